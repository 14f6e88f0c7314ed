use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use alloy_primitives::{Address, Bytes, U256};
use async_trait::async_trait;
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use parking_lot::Mutex;
use serde_json::{json, Value};
use sx_client::authenticators::{EthSigAuthenticator, SaltSource};
use sx_client::calldata::NativeCall;
use sx_client::devnet::{Deployment, Devnet};
use sx_client::{EthWallet, EvmProvider, NativeAccount, NativeProvider, Receipt, SpaceClient, SxError};
use sx_types::{ActionPayload, ChainAddress, ExecutionStrategyInput, NativeAddress, ProposeAction, StrategyConfig};
use tokio::net::TcpListener;

use crate::rpc::{build_router, RpcState};
use crate::{RelayError, RelayService, SignerDerivation, SponsorClient};

struct Harness {
    devnet: Devnet,
    deployment: Deployment,
    url: String,
}

impl Harness {
    fn rpc_url(&self, chain_id: u64) -> String {
        format!("{}/rpc/{chain_id}", self.url)
    }

    fn chain_id(&self) -> u64 {
        self.deployment.network.chain_id
    }

    async fn call(&self, method: &str, params: Value) -> Value {
        let body = json!({ "jsonrpc": "2.0", "id": 1, "method": method, "params": params });
        post_json(&self.rpc_url(self.chain_id()), body.to_string()).await
    }
}

async fn serve(router: Router) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    addr
}

async fn post_json(url: &str, body: String) -> Value {
    reqwest::Client::new()
        .post(url)
        .header("content-type", "application/json")
        .body(body)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap()
}

async fn start(sponsor_url: Option<String>) -> Harness {
    let (devnet, deployment) = Devnet::bootstrap();
    let l1: Arc<dyn EvmProvider> = Arc::new(devnet.clone());

    let mut service = RelayService::new(SignerDerivation::new(vec![0x42; 32], 16)).with_network(
        deployment.network.clone(),
        devnet.native_provider(),
        l1,
    );
    if let Some(url) = sponsor_url {
        service = service.with_sponsor(SponsorClient::new(url, "1000"));
    }
    let addr = serve(build_router(Arc::new(RpcState::new(service)), 64 * 1024)).await;
    Harness { devnet, deployment, url: format!("http://{addr}") }
}

type Seen = Arc<Mutex<Vec<Value>>>;

/// Sponsorship mock answering every request with `status`.
async fn sponsor_mock(status: StatusCode, answer: &'static str) -> (String, Seen) {
    async fn handle(
        State((seen, status, answer)): State<(Seen, StatusCode, &'static str)>,
        Json(body): Json<Value>,
    ) -> (StatusCode, &'static str) {
        seen.lock().push(body);
        (status, answer)
    }

    let seen = Seen::default();
    let router = Router::new().route("/sponsor", post(handle)).with_state((seen.clone(), status, answer));
    let addr = serve(router).await;
    (format!("http://{addr}/sponsor"), seen)
}

fn propose_action(d: &Deployment, uri: &str) -> ActionPayload {
    ActionPayload::Propose(ProposeAction {
        space: d.space,
        authenticator: d.eth_sig_authenticator,
        strategies: vec![StrategyConfig { index: 0, address: d.vanilla_strategy, params: Bytes::new(), metadata: None }],
        execution_strategy: ExecutionStrategyInput { addr: d.vanilla_execution, params: vec![Bytes::from_static(&[0])] },
        metadata_uri: uri.to_string(),
    })
}

#[tokio::test]
async fn test_send_relays_signed_proposal() {
    let h = start(None).await;
    let d = &h.deployment;
    let wallet = EthWallet::random();
    let envelope = EthSigAuthenticator::new(Arc::new(d.network.clone()))
        .with_salt(SaltSource::Pinned(U256::from(1u8)))
        .sign(&wallet, propose_action(d, "ipfs://relayed"))
        .await
        .unwrap();

    let response = h.call("send", json!({ "envelope": envelope })).await;
    assert_eq!(response["jsonrpc"], "2.0");
    assert_eq!(response["id"], 1);
    assert!(response["result"]["transactionHash"].is_string(), "{response}");

    let proposal = h.devnet.proposal(d.space, 1).unwrap();
    assert_eq!(proposal.author, ChainAddress::Ethereum(wallet.address()));
    assert_eq!(proposal.metadata_uri, "ipfs://relayed");

    // Replayed envelope reverts on chain.
    let response = h.call("send", json!({ "envelope": envelope })).await;
    assert_eq!(response["error"]["code"], -32002);
    assert!(response["error"]["message"].as_str().unwrap().contains("salt already used"));
}

#[tokio::test]
async fn test_send_rejects_mismatched_type_markers() {
    let h = start(None).await;
    let d = &h.deployment;
    let mut envelope = EthSigAuthenticator::new(Arc::new(d.network.clone()))
        .sign(&EthWallet::random(), propose_action(d, ""))
        .await
        .unwrap();
    if let Some(sig) = envelope.signature_data.as_mut() {
        let fields = sig.types.remove("Propose").unwrap_or_default();
        sig.types.insert("Vote".to_string(), fields);
    }

    let response = h.call("send", json!({ "envelope": envelope })).await;
    assert_eq!(response["error"]["code"], -32602);
    assert!(h.devnet.proposal(d.space, 1).is_none());
}

#[tokio::test]
async fn test_request_errors() {
    let h = start(None).await;

    let response = h.call("teleport", json!({})).await;
    assert_eq!(response["error"]["code"], -32601);

    let response = post_json(&h.rpc_url(h.chain_id()), "{not json".to_string()).await;
    assert_eq!(response["error"]["code"], -32700);
    assert_eq!(response["id"], Value::Null);

    let response = post_json(&h.rpc_url(h.chain_id()), json!({ "id": 3 }).to_string()).await;
    assert_eq!(response["error"]["code"], -32600);

    let response = h.call("execute", json!({ "space": h.deployment.space })).await;
    assert_eq!(response["error"]["code"], -32602);

    let body = json!({ "jsonrpc": "2.0", "id": 9, "method": "execute", "params": {
        "space": h.deployment.space, "proposalId": 1, "executionParams": []
    }});
    let response = post_json(&h.rpc_url(1), body.to_string()).await;
    assert_eq!(response["error"]["code"], -32001);
    assert_eq!(response["id"], 9);
}

#[tokio::test]
async fn test_execute_surfaces_revert() {
    let h = start(None).await;
    let d = &h.deployment;
    SpaceClient::new(Arc::new(d.network.clone()), h.devnet.native_provider())
        .propose(&d.owner, {
            let mut action = propose_action(d, "");
            if let ActionPayload::Propose(p) = &mut action {
                p.authenticator = d.vanilla_authenticator;
            }
            action
        })
        .await
        .unwrap();

    let response = h
        .call("execute", json!({ "space": d.space, "proposalId": 1, "executionParams": ["0x00"] }))
        .await;
    assert_eq!(response["error"]["code"], -32002);
    assert!(response["error"]["message"].as_str().unwrap().contains("proposal not accepted"));
}

#[tokio::test]
async fn test_finalize_proposal_goes_through_sponsor() {
    let (sponsor, seen) = sponsor_mock(StatusCode::OK, "queued").await;
    let h = start(Some(sponsor)).await;

    let response = h.call("finalizeProposal", json!({ "space": h.deployment.space, "proposalId": 4 })).await;
    assert_eq!(response["result"], "queued");

    let seen = seen.lock();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0]["chainId"], h.chain_id());
    assert_eq!(seen[0]["proposalId"], 4);
    assert_eq!(seen[0]["feeData"]["maxFeePerGas"], "1000");
}

#[tokio::test]
async fn test_sponsor_rejection_is_not_retried() {
    let (sponsor, seen) = sponsor_mock(StatusCode::FORBIDDEN, "space not whitelisted").await;
    let h = start(Some(sponsor)).await;

    let response = h.call("finalizeProposal", json!({ "space": h.deployment.space, "proposalId": 1 })).await;
    assert_eq!(response["error"]["code"], -32003);
    assert!(response["error"]["message"].as_str().unwrap().contains("space not whitelisted"));
    assert_eq!(seen.lock().len(), 1);
}

#[tokio::test]
async fn test_finalize_without_sponsor_is_refused() {
    let h = start(None).await;
    let response = h.call("finalizeProposal", json!({ "space": h.deployment.space, "proposalId": 1 })).await;
    assert_eq!(response["error"]["code"], -32602);
}

#[tokio::test]
async fn test_health() {
    let h = start(None).await;
    let health: Value = reqwest::get(format!("{}/health", h.url)).await.unwrap().json().await.unwrap();
    assert_eq!(health["status"], "healthy");
    assert_eq!(health["service"], "sx-relayer");
    assert_eq!(health["chains"], json!([h.chain_id()]));
    assert!(time::OffsetDateTime::parse(
        health["startedAt"].as_str().unwrap(),
        &time::format_description::well_known::Rfc3339
    )
    .is_ok());
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Event {
    Start(NativeAddress),
    End(NativeAddress),
}

/// Devnet provider that records when each submission starts and ends, holding it open for a while.
struct Recording {
    inner: Devnet,
    events: Arc<Mutex<Vec<Event>>>,
}

#[async_trait]
impl NativeProvider for Recording {
    async fn chain_id(&self) -> sx_client::Result<u64> {
        NativeProvider::chain_id(&self.inner).await
    }

    async fn invoke(&self, account: &dyn NativeAccount, call: NativeCall) -> sx_client::Result<Receipt> {
        self.events.lock().push(Event::Start(account.address()));
        tokio::time::sleep(Duration::from_millis(25)).await;
        let outcome = self.inner.invoke(account, call).await;
        self.events.lock().push(Event::End(account.address()));
        outcome
    }

    async fn call(&self, call: NativeCall) -> sx_client::Result<Vec<U256>> {
        NativeProvider::call(&self.inner, call).await
    }

    async fn messages_to_l1(&self, from: NativeAddress, to: Address) -> sx_client::Result<Vec<Vec<U256>>> {
        self.inner.messages_to_l1(from, to).await
    }
}

fn recording_service() -> (RelayService, Devnet, Deployment, Arc<Mutex<Vec<Event>>>) {
    let (devnet, deployment) = Devnet::bootstrap();
    let events = Arc::new(Mutex::new(Vec::new()));
    let native = Arc::new(Recording { inner: devnet.clone(), events: events.clone() });
    let service = RelayService::new(SignerDerivation::new(vec![0x42; 32], 16)).with_network(
        deployment.network.clone(),
        native,
        Arc::new(devnet.clone()),
    );
    (service, devnet, deployment, events)
}

#[tokio::test]
async fn test_concurrent_sends_for_one_space_are_serialized() {
    let (service, devnet, d, events) = recording_service();
    let chain_id = d.network.chain_id;
    let wallet = EthWallet::random();
    let mut envelopes = Vec::new();
    for (salt, uri) in [(1u8, "ipfs://first"), (2, "ipfs://second")] {
        let authenticator =
            EthSigAuthenticator::new(Arc::new(d.network.clone())).with_salt(SaltSource::Pinned(U256::from(salt)));
        envelopes.push(authenticator.sign(&wallet, propose_action(&d, uri)).await.unwrap());
    }
    let second = envelopes.pop().unwrap();
    let first = envelopes.pop().unwrap();

    let (a, b) = tokio::join!(service.send(chain_id, first), service.send(chain_id, second));
    assert_ne!(a.unwrap(), b.unwrap());

    let signer = service.signer(chain_id, d.space).unwrap().account.address();
    assert_eq!(
        *events.lock(),
        vec![Event::Start(signer), Event::End(signer), Event::Start(signer), Event::End(signer)]
    );
    assert_eq!(devnet.nonce(signer), 2);
    let mut uris: Vec<String> = (1..=2).map(|id| devnet.proposal(d.space, id).unwrap().metadata_uri).collect();
    uris.sort();
    assert_eq!(uris, ["ipfs://first", "ipfs://second"]);
}

#[tokio::test]
async fn test_concurrent_executes_for_two_spaces_overlap() {
    let (service, devnet, d, events) = recording_service();
    let chain_id = d.network.chain_id;
    let other = NativeAddress::from_u64(0xbeef);
    let params = [Bytes::from_static(&[0])];

    let (a, b) = tokio::join!(
        service.execute(chain_id, d.space, 1, &params),
        service.execute(chain_id, other, 1, &params)
    );
    // Nothing was proposed, so both revert after reaching the chain.
    assert!(matches!(a, Err(RelayError::Client(SxError::ExecutionReverted { .. }))));
    assert!(matches!(b, Err(RelayError::Client(SxError::ExecutionReverted { .. }))));

    let first = service.signer(chain_id, d.space).unwrap().account.address();
    let second = service.signer(chain_id, other).unwrap().account.address();
    assert_ne!(first, second);
    let events = events.lock();
    assert_eq!(events.len(), 4);
    assert!(matches!(&events[..2], [Event::Start(_), Event::Start(_)]), "{events:?}");
    assert_eq!(devnet.nonce(first), 1);
    assert_eq!(devnet.nonce(second), 1);
}
