//! Relay service.
//!
//! Submits on behalf of users with a signer derived per (chain, space). Submissions using the
//! same signer run one at a time so they never race for a nonce.

use std::collections::HashMap;
use std::sync::Arc;

use alloy_primitives::{Address, Bytes};
use sx_client::{EvmProvider, NativeAccount, NativeProvider, NetworkConfig, NetworkMap, Receipt, SpaceClient, SxError};
use sx_types::{ActionKind, Envelope, NativeAddress};
use tracing::info;

use crate::derivation::{DerivedSigner, SignerDerivation};
use crate::locks::SignerLocks;
use crate::sponsor::{SponsorClient, SponsorError};

#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error(transparent)]
    Client(#[from] SxError),

    #[error(transparent)]
    Sponsor(#[from] SponsorError),

    #[error("invalid params: {0}")]
    InvalidParams(String),
}

/// One served network: its dispatch client and the L1 it executes on.
#[derive(Clone)]
struct Chain {
    client: SpaceClient,
    l1: Arc<dyn EvmProvider>,
}

pub struct RelayService {
    networks: NetworkMap,
    chains: HashMap<u64, Chain>,
    derivation: SignerDerivation,
    locks: SignerLocks,
    sponsor: Option<SponsorClient>,
}

impl RelayService {
    pub fn new(derivation: SignerDerivation) -> Self {
        RelayService {
            networks: NetworkMap::new(),
            chains: HashMap::new(),
            derivation,
            locks: SignerLocks::new(),
            sponsor: None,
        }
    }

    /// Serve `network`, submitting governance chain calls through `native` and L1 calls through `l1`.
    pub fn with_network(
        mut self,
        network: NetworkConfig,
        native: Arc<dyn NativeProvider>,
        l1: Arc<dyn EvmProvider>,
    ) -> Self {
        let network = self.networks.insert(network);
        let client = SpaceClient::new(network.clone(), native);
        self.chains.insert(network.chain_id, Chain { client, l1 });
        self
    }

    pub fn with_sponsor(mut self, sponsor: SponsorClient) -> Self {
        self.sponsor = Some(sponsor);
        self
    }

    pub fn chain_ids(&self) -> Vec<u64> {
        self.networks.chain_ids()
    }

    fn chain(&self, chain_id: u64) -> Result<&Chain, RelayError> {
        let network = self.networks.get(chain_id)?;
        self.chains
            .get(&network.chain_id)
            .ok_or(RelayError::Client(SxError::UnsupportedNetwork(chain_id)))
    }

    pub fn signer(&self, chain_id: u64, space: NativeAddress) -> Result<DerivedSigner, RelayError> {
        self.chain(chain_id)?;
        Ok(self.derivation.signer(chain_id, space)?)
    }

    /// Dispatch a signed envelope. The action kind comes from the envelope's type markers.
    pub async fn send(&self, chain_id: u64, envelope: Envelope) -> Result<Receipt, RelayError> {
        let chain = self.chain(chain_id)?;
        let types = envelope
            .signature_data
            .as_ref()
            .map(|sig| sig.types.keys().map(String::as_str).collect::<Vec<_>>())
            .unwrap_or_default();
        let kind = ActionKind::from_type_markers(types.iter().copied()).ok_or_else(|| {
            RelayError::InvalidParams("envelope carries no single Propose, updateProposal or Vote type".to_string())
        })?;
        if kind != envelope.data.kind() {
            return Err(RelayError::InvalidParams(format!(
                "envelope types describe a {kind} action, data is a {}",
                envelope.data.kind()
            )));
        }

        let space = envelope.data.space();
        let signer = self.derivation.signer(chain_id, space)?;
        let _guard = self.locks.acquire(signer.account.address()).await;
        let receipt = match kind {
            ActionKind::Propose => chain.client.propose(&signer.account, envelope).await?,
            ActionKind::UpdateProposal => chain.client.update_proposal(&signer.account, envelope).await?,
            ActionKind::Vote => chain.client.vote(&signer.account, envelope).await?,
            ActionKind::Cancel | ActionKind::AdminSetting => {
                return Err(RelayError::InvalidParams(format!("{kind} is not relayed")))
            }
        };
        info!(chain_id, %space, action = %kind, tx = %receipt.transaction_hash, "relayed envelope");
        Ok(receipt)
    }

    /// Hand finalization of a proposal to the sponsorship service.
    pub async fn finalize_proposal(
        &self,
        chain_id: u64,
        space: NativeAddress,
        proposal_id: u64,
    ) -> Result<String, RelayError> {
        self.chain(chain_id)?;
        let sponsor = self.sponsor.as_ref().ok_or_else(|| {
            RelayError::Client(SxError::Configuration("no sponsorship service configured".to_string()))
        })?;
        Ok(sponsor.finalize(chain_id, space, proposal_id).await?)
    }

    pub async fn execute(
        &self,
        chain_id: u64,
        space: NativeAddress,
        proposal_id: u64,
        execution_params: &[Bytes],
    ) -> Result<Receipt, RelayError> {
        let chain = self.chain(chain_id)?;
        let signer = self.derivation.signer(chain_id, space)?;
        let _guard = self.locks.acquire(signer.account.address()).await;
        Ok(chain.client.execute(&signer.account, space, proposal_id, execution_params).await?)
    }

    pub async fn execute_queued_proposal(
        &self,
        chain_id: u64,
        space: NativeAddress,
        timelock: Address,
        execution_params: &[Bytes],
    ) -> Result<Receipt, RelayError> {
        let chain = self.chain(chain_id)?;
        let signer = self.derivation.signer(chain_id, space)?;
        let wallet = signer.wallet.connect(chain.l1.clone());
        let _guard = self.locks.acquire(signer.account.address()).await;
        Ok(chain.client.execute_queued_proposal(&wallet, timelock, execution_params).await?)
    }
}
