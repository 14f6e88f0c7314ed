//! In-process governance chain plus L1.
//!
//! `Devnet` implements both `NativeProvider` and `EvmProvider`, so the client, the pipeline and
//! the relay service run against it unchanged. Messages between the chains move only on
//! `flush()`, and time moves only on `increase_time()`.
//!
//! Each transaction runs against a copy of the chain it targets; the copy replaces the chain
//! only when the transaction succeeds.

mod l1;
mod native;

use std::collections::HashMap;
use std::sync::Arc;

use alloy_primitives::{Address, Bytes, B256, U256};
use async_trait::async_trait;
use parking_lot::Mutex;
use sx_types::{MetaTransaction, NativeAddress};
use tracing::{debug, info, warn};

use crate::calldata::{keccak256_bytes, keccak_words, NativeCall};
use crate::errors::{Result, SxError};
use crate::network::{
    AuthenticatorKind, ExecutionStrategyType, L1Config, NetworkConfig, VotingStrategyKind,
};
use crate::provider::{EvmProvider, EvmTransaction, NativeProvider, Receipt};
use crate::signer::{recover_native_account, EthWallet, LocalNativeAccount, NativeAccount};

use l1::{Executor, L1Chain, L1Contract, Timelock};
use native::{Authenticator, ExecutionStrategy, NativeChain};

pub use native::{payload_hash, FinalizationStatus, Proposal, Space};

pub const DEVNET_CHAIN_ID: u64 = 0x534e_5f44_4556;
pub const DEVNET_L1_CHAIN_ID: u64 = 31337;
pub const DEFAULT_TIMELOCK_DELAY: u64 = 3_600;

/// Message from a governance chain contract to an L1 contract.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct L2ToL1Message {
    pub from: NativeAddress,
    pub to: Address,
    pub payload: Vec<U256>,
}

impl L2ToL1Message {
    /// `keccak256(from ‖ to ‖ len ‖ payload)`.
    pub fn hash(&self) -> B256 {
        let mut words = Vec::with_capacity(self.payload.len() + 3);
        words.push(self.from.word());
        words.push(U256::from_be_slice(self.to.as_slice()));
        words.push(U256::from(self.payload.len()));
        words.extend_from_slice(&self.payload);
        B256::from(keccak_words(&words).to_be_bytes::<32>())
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct L1ToL2Message {
    pub from: Address,
    pub to: NativeAddress,
    pub payload: Vec<U256>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FlushReport {
    pub to_l1: usize,
    pub to_l2: usize,
}

#[derive(Clone, Debug, Default)]
struct State {
    timestamp: u64,
    native: NativeChain,
    l1: L1Chain,
    native_nonces: HashMap<NativeAddress, u64>,
    l1_nonces: HashMap<Address, u64>,
    /// Every L2 -> L1 message propagated so far.
    propagated: Vec<L2ToL1Message>,
}

/// Contracts deployed by `Devnet::bootstrap`.
#[derive(Clone, Debug)]
pub struct Deployment {
    pub network: NetworkConfig,
    pub space: NativeAddress,
    pub owner: LocalNativeAccount,
    pub vanilla_authenticator: NativeAddress,
    pub eth_sig_authenticator: NativeAddress,
    pub eth_tx_authenticator: NativeAddress,
    pub native_sig_authenticator: NativeAddress,
    pub native_tx_authenticator: NativeAddress,
    pub vanilla_strategy: NativeAddress,
    pub erc20_votes_strategy: NativeAddress,
    pub vanilla_execution: NativeAddress,
    /// Relays to `avatar`.
    pub avatar_relayer: NativeAddress,
    /// Relays to `timelock`.
    pub timelock_relayer: NativeAddress,
    pub l1_commit: Address,
    pub avatar: Address,
    pub timelock: Address,
    pub guardian: EthWallet,
}

#[derive(Clone, Default)]
pub struct Devnet {
    state: Arc<Mutex<State>>,
}

impl Devnet {
    pub fn new(chain_id: u64, l1_chain_id: u64) -> Self {
        let mut state = State::default();
        state.native.chain_id = chain_id;
        state.native.eip712_chain_id = l1_chain_id;
        state.l1.chain_id = l1_chain_id;
        Devnet { state: Arc::new(Mutex::new(state)) }
    }

    /// A devnet with one space reachable through every authenticator kind, relayers to an L1
    /// avatar and an L1 timelock, and the matching network config.
    pub fn bootstrap() -> (Devnet, Deployment) {
        let devnet = Devnet::new(DEVNET_CHAIN_ID, DEVNET_L1_CHAIN_ID);
        let owner = LocalNativeAccount::random();
        let guardian = devnet.wallet();

        let native = |n: u64| NativeAddress::from_u64(0x1000 + n);
        let mut deployment = Deployment {
            network: NetworkConfig {
                name: "sn-devnet".to_string(),
                chain_id: DEVNET_CHAIN_ID,
                eip712_chain_id: DEVNET_L1_CHAIN_ID,
                l1: L1Config {
                    chain_id: DEVNET_L1_CHAIN_ID,
                    rpc_url: None,
                    commit: Address::with_last_byte(0xc0),
                },
                space_factory: Some(native(0)),
                start_block: 0,
                authenticators: Default::default(),
                strategies: Default::default(),
                execution_strategies: Default::default(),
            },
            space: native(1),
            owner,
            vanilla_authenticator: native(0x10),
            eth_sig_authenticator: native(0x11),
            eth_tx_authenticator: native(0x12),
            native_sig_authenticator: native(0x13),
            native_tx_authenticator: native(0x14),
            vanilla_strategy: native(0x20),
            erc20_votes_strategy: native(0x21),
            vanilla_execution: native(0x30),
            avatar_relayer: native(0x31),
            timelock_relayer: native(0x32),
            l1_commit: Address::with_last_byte(0xc0),
            avatar: Address::with_last_byte(0xa1),
            timelock: Address::with_last_byte(0xa2),
            guardian,
        };

        {
            let mut state = devnet.state.lock();
            let chain = &mut state.native;
            chain.l1_commit = deployment.l1_commit;

            let authenticators = [
                (deployment.vanilla_authenticator, AuthenticatorKind::Vanilla),
                (deployment.eth_sig_authenticator, AuthenticatorKind::EthSig),
                (deployment.eth_tx_authenticator, AuthenticatorKind::EthTx),
                (deployment.native_sig_authenticator, AuthenticatorKind::NativeSig),
                (deployment.native_tx_authenticator, AuthenticatorKind::NativeTx),
            ];
            let mut space = Space::new(deployment.owner.address());
            for (addr, kind) in authenticators {
                chain.authenticators.insert(addr, Authenticator::new(kind));
                space.authenticators.insert(addr);
                deployment.network.authenticators.insert(addr, kind);
            }

            for (addr, kind) in [
                (deployment.vanilla_strategy, VotingStrategyKind::Vanilla),
                (deployment.erc20_votes_strategy, VotingStrategyKind::Erc20Votes),
            ] {
                chain.voting_strategies.insert(addr, kind);
                space.voting_strategies.push(addr);
                deployment.network.strategies.insert(addr, kind);
            }

            for (addr, kind) in [
                (deployment.vanilla_execution, ExecutionStrategyType::Vanilla),
                (deployment.avatar_relayer, ExecutionStrategyType::EthRelayer),
                (deployment.timelock_relayer, ExecutionStrategyType::EthRelayer),
            ] {
                chain.execution_strategies.insert(addr, ExecutionStrategy::new(kind, U256::from(1u8)));
                deployment.network.execution_strategies.insert(addr, kind);
            }
            chain.spaces.insert(deployment.space, space);

            let contracts = &mut state.l1.contracts;
            contracts.insert(deployment.l1_commit, L1Contract::Commit);
            contracts.insert(
                deployment.avatar,
                L1Contract::Avatar(Executor::new(deployment.avatar_relayer, U256::from(1u8))),
            );
            contracts.insert(
                deployment.timelock,
                L1Contract::Timelock(Timelock::new(
                    Executor::new(deployment.timelock_relayer, U256::from(1u8)),
                    DEFAULT_TIMELOCK_DELAY,
                    deployment.guardian.address(),
                )),
            );
        }
        info!(space = %deployment.space, "bootstrapped devnet");
        (devnet, deployment)
    }

    /// A fresh ethereum wallet connected to this devnet's L1.
    pub fn wallet(&self) -> EthWallet {
        EthWallet::random().connect(Arc::new(self.clone()))
    }

    pub fn native_provider(&self) -> Arc<dyn NativeProvider> {
        Arc::new(self.clone())
    }

    pub fn timestamp(&self) -> u64 {
        self.state.lock().timestamp
    }

    pub fn increase_time(&self, seconds: u64) {
        let mut state = self.state.lock();
        state.timestamp += seconds;
        debug!(timestamp = state.timestamp, "advanced devnet time");
    }

    /// Voting power of `account` under the erc20 votes strategy.
    pub fn set_voting_power(&self, account: NativeAddress, power: U256) {
        self.state.lock().native.balances.insert(account, power);
    }

    /// Propagate pending messages in both directions.
    pub fn flush(&self) -> FlushReport {
        let mut state = self.state.lock();
        let to_l1 = std::mem::take(&mut state.native.outbox);
        for message in &to_l1 {
            *state.l1.inbox.entry(message.hash()).or_default() += 1;
        }

        let to_l2 = std::mem::take(&mut state.l1.outbox);
        for message in &to_l2 {
            let mut next = state.native.clone();
            match next.receive_from_l1(message) {
                Ok(()) => state.native = next,
                Err(err) => warn!(to = %message.to, error = %err, "L1 message handler failed"),
            }
        }

        let report = FlushReport { to_l1: to_l1.len(), to_l2: to_l2.len() };
        state.propagated.extend(to_l1);
        info!(to_l1 = report.to_l1, to_l2 = report.to_l2, "flushed messages");
        report
    }

    pub fn space(&self, space: NativeAddress) -> Option<Space> {
        self.state.lock().native.spaces.get(&space).cloned()
    }

    pub fn proposal(&self, space: NativeAddress, proposal_id: u64) -> Option<Proposal> {
        self.state
            .lock()
            .native
            .spaces
            .get(&space)
            .and_then(|s| s.proposals.get(&proposal_id).cloned())
    }

    /// Transactions carried out by an L1 executor.
    pub fn executed_transactions(&self, executor: Address) -> Vec<MetaTransaction> {
        match self.state.lock().l1.contracts.get(&executor) {
            Some(L1Contract::Avatar(executor)) => executor.transactions.clone(),
            Some(L1Contract::Timelock(timelock)) => timelock.executor.transactions.clone(),
            _ => Vec::new(),
        }
    }

    pub fn is_queued(&self, timelock: Address, execution_hash: B256) -> bool {
        matches!(
            self.state.lock().l1.contracts.get(&timelock),
            Some(L1Contract::Timelock(t)) if t.queue.contains_key(&execution_hash)
        )
    }

    pub fn nonce(&self, account: NativeAddress) -> u64 {
        self.state.lock().native_nonces.get(&account).copied().unwrap_or_default()
    }
}

fn native_tx_hash(sender: NativeAddress, nonce: u64, call: &NativeCall) -> B256 {
    let mut words = Vec::with_capacity(call.calldata.len() + 4);
    words.push(sender.word());
    words.push(U256::from(nonce));
    words.push(call.contract_address.word());
    words.push(call.selector());
    words.extend_from_slice(&call.calldata);
    B256::from(keccak_words(&words).to_be_bytes::<32>())
}

fn l1_tx_hash(sender: Address, nonce: u64, tx: &EvmTransaction) -> B256 {
    let mut buf = Vec::with_capacity(20 * 2 + 8 + tx.data.len());
    buf.extend_from_slice(sender.as_slice());
    buf.extend_from_slice(&nonce.to_be_bytes());
    buf.extend_from_slice(tx.to.as_slice());
    buf.extend_from_slice(&tx.data);
    keccak256_bytes(&buf)
}

#[async_trait]
impl NativeProvider for Devnet {
    async fn chain_id(&self) -> Result<u64> {
        Ok(self.state.lock().native.chain_id)
    }

    async fn invoke(&self, account: &dyn NativeAccount, call: NativeCall) -> Result<Receipt> {
        let sender = account.address();
        let nonce = self.nonce(sender);
        let hash = native_tx_hash(sender, nonce, &call);
        let signature = account.sign_hash(hash).await?;

        let mut state = self.state.lock();
        if recover_native_account(hash, &signature).ok() != Some(sender) {
            return Err(SxError::reverted("invalid account signature"));
        }
        let current = state.native_nonces.get(&sender).copied().unwrap_or_default();
        if current != nonce {
            return Err(SxError::reverted(format!("invalid nonce {nonce}, expected {current}")));
        }
        state.native_nonces.insert(sender, nonce + 1);

        let now = state.timestamp;
        let mut next = state.native.clone();
        match next.invoke(sender, now, &call) {
            Ok(_) => {
                state.native = next;
                debug!(%sender, target = %call.contract_address, entrypoint = call.entrypoint, tx = %hash, "invoke succeeded");
                Ok(Receipt { transaction_hash: hash })
            }
            Err(err) => {
                debug!(%sender, target = %call.contract_address, entrypoint = call.entrypoint, error = %err, "invoke reverted");
                Err(err)
            }
        }
    }

    async fn call(&self, call: NativeCall) -> Result<Vec<U256>> {
        let state = self.state.lock();
        let mut scratch = state.native.clone();
        scratch.invoke(NativeAddress::ZERO, state.timestamp, &call)
    }

    async fn messages_to_l1(&self, from: NativeAddress, to: Address) -> Result<Vec<Vec<U256>>> {
        Ok(self
            .state
            .lock()
            .propagated
            .iter()
            .filter(|m| m.from == from && m.to == to)
            .map(|m| m.payload.clone())
            .collect())
    }
}

#[async_trait]
impl EvmProvider for Devnet {
    async fn chain_id(&self) -> Result<u64> {
        Ok(self.state.lock().l1.chain_id)
    }

    async fn send_transaction(&self, wallet: &EthWallet, tx: EvmTransaction) -> Result<Receipt> {
        let sender = wallet.address();
        let mut state = self.state.lock();
        let nonce = state.l1_nonces.get(&sender).copied().unwrap_or_default();
        state.l1_nonces.insert(sender, nonce + 1);
        let hash = l1_tx_hash(sender, nonce, &tx);

        let now = state.timestamp;
        let mut next = state.l1.clone();
        next.transact(sender, now, &tx)?;
        state.l1 = next;
        debug!(%sender, to = %tx.to, tx = %hash, "L1 transaction succeeded");
        Ok(Receipt { transaction_hash: hash })
    }

    async fn call(&self, tx: EvmTransaction) -> Result<Bytes> {
        let state = self.state.lock();
        let mut scratch = state.l1.clone();
        scratch.transact(Address::ZERO, state.timestamp, &tx)?;
        Ok(Bytes::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bootstrap_network_matches_contracts() {
        let (devnet, deployment) = Devnet::bootstrap();
        let network = &deployment.network;
        assert_eq!(network.authenticators.len(), 5);
        assert_eq!(
            network.authenticator_kind(deployment.native_tx_authenticator).unwrap(),
            AuthenticatorKind::NativeTx
        );
        assert_eq!(
            network.execution_strategy_type(deployment.avatar_relayer).unwrap(),
            ExecutionStrategyType::EthRelayer
        );
        let space = devnet.space(deployment.space).unwrap();
        assert_eq!(space.owner, deployment.owner.address());
        assert_eq!(space.next_proposal_id, 1);
    }

    #[test]
    fn test_message_identity_binds_endpoints() {
        let message = L2ToL1Message {
            from: NativeAddress::from_u64(1),
            to: Address::with_last_byte(2),
            payload: vec![U256::from(3u8)],
        };
        let mut other = message.clone();
        other.to = Address::with_last_byte(4);
        assert_ne!(message.hash(), other.hash());
        assert_eq!(message.hash(), message.clone().hash());
    }

    #[tokio::test]
    async fn test_invoke_bumps_nonce_and_reverts_atomically() {
        let (devnet, deployment) = Devnet::bootstrap();
        let owner = &deployment.owner;
        let call = NativeCall::new(deployment.space, "set_voting_delay", vec![U256::from(5u8)]);
        devnet.invoke(owner, call).await.unwrap();
        assert_eq!(devnet.nonce(owner.address()), 1);

        let stranger = LocalNativeAccount::random();
        let call = NativeCall::new(deployment.space, "set_voting_delay", vec![U256::from(9u8)]);
        let err = devnet.invoke(&stranger, call).await.unwrap_err();
        assert!(matches!(err, SxError::ExecutionReverted { .. }));
        assert_eq!(devnet.space(deployment.space).unwrap().voting_delay, 5);
    }

    #[tokio::test]
    async fn test_views_do_not_write() {
        let (devnet, deployment) = Devnet::bootstrap();
        let out = NativeProvider::call(&devnet, NativeCall::new(deployment.space, "next_proposal_id", vec![]))
            .await
            .unwrap();
        assert_eq!(out, vec![U256::from(1u8)]);
    }
}
