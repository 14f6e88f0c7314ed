//! Cross-chain execution pipeline.
//!
//! Drives one relayed proposal through
//! `ProposalOpen -> AwaitingFinalization -> AwaitingRelay -> Executed`, or `Vetoed` when a
//! timelock guardian vetoes the queued proposal.
//!
//! The pipeline records nothing about consumed messages. Replays are rejected by the L1
//! executor, which consumes each relayed message once and refuses already executed proposals.

use std::time::{Duration, Instant};

use alloy_primitives::{Address, Bytes, U256};
use alloy_sol_types::SolCall;
use sx_types::{ExecutionIntent, NativeAddress, RelayedMessage};
use tracing::{debug, info, warn};

use crate::abi::{to_abi_transactions, IL1AvatarExecutionStrategy, IL1TimelockExecutionStrategy, L2Proposal};
use crate::client::SpaceClient;
use crate::errors::{Result, SxError};
use crate::executors::{self, execution_hash, ExecutionData};
use crate::network::ExecutionStrategyType;
use crate::provider::{with_read_retry, EvmTransaction, Receipt, RetryPolicy};
use crate::signer::{EthWallet, NativeAccount};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum L1DestinationKind {
    /// Executes immediately.
    Avatar,
    /// Queues, then executes after a delay unless vetoed.
    Timelock,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct L1Destination {
    pub kind: L1DestinationKind,
    pub address: Address,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RelayState {
    ProposalOpen,
    AwaitingFinalization,
    AwaitingRelay { message: RelayedMessage, queued: bool },
    Executed,
    Vetoed,
}

impl RelayState {
    fn name(&self) -> &'static str {
        match self {
            RelayState::ProposalOpen => "ProposalOpen",
            RelayState::AwaitingFinalization => "AwaitingFinalization",
            RelayState::AwaitingRelay { queued: false, .. } => "AwaitingRelay",
            RelayState::AwaitingRelay { queued: true, .. } => "AwaitingRelay(queued)",
            RelayState::Executed => "Executed",
            RelayState::Vetoed => "Vetoed",
        }
    }
}

pub struct CrossChainExecution {
    client: SpaceClient,
    space: NativeAddress,
    proposal_id: u64,
    strategy: NativeAddress,
    destination: L1Destination,
    intent: ExecutionIntent,
    poll_interval: Duration,
    retry: RetryPolicy,
    state: RelayState,
}

impl CrossChainExecution {
    /// Pipeline for `proposal_id`, relayed by `strategy` to `destination`.
    pub fn new(
        client: SpaceClient,
        space: NativeAddress,
        proposal_id: u64,
        strategy: NativeAddress,
        destination: L1Destination,
        mut intent: ExecutionIntent,
    ) -> Result<Self> {
        let strategy_type = client.network().execution_strategy_type(strategy)?;
        if strategy_type != ExecutionStrategyType::EthRelayer {
            return Err(SxError::Configuration(format!(
                "{strategy} is a {strategy_type:?} strategy, not a relayer"
            )));
        }
        match intent.destination {
            None => intent.destination = Some(destination.address),
            Some(addr) if addr == destination.address => {}
            Some(addr) => {
                return Err(SxError::Configuration(format!(
                    "intent targets {addr}, pipeline targets {}",
                    destination.address
                )))
            }
        }
        Ok(CrossChainExecution {
            client,
            space,
            proposal_id,
            strategy,
            destination,
            intent,
            poll_interval: Duration::from_millis(500),
            retry: RetryPolicy::default(),
            state: RelayState::ProposalOpen,
        })
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn state(&self) -> &RelayState {
        &self.state
    }

    /// Execution params for the relayer strategy, with the hash L1 will check.
    pub fn execution_data(&self) -> Result<ExecutionData> {
        executors::encode(ExecutionStrategyType::EthRelayer, self.strategy, &self.intent)
    }

    fn wrong_state(&self, operation: &str) -> SxError {
        SxError::Configuration(format!("cannot {operation} in state {}", self.state.name()))
    }

    /// Finalize on the governance chain; emits the message to L1.
    pub async fn finalize(&mut self, account: &dyn NativeAccount) -> Result<Receipt> {
        if self.state != RelayState::ProposalOpen {
            return Err(self.wrong_state("finalize"));
        }
        let params = self.execution_data()?.execution_params;
        let receipt = self.client.execute(account, self.space, self.proposal_id, &params).await?;
        self.state = RelayState::AwaitingFinalization;
        info!(
            space = %self.space,
            proposal_id = self.proposal_id,
            tx = %receipt.transaction_hash,
            "finalized relayed proposal"
        );
        Ok(receipt)
    }

    /// Wait until the relayed message for this proposal is observable, up to `timeout`.
    ///
    /// Finalization is permissionless, so this also picks up a proposal still `ProposalOpen`
    /// from this pipeline's point of view but finalized by another account.
    pub async fn await_relay(&mut self, timeout: Duration) -> Result<&RelayedMessage> {
        if matches!(self.state, RelayState::ProposalOpen | RelayState::AwaitingFinalization) {
            let message = self.poll_message(timeout).await?;
            self.state = RelayState::AwaitingRelay { message, queued: false };
        }
        match &self.state {
            RelayState::AwaitingRelay { message, .. } => Ok(message),
            _ => Err(self.wrong_state("await relay")),
        }
    }

    async fn poll_message(&self, timeout: Duration) -> Result<RelayedMessage> {
        let started = Instant::now();
        let provider = self.client.provider().clone();
        loop {
            let payloads = with_read_retry(self.retry, "messages_to_l1", || {
                provider.messages_to_l1(self.strategy, self.destination.address)
            })
            .await?;
            if let Some(message) = self.find_message(&payloads) {
                info!(
                    space = %self.space,
                    proposal_id = self.proposal_id,
                    waited_ms = started.elapsed().as_millis() as u64,
                    "relayed message observed"
                );
                return Ok(message);
            }

            let waited = started.elapsed();
            if waited >= timeout {
                return Err(SxError::RelayPending { proposal_id: self.proposal_id, waited });
            }
            debug!(proposal_id = self.proposal_id, ?waited, "relayed message not yet observable");
            tokio::time::sleep(self.poll_interval.min(timeout - waited)).await;
        }
    }

    fn find_message(&self, payloads: &[Vec<U256>]) -> Option<RelayedMessage> {
        payloads.iter().rev().find_map(|payload| match RelayedMessage::decode(payload) {
            Ok(message)
                if message.space == self.space
                    && message.proposal_id == U256::from(self.proposal_id) =>
            {
                Some(message)
            }
            Ok(_) => None,
            Err(err) => {
                warn!(error = %err, "skipping undecodable message");
                None
            }
        })
    }

    /// Fail-closed gate: the relayed hash must equal the hash of the intent's transactions.
    pub fn verify(&self, message: &RelayedMessage) -> Result<()> {
        let actual = execution_hash(&self.intent.transactions);
        if message.execution_hash != actual {
            return Err(SxError::ExecutionHashMismatch { expected: message.execution_hash, actual });
        }
        Ok(())
    }

    /// Submit the relayed proposal to the L1 destination.
    pub async fn execute(&mut self, wallet: &EthWallet) -> Result<Receipt> {
        let message = match &self.state {
            RelayState::AwaitingRelay { message, queued: false } => message.clone(),
            _ => return Err(self.wrong_state("execute")),
        };
        self.verify(&message)?;

        let proposal = L2Proposal::from(&message.proposal);
        let transactions = to_abi_transactions(&self.intent.transactions);
        let data = match self.destination.kind {
            L1DestinationKind::Avatar => IL1AvatarExecutionStrategy::executeCall {
                space: message.space.word(),
                proposalId: message.proposal_id,
                proposal,
                votesFor: message.votes_for,
                votesAgainst: message.votes_against,
                votesAbstain: message.votes_abstain,
                executionHash: message.execution_hash,
                transactions,
            }
            .abi_encode(),
            L1DestinationKind::Timelock => IL1TimelockExecutionStrategy::executeCall {
                space: message.space.word(),
                proposalId: message.proposal_id,
                proposal,
                votesFor: message.votes_for,
                votesAgainst: message.votes_against,
                votesAbstain: message.votes_abstain,
                executionHash: message.execution_hash,
                transactions,
            }
            .abi_encode(),
        };
        let tx = EvmTransaction { to: self.destination.address, data: data.into(), value: U256::ZERO };
        let receipt = wallet.provider()?.send_transaction(wallet, tx).await?;

        self.state = match self.destination.kind {
            L1DestinationKind::Avatar => RelayState::Executed,
            L1DestinationKind::Timelock => RelayState::AwaitingRelay { message, queued: true },
        };
        info!(
            destination = %self.destination.address,
            proposal_id = self.proposal_id,
            state = self.state.name(),
            tx = %receipt.transaction_hash,
            "submitted relayed proposal on L1"
        );
        Ok(receipt)
    }

    /// Execute a timelock-queued proposal after its delay.
    pub async fn execute_queued(&mut self, wallet: &EthWallet) -> Result<Receipt> {
        if !matches!(self.state, RelayState::AwaitingRelay { queued: true, .. }) {
            return Err(self.wrong_state("execute queued proposal"));
        }
        let payload = Bytes::from(crate::abi::encode_transactions(&self.intent.transactions));
        let receipt = self
            .client
            .execute_queued_proposal(wallet, self.destination.address, &[payload])
            .await?;
        self.state = RelayState::Executed;
        Ok(receipt)
    }

    /// Veto a queued proposal; only the timelock's guardian may do this.
    pub async fn veto(&mut self, guardian: &EthWallet) -> Result<Receipt> {
        if !matches!(self.state, RelayState::AwaitingRelay { queued: true, .. }) {
            return Err(self.wrong_state("veto"));
        }
        let call = IL1TimelockExecutionStrategy::vetoCall {
            executionPayloadHash: execution_hash(&self.intent.transactions),
        };
        let tx = EvmTransaction {
            to: self.destination.address,
            data: call.abi_encode().into(),
            value: U256::ZERO,
        };
        let receipt = guardian.provider()?.send_transaction(guardian, tx).await?;
        self.state = RelayState::Vetoed;
        info!(proposal_id = self.proposal_id, tx = %receipt.transaction_hash, "vetoed queued proposal");
        Ok(receipt)
    }
}
