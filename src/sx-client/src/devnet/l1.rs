//! L1 contracts: the commit contract and the relayed execution strategies.

use std::collections::{BTreeMap, HashMap, HashSet};

use alloy_primitives::{Address, B256, U256};
use alloy_sol_types::SolCall;
use sx_types::{ChainAddress, MetaTransaction, NativeAddress, RelayedMessage, RelayedProposal};

use super::{L1ToL2Message, L2ToL1Message};
use crate::abi::{
    decode_transactions, ICommit, IL1AvatarExecutionStrategy, IL1TimelockExecutionStrategy, L2Proposal,
};
use crate::calldata::keccak256_bytes;
use crate::errors::{Result, SxError};
use crate::executors::execution_hash;
use crate::provider::EvmTransaction;

fn revert(reason: impl Into<String>) -> SxError {
    SxError::reverted(reason)
}

/// Checks shared by both relayed executors.
#[derive(Clone, Debug)]
pub(super) struct Executor {
    /// Governance chain strategy allowed to send messages to this executor.
    relayer: NativeAddress,
    quorum: U256,
    executed: HashSet<(NativeAddress, U256)>,
    /// Transactions carried out so far, in order.
    pub transactions: Vec<MetaTransaction>,
}

impl Executor {
    pub(super) fn new(relayer: NativeAddress, quorum: U256) -> Self {
        Executor { relayer, quorum, executed: HashSet::new(), transactions: Vec::new() }
    }
}

#[derive(Clone, Debug)]
pub(super) struct Timelock {
    pub executor: Executor,
    delay: u64,
    guardian: Address,
    /// execution hash -> earliest execution time.
    pub queue: HashMap<B256, u64>,
}

impl Timelock {
    pub(super) fn new(executor: Executor, delay: u64, guardian: Address) -> Self {
        Timelock { executor, delay, guardian, queue: HashMap::new() }
    }
}

#[derive(Clone, Debug)]
pub(super) enum L1Contract {
    Commit,
    Avatar(Executor),
    Timelock(Timelock),
}

#[derive(Clone, Debug, Default)]
pub(super) struct L1Chain {
    pub chain_id: u64,
    pub contracts: BTreeMap<Address, L1Contract>,
    /// Propagated L2 -> L1 messages by identity, with how many times each may still be consumed.
    pub inbox: HashMap<B256, u32>,
    /// Messages emitted to the governance chain, not yet propagated.
    pub outbox: Vec<L1ToL2Message>,
}

/// Arguments of a relayed `execute` call; identical for the avatar and the timelock.
struct RelayedExecution {
    message: RelayedMessage,
    transactions: Vec<MetaTransaction>,
}

fn relayed_proposal(p: &L2Proposal) -> Result<RelayedProposal> {
    Ok(RelayedProposal {
        start_timestamp: p.startTimestamp,
        min_end_timestamp: p.minEndTimestamp,
        max_end_timestamp: p.maxEndTimestamp,
        finalization_status: p.finalizationStatus,
        execution_payload_hash: p.executionPayloadHash,
        execution_strategy: NativeAddress(p.executionStrategy),
        author: ChainAddress::from_parts(p.authorAddressType, p.author)
            .map_err(|e| revert(format!("invalid author: {e}")))?,
        active_voting_strategies: p.activeVotingStrategies,
    })
}

macro_rules! relayed_execution {
    ($call:expr) => {{
        let call = $call;
        let transactions = call
            .transactions
            .into_iter()
            .map(MetaTransaction::try_from)
            .collect::<Result<Vec<_>>>()?;
        RelayedExecution {
            message: RelayedMessage {
                space: NativeAddress(call.space),
                proposal_id: call.proposalId,
                proposal: relayed_proposal(&call.proposal)?,
                votes_for: call.votesFor,
                votes_against: call.votesAgainst,
                votes_abstain: call.votesAbstain,
                execution_hash: call.executionHash,
            },
            transactions,
        }
    }};
}

fn selector_of(data: &[u8]) -> Result<[u8; 4]> {
    data.get(..4)
        .and_then(|s| <[u8; 4]>::try_from(s).ok())
        .ok_or_else(|| revert("calldata has no selector"))
}

fn decode<C: SolCall>(data: &[u8]) -> Result<C> {
    C::abi_decode(data, true).map_err(|e| revert(format!("malformed calldata: {e}")))
}

impl L1Chain {
    pub fn transact(&mut self, sender: Address, now: u64, tx: &EvmTransaction) -> Result<()> {
        let L1Chain { contracts, inbox, outbox, .. } = self;
        let contract = contracts
            .get_mut(&tx.to)
            .ok_or_else(|| revert(format!("no contract deployed at {}", tx.to)))?;
        let selector = selector_of(&tx.data)?;

        match contract {
            L1Contract::Commit if selector == ICommit::commitCall::SELECTOR => {
                let call: ICommit::commitCall = decode(&tx.data)?;
                outbox.push(L1ToL2Message {
                    from: tx.to,
                    to: NativeAddress(call.authenticator),
                    payload: vec![
                        ChainAddress::Ethereum(sender).to_word(),
                        call.space,
                        call.proposalKey,
                        call.commitment,
                    ],
                });
                Ok(())
            }
            L1Contract::Avatar(executor) if selector == IL1AvatarExecutionStrategy::executeCall::SELECTOR => {
                let call: IL1AvatarExecutionStrategy::executeCall = decode(&tx.data)?;
                let execution = relayed_execution!(call);
                accept(inbox, executor, tx.to, &execution)?;
                executor.transactions.extend(execution.transactions);
                Ok(())
            }
            L1Contract::Timelock(timelock) => {
                if selector == IL1TimelockExecutionStrategy::executeCall::SELECTOR {
                    let call: IL1TimelockExecutionStrategy::executeCall = decode(&tx.data)?;
                    let execution = relayed_execution!(call);
                    let hash = accept(inbox, &mut timelock.executor, tx.to, &execution)?;
                    if timelock.queue.contains_key(&hash) {
                        return Err(revert("duplicate execution payload hash"));
                    }
                    timelock.queue.insert(hash, now + timelock.delay);
                    Ok(())
                } else if selector == IL1TimelockExecutionStrategy::executeQueuedProposalCall::SELECTOR {
                    let call: IL1TimelockExecutionStrategy::executeQueuedProposalCall = decode(&tx.data)?;
                    let hash = keccak256_bytes(&call.payload);
                    let ready_at = *timelock.queue.get(&hash).ok_or_else(|| revert("proposal not queued"))?;
                    if now < ready_at {
                        return Err(revert("timelock delay not met"));
                    }
                    let transactions = decode_transactions(&call.payload)
                        .map_err(|e| revert(format!("invalid payload: {e}")))?;
                    timelock.queue.remove(&hash);
                    timelock.executor.transactions.extend(transactions);
                    Ok(())
                } else if selector == IL1TimelockExecutionStrategy::vetoCall::SELECTOR {
                    let call: IL1TimelockExecutionStrategy::vetoCall = decode(&tx.data)?;
                    if sender != timelock.guardian {
                        return Err(revert("only the guardian can veto"));
                    }
                    if timelock.queue.remove(&call.executionPayloadHash).is_none() {
                        return Err(revert("proposal not queued"));
                    }
                    Ok(())
                } else {
                    Err(revert("timelock has no such function"))
                }
            }
            _ => Err(revert(format!("{} has no function {}", tx.to, hex::encode(selector)))),
        }
    }
}

/// Consume the relayed message and check the proposal can run. Returns the execution hash.
fn accept(
    inbox: &mut HashMap<B256, u32>,
    executor: &mut Executor,
    this: Address,
    execution: &RelayedExecution,
) -> Result<B256> {
    let message = &execution.message;
    let identity = L2ToL1Message {
        from: executor.relayer,
        to: this,
        payload: message.to_payload(),
    }
    .hash();
    match inbox.get_mut(&identity) {
        Some(count) if *count > 0 => *count -= 1,
        _ => return Err(revert("message not received")),
    }

    if !executor.executed.insert((message.space, message.proposal_id)) {
        return Err(revert("proposal already executed"));
    }
    if message.proposal.finalization_status != 0 {
        return Err(revert("proposal has been finalized"));
    }
    let accepted = message.votes_for + message.votes_abstain >= executor.quorum
        && message.votes_for > message.votes_against;
    if !accepted {
        return Err(revert("proposal not accepted"));
    }
    if execution_hash(&execution.transactions) != message.execution_hash {
        return Err(revert("invalid execution payload"));
    }
    Ok(message.execution_hash)
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::Bytes;
    use sx_types::Operation;

    const RELAYER: u64 = 0xe2;

    fn avatar() -> Address {
        Address::with_last_byte(0xa1)
    }

    fn chain() -> L1Chain {
        let mut chain = L1Chain::default();
        chain
            .contracts
            .insert(avatar(), L1Contract::Avatar(Executor::new(NativeAddress::from_u64(RELAYER), U256::from(1u8))));
        chain.contracts.insert(Address::with_last_byte(0xc0), L1Contract::Commit);
        chain
    }

    fn transactions() -> Vec<MetaTransaction> {
        vec![MetaTransaction {
            to: Address::repeat_byte(0x11),
            value: U256::from(1u8),
            data: Bytes::new(),
            operation: Operation::Call,
            salt: U256::ZERO,
        }]
    }

    fn message(votes_for: u64) -> RelayedMessage {
        RelayedMessage {
            space: NativeAddress::from_u64(5),
            proposal_id: U256::from(1u8),
            proposal: RelayedProposal {
                start_timestamp: 0,
                min_end_timestamp: 0,
                max_end_timestamp: 10,
                finalization_status: 0,
                execution_payload_hash: U256::from(3u8),
                execution_strategy: NativeAddress::from_u64(RELAYER),
                author: NativeAddress::from_u64(9).into(),
                active_voting_strategies: U256::from(1u8),
            },
            votes_for: U256::from(votes_for),
            votes_against: U256::ZERO,
            votes_abstain: U256::ZERO,
            execution_hash: execution_hash(&transactions()),
        }
    }

    fn deliver(chain: &mut L1Chain, message: &RelayedMessage) {
        let identity = L2ToL1Message {
            from: NativeAddress::from_u64(RELAYER),
            to: avatar(),
            payload: message.to_payload(),
        }
        .hash();
        *chain.inbox.entry(identity).or_default() += 1;
    }

    fn execute_tx(message: &RelayedMessage) -> EvmTransaction {
        let call = IL1AvatarExecutionStrategy::executeCall {
            space: message.space.word(),
            proposalId: message.proposal_id,
            proposal: L2Proposal::from(&message.proposal),
            votesFor: message.votes_for,
            votesAgainst: message.votes_against,
            votesAbstain: message.votes_abstain,
            executionHash: message.execution_hash,
            transactions: crate::abi::to_abi_transactions(&transactions()),
        };
        EvmTransaction::call(avatar(), call.abi_encode())
    }

    #[test]
    fn test_avatar_executes_once() {
        let mut chain = chain();
        let message = message(1);
        deliver(&mut chain, &message);
        chain.transact(Address::ZERO, 0, &execute_tx(&message)).unwrap();
        let Some(L1Contract::Avatar(executor)) = chain.contracts.get(&avatar()) else {
            panic!("avatar missing");
        };
        assert_eq!(executor.transactions, transactions());

        deliver(&mut chain, &message);
        let err = chain.transact(Address::ZERO, 0, &execute_tx(&message)).unwrap_err();
        assert!(err.to_string().contains("already executed"));
    }

    #[test]
    fn test_avatar_requires_message() {
        let mut chain = chain();
        let err = chain.transact(Address::ZERO, 0, &execute_tx(&message(1))).unwrap_err();
        assert!(err.to_string().contains("message not received"));
    }

    #[test]
    fn test_avatar_checks_quorum() {
        let mut chain = chain();
        let message = message(0);
        deliver(&mut chain, &message);
        let err = chain.transact(Address::ZERO, 0, &execute_tx(&message)).unwrap_err();
        assert!(err.to_string().contains("not accepted"));
    }

    #[test]
    fn test_commit_emits_message_to_authenticator() {
        let mut chain = chain();
        let call = ICommit::commitCall {
            authenticator: U256::from(0x0a_u8),
            space: U256::from(5u8),
            proposalKey: U256::ZERO,
            commitment: U256::from(77u8),
        };
        let sender = Address::repeat_byte(0x42);
        chain
            .transact(sender, 0, &EvmTransaction::call(Address::with_last_byte(0xc0), call.abi_encode()))
            .unwrap();
        assert_eq!(chain.outbox.len(), 1);
        assert_eq!(chain.outbox[0].to, NativeAddress::from_u64(0xa));
        assert_eq!(chain.outbox[0].payload[0], ChainAddress::Ethereum(sender).to_word());
    }
}
