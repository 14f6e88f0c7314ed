//! Solidity ABI of the L1 contracts the pipeline talks to.

use alloy_sol_types::{sol, SolValue};
use sx_types::{Operation, RelayedProposal};

use crate::errors::{Result, SxError};

sol! {
    /// Proposal transaction as executed by a Safe-style avatar.
    struct MetaTransaction {
        address to;
        uint256 value;
        bytes data;
        uint8 operation;
        uint256 salt;
    }

    /// Proposal snapshot relayed from the governance chain.
    struct L2Proposal {
        uint64 startTimestamp;
        uint64 minEndTimestamp;
        uint64 maxEndTimestamp;
        uint8 finalizationStatus;
        uint256 executionPayloadHash;
        uint256 executionStrategy;
        uint8 authorAddressType;
        uint256 author;
        uint256 activeVotingStrategies;
    }

    /// L1 entry of the ethereum transaction authenticator.
    interface ICommit {
        function commit(uint256 authenticator, uint256 space, uint256 proposalKey, uint256 commitment) external payable;
    }

    interface IL1AvatarExecutionStrategy {
        function execute(
            uint256 space,
            uint256 proposalId,
            L2Proposal proposal,
            uint256 votesFor,
            uint256 votesAgainst,
            uint256 votesAbstain,
            bytes32 executionHash,
            MetaTransaction[] transactions
        ) external;
    }

    interface IL1TimelockExecutionStrategy {
        function execute(
            uint256 space,
            uint256 proposalId,
            L2Proposal proposal,
            uint256 votesFor,
            uint256 votesAgainst,
            uint256 votesAbstain,
            bytes32 executionHash,
            MetaTransaction[] transactions
        ) external;
        function executeQueuedProposal(bytes payload) external;
        function veto(bytes32 executionPayloadHash) external;
    }
}

impl From<&sx_types::MetaTransaction> for MetaTransaction {
    fn from(tx: &sx_types::MetaTransaction) -> Self {
        MetaTransaction {
            to: tx.to,
            value: tx.value,
            data: tx.data.clone(),
            operation: tx.operation.into(),
            salt: tx.salt,
        }
    }
}

impl TryFrom<MetaTransaction> for sx_types::MetaTransaction {
    type Error = SxError;

    fn try_from(tx: MetaTransaction) -> Result<Self> {
        Ok(sx_types::MetaTransaction {
            to: tx.to,
            value: tx.value,
            data: tx.data,
            operation: Operation::try_from(tx.operation).map_err(SxError::InvalidMessage)?,
            salt: tx.salt,
        })
    }
}

impl From<&RelayedProposal> for L2Proposal {
    fn from(p: &RelayedProposal) -> Self {
        L2Proposal {
            startTimestamp: p.start_timestamp,
            minEndTimestamp: p.min_end_timestamp,
            maxEndTimestamp: p.max_end_timestamp,
            finalizationStatus: p.finalization_status,
            executionPayloadHash: p.execution_payload_hash,
            executionStrategy: p.execution_strategy.word(),
            authorAddressType: p.author.address_type(),
            author: p.author.to_word(),
            activeVotingStrategies: p.active_voting_strategies,
        }
    }
}

pub fn to_abi_transactions(transactions: &[sx_types::MetaTransaction]) -> Vec<MetaTransaction> {
    transactions.iter().map(MetaTransaction::from).collect()
}

/// `abi.encode(MetaTransaction[])`.
pub fn encode_transactions(transactions: &[sx_types::MetaTransaction]) -> Vec<u8> {
    to_abi_transactions(transactions).abi_encode()
}

pub fn decode_transactions(data: &[u8]) -> Result<Vec<sx_types::MetaTransaction>> {
    Vec::<MetaTransaction>::abi_decode(data, true)?
        .into_iter()
        .map(sx_types::MetaTransaction::try_from)
        .collect()
}
