//! Record layout of the message a space emits to L1 when a relayed proposal is executed.
//!
//! All offset knowledge lives in this file. The payload is a flat array of 256-bit words in
//! which values wider than 128 bits are split into (low, high) limb pairs.

use alloy_primitives::{B256, U256};

use crate::address::{AddressError, ChainAddress, NativeAddress};

pub const RELAYED_MESSAGE_LEN: usize = 21;

const SPACE: usize = 0;
const PROPOSAL_ID: usize = 1;
const START_TIMESTAMP: usize = 3;
const MIN_END_TIMESTAMP: usize = 4;
const MAX_END_TIMESTAMP: usize = 5;
const FINALIZATION_STATUS: usize = 6;
const EXECUTION_PAYLOAD_HASH: usize = 7;
const EXECUTION_STRATEGY: usize = 8;
const AUTHOR_ADDRESS_TYPE: usize = 9;
const AUTHOR: usize = 10;
const ACTIVE_VOTING_STRATEGIES: usize = 11;
const VOTES_FOR: usize = 13;
const VOTES_AGAINST: usize = 15;
const VOTES_ABSTAIN: usize = 17;
const EXECUTION_HASH: usize = 19;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MessageError {
    #[error("relayed message has {actual} words, expected {expected}")]
    Length { expected: usize, actual: usize },
    #[error("limb of {field} exceeds 128 bits")]
    LimbOverflow { field: &'static str },
    #[error("{field} does not fit its field width")]
    FieldOverflow { field: &'static str },
    #[error("invalid author: {0}")]
    Author(#[from] AddressError),
}

/// Proposal snapshot as stored by the space at finalization time.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RelayedProposal {
    pub start_timestamp: u64,
    pub min_end_timestamp: u64,
    pub max_end_timestamp: u64,
    /// 0 pending, 1 executed, 2 cancelled.
    pub finalization_status: u8,
    pub execution_payload_hash: U256,
    pub execution_strategy: NativeAddress,
    pub author: ChainAddress,
    /// Bitmap of voting strategies active when the proposal was created.
    pub active_voting_strategies: U256,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RelayedMessage {
    pub space: NativeAddress,
    pub proposal_id: U256,
    pub proposal: RelayedProposal,
    pub votes_for: U256,
    pub votes_against: U256,
    pub votes_abstain: U256,
    pub execution_hash: B256,
}

impl RelayedMessage {
    pub fn decode(payload: &[U256]) -> Result<Self, MessageError> {
        if payload.len() != RELAYED_MESSAGE_LEN {
            return Err(MessageError::Length {
                expected: RELAYED_MESSAGE_LEN,
                actual: payload.len(),
            });
        }
        let address_type = narrow(payload[AUTHOR_ADDRESS_TYPE], u8::MAX as u64, "author address type")?;
        Ok(RelayedMessage {
            space: NativeAddress(payload[SPACE]),
            proposal_id: join_limbs(payload, PROPOSAL_ID, "proposal id")?,
            proposal: RelayedProposal {
                start_timestamp: narrow(payload[START_TIMESTAMP], u64::MAX, "start timestamp")?,
                min_end_timestamp: narrow(payload[MIN_END_TIMESTAMP], u64::MAX, "min end timestamp")?,
                max_end_timestamp: narrow(payload[MAX_END_TIMESTAMP], u64::MAX, "max end timestamp")?,
                finalization_status: narrow(
                    payload[FINALIZATION_STATUS],
                    u8::MAX as u64,
                    "finalization status",
                )? as u8,
                execution_payload_hash: payload[EXECUTION_PAYLOAD_HASH],
                execution_strategy: NativeAddress(payload[EXECUTION_STRATEGY]),
                author: ChainAddress::from_parts(address_type as u8, payload[AUTHOR])?,
                active_voting_strategies: join_limbs(
                    payload,
                    ACTIVE_VOTING_STRATEGIES,
                    "active voting strategies",
                )?,
            },
            votes_for: join_limbs(payload, VOTES_FOR, "votes for")?,
            votes_against: join_limbs(payload, VOTES_AGAINST, "votes against")?,
            votes_abstain: join_limbs(payload, VOTES_ABSTAIN, "votes abstain")?,
            execution_hash: B256::from(
                join_limbs(payload, EXECUTION_HASH, "execution hash")?.to_be_bytes::<32>(),
            ),
        })
    }

    pub fn to_payload(&self) -> Vec<U256> {
        let mut out = vec![U256::ZERO; RELAYED_MESSAGE_LEN];
        out[SPACE] = self.space.word();
        split_into(&mut out, PROPOSAL_ID, self.proposal_id);
        out[START_TIMESTAMP] = U256::from(self.proposal.start_timestamp);
        out[MIN_END_TIMESTAMP] = U256::from(self.proposal.min_end_timestamp);
        out[MAX_END_TIMESTAMP] = U256::from(self.proposal.max_end_timestamp);
        out[FINALIZATION_STATUS] = U256::from(self.proposal.finalization_status);
        out[EXECUTION_PAYLOAD_HASH] = self.proposal.execution_payload_hash;
        out[EXECUTION_STRATEGY] = self.proposal.execution_strategy.word();
        out[AUTHOR_ADDRESS_TYPE] = U256::from(self.proposal.author.address_type());
        out[AUTHOR] = self.proposal.author.to_word();
        split_into(&mut out, ACTIVE_VOTING_STRATEGIES, self.proposal.active_voting_strategies);
        split_into(&mut out, VOTES_FOR, self.votes_for);
        split_into(&mut out, VOTES_AGAINST, self.votes_against);
        split_into(&mut out, VOTES_ABSTAIN, self.votes_abstain);
        split_into(&mut out, EXECUTION_HASH, U256::from_be_bytes(self.execution_hash.0));
        out
    }
}

/// Splits a word into its (low, high) 128-bit limbs.
pub fn split_limbs(value: U256) -> (U256, U256) {
    (value & U256::from(u128::MAX), value >> 128usize)
}

fn split_into(out: &mut [U256], at: usize, value: U256) {
    let (low, high) = split_limbs(value);
    out[at] = low;
    out[at + 1] = high;
}

fn join_limbs(payload: &[U256], at: usize, field: &'static str) -> Result<U256, MessageError> {
    let low = payload[at];
    let high = payload[at + 1];
    let limit = U256::from(u128::MAX);
    if low > limit || high > limit {
        return Err(MessageError::LimbOverflow { field });
    }
    Ok(low + (high << 128usize))
}

fn narrow(value: U256, max: u64, field: &'static str) -> Result<u64, MessageError> {
    if value > U256::from(max) {
        return Err(MessageError::FieldOverflow { field });
    }
    Ok(value.as_limbs()[0])
}
