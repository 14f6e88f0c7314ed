//! Governance chain calldata.
//!
//! Purpose:
//! - encode action fields into the word arrays the space and authenticator contracts decode;
//! - decode them back with cursor-style readers (`read_*(data, &mut i)`).
//!
//! Commit-then-confirm authenticators hash the exact calldata of the second-step call, so both
//! steps build it through the same functions in this module.

use alloy_primitives::{Bytes, B256, U256};
use sha3::{Digest, Keccak256};
use sx_types::{
    ChainAddress, Choice, ExecutionStrategyInput, NativeAddress, ProposeAction, UpdateProposalAction,
    VoteAction,
};

use crate::errors::{Result, SxError};

/// A call on the governance chain.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NativeCall {
    pub contract_address: NativeAddress,
    pub entrypoint: String,
    pub calldata: Vec<U256>,
}

impl NativeCall {
    pub fn new(contract_address: NativeAddress, entrypoint: &str, calldata: Vec<U256>) -> Self {
        NativeCall { contract_address, entrypoint: entrypoint.to_string(), calldata }
    }

    pub fn selector(&self) -> U256 {
        selector(&self.entrypoint)
    }
}

pub fn keccak256_bytes(bytes: &[u8]) -> B256 {
    let mut h = Keccak256::new();
    h.update(bytes);
    let out = h.finalize();
    let mut b = [0u8; 32];
    b.copy_from_slice(out.as_slice());
    B256::from(b)
}

/// Keccak of the big-endian concatenation of `words`.
pub fn keccak_words(words: &[U256]) -> U256 {
    let mut buf = Vec::with_capacity(words.len() * 32);
    for word in words {
        buf.extend_from_slice(&word.to_be_bytes::<32>());
    }
    U256::from_be_bytes(keccak256_bytes(&buf).0)
}

/// Entrypoint selector: keccak of the name, masked to 250 bits.
pub fn selector(name: &str) -> U256 {
    let hash = U256::from_be_bytes(keccak256_bytes(name.as_bytes()).0);
    hash & ((U256::from(1u8) << 250usize) - U256::from(1u8))
}

/// Commitment recorded by a transaction-commit authenticator for a later `entrypoint` call.
pub fn commitment(entrypoint: &str, calldata: &[U256]) -> U256 {
    let mut words = Vec::with_capacity(calldata.len() + 1);
    words.push(selector(entrypoint));
    words.extend_from_slice(calldata);
    keccak_words(&words)
}

/// Voting strategy index plus the user-supplied parameters for it.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct IndexedParams {
    pub index: u8,
    pub params: Vec<U256>,
}

#[derive(Clone, Debug, Default)]
pub struct CalldataBuilder {
    words: Vec<U256>,
}

impl CalldataBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_word(&mut self, word: U256) -> &mut Self {
        self.words.push(word);
        self
    }

    pub fn push_u64(&mut self, value: u64) -> &mut Self {
        self.push_word(U256::from(value))
    }

    pub fn push_address(&mut self, address: NativeAddress) -> &mut Self {
        self.push_word(address.word())
    }

    /// `[type, value]`.
    pub fn push_user(&mut self, user: ChainAddress) -> &mut Self {
        self.push_word(U256::from(user.address_type()));
        self.push_word(user.to_word())
    }

    /// `[byte_len, right-padded 32-byte words...]`.
    pub fn push_bytes(&mut self, bytes: &[u8]) -> &mut Self {
        self.push_u64(bytes.len() as u64);
        for chunk in bytes.chunks(32) {
            let mut word = [0u8; 32];
            word[..chunk.len()].copy_from_slice(chunk);
            self.words.push(U256::from_be_bytes(word));
        }
        self
    }

    pub fn push_string(&mut self, value: &str) -> &mut Self {
        self.push_bytes(value.as_bytes())
    }

    pub fn push_words(&mut self, words: &[U256]) -> &mut Self {
        self.push_u64(words.len() as u64);
        self.words.extend_from_slice(words);
        self
    }

    pub fn push_bytes_array(&mut self, items: &[Bytes]) -> &mut Self {
        self.push_u64(items.len() as u64);
        for item in items {
            self.push_bytes(item);
        }
        self
    }

    /// `[addr, param_count, bytes...]`.
    pub fn push_execution_strategy(&mut self, strategy: &ExecutionStrategyInput) -> &mut Self {
        self.push_address(strategy.addr);
        self.push_bytes_array(&strategy.params)
    }

    /// `[count, (index, word_count, words...)...]`.
    pub fn push_indexed(&mut self, strategies: &[IndexedParams]) -> &mut Self {
        self.push_u64(strategies.len() as u64);
        for strategy in strategies {
            self.push_u64(strategy.index as u64);
            self.push_words(&strategy.params);
        }
        self
    }

    pub fn extend(&mut self, words: &[U256]) -> &mut Self {
        self.words.extend_from_slice(words);
        self
    }

    pub fn finish(&mut self) -> Vec<U256> {
        std::mem::take(&mut self.words)
    }
}

fn truncated(what: &str) -> SxError {
    SxError::InvalidMessage(format!("calldata truncated while reading {what}"))
}

pub fn read_word(data: &[U256], i: &mut usize) -> Result<U256> {
    let word = *data.get(*i).ok_or_else(|| truncated("word"))?;
    *i += 1;
    Ok(word)
}

pub fn read_u64(data: &[U256], i: &mut usize) -> Result<u64> {
    let word = read_word(data, i)?;
    if word > U256::from(u64::MAX) {
        return Err(SxError::InvalidMessage(format!("{word:#x} does not fit in 64 bits")));
    }
    Ok(word.as_limbs()[0])
}

pub fn read_address(data: &[U256], i: &mut usize) -> Result<NativeAddress> {
    Ok(NativeAddress(read_word(data, i)?))
}

pub fn read_user(data: &[U256], i: &mut usize) -> Result<ChainAddress> {
    let address_type = read_u64(data, i)?;
    let word = read_word(data, i)?;
    let address_type = u8::try_from(address_type)
        .map_err(|_| SxError::InvalidMessage(format!("address type {address_type}")))?;
    Ok(ChainAddress::from_parts(address_type, word)
        .map_err(|e| SxError::InvalidMessage(e.to_string()))?)
}

pub fn read_bytes(data: &[U256], i: &mut usize) -> Result<Vec<u8>> {
    let len = read_u64(data, i)? as usize;
    let words = len.div_ceil(32);
    let end = span_end(data, *i, words, "bytes")?;
    let mut out = Vec::with_capacity(words * 32);
    for word in &data[*i..end] {
        out.extend_from_slice(&word.to_be_bytes::<32>());
    }
    out.truncate(len);
    *i = end;
    Ok(out)
}

pub fn read_string(data: &[U256], i: &mut usize) -> Result<String> {
    String::from_utf8(read_bytes(data, i)?)
        .map_err(|_| SxError::InvalidMessage("string is not utf-8".to_string()))
}

pub fn read_words(data: &[U256], i: &mut usize) -> Result<Vec<U256>> {
    let len = read_u64(data, i)? as usize;
    let end = span_end(data, *i, len, "word array")?;
    let out = data[*i..end].to_vec();
    *i = end;
    Ok(out)
}

/// End of a `len`-word span starting at `start`; length words come from untrusted calldata.
fn span_end(data: &[U256], start: usize, len: usize, what: &str) -> Result<usize> {
    start
        .checked_add(len)
        .filter(|end| *end <= data.len())
        .ok_or_else(|| truncated(what))
}

pub fn read_bytes_array(data: &[U256], i: &mut usize) -> Result<Vec<Bytes>> {
    let count = read_u64(data, i)?;
    let mut out = Vec::new();
    for _ in 0..count {
        out.push(Bytes::from(read_bytes(data, i)?));
    }
    Ok(out)
}

pub fn read_execution_strategy(data: &[U256], i: &mut usize) -> Result<ExecutionStrategyInput> {
    let addr = read_address(data, i)?;
    let params = read_bytes_array(data, i)?;
    Ok(ExecutionStrategyInput { addr, params })
}

pub fn read_indexed(data: &[U256], i: &mut usize) -> Result<Vec<IndexedParams>> {
    let count = read_u64(data, i)?;
    let mut out = Vec::new();
    for _ in 0..count {
        let index = read_u64(data, i)?;
        let index = u8::try_from(index)
            .map_err(|_| SxError::InvalidMessage(format!("strategy index {index}")))?;
        out.push(IndexedParams { index, params: read_words(data, i)? });
    }
    Ok(out)
}

pub fn read_choice(data: &[U256], i: &mut usize) -> Result<Choice> {
    let raw = read_u64(data, i)?;
    u8::try_from(raw)
        .ok()
        .and_then(|v| Choice::try_from(v).ok())
        .ok_or_else(|| SxError::InvalidMessage(format!("invalid choice {raw}")))
}

/// Fields of a propose call that follow the author.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProposeBody {
    pub metadata_uri: String,
    pub execution_strategy: ExecutionStrategyInput,
    /// Flattened `[count, (index, len, words...)...]` of the author's strategies.
    pub validation_params: Vec<U256>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VoteBody {
    pub proposal_id: u64,
    pub choice: Choice,
    pub strategies: Vec<IndexedParams>,
    pub metadata_uri: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UpdateProposalBody {
    pub proposal_id: u64,
    pub execution_strategy: ExecutionStrategyInput,
    pub metadata_uri: String,
}

/// Author-independent part of an authenticated space call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ActionBody {
    Propose(ProposeBody),
    Vote(VoteBody),
    UpdateProposal(UpdateProposalBody),
}

impl ActionBody {
    pub fn propose(action: &ProposeAction, strategies: &[IndexedParams]) -> Self {
        let validation_params = CalldataBuilder::new().push_indexed(strategies).finish();
        ActionBody::Propose(ProposeBody {
            metadata_uri: action.metadata_uri.clone(),
            execution_strategy: action.execution_strategy.clone(),
            validation_params,
        })
    }

    pub fn vote(action: &VoteAction, strategies: Vec<IndexedParams>) -> Self {
        ActionBody::Vote(VoteBody {
            proposal_id: action.proposal,
            choice: action.choice,
            strategies,
            metadata_uri: action.metadata_uri.clone(),
        })
    }

    pub fn update_proposal(action: &UpdateProposalAction) -> Self {
        ActionBody::UpdateProposal(UpdateProposalBody {
            proposal_id: action.proposal,
            execution_strategy: action.execution_strategy.clone(),
            metadata_uri: action.metadata_uri.clone(),
        })
    }

    /// Space entrypoint the authenticator forwards to.
    pub fn space_entrypoint(&self) -> &'static str {
        match self {
            ActionBody::Propose(_) => "propose",
            ActionBody::Vote(_) => "vote",
            ActionBody::UpdateProposal(_) => "update_proposal",
        }
    }

    /// Entrypoint on signature and transaction authenticators.
    pub fn authenticator_entrypoint(&self) -> &'static str {
        match self {
            ActionBody::Propose(_) => "authenticate_propose",
            ActionBody::Vote(_) => "authenticate_vote",
            ActionBody::UpdateProposal(_) => "authenticate_update_proposal",
        }
    }

    /// Votes are unique per (voter, proposal) and carry no salt.
    pub fn has_salt(&self) -> bool {
        !matches!(self, ActionBody::Vote(_))
    }

    pub fn proposal_key(&self) -> U256 {
        match self {
            ActionBody::Propose(_) => U256::ZERO,
            ActionBody::Vote(body) => U256::from(body.proposal_id),
            ActionBody::UpdateProposal(body) => U256::from(body.proposal_id),
        }
    }

    pub fn encode(&self) -> Vec<U256> {
        let mut b = CalldataBuilder::new();
        match self {
            ActionBody::Propose(body) => {
                b.push_string(&body.metadata_uri)
                    .push_execution_strategy(&body.execution_strategy)
                    .push_words(&body.validation_params);
            }
            ActionBody::Vote(body) => {
                b.push_u64(body.proposal_id)
                    .push_u64(u8::from(body.choice) as u64)
                    .push_indexed(&body.strategies)
                    .push_string(&body.metadata_uri);
            }
            ActionBody::UpdateProposal(body) => {
                b.push_u64(body.proposal_id)
                    .push_execution_strategy(&body.execution_strategy)
                    .push_string(&body.metadata_uri);
            }
        }
        b.finish()
    }

    /// Read a body for the space entrypoint `entrypoint`.
    pub fn read(entrypoint: &str, data: &[U256], i: &mut usize) -> Result<Self> {
        match entrypoint {
            "propose" | "authenticate_propose" => Ok(ActionBody::Propose(ProposeBody {
                metadata_uri: read_string(data, i)?,
                execution_strategy: read_execution_strategy(data, i)?,
                validation_params: read_words(data, i)?,
            })),
            "vote" | "authenticate_vote" => Ok(ActionBody::Vote(VoteBody {
                proposal_id: read_u64(data, i)?,
                choice: read_choice(data, i)?,
                strategies: read_indexed(data, i)?,
                metadata_uri: read_string(data, i)?,
            })),
            "update_proposal" | "authenticate_update_proposal" => {
                Ok(ActionBody::UpdateProposal(UpdateProposalBody {
                    proposal_id: read_u64(data, i)?,
                    execution_strategy: read_execution_strategy(data, i)?,
                    metadata_uri: read_string(data, i)?,
                }))
            }
            other => Err(SxError::InvalidMessage(format!("no action body for {other}"))),
        }
    }
}

/// Space calldata: `[author type, author, body...]`.
pub fn space_calldata(author: ChainAddress, body: &ActionBody) -> Vec<U256> {
    CalldataBuilder::new().push_user(author).extend(&body.encode()).finish()
}

/// Vanilla authenticator: `[space, selector, len, space calldata...]`.
pub fn vanilla_calldata(space: NativeAddress, author: ChainAddress, body: &ActionBody) -> Vec<U256> {
    let inner = space_calldata(author, body);
    CalldataBuilder::new()
        .push_address(space)
        .push_word(selector(body.space_entrypoint()))
        .push_words(&inner)
        .finish()
}

/// Signature authenticators: `[sig_len, sig..., space, author, body..., salt?]`.
pub fn signature_calldata(
    signature: &[U256],
    space: NativeAddress,
    author: ChainAddress,
    body: &ActionBody,
    salt: U256,
) -> Vec<U256> {
    let mut b = CalldataBuilder::new();
    b.push_words(signature)
        .push_address(space)
        .push_word(author.to_word())
        .extend(&body.encode());
    if body.has_salt() {
        b.push_word(salt);
    }
    b.finish()
}

/// Transaction authenticators: `[space, author, body...]`.
pub fn transaction_calldata(space: NativeAddress, author: ChainAddress, body: &ActionBody) -> Vec<U256> {
    CalldataBuilder::new()
        .push_address(space)
        .push_word(author.to_word())
        .extend(&body.encode())
        .finish()
}
