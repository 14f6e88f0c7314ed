//! Governance chain contracts: spaces, authenticators and strategies.
//!
//! Every entrypoint either succeeds or returns `ExecutionReverted`; the caller applies calls to
//! a scratch copy of the chain so a revert leaves no partial writes.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use alloy_primitives::{Address, Bytes, U256};
use sx_types::{ChainAddress, Choice, NativeAddress, RelayedMessage, RelayedProposal};

use super::{L1ToL2Message, L2ToL1Message};
use crate::calldata::{
    commitment, keccak_words, read_address, read_bytes_array, read_indexed, read_string, read_u64,
    read_user, read_word, read_words, selector, space_calldata, ActionBody, CalldataBuilder,
    IndexedParams, NativeCall, ProposeBody, UpdateProposalBody, VoteBody,
};
use crate::errors::{Result, SxError};
use crate::executors::relayer;
use crate::network::{AuthenticatorKind, ExecutionStrategyType, VotingStrategyKind};
use crate::signer::{recover_native_account, recover_signer, EcdsaSignature};
use crate::typed_data::{digest, SigningDomain, TypedMessage};

fn revert(reason: impl Into<String>) -> SxError {
    SxError::reverted(reason)
}

/// Malformed calldata reverts like any other failed check.
fn malformed(err: SxError) -> SxError {
    match err {
        SxError::InvalidMessage(reason) => revert(format!("malformed calldata: {reason}")),
        other => other,
    }
}

fn ensure_consumed(data: &[U256], i: usize) -> Result<()> {
    if i != data.len() {
        return Err(SxError::InvalidMessage(format!("{} trailing words", data.len() - i)));
    }
    Ok(())
}

/// Hash of execution params committed to by a proposal.
pub fn payload_hash(params: &[Bytes]) -> U256 {
    keccak_words(&CalldataBuilder::new().push_bytes_array(params).finish())
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FinalizationStatus {
    Pending = 0,
    Executed = 1,
    Cancelled = 2,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Proposal {
    pub start_timestamp: u64,
    pub min_end_timestamp: u64,
    pub max_end_timestamp: u64,
    pub finalization_status: FinalizationStatus,
    pub execution_payload_hash: U256,
    pub execution_strategy: NativeAddress,
    pub author: ChainAddress,
    pub active_voting_strategies: U256,
    pub votes_for: U256,
    pub votes_against: U256,
    pub votes_abstain: U256,
    pub metadata_uri: String,
}

impl Proposal {
    fn relayed(&self) -> RelayedProposal {
        RelayedProposal {
            start_timestamp: self.start_timestamp,
            min_end_timestamp: self.min_end_timestamp,
            max_end_timestamp: self.max_end_timestamp,
            finalization_status: self.finalization_status as u8,
            execution_payload_hash: self.execution_payload_hash,
            execution_strategy: self.execution_strategy,
            author: self.author,
            active_voting_strategies: self.active_voting_strategies,
        }
    }

    /// Simple quorum: enough participation and more for than against.
    pub fn accepted(&self, quorum: U256) -> bool {
        self.votes_for + self.votes_abstain >= quorum && self.votes_for > self.votes_against
    }
}

#[derive(Clone, Debug)]
pub struct Space {
    pub owner: NativeAddress,
    pub min_voting_duration: u64,
    pub max_voting_duration: u64,
    pub voting_delay: u64,
    pub metadata_uri: String,
    pub proposal_threshold: U256,
    pub authenticators: BTreeSet<NativeAddress>,
    pub voting_strategies: Vec<NativeAddress>,
    pub next_proposal_id: u64,
    pub proposals: BTreeMap<u64, Proposal>,
    voted: HashSet<(u64, ChainAddress)>,
}

impl Space {
    pub fn new(owner: NativeAddress) -> Self {
        Space {
            owner,
            min_voting_duration: 0,
            max_voting_duration: 86_400,
            voting_delay: 0,
            metadata_uri: String::new(),
            proposal_threshold: U256::ZERO,
            authenticators: BTreeSet::new(),
            voting_strategies: Vec::new(),
            next_proposal_id: 1,
            proposals: BTreeMap::new(),
            voted: HashSet::new(),
        }
    }

    fn active_strategies(&self) -> U256 {
        (U256::from(1u8) << self.voting_strategies.len()) - U256::from(1u8)
    }
}

#[derive(Clone, Debug)]
pub(super) struct Authenticator {
    kind: AuthenticatorKind,
    used_salts: HashSet<(U256, U256)>,
    /// (signer, space, proposal key) -> commitment.
    commits: HashMap<(U256, NativeAddress, U256), U256>,
}

impl Authenticator {
    pub(super) fn new(kind: AuthenticatorKind) -> Self {
        Authenticator { kind, used_salts: HashSet::new(), commits: HashMap::new() }
    }
}

#[derive(Clone, Debug)]
pub(super) struct ExecutionStrategy {
    kind: ExecutionStrategyType,
    quorum: U256,
}

impl ExecutionStrategy {
    pub(super) fn new(kind: ExecutionStrategyType, quorum: U256) -> Self {
        ExecutionStrategy { kind, quorum }
    }
}

#[derive(Clone, Debug, Default)]
pub(super) struct NativeChain {
    pub chain_id: u64,
    pub eip712_chain_id: u64,
    pub l1_commit: Address,
    pub spaces: BTreeMap<NativeAddress, Space>,
    pub authenticators: BTreeMap<NativeAddress, Authenticator>,
    pub voting_strategies: BTreeMap<NativeAddress, VotingStrategyKind>,
    pub execution_strategies: BTreeMap<NativeAddress, ExecutionStrategy>,
    pub balances: HashMap<NativeAddress, U256>,
    /// Messages emitted to L1, not yet propagated.
    pub outbox: Vec<L2ToL1Message>,
}

impl NativeChain {
    pub fn invoke(&mut self, sender: NativeAddress, now: u64, call: &NativeCall) -> Result<Vec<U256>> {
        let target = call.contract_address;
        if self.spaces.contains_key(&target) {
            return self.space_call(target, sender, now, &call.entrypoint, &call.calldata);
        }
        if self.authenticators.contains_key(&target) {
            return self.authenticate(target, sender, now, &call.entrypoint, &call.calldata);
        }
        Err(revert(format!("no contract deployed at {target}")))
    }

    fn space(&self, space: NativeAddress) -> Result<&Space> {
        self.spaces.get(&space).ok_or_else(|| revert(format!("no space at {space}")))
    }

    fn space_mut(&mut self, space: NativeAddress) -> Result<&mut Space> {
        self.spaces.get_mut(&space).ok_or_else(|| revert(format!("no space at {space}")))
    }

    fn only_owner(&mut self, space: NativeAddress, sender: NativeAddress) -> Result<&mut Space> {
        let space = self.space_mut(space)?;
        if space.owner != sender {
            return Err(revert("caller is not the owner"));
        }
        Ok(space)
    }

    fn space_call(
        &mut self,
        space: NativeAddress,
        sender: NativeAddress,
        now: u64,
        entrypoint: &str,
        data: &[U256],
    ) -> Result<Vec<U256>> {
        match entrypoint {
            "propose" | "vote" | "update_proposal" => {
                if !self.space(space)?.authenticators.contains(&sender) {
                    return Err(revert("caller is not an authenticator"));
                }
                let (author, body) = parse_space_action(entrypoint, data).map_err(malformed)?;
                match body {
                    ActionBody::Propose(body) => self.propose(space, now, author, body),
                    ActionBody::Vote(body) => self.vote(space, now, author, body),
                    ActionBody::UpdateProposal(body) => self.update_proposal(space, now, author, body),
                }
            }
            "execute" => {
                let (proposal_id, params) = parse_execute(data).map_err(malformed)?;
                self.execute(space, now, proposal_id, &params)
            }
            "cancel_proposal" => {
                let proposal_id = parse_single(data, read_u64).map_err(malformed)?;
                let proposal = self
                    .only_owner(space, sender)?
                    .proposals
                    .get_mut(&proposal_id)
                    .ok_or_else(|| revert("proposal does not exist"))?;
                if proposal.finalization_status != FinalizationStatus::Pending {
                    return Err(revert("proposal has been finalized"));
                }
                proposal.finalization_status = FinalizationStatus::Cancelled;
                Ok(Vec::new())
            }
            "set_min_voting_duration" => {
                let value = parse_single(data, read_u64).map_err(malformed)?;
                let space = self.only_owner(space, sender)?;
                if value > space.max_voting_duration {
                    return Err(revert("invalid duration"));
                }
                space.min_voting_duration = value;
                Ok(Vec::new())
            }
            "set_max_voting_duration" => {
                let value = parse_single(data, read_u64).map_err(malformed)?;
                let space = self.only_owner(space, sender)?;
                if value < space.min_voting_duration {
                    return Err(revert("invalid duration"));
                }
                space.max_voting_duration = value;
                Ok(Vec::new())
            }
            "set_voting_delay" => {
                let value = parse_single(data, read_u64).map_err(malformed)?;
                self.only_owner(space, sender)?.voting_delay = value;
                Ok(Vec::new())
            }
            "set_metadata_uri" => {
                let value = parse_single(data, read_string).map_err(malformed)?;
                self.only_owner(space, sender)?.metadata_uri = value;
                Ok(Vec::new())
            }
            "transfer_ownership" => {
                let value = parse_single(data, read_address).map_err(malformed)?;
                self.only_owner(space, sender)?.owner = value;
                Ok(Vec::new())
            }
            "next_proposal_id" => Ok(vec![U256::from(self.space(space)?.next_proposal_id)]),
            other => Err(revert(format!("space has no entrypoint {other}"))),
        }
    }

    fn voting_power(&self, space: &Space, voter: ChainAddress, strategies: &[IndexedParams]) -> Result<U256> {
        let mut seen = HashSet::new();
        let mut power = U256::ZERO;
        for strategy in strategies {
            if !seen.insert(strategy.index) {
                return Err(revert("duplicate voting strategy index"));
            }
            let addr = space
                .voting_strategies
                .get(strategy.index as usize)
                .ok_or_else(|| revert(format!("invalid voting strategy index {}", strategy.index)))?;
            let kind = self
                .voting_strategies
                .get(addr)
                .ok_or_else(|| revert(format!("no voting strategy at {addr}")))?;
            power += match (kind, voter) {
                (VotingStrategyKind::Vanilla, _) => U256::from(1u8),
                (VotingStrategyKind::Erc20Votes, ChainAddress::Native(account)) => {
                    self.balances.get(&account).copied().unwrap_or_default()
                }
                (VotingStrategyKind::Erc20Votes, ChainAddress::Ethereum(_)) => {
                    return Err(revert("Not supported for Ethereum addresses"))
                }
            };
        }
        Ok(power)
    }

    fn check_execution_strategy(&self, strategy: NativeAddress) -> Result<()> {
        if !self.execution_strategies.contains_key(&strategy) {
            return Err(revert(format!("unknown execution strategy {strategy}")));
        }
        Ok(())
    }

    fn propose(
        &mut self,
        space_addr: NativeAddress,
        now: u64,
        author: ChainAddress,
        body: ProposeBody,
    ) -> Result<Vec<U256>> {
        let mut i = 0;
        let strategies = read_indexed(&body.validation_params, &mut i).map_err(malformed)?;
        let space = self.space(space_addr)?;
        if self.voting_power(space, author, &strategies)? < space.proposal_threshold {
            return Err(revert("proposal validation failed"));
        }
        self.check_execution_strategy(body.execution_strategy.addr)?;

        let space = self.space_mut(space_addr)?;
        let id = space.next_proposal_id;
        let start = now + space.voting_delay;
        let proposal = Proposal {
            start_timestamp: start,
            min_end_timestamp: start + space.min_voting_duration,
            max_end_timestamp: start + space.max_voting_duration,
            finalization_status: FinalizationStatus::Pending,
            execution_payload_hash: payload_hash(&body.execution_strategy.params),
            execution_strategy: body.execution_strategy.addr,
            author,
            active_voting_strategies: space.active_strategies(),
            votes_for: U256::ZERO,
            votes_against: U256::ZERO,
            votes_abstain: U256::ZERO,
            metadata_uri: body.metadata_uri,
        };
        space.proposals.insert(id, proposal);
        space.next_proposal_id += 1;
        Ok(vec![U256::from(id)])
    }

    fn vote(&mut self, space_addr: NativeAddress, now: u64, voter: ChainAddress, body: VoteBody) -> Result<Vec<U256>> {
        let space = self.space(space_addr)?;
        let proposal = space
            .proposals
            .get(&body.proposal_id)
            .ok_or_else(|| revert("proposal does not exist"))?;
        if proposal.finalization_status != FinalizationStatus::Pending {
            return Err(revert("proposal has been finalized"));
        }
        if now < proposal.start_timestamp {
            return Err(revert("voting period has not started"));
        }
        if now >= proposal.max_end_timestamp {
            return Err(revert("voting period has ended"));
        }
        let power = self.voting_power(space, voter, &body.strategies)?;
        if power.is_zero() {
            return Err(revert("user has no voting power"));
        }

        let space = self.space_mut(space_addr)?;
        if !space.voted.insert((body.proposal_id, voter)) {
            return Err(revert("voter has already voted"));
        }
        if let Some(proposal) = space.proposals.get_mut(&body.proposal_id) {
            match body.choice {
                Choice::For => proposal.votes_for += power,
                Choice::Against => proposal.votes_against += power,
                Choice::Abstain => proposal.votes_abstain += power,
            }
        }
        Ok(Vec::new())
    }

    fn update_proposal(
        &mut self,
        space_addr: NativeAddress,
        now: u64,
        author: ChainAddress,
        body: UpdateProposalBody,
    ) -> Result<Vec<U256>> {
        self.check_execution_strategy(body.execution_strategy.addr)?;
        let proposal = self
            .space_mut(space_addr)?
            .proposals
            .get_mut(&body.proposal_id)
            .ok_or_else(|| revert("proposal does not exist"))?;
        if proposal.author != author {
            return Err(revert("only the author can update a proposal"));
        }
        if proposal.finalization_status != FinalizationStatus::Pending {
            return Err(revert("proposal has been finalized"));
        }
        if now > proposal.start_timestamp {
            return Err(revert("voting period has started"));
        }
        proposal.execution_strategy = body.execution_strategy.addr;
        proposal.execution_payload_hash = payload_hash(&body.execution_strategy.params);
        proposal.metadata_uri = body.metadata_uri;
        Ok(Vec::new())
    }

    fn execute(&mut self, space_addr: NativeAddress, now: u64, proposal_id: u64, params: &[Bytes]) -> Result<Vec<U256>> {
        let proposal = self
            .space(space_addr)?
            .proposals
            .get(&proposal_id)
            .ok_or_else(|| revert("proposal does not exist"))?
            .clone();
        if proposal.finalization_status != FinalizationStatus::Pending {
            return Err(revert("proposal has been finalized"));
        }
        if payload_hash(params) != proposal.execution_payload_hash {
            return Err(revert("invalid execution payload"));
        }
        let strategy_addr = proposal.execution_strategy;
        let (kind, quorum) = self
            .execution_strategies
            .get(&strategy_addr)
            .map(|s| (s.kind, s.quorum))
            .ok_or_else(|| revert(format!("unknown execution strategy {strategy_addr}")))?;

        match kind {
            ExecutionStrategyType::Vanilla => {
                if now < proposal.min_end_timestamp || !proposal.accepted(quorum) {
                    return Err(revert("proposal not accepted"));
                }
            }
            // Quorum is checked by the L1 executor.
            ExecutionStrategyType::EthRelayer => {
                let params = relayer::decode(params).map_err(malformed)?;
                let message = RelayedMessage {
                    space: space_addr,
                    proposal_id: U256::from(proposal_id),
                    proposal: proposal.relayed(),
                    votes_for: proposal.votes_for,
                    votes_against: proposal.votes_against,
                    votes_abstain: proposal.votes_abstain,
                    execution_hash: params.execution_hash,
                };
                self.outbox.push(L2ToL1Message {
                    from: strategy_addr,
                    to: params.destination,
                    payload: message.to_payload(),
                });
            }
            other => {
                return Err(revert(format!("{other:?} does not execute on the governance chain")));
            }
        }

        if let Some(proposal) = self.space_mut(space_addr)?.proposals.get_mut(&proposal_id) {
            proposal.finalization_status = FinalizationStatus::Executed;
        }
        Ok(Vec::new())
    }

    fn authenticate(
        &mut self,
        authenticator: NativeAddress,
        sender: NativeAddress,
        now: u64,
        entrypoint: &str,
        data: &[U256],
    ) -> Result<Vec<U256>> {
        let kind = self
            .authenticators
            .get(&authenticator)
            .map(|a| a.kind)
            .ok_or_else(|| revert(format!("no authenticator at {authenticator}")))?;
        let authenticate = matches!(
            entrypoint,
            "authenticate_propose" | "authenticate_vote" | "authenticate_update_proposal"
        );

        match kind {
            AuthenticatorKind::Vanilla if entrypoint == "authenticate" => {
                let (space, target, inner) = parse_vanilla(data).map_err(malformed)?;
                let target = ["propose", "vote", "update_proposal"]
                    .into_iter()
                    .find(|name| selector(name) == target)
                    .ok_or_else(|| revert("unknown space selector"))?;
                self.space_call(space, authenticator, now, target, &inner)
            }
            AuthenticatorKind::EthSig | AuthenticatorKind::NativeSig if authenticate => {
                self.verify_signature(authenticator, kind, now, entrypoint, data)
            }
            AuthenticatorKind::EthTx | AuthenticatorKind::NativeTx if authenticate => {
                self.consume_commit(authenticator, kind, sender, now, entrypoint, data)
            }
            AuthenticatorKind::NativeTx if entrypoint == "commit" => {
                let (space, key, commitment) = parse_commit(data).map_err(malformed)?;
                self.record_commit(authenticator, (sender.word(), space, key), commitment);
                Ok(Vec::new())
            }
            _ => Err(revert(format!("{kind} authenticator has no entrypoint {entrypoint}"))),
        }
    }

    fn record_commit(&mut self, authenticator: NativeAddress, key: (U256, NativeAddress, U256), commitment: U256) {
        if let Some(auth) = self.authenticators.get_mut(&authenticator) {
            auth.commits.insert(key, commitment);
        }
    }

    fn verify_signature(
        &mut self,
        authenticator: NativeAddress,
        kind: AuthenticatorKind,
        now: u64,
        entrypoint: &str,
        data: &[U256],
    ) -> Result<Vec<U256>> {
        let (signature, space, author_word, body, salt) =
            parse_signed(entrypoint, data).map_err(malformed)?;

        let (author, domain) = if kind == AuthenticatorKind::EthSig {
            let author = ChainAddress::from_parts(1, author_word)
                .map_err(|e| revert(format!("invalid author: {e}")))?;
            (author, SigningDomain::Ethereum { chain_id: self.eip712_chain_id })
        } else {
            let domain = SigningDomain::Native { chain_id: self.chain_id, verifying_contract: authenticator };
            (ChainAddress::Native(NativeAddress(author_word)), domain)
        };
        let message = TypedMessage { authenticator, space, author, body: &body, salt };
        let digest = digest(&domain, &message)?;
        let valid = match author {
            ChainAddress::Ethereum(addr) => EcdsaSignature::from_words(&signature)
                .and_then(|sig| recover_signer(digest, &sig))
                .is_ok_and(|signer| signer == addr),
            ChainAddress::Native(addr) => {
                recover_native_account(digest, &signature).is_ok_and(|signer| signer == addr)
            }
        };
        if !valid {
            return Err(revert("invalid signature"));
        }

        if body.has_salt() {
            let fresh = self
                .authenticators
                .get_mut(&authenticator)
                .is_some_and(|auth| auth.used_salts.insert((author_word, salt)));
            if !fresh {
                return Err(revert("salt already used"));
            }
        }
        self.space_call(space, authenticator, now, body.space_entrypoint(), &space_calldata(author, &body))
    }

    fn consume_commit(
        &mut self,
        authenticator: NativeAddress,
        kind: AuthenticatorKind,
        sender: NativeAddress,
        now: u64,
        entrypoint: &str,
        data: &[U256],
    ) -> Result<Vec<U256>> {
        let (space, author_word, body) = parse_confirm(entrypoint, data).map_err(malformed)?;

        let author = if kind == AuthenticatorKind::EthTx {
            ChainAddress::from_parts(1, author_word).map_err(|e| revert(format!("invalid author: {e}")))?
        } else {
            if author_word != sender.word() {
                return Err(revert("only the author can confirm a commit"));
            }
            ChainAddress::Native(sender)
        };

        let key = (author_word, space, body.proposal_key());
        let expected = commitment(entrypoint, data);
        let auth = self
            .authenticators
            .get_mut(&authenticator)
            .ok_or_else(|| revert(format!("no authenticator at {authenticator}")))?;
        match auth.commits.get(&key) {
            None => return Err(revert("commit not found")),
            Some(found) if *found != expected => return Err(revert("commitment does not match")),
            Some(_) => {
                auth.commits.remove(&key);
            }
        }
        self.space_call(space, authenticator, now, body.space_entrypoint(), &space_calldata(author, &body))
    }

    /// L1 handler of the ethereum transaction authenticator.
    pub fn receive_from_l1(&mut self, message: &L1ToL2Message) -> Result<()> {
        let kind = self.authenticators.get(&message.to).map(|a| a.kind);
        if kind != Some(AuthenticatorKind::EthTx) {
            return Err(revert(format!("{} has no L1 handler", message.to)));
        }
        if message.from != self.l1_commit {
            return Err(revert("message is not from the commit contract"));
        }
        let &[sender, space, key, commitment] = message.payload.as_slice() else {
            return Err(revert(format!("commit message has {} words", message.payload.len())));
        };
        self.record_commit(message.to, (sender, NativeAddress(space), key), commitment);
        Ok(())
    }
}

fn parse_space_action(entrypoint: &str, data: &[U256]) -> Result<(ChainAddress, ActionBody)> {
    let mut i = 0;
    let author = read_user(data, &mut i)?;
    let body = ActionBody::read(entrypoint, data, &mut i)?;
    ensure_consumed(data, i)?;
    Ok((author, body))
}

fn parse_execute(data: &[U256]) -> Result<(u64, Vec<Bytes>)> {
    let mut i = 0;
    let proposal_id = read_u64(data, &mut i)?;
    let params = read_bytes_array(data, &mut i)?;
    ensure_consumed(data, i)?;
    Ok((proposal_id, params))
}

fn parse_vanilla(data: &[U256]) -> Result<(NativeAddress, U256, Vec<U256>)> {
    let mut i = 0;
    let space = read_address(data, &mut i)?;
    let target = read_word(data, &mut i)?;
    let inner = read_words(data, &mut i)?;
    ensure_consumed(data, i)?;
    Ok((space, target, inner))
}

fn parse_commit(data: &[U256]) -> Result<(NativeAddress, U256, U256)> {
    let mut i = 0;
    let space = read_address(data, &mut i)?;
    let key = read_word(data, &mut i)?;
    let commitment = read_word(data, &mut i)?;
    ensure_consumed(data, i)?;
    Ok((space, key, commitment))
}

/// `[sig_len, sig..., space, author, body..., salt?]`.
fn parse_signed(entrypoint: &str, data: &[U256]) -> Result<(Vec<U256>, NativeAddress, U256, ActionBody, U256)> {
    let mut i = 0;
    let signature = read_words(data, &mut i)?;
    let space = read_address(data, &mut i)?;
    let author = read_word(data, &mut i)?;
    let body = ActionBody::read(entrypoint, data, &mut i)?;
    let salt = if body.has_salt() { read_word(data, &mut i)? } else { U256::ZERO };
    ensure_consumed(data, i)?;
    Ok((signature, space, author, body, salt))
}

fn parse_confirm(entrypoint: &str, data: &[U256]) -> Result<(NativeAddress, U256, ActionBody)> {
    let mut i = 0;
    let space = read_address(data, &mut i)?;
    let author = read_word(data, &mut i)?;
    let body = ActionBody::read(entrypoint, data, &mut i)?;
    ensure_consumed(data, i)?;
    Ok((space, author, body))
}

fn parse_single<T>(data: &[U256], read: fn(&[U256], &mut usize) -> Result<T>) -> Result<T> {
    let mut i = 0;
    let value = read(data, &mut i)?;
    ensure_consumed(data, i)?;
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use sx_types::ExecutionStrategyInput;

    const SPACE: u64 = 0x5;
    const AUTH: u64 = 0xa;
    const OWNER: u64 = 0x0;

    fn chain() -> NativeChain {
        let mut chain = NativeChain::default();
        let mut space = Space::new(NativeAddress::from_u64(OWNER));
        space.authenticators.insert(NativeAddress::from_u64(AUTH));
        space.voting_strategies.push(NativeAddress::from_u64(0x51));
        chain.spaces.insert(NativeAddress::from_u64(SPACE), space);
        chain
            .authenticators
            .insert(NativeAddress::from_u64(AUTH), Authenticator::new(AuthenticatorKind::Vanilla));
        chain.voting_strategies.insert(NativeAddress::from_u64(0x51), VotingStrategyKind::Vanilla);
        chain.execution_strategies.insert(
            NativeAddress::from_u64(0xe1),
            ExecutionStrategy::new(ExecutionStrategyType::Vanilla, U256::from(1u8)),
        );
        chain
    }

    fn propose_call(author: ChainAddress) -> NativeCall {
        let body = ActionBody::propose(
            &sx_types::ProposeAction {
                space: NativeAddress::from_u64(SPACE),
                authenticator: NativeAddress::from_u64(AUTH),
                strategies: vec![],
                execution_strategy: ExecutionStrategyInput {
                    addr: NativeAddress::from_u64(0xe1),
                    params: vec![Bytes::from_static(&[0])],
                },
                metadata_uri: String::new(),
            },
            &[],
        );
        NativeCall::new(
            NativeAddress::from_u64(AUTH),
            "authenticate",
            crate::calldata::vanilla_calldata(NativeAddress::from_u64(SPACE), author, &body),
        )
    }

    #[test]
    fn test_proposal_ids_start_at_one() {
        let mut chain = chain();
        let author: ChainAddress = NativeAddress::from_u64(0x77).into();
        let out = chain.invoke(NativeAddress::from_u64(0x77), 100, &propose_call(author)).unwrap();
        assert_eq!(out, vec![U256::from(1u8)]);
        let out = chain.invoke(NativeAddress::from_u64(0x77), 100, &propose_call(author)).unwrap();
        assert_eq!(out, vec![U256::from(2u8)]);
        let proposal = &chain.spaces[&NativeAddress::from_u64(SPACE)].proposals[&1];
        assert_eq!(proposal.start_timestamp, 100);
        assert_eq!(proposal.max_end_timestamp, 100 + 86_400);
        assert_eq!(proposal.active_voting_strategies, U256::from(1u8));
    }

    #[test]
    fn test_space_rejects_direct_propose() {
        let mut chain = chain();
        let author: ChainAddress = NativeAddress::from_u64(0x77).into();
        let mut call = propose_call(author);
        call.contract_address = NativeAddress::from_u64(SPACE);
        call.entrypoint = "propose".to_string();
        assert!(matches!(
            chain.invoke(NativeAddress::from_u64(0x77), 0, &call),
            Err(SxError::ExecutionReverted { .. })
        ));
    }

    #[test]
    fn test_owner_only_settings() {
        let mut chain = chain();
        let call = NativeCall::new(NativeAddress::from_u64(SPACE), "set_voting_delay", vec![U256::from(60u8)]);
        assert!(chain.invoke(NativeAddress::from_u64(0x99), 0, &call).is_err());
        chain.invoke(NativeAddress::from_u64(OWNER), 0, &call).unwrap();
        assert_eq!(chain.spaces[&NativeAddress::from_u64(SPACE)].voting_delay, 60);
    }

    #[test]
    fn test_min_duration_cannot_exceed_max() {
        let mut chain = chain();
        let call = NativeCall::new(
            NativeAddress::from_u64(SPACE),
            "set_min_voting_duration",
            vec![U256::from(100_000u64)],
        );
        assert!(chain.invoke(NativeAddress::from_u64(OWNER), 0, &call).is_err());
    }

    #[test]
    fn test_quorum_rule() {
        let mut proposal = chain();
        let author: ChainAddress = NativeAddress::from_u64(0x77).into();
        proposal.invoke(NativeAddress::from_u64(0x77), 0, &propose_call(author)).unwrap();
        let mut p = proposal.spaces[&NativeAddress::from_u64(SPACE)].proposals[&1].clone();
        assert!(!p.accepted(U256::from(1u8)));
        p.votes_abstain = U256::from(1u8);
        assert!(!p.accepted(U256::from(1u8)));
        p.votes_for = U256::from(1u8);
        assert!(p.accepted(U256::from(2u8)));
        p.votes_against = U256::from(1u8);
        assert!(!p.accepted(U256::from(1u8)));
    }
}
