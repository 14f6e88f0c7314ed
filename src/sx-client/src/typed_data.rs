//! Typed-data digests for message-signature authenticators.
//!
//! Purpose: build the exact digest a signature authenticator re-derives on-chain, for both the
//! ethereum (EIP-712) domain and the governance chain's native domain. The struct hashes are
//! assembled by hand from padded words, the same way the contracts do it.

use std::collections::BTreeMap;

use alloy_primitives::{B256, U256};
use sx_types::{ChainAddress, ExecutionStrategyInput, NativeAddress, TypedField};

use crate::calldata::{keccak256_bytes, ActionBody, IndexedParams};
use crate::errors::{Result, SxError};

pub const DOMAIN_NAME: &str = "sx";
pub const DOMAIN_VERSION: &str = "1";

struct TypeDef {
    name: &'static str,
    fields: &'static [(&'static str, &'static str)],
}

const STRATEGY: TypeDef = TypeDef {
    name: "Strategy",
    fields: &[("addr", "uint256"), ("params", "bytes[]")],
};

const INDEXED_STRATEGY: TypeDef = TypeDef {
    name: "IndexedStrategy",
    fields: &[("index", "uint256"), ("params", "uint256[]")],
};

const ETH_PROPOSE: TypeDef = TypeDef {
    name: "Propose",
    fields: &[
        ("authenticator", "bytes32"),
        ("space", "bytes32"),
        ("author", "address"),
        ("metadataUri", "string"),
        ("executionStrategy", "Strategy"),
        ("userProposalValidationParams", "uint256[]"),
        ("salt", "uint256"),
    ],
};

const ETH_VOTE: TypeDef = TypeDef {
    name: "Vote",
    fields: &[
        ("authenticator", "bytes32"),
        ("space", "bytes32"),
        ("voter", "address"),
        ("proposalId", "uint256"),
        ("choice", "uint256"),
        ("userVotingStrategies", "IndexedStrategy[]"),
        ("metadataUri", "string"),
    ],
};

const ETH_UPDATE_PROPOSAL: TypeDef = TypeDef {
    name: "UpdateProposal",
    fields: &[
        ("authenticator", "bytes32"),
        ("space", "bytes32"),
        ("author", "address"),
        ("proposalId", "uint256"),
        ("executionStrategy", "Strategy"),
        ("metadataUri", "string"),
        ("salt", "uint256"),
    ],
};

const NATIVE_PROPOSE: TypeDef = TypeDef {
    name: "Propose",
    fields: &[
        ("authenticator", "bytes32"),
        ("space", "bytes32"),
        ("author", "bytes32"),
        ("metadataUri", "string"),
        ("executionStrategy", "Strategy"),
        ("userProposalValidationParams", "uint256[]"),
        ("salt", "uint256"),
    ],
};

const NATIVE_VOTE: TypeDef = TypeDef {
    name: "Vote",
    fields: &[
        ("authenticator", "bytes32"),
        ("space", "bytes32"),
        ("voter", "bytes32"),
        ("proposalId", "uint256"),
        ("choice", "uint256"),
        ("userVotingStrategies", "IndexedStrategy[]"),
        ("metadataUri", "string"),
    ],
};

const NATIVE_UPDATE_PROPOSAL: TypeDef = TypeDef {
    name: "UpdateProposal",
    fields: &[
        ("authenticator", "bytes32"),
        ("space", "bytes32"),
        ("author", "bytes32"),
        ("proposalId", "uint256"),
        ("executionStrategy", "Strategy"),
        ("metadataUri", "string"),
        ("salt", "uint256"),
    ],
};

/// Signing domain of a message-signature authenticator.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SigningDomain {
    Ethereum { chain_id: u64 },
    Native { chain_id: u64, verifying_contract: NativeAddress },
}

impl SigningDomain {
    pub fn separator(&self) -> B256 {
        let mut buf = Vec::with_capacity(32 * 5);
        match self {
            SigningDomain::Ethereum { chain_id } => {
                buf.extend_from_slice(
                    keccak256_bytes(b"EIP712Domain(string name,string version,uint256 chainId)").as_slice(),
                );
                buf.extend_from_slice(keccak256_bytes(DOMAIN_NAME.as_bytes()).as_slice());
                buf.extend_from_slice(keccak256_bytes(DOMAIN_VERSION.as_bytes()).as_slice());
                buf.extend_from_slice(&U256::from(*chain_id).to_be_bytes::<32>());
            }
            SigningDomain::Native { chain_id, verifying_contract } => {
                buf.extend_from_slice(
                    keccak256_bytes(
                        b"NativeDomain(string name,string version,uint256 chainId,bytes32 verifyingContract)",
                    )
                    .as_slice(),
                );
                buf.extend_from_slice(keccak256_bytes(DOMAIN_NAME.as_bytes()).as_slice());
                buf.extend_from_slice(keccak256_bytes(DOMAIN_VERSION.as_bytes()).as_slice());
                buf.extend_from_slice(&U256::from(*chain_id).to_be_bytes::<32>());
                buf.extend_from_slice(&verifying_contract.to_bytes());
            }
        }
        keccak256_bytes(&buf)
    }

    fn primary(&self, body: &ActionBody) -> (&'static TypeDef, &'static TypeDef) {
        let ethereum = matches!(self, SigningDomain::Ethereum { .. });
        match (body, ethereum) {
            (ActionBody::Propose(_), true) => (&ETH_PROPOSE, &STRATEGY),
            (ActionBody::Propose(_), false) => (&NATIVE_PROPOSE, &STRATEGY),
            (ActionBody::Vote(_), true) => (&ETH_VOTE, &INDEXED_STRATEGY),
            (ActionBody::Vote(_), false) => (&NATIVE_VOTE, &INDEXED_STRATEGY),
            (ActionBody::UpdateProposal(_), true) => (&ETH_UPDATE_PROPOSAL, &STRATEGY),
            (ActionBody::UpdateProposal(_), false) => (&NATIVE_UPDATE_PROPOSAL, &STRATEGY),
        }
    }

    /// `types` map carried in the envelope's signature data.
    pub fn types(&self, body: &ActionBody) -> BTreeMap<String, Vec<TypedField>> {
        let (primary, dep) = self.primary(body);
        [primary, dep]
            .into_iter()
            .map(|def| {
                let fields = def
                    .fields
                    .iter()
                    .map(|(name, ty)| TypedField { name: name.to_string(), ty: ty.to_string() })
                    .collect();
                (def.name.to_string(), fields)
            })
            .collect()
    }

    fn check_author(&self, author: &ChainAddress) -> Result<()> {
        match (self, author) {
            (SigningDomain::Ethereum { .. }, ChainAddress::Ethereum(_)) => Ok(()),
            (SigningDomain::Native { .. }, ChainAddress::Native(_)) => Ok(()),
            (SigningDomain::Ethereum { .. }, ChainAddress::Native(addr)) => Err(
                SxError::UnsupportedAddressSpace(format!("{addr} cannot sign in the ethereum domain")),
            ),
            (SigningDomain::Native { .. }, ChainAddress::Ethereum(addr)) => Err(
                SxError::UnsupportedAddressSpace(format!("{addr} cannot sign in the native domain")),
            ),
        }
    }
}

/// The message a signature authenticator verifies.
#[derive(Clone, Debug)]
pub struct TypedMessage<'a> {
    pub authenticator: NativeAddress,
    pub space: NativeAddress,
    pub author: ChainAddress,
    pub body: &'a ActionBody,
    pub salt: U256,
}

fn encode_type(primary: &TypeDef, dep: &TypeDef) -> String {
    let render = |def: &TypeDef| {
        let fields: Vec<String> = def.fields.iter().map(|(name, ty)| format!("{ty} {name}")).collect();
        format!("{}({})", def.name, fields.join(","))
    };
    format!("{}{}", render(primary), render(dep))
}

fn type_hash(def: &TypeDef) -> B256 {
    let fields: Vec<String> = def.fields.iter().map(|(name, ty)| format!("{ty} {name}")).collect();
    keccak256_bytes(format!("{}({})", def.name, fields.join(",")).as_bytes())
}

fn hash_words(words: &[U256]) -> B256 {
    let mut buf = Vec::with_capacity(words.len() * 32);
    for word in words {
        buf.extend_from_slice(&word.to_be_bytes::<32>());
    }
    keccak256_bytes(&buf)
}

fn hash_strategy(strategy: &ExecutionStrategyInput) -> B256 {
    let mut params = Vec::with_capacity(strategy.params.len() * 32);
    for param in &strategy.params {
        params.extend_from_slice(keccak256_bytes(param).as_slice());
    }
    let mut buf = Vec::with_capacity(32 * 3);
    buf.extend_from_slice(type_hash(&STRATEGY).as_slice());
    buf.extend_from_slice(&strategy.addr.to_bytes());
    buf.extend_from_slice(keccak256_bytes(&params).as_slice());
    keccak256_bytes(&buf)
}

fn hash_indexed(strategies: &[IndexedParams]) -> B256 {
    let mut items = Vec::with_capacity(strategies.len() * 32);
    for strategy in strategies {
        let mut buf = Vec::with_capacity(32 * 3);
        buf.extend_from_slice(type_hash(&INDEXED_STRATEGY).as_slice());
        buf.extend_from_slice(&U256::from(strategy.index).to_be_bytes::<32>());
        buf.extend_from_slice(hash_words(&strategy.params).as_slice());
        items.extend_from_slice(keccak256_bytes(&buf).as_slice());
    }
    keccak256_bytes(&items)
}

/// Struct hash of the message under `domain`'s type definitions.
pub fn struct_hash(domain: &SigningDomain, message: &TypedMessage<'_>) -> Result<B256> {
    domain.check_author(&message.author)?;
    let (primary, dep) = domain.primary(message.body);
    let type_hash = keccak256_bytes(encode_type(primary, dep).as_bytes());

    let mut buf = Vec::with_capacity(32 * 8);
    buf.extend_from_slice(type_hash.as_slice());
    buf.extend_from_slice(&message.authenticator.to_bytes());
    buf.extend_from_slice(&message.space.to_bytes());
    buf.extend_from_slice(&message.author.to_word().to_be_bytes::<32>());
    match message.body {
        ActionBody::Propose(body) => {
            buf.extend_from_slice(keccak256_bytes(body.metadata_uri.as_bytes()).as_slice());
            buf.extend_from_slice(hash_strategy(&body.execution_strategy).as_slice());
            buf.extend_from_slice(hash_words(&body.validation_params).as_slice());
            buf.extend_from_slice(&message.salt.to_be_bytes::<32>());
        }
        ActionBody::Vote(body) => {
            buf.extend_from_slice(&U256::from(body.proposal_id).to_be_bytes::<32>());
            buf.extend_from_slice(&U256::from(u8::from(body.choice)).to_be_bytes::<32>());
            buf.extend_from_slice(hash_indexed(&body.strategies).as_slice());
            buf.extend_from_slice(keccak256_bytes(body.metadata_uri.as_bytes()).as_slice());
        }
        ActionBody::UpdateProposal(body) => {
            buf.extend_from_slice(&U256::from(body.proposal_id).to_be_bytes::<32>());
            buf.extend_from_slice(hash_strategy(&body.execution_strategy).as_slice());
            buf.extend_from_slice(keccak256_bytes(body.metadata_uri.as_bytes()).as_slice());
            buf.extend_from_slice(&message.salt.to_be_bytes::<32>());
        }
    }
    Ok(keccak256_bytes(&buf))
}

/// Final digest to sign (must match the authenticator's on-chain derivation).
pub fn digest(domain: &SigningDomain, message: &TypedMessage<'_>) -> Result<B256> {
    let struct_hash = struct_hash(domain, message)?;
    let separator = domain.separator();
    let mut buf = Vec::with_capacity(2 + 32 * 3);
    match domain {
        SigningDomain::Ethereum { .. } => {
            buf.extend_from_slice(b"\x19\x01");
            buf.extend_from_slice(separator.as_slice());
        }
        SigningDomain::Native { .. } => {
            buf.extend_from_slice(b"\x19\x02");
            buf.extend_from_slice(separator.as_slice());
            buf.extend_from_slice(&message.author.to_word().to_be_bytes::<32>());
        }
    }
    buf.extend_from_slice(struct_hash.as_slice());
    Ok(keccak256_bytes(&buf))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calldata::{ProposeBody, VoteBody};
    use alloy_primitives::{Address, Bytes};
    use sx_types::Choice;

    fn propose_body() -> ActionBody {
        ActionBody::Propose(ProposeBody {
            metadata_uri: "ipfs://a".to_string(),
            execution_strategy: ExecutionStrategyInput {
                addr: NativeAddress::from_u64(0xe1),
                params: vec![Bytes::from_static(&[0])],
            },
            validation_params: vec![U256::from(1u8), U256::ZERO, U256::ZERO],
        })
    }

    fn message<'a>(body: &'a ActionBody, author: ChainAddress, salt: u64) -> TypedMessage<'a> {
        TypedMessage {
            authenticator: NativeAddress::from_u64(0xa1),
            space: NativeAddress::from_u64(0x5),
            author,
            body,
            salt: U256::from(salt),
        }
    }

    fn eth_author() -> ChainAddress {
        ChainAddress::Ethereum(Address::repeat_byte(0x11))
    }

    #[test]
    fn test_type_strings() {
        assert_eq!(
            encode_type(&ETH_PROPOSE, &STRATEGY),
            "Propose(bytes32 authenticator,bytes32 space,address author,string metadataUri,Strategy executionStrategy,uint256[] userProposalValidationParams,uint256 salt)Strategy(uint256 addr,bytes[] params)"
        );
        assert_eq!(
            encode_type(&ETH_VOTE, &INDEXED_STRATEGY),
            "Vote(bytes32 authenticator,bytes32 space,address voter,uint256 proposalId,uint256 choice,IndexedStrategy[] userVotingStrategies,string metadataUri)IndexedStrategy(uint256 index,uint256[] params)"
        );
    }

    #[test]
    fn test_digest_is_deterministic_and_salted() {
        let domain = SigningDomain::Ethereum { chain_id: 5 };
        let body = propose_body();
        let a = digest(&domain, &message(&body, eth_author(), 1)).unwrap();
        let b = digest(&domain, &message(&body, eth_author(), 1)).unwrap();
        let c = digest(&domain, &message(&body, eth_author(), 2)).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_domains_differ_by_chain() {
        assert_ne!(
            SigningDomain::Ethereum { chain_id: 1 }.separator(),
            SigningDomain::Ethereum { chain_id: 5 }.separator()
        );
    }

    #[test]
    fn test_author_must_match_domain() {
        let body = propose_body();
        let native: ChainAddress = NativeAddress::from_u64(9).into();
        let err = digest(&SigningDomain::Ethereum { chain_id: 1 }, &message(&body, native, 0)).unwrap_err();
        assert!(matches!(err, SxError::UnsupportedAddressSpace(_)));

        let domain = SigningDomain::Native { chain_id: 1, verifying_contract: NativeAddress::from_u64(0xa1) };
        assert!(digest(&domain, &message(&body, eth_author(), 0)).is_err());
        assert!(digest(&domain, &message(&body, native, 0)).is_ok());
    }

    #[test]
    fn test_types_map_carries_marker() {
        let vote = ActionBody::Vote(VoteBody {
            proposal_id: 1,
            choice: Choice::For,
            strategies: vec![],
            metadata_uri: String::new(),
        });
        let types = SigningDomain::Ethereum { chain_id: 1 }.types(&vote);
        assert!(types.contains_key("Vote"));
        assert!(types.contains_key("IndexedStrategy"));
        assert_eq!(types["Vote"][2].ty, "address");

        let native = SigningDomain::Native { chain_id: 1, verifying_contract: NativeAddress::ZERO };
        assert_eq!(native.types(&vote)["Vote"][2].ty, "bytes32");
    }
}
