//! Network map.
//!
//! Purpose: resolve a chain id to the contracts deployed on it and the kind of each contract.
//! Lookups of chain ids that are not configured fail with `UnsupportedNetwork`; there is no
//! default network.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

use alloy_primitives::Address;
use serde::{Deserialize, Serialize};
use sx_types::NativeAddress;

use crate::errors::{Result, SxError};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AuthenticatorKind {
    /// Pass-through, no authentication.
    Vanilla,
    /// EIP-712 signature by an ethereum account.
    EthSig,
    /// Commitment sent from an ethereum account through the L1 commit contract.
    EthTx,
    /// Typed-data signature by a governance chain account.
    NativeSig,
    /// Commitment sent from a governance chain account.
    NativeTx,
}

impl AuthenticatorKind {
    pub const ALL: [AuthenticatorKind; 5] = [
        AuthenticatorKind::Vanilla,
        AuthenticatorKind::EthSig,
        AuthenticatorKind::EthTx,
        AuthenticatorKind::NativeSig,
        AuthenticatorKind::NativeTx,
    ];
}

impl fmt::Display for AuthenticatorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AuthenticatorKind::Vanilla => "vanilla",
            AuthenticatorKind::EthSig => "ethSig",
            AuthenticatorKind::EthTx => "ethTx",
            AuthenticatorKind::NativeSig => "nativeSig",
            AuthenticatorKind::NativeTx => "nativeTx",
        };
        f.write_str(name)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum VotingStrategyKind {
    Vanilla,
    Erc20Votes,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ExecutionStrategyType {
    /// Direct execution with no transactions (signalling only).
    Vanilla,
    SimpleQuorumAvatar,
    SimpleQuorumTimelock,
    /// Relays the proposal to an L1 executor through the messaging layer.
    EthRelayer,
    /// Oracle-attested execution.
    Axiom,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct L1Config {
    pub chain_id: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rpc_url: Option<String>,
    /// Commit contract used by the ethereum transaction authenticator.
    pub commit: Address,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkConfig {
    pub name: String,
    pub chain_id: u64,
    /// Chain id used in the EIP-712 domain of ethereum signatures.
    pub eip712_chain_id: u64,
    pub l1: L1Config,
    #[serde(default)]
    pub space_factory: Option<NativeAddress>,
    #[serde(default)]
    pub start_block: u64,
    #[serde(default)]
    pub authenticators: BTreeMap<NativeAddress, AuthenticatorKind>,
    #[serde(default)]
    pub strategies: BTreeMap<NativeAddress, VotingStrategyKind>,
    #[serde(default)]
    pub execution_strategies: BTreeMap<NativeAddress, ExecutionStrategyType>,
}

impl NetworkConfig {
    pub fn authenticator_kind(&self, authenticator: NativeAddress) -> Result<AuthenticatorKind> {
        self.authenticators.get(&authenticator).copied().ok_or_else(|| {
            SxError::Configuration(format!(
                "authenticator {authenticator} is not configured on {}",
                self.name
            ))
        })
    }

    pub fn voting_strategy_kind(&self, strategy: NativeAddress) -> Result<VotingStrategyKind> {
        self.strategies.get(&strategy).copied().ok_or_else(|| {
            SxError::Configuration(format!("voting strategy {strategy} is not configured on {}", self.name))
        })
    }

    pub fn execution_strategy_type(&self, strategy: NativeAddress) -> Result<ExecutionStrategyType> {
        self.execution_strategies.get(&strategy).copied().ok_or_else(|| {
            SxError::Configuration(format!(
                "execution strategy {strategy} is not configured on {}",
                self.name
            ))
        })
    }
}

/// Supported networks, keyed by governance chain id.
#[derive(Clone, Debug, Default)]
pub struct NetworkMap {
    networks: HashMap<u64, Arc<NetworkConfig>>,
}

impl NetworkMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, config: NetworkConfig) -> Arc<NetworkConfig> {
        let config = Arc::new(config);
        self.networks.insert(config.chain_id, config.clone());
        config
    }

    pub fn get(&self, chain_id: u64) -> Result<Arc<NetworkConfig>> {
        self.networks
            .get(&chain_id)
            .cloned()
            .ok_or(SxError::UnsupportedNetwork(chain_id))
    }

    pub fn chain_ids(&self) -> Vec<u64> {
        let mut ids: Vec<u64> = self.networks.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Parse a JSON array of network configs. Duplicate chain ids are rejected.
    pub fn from_json(raw: &str) -> Result<Self> {
        let configs: Vec<NetworkConfig> = serde_json::from_str(raw)
            .map_err(|e| SxError::Configuration(format!("invalid network config: {e}")))?;
        let mut map = NetworkMap::new();
        for config in configs {
            if map.networks.contains_key(&config.chain_id) {
                return Err(SxError::Configuration(format!(
                    "chain id {} configured twice",
                    config.chain_id
                )));
            }
            map.insert(config);
        }
        Ok(map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(chain_id: u64) -> NetworkConfig {
        let mut authenticators = BTreeMap::new();
        authenticators.insert(NativeAddress::from_u64(0xa1), AuthenticatorKind::EthSig);
        NetworkConfig {
            name: format!("net-{chain_id}"),
            chain_id,
            eip712_chain_id: 1,
            l1: L1Config { chain_id: 1, rpc_url: None, commit: Address::ZERO },
            space_factory: None,
            start_block: 0,
            authenticators,
            strategies: BTreeMap::new(),
            execution_strategies: BTreeMap::new(),
        }
    }

    #[test]
    fn test_unknown_chain_is_unsupported() {
        let mut map = NetworkMap::new();
        map.insert(config(5));
        assert!(map.get(5).is_ok());
        assert!(matches!(map.get(6), Err(SxError::UnsupportedNetwork(6))));
        assert!(matches!(NetworkMap::new().get(0), Err(SxError::UnsupportedNetwork(0))));
    }

    #[test]
    fn test_from_json() {
        let raw = serde_json::to_string(&vec![config(5), config(9)]).unwrap();
        let map = NetworkMap::from_json(&raw).unwrap();
        assert_eq!(map.chain_ids(), vec![5, 9]);
        let net = map.get(9).unwrap();
        assert_eq!(
            net.authenticator_kind(NativeAddress::from_u64(0xa1)).unwrap(),
            AuthenticatorKind::EthSig
        );
        assert!(net.authenticator_kind(NativeAddress::from_u64(0xa2)).is_err());
    }

    #[test]
    fn test_duplicate_chain_rejected() {
        let raw = serde_json::to_string(&vec![config(5), config(5)]).unwrap();
        assert!(matches!(NetworkMap::from_json(&raw), Err(SxError::Configuration(_))));
    }
}
