//! Indexer configuration.
//!
//! Binds contract events to handler names for an event indexer following one network: the
//! space factory is a static source, spaces and execution strategies it deploys are templates.

use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};
use sx_types::NativeAddress;

use crate::errors::{Result, SxError};
use crate::network::{ExecutionStrategyType, NetworkConfig};

pub const SPACE_TEMPLATE: &str = "Space";
pub const TIMELOCK_TEMPLATE: &str = "SimpleQuorumTimelockExecutionStrategy";
pub const AXIOM_TEMPLATE: &str = "AxiomExecutionStrategy";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventHandler {
    /// Event signature, e.g. `ProposalCancelled(uint256)`.
    pub name: String,
    #[serde(rename = "fn")]
    pub handler: String,
}

impl EventHandler {
    fn new(name: &str, handler: &str) -> Self {
        EventHandler { name: name.to_string(), handler: handler.to_string() }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Source {
    pub contract: NativeAddress,
    pub start: u64,
    pub abi: String,
    pub events: Vec<EventHandler>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Template {
    pub abi: String,
    pub events: Vec<EventHandler>,
}

/// Implementation contracts the indexer recognizes deployments of.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Overrides {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub master_simple_quorum_avatar: Option<NativeAddress>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub master_simple_quorum_timelock: Option<NativeAddress>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub master_axiom: Option<NativeAddress>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexerConfig {
    pub indexer_name: String,
    pub chain_id: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network_node_url: Option<String>,
    pub overrides: Overrides,
    pub sources: Vec<Source>,
    pub templates: BTreeMap<String, Template>,
}

fn space_events() -> Vec<EventHandler> {
    vec![
        EventHandler::new("SpaceCreated(felt252,felt252,u64,u64,u64,Strategy,felt252,Array<Strategy>)", "handleSpaceCreated"),
        EventHandler::new("MetadataUriUpdated(Array<felt252>)", "handleMetadataUriUpdated"),
        EventHandler::new("MinVotingDurationUpdated(u64)", "handleMinVotingDurationUpdated"),
        EventHandler::new("MaxVotingDurationUpdated(u64)", "handleMaxVotingDurationUpdated"),
        EventHandler::new("VotingDelayUpdated(u64)", "handleVotingDelayUpdated"),
        EventHandler::new("OwnershipTransferred(felt252,felt252)", "handleOwnershipTransferred"),
        EventHandler::new("AuthenticatorsAdded(Array<felt252>)", "handleAuthenticatorsAdded"),
        EventHandler::new("AuthenticatorsRemoved(Array<felt252>)", "handleAuthenticatorsRemoved"),
        EventHandler::new("VotingStrategiesAdded(Array<Strategy>)", "handleVotingStrategiesAdded"),
        EventHandler::new("VotingStrategiesRemoved(Array<u8>)", "handleVotingStrategiesRemoved"),
        EventHandler::new("ProposalCreated(u256,UserAddress,Proposal,Array<felt252>)", "handleProposalCreated"),
        EventHandler::new("ProposalCancelled(u256)", "handleProposalCancelled"),
        EventHandler::new("ProposalUpdated(u256,Strategy,Array<felt252>)", "handleProposalUpdated"),
        EventHandler::new("ProposalExecuted(u256)", "handleProposalExecuted"),
        EventHandler::new("VoteCast(u256,UserAddress,u8,u256)", "handleVoteCast"),
        EventHandler::new("VoteCastWithMetadata(u256,UserAddress,u8,u256,Array<felt252>)", "handleVoteCast"),
    ]
}

fn timelock_events() -> Vec<EventHandler> {
    vec![
        EventHandler::new("ProposalExecuted(bytes32)", "handleTimelockProposalExecuted"),
        EventHandler::new("ProposalVetoed(bytes32)", "handleTimelockProposalVetoed"),
    ]
}

fn axiom_events() -> Vec<EventHandler> {
    vec![EventHandler::new(
        "WriteOffchainVotes(uint256,uint256,uint256,uint256,uint256)",
        "handleAxiomWriteOffchainVotes",
    )]
}

fn first_of(network: &NetworkConfig, ty: ExecutionStrategyType) -> Option<NativeAddress> {
    network
        .execution_strategies
        .iter()
        .find_map(|(addr, t)| (*t == ty).then_some(*addr))
}

impl IndexerConfig {
    pub fn for_network(network: &NetworkConfig) -> Result<Self> {
        let factory = network.space_factory.ok_or_else(|| {
            SxError::Configuration(format!("{} has no space factory to index", network.name))
        })?;

        let mut templates = BTreeMap::new();
        templates.insert(
            SPACE_TEMPLATE.to_string(),
            Template { abi: SPACE_TEMPLATE.to_string(), events: space_events() },
        );
        templates.insert(
            TIMELOCK_TEMPLATE.to_string(),
            Template { abi: TIMELOCK_TEMPLATE.to_string(), events: timelock_events() },
        );
        templates.insert(
            AXIOM_TEMPLATE.to_string(),
            Template { abi: AXIOM_TEMPLATE.to_string(), events: axiom_events() },
        );

        let config = IndexerConfig {
            indexer_name: network.name.clone(),
            chain_id: network.eip712_chain_id,
            network_node_url: None,
            overrides: Overrides {
                master_simple_quorum_avatar: first_of(network, ExecutionStrategyType::SimpleQuorumAvatar),
                master_simple_quorum_timelock: first_of(network, ExecutionStrategyType::SimpleQuorumTimelock),
                master_axiom: first_of(network, ExecutionStrategyType::Axiom),
            },
            sources: vec![Source {
                contract: factory,
                start: network.start_block,
                abi: "SpaceFactory".to_string(),
                events: vec![EventHandler::new("NewContractDeployed(felt252,felt252)", "handleContractDeployed")],
            }],
            templates,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn with_node_url(mut self, url: impl Into<String>) -> Self {
        self.network_node_url = Some(url.into());
        self
    }

    /// Rejects a contract type binding the same event signature twice.
    pub fn validate(&self) -> Result<()> {
        let sources = self.sources.iter().map(|s| (s.abi.as_str(), &s.events));
        let templates = self.templates.iter().map(|(name, t)| (name.as_str(), &t.events));
        for (contract, events) in sources.chain(templates) {
            let mut seen = HashSet::new();
            for event in events {
                if !seen.insert(event.name.as_str()) {
                    return Err(SxError::Configuration(format!(
                        "{contract} binds {} more than once",
                        event.name
                    )));
                }
            }
        }
        Ok(())
    }

    pub fn from_json(raw: &str) -> Result<Self> {
        let config: IndexerConfig = serde_json::from_str(raw)
            .map_err(|e| SxError::Configuration(format!("invalid indexer config: {e}")))?;
        config.validate()?;
        Ok(config)
    }
}
