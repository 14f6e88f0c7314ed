//! Envelope model.
//!
//! Purpose:
//! - carry one governance action (`ActionPayload`) together with the metadata the target
//!   authenticator needs to attribute it (`SignatureData`);
//! - stay agnostic of authenticator rules: no validation happens here.
//!
//! Envelopes are immutable values. They are built once per action, handed to the dispatch
//! client (or to the relay service), and dropped.

use std::collections::BTreeMap;
use std::fmt;

use alloy_primitives::{Bytes, U256};
use serde::{Deserialize, Serialize};

use crate::address::{ChainAddress, NativeAddress};

/// Vote choice as encoded on-chain.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum Choice {
    Against = 0,
    For = 1,
    Abstain = 2,
}

impl From<Choice> for u8 {
    fn from(choice: Choice) -> u8 {
        choice as u8
    }
}

impl TryFrom<u8> for Choice {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Choice::Against),
            1 => Ok(Choice::For),
            2 => Ok(Choice::Abstain),
            other => Err(format!("invalid choice {other}")),
        }
    }
}

/// A voting strategy slot of the space, as referenced by a voter or author.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StrategyConfig {
    /// Index of the strategy in the space's voting strategy list.
    pub index: u8,
    /// Strategy contract.
    pub address: NativeAddress,
    /// Space-level strategy parameters.
    #[serde(default)]
    pub params: Bytes,
    /// Strategy-specific metadata consumed by the parameter hook (e.g. a merkle tree).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}

/// Execution strategy selected by a proposal, with encoder output as params.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionStrategyInput {
    pub addr: NativeAddress,
    #[serde(default)]
    pub params: Vec<Bytes>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProposeAction {
    pub space: NativeAddress,
    pub authenticator: NativeAddress,
    pub strategies: Vec<StrategyConfig>,
    pub execution_strategy: ExecutionStrategyInput,
    pub metadata_uri: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProposalAction {
    pub space: NativeAddress,
    pub authenticator: NativeAddress,
    pub proposal: u64,
    pub execution_strategy: ExecutionStrategyInput,
    pub metadata_uri: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteAction {
    pub space: NativeAddress,
    pub authenticator: NativeAddress,
    pub strategies: Vec<StrategyConfig>,
    pub proposal: u64,
    pub choice: Choice,
    pub metadata_uri: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelAction {
    pub space: NativeAddress,
    pub proposal: u64,
}

/// Owner-controlled space settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "field", content = "value", rename_all = "camelCase")]
pub enum SpaceSetting {
    MinVotingDuration(u64),
    MaxVotingDuration(u64),
    VotingDelay(u64),
    MetadataUri(String),
    Owner(NativeAddress),
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingAction {
    pub space: NativeAddress,
    pub setting: SpaceSetting,
}

/// The governance action carried by an envelope.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum ActionPayload {
    Propose(ProposeAction),
    UpdateProposal(UpdateProposalAction),
    Vote(VoteAction),
    Cancel(CancelAction),
    AdminSetting(SettingAction),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ActionKind {
    Propose,
    UpdateProposal,
    Vote,
    Cancel,
    AdminSetting,
}

impl ActionKind {
    pub const ALL: [ActionKind; 5] = [
        ActionKind::Propose,
        ActionKind::UpdateProposal,
        ActionKind::Vote,
        ActionKind::Cancel,
        ActionKind::AdminSetting,
    ];

    /// Recover the action kind from the type markers present in a `types` map.
    ///
    /// Marker matching is case-insensitive on the first letter so both `UpdateProposal` and
    /// `updateProposal` are accepted. More than one marker is ambiguous and yields `None`.
    pub fn from_type_markers<'a>(names: impl IntoIterator<Item = &'a str>) -> Option<ActionKind> {
        let mut found = None;
        for name in names {
            let kind = match name {
                "Propose" | "propose" => ActionKind::Propose,
                "Vote" | "vote" => ActionKind::Vote,
                "UpdateProposal" | "updateProposal" => ActionKind::UpdateProposal,
                _ => continue,
            };
            if found.replace(kind).is_some() {
                return None;
            }
        }
        found
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ActionKind::Propose => "propose",
            ActionKind::UpdateProposal => "updateProposal",
            ActionKind::Vote => "vote",
            ActionKind::Cancel => "cancel",
            ActionKind::AdminSetting => "adminSetting",
        };
        f.write_str(name)
    }
}

impl ActionPayload {
    pub fn kind(&self) -> ActionKind {
        match self {
            ActionPayload::Propose(_) => ActionKind::Propose,
            ActionPayload::UpdateProposal(_) => ActionKind::UpdateProposal,
            ActionPayload::Vote(_) => ActionKind::Vote,
            ActionPayload::Cancel(_) => ActionKind::Cancel,
            ActionPayload::AdminSetting(_) => ActionKind::AdminSetting,
        }
    }

    pub fn space(&self) -> NativeAddress {
        match self {
            ActionPayload::Propose(a) => a.space,
            ActionPayload::UpdateProposal(a) => a.space,
            ActionPayload::Vote(a) => a.space,
            ActionPayload::Cancel(a) => a.space,
            ActionPayload::AdminSetting(a) => a.space,
        }
    }

    /// Authenticator that must accept this action; owner actions go to the space directly.
    pub fn authenticator(&self) -> Option<NativeAddress> {
        match self {
            ActionPayload::Propose(a) => Some(a.authenticator),
            ActionPayload::UpdateProposal(a) => Some(a.authenticator),
            ActionPayload::Vote(a) => Some(a.authenticator),
            ActionPayload::Cancel(_) | ActionPayload::AdminSetting(_) => None,
        }
    }

    /// Key under which transaction-commit authenticators store commitments: 0 for proposals
    /// that do not exist yet, the proposal id otherwise.
    pub fn proposal_key(&self) -> U256 {
        match self {
            ActionPayload::Propose(_) | ActionPayload::AdminSetting(_) => U256::ZERO,
            ActionPayload::UpdateProposal(a) => U256::from(a.proposal),
            ActionPayload::Vote(a) => U256::from(a.proposal),
            ActionPayload::Cancel(a) => U256::from(a.proposal),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypedField {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: String,
}

/// Signature words and salt that accompany a message-signature call.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedPayload {
    pub signature: Vec<U256>,
    pub salt: U256,
}

/// Attribution metadata; scheme-specific.
///
/// Transaction-commit schemes only set `address`: the commit transaction itself is the
/// authentication.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignatureData {
    pub address: ChainAddress,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub types: BTreeMap<String, Vec<TypedField>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signed: Option<SignedPayload>,
}

impl SignatureData {
    pub fn address_only(address: ChainAddress) -> Self {
        SignatureData { address, types: BTreeMap::new(), signed: None }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature_data: Option<SignatureData>,
    pub data: ActionPayload,
}

impl Envelope {
    pub fn new(signature_data: SignatureData, data: ActionPayload) -> Self {
        Envelope { signature_data: Some(signature_data), data }
    }

    /// Envelope for owner calls, which carry no attribution.
    pub fn unattributed(data: ActionPayload) -> Self {
        Envelope { signature_data: None, data }
    }

    pub fn signer(&self) -> Option<ChainAddress> {
        self.signature_data.as_ref().map(|sig| sig.address)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vote() -> ActionPayload {
        ActionPayload::Vote(VoteAction {
            space: NativeAddress::from_u64(0x10),
            authenticator: NativeAddress::from_u64(0x20),
            strategies: vec![StrategyConfig {
                index: 0,
                address: NativeAddress::from_u64(0x30),
                params: Bytes::from_static(&[0]),
                metadata: None,
            }],
            proposal: 1,
            choice: Choice::For,
            metadata_uri: String::new(),
        })
    }

    #[test]
    fn test_choice_serializes_as_number() {
        assert_eq!(serde_json::to_string(&Choice::For).unwrap(), "1");
        assert_eq!(serde_json::from_str::<Choice>("2").unwrap(), Choice::Abstain);
        assert!(serde_json::from_str::<Choice>("3").is_err());
    }

    #[test]
    fn test_envelope_json_is_tagged() {
        let env = Envelope::new(
            SignatureData::address_only(NativeAddress::from_u64(7).into()),
            vote(),
        );
        let json = serde_json::to_value(&env).unwrap();
        assert_eq!(json["data"]["kind"], "vote");
        assert_eq!(json["data"]["choice"], 1);
        assert_eq!(json["data"]["metadataUri"], "");

        let back: Envelope = serde_json::from_value(json).unwrap();
        assert_eq!(back, env);
        assert_eq!(back.data.kind(), ActionKind::Vote);
    }

    #[test]
    fn test_owner_actions_have_no_authenticator() {
        let cancel = ActionPayload::Cancel(CancelAction {
            space: NativeAddress::from_u64(1),
            proposal: 4,
        });
        assert_eq!(cancel.authenticator(), None);
        assert_eq!(cancel.proposal_key(), U256::from(4u64));
        assert_eq!(vote().authenticator(), Some(NativeAddress::from_u64(0x20)));
    }

    #[test]
    fn test_setting_json_shape() {
        let setting = SpaceSetting::VotingDelay(3600);
        let json = serde_json::to_value(&setting).unwrap();
        assert_eq!(json, serde_json::json!({ "field": "votingDelay", "value": 3600 }));
    }

    #[test]
    fn test_type_marker_detection() {
        assert_eq!(
            ActionKind::from_type_markers(["Propose", "Strategy"]),
            Some(ActionKind::Propose)
        );
        assert_eq!(
            ActionKind::from_type_markers(["updateProposal", "Strategy"]),
            Some(ActionKind::UpdateProposal)
        );
        assert_eq!(
            ActionKind::from_type_markers(["Vote", "IndexedStrategy"]),
            Some(ActionKind::Vote)
        );
        assert_eq!(ActionKind::from_type_markers(["Strategy"]), None);
        assert_eq!(ActionKind::from_type_markers(["Vote", "Propose"]), None);
    }
}
