use alloy_primitives::{Address, Bytes, U256};
use serde::{Deserialize, Serialize};

/// Call type of a proposal transaction, as understood by Safe-style avatars.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum Operation {
    #[default]
    Call = 0,
    DelegateCall = 1,
}

impl From<Operation> for u8 {
    fn from(op: Operation) -> u8 {
        op as u8
    }
}

impl TryFrom<u8> for Operation {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Operation::Call),
            1 => Ok(Operation::DelegateCall),
            other => Err(format!("invalid operation {other}")),
        }
    }
}

/// One transaction attached to a proposal.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetaTransaction {
    pub to: Address,
    pub value: U256,
    #[serde(default)]
    pub data: Bytes,
    #[serde(default)]
    pub operation: Operation,
    /// Caller-supplied; lets otherwise identical transactions hash differently.
    #[serde(default)]
    pub salt: U256,
}

/// What an execution strategy should do once a proposal passes.
///
/// Built fresh for every execute call and never persisted.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionIntent {
    pub transactions: Vec<MetaTransaction>,
    /// Destination executor on L1 (avatar or timelock) for strategies that relay there.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destination: Option<Address>,
}

impl ExecutionIntent {
    pub fn new(transactions: Vec<MetaTransaction>) -> Self {
        ExecutionIntent { transactions, destination: None }
    }

    pub fn with_destination(mut self, destination: Address) -> Self {
        self.destination = Some(destination);
        self
    }
}
