//! Execution strategy encoders.
//!
//! Purpose: turn an `ExecutionIntent` into the `executionParams` a given on-chain executor
//! decodes. Each strategy type owns its byte layout here and nowhere else.
//!
//! Encoders are pure: identical inputs give identical bytes. Transaction salts come from the
//! intent, never from the encoder.

pub mod avatar;
pub mod relayer;

use alloy_primitives::{Bytes, B256};
use sx_types::{ExecutionIntent, ExecutionStrategyInput, MetaTransaction, NativeAddress};
use tracing::debug;

use crate::abi::encode_transactions;
use crate::calldata::keccak256_bytes;
use crate::errors::{Result, SxError};
use crate::network::ExecutionStrategyType;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExecutionData {
    pub execution_params: Vec<Bytes>,
    /// Hash the destination chain verifies independently (relayed strategies only).
    pub execution_hash: Option<B256>,
}

impl ExecutionData {
    pub fn into_strategy(self, addr: NativeAddress) -> ExecutionStrategyInput {
        ExecutionStrategyInput { addr, params: self.execution_params }
    }
}

pub fn encode(
    strategy_type: ExecutionStrategyType,
    strategy: NativeAddress,
    intent: &ExecutionIntent,
) -> Result<ExecutionData> {
    debug!(
        %strategy,
        ?strategy_type,
        transactions = intent.transactions.len(),
        "encoding execution params"
    );
    match strategy_type {
        ExecutionStrategyType::Vanilla => {
            reject_transactions(strategy_type, intent)?;
            Ok(ExecutionData {
                execution_params: vec![Bytes::from_static(&[0])],
                execution_hash: None,
            })
        }
        ExecutionStrategyType::SimpleQuorumAvatar | ExecutionStrategyType::SimpleQuorumTimelock => {
            Ok(avatar::encode(intent))
        }
        ExecutionStrategyType::EthRelayer => relayer::encode(intent),
        ExecutionStrategyType::Axiom => {
            reject_transactions(strategy_type, intent)?;
            Ok(ExecutionData { execution_params: Vec::new(), execution_hash: None })
        }
    }
}

/// `keccak256(abi.encode(MetaTransaction[]))`.
pub fn execution_hash(transactions: &[MetaTransaction]) -> B256 {
    keccak256_bytes(&encode_transactions(transactions))
}

fn reject_transactions(strategy_type: ExecutionStrategyType, intent: &ExecutionIntent) -> Result<()> {
    if intent.transactions.is_empty() {
        return Ok(());
    }
    Err(SxError::Configuration(format!(
        "{strategy_type:?} execution does not carry transactions"
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::{Address, U256};
    use sx_types::Operation;

    fn intent() -> ExecutionIntent {
        ExecutionIntent::new(vec![MetaTransaction {
            to: Address::repeat_byte(0x44),
            value: U256::from(10u8),
            data: Bytes::new(),
            operation: Operation::Call,
            salt: U256::from(1u8),
        }])
        .with_destination(Address::repeat_byte(0x55))
    }

    #[test]
    fn test_encoders_are_idempotent() {
        let strategy = NativeAddress::from_u64(0xe1);
        for ty in [
            ExecutionStrategyType::SimpleQuorumAvatar,
            ExecutionStrategyType::SimpleQuorumTimelock,
            ExecutionStrategyType::EthRelayer,
        ] {
            assert_eq!(encode(ty, strategy, &intent()).unwrap(), encode(ty, strategy, &intent()).unwrap());
        }
    }

    #[test]
    fn test_vanilla_params() {
        let out = encode(ExecutionStrategyType::Vanilla, NativeAddress::ZERO, &ExecutionIntent::default()).unwrap();
        assert_eq!(out.execution_params, vec![Bytes::from_static(&[0])]);
        assert!(encode(ExecutionStrategyType::Vanilla, NativeAddress::ZERO, &intent()).is_err());
    }

    #[test]
    fn test_axiom_params() {
        let out = encode(ExecutionStrategyType::Axiom, NativeAddress::ZERO, &ExecutionIntent::default()).unwrap();
        assert!(out.execution_params.is_empty());
        assert!(matches!(
            encode(ExecutionStrategyType::Axiom, NativeAddress::ZERO, &intent()),
            Err(SxError::Configuration(_))
        ));
    }

    #[test]
    fn test_salt_changes_hash() {
        let mut other = intent();
        other.transactions[0].salt = U256::from(2u8);
        assert_ne!(execution_hash(&intent().transactions), execution_hash(&other.transactions));
    }
}
