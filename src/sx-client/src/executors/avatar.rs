//! Simple-quorum avatar and timelock executors: `[abi.encode(MetaTransaction[])]`.

use alloy_primitives::Bytes;
use sx_types::{ExecutionIntent, MetaTransaction};

use super::ExecutionData;
use crate::abi::{decode_transactions, encode_transactions};
use crate::errors::{Result, SxError};

pub fn encode(intent: &ExecutionIntent) -> ExecutionData {
    ExecutionData {
        execution_params: vec![Bytes::from(encode_transactions(&intent.transactions))],
        execution_hash: None,
    }
}

pub fn decode(params: &[Bytes]) -> Result<Vec<MetaTransaction>> {
    match params {
        [payload] => decode_transactions(payload),
        _ => Err(SxError::InvalidMessage(format!(
            "avatar payload has {} params, expected 1",
            params.len()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::{Address, U256};
    use sx_types::Operation;

    #[test]
    fn test_payload_decodes_to_intent_transactions() {
        let intent = ExecutionIntent::new(vec![MetaTransaction {
            to: Address::repeat_byte(9),
            value: U256::from(5u8),
            data: Bytes::from_static(&[1, 2]),
            operation: Operation::DelegateCall,
            salt: U256::ZERO,
        }]);
        let out = encode(&intent);
        assert_eq!(out.execution_params.len(), 1);
        assert_eq!(decode(&out.execution_params).unwrap(), intent.transactions);
        assert!(decode(&[]).is_err());
    }
}
