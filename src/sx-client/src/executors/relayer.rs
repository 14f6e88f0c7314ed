//! Cross-chain relayed execution.
//!
//! Layout: `[destination, hashLow, hashHigh]`, each a 32-byte big-endian word. The destination
//! is the L1 executor that consumes the relayed message; the hash limbs reassemble into
//! `keccak256(abi.encode(MetaTransaction[]))`.

use alloy_primitives::{Address, Bytes, B256, U256};
use sx_types::{split_limbs, ExecutionIntent};

use super::{execution_hash, ExecutionData};
use crate::errors::{Result, SxError};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RelayerParams {
    pub destination: Address,
    pub execution_hash: B256,
}

pub fn encode(intent: &ExecutionIntent) -> Result<ExecutionData> {
    let destination = intent.destination.ok_or_else(|| {
        SxError::Configuration("relayed execution requires an L1 destination".to_string())
    })?;
    let hash = execution_hash(&intent.transactions);
    let (low, high) = split_limbs(U256::from_be_bytes(hash.0));

    let mut dest = [0u8; 32];
    dest[12..].copy_from_slice(destination.as_slice());
    Ok(ExecutionData {
        execution_params: vec![
            Bytes::from(dest.to_vec()),
            Bytes::from(low.to_be_bytes::<32>().to_vec()),
            Bytes::from(high.to_be_bytes::<32>().to_vec()),
        ],
        execution_hash: Some(hash),
    })
}

pub fn decode(params: &[Bytes]) -> Result<RelayerParams> {
    let [dest, low, high] = params else {
        return Err(SxError::InvalidMessage(format!(
            "relayer params have {} entries, expected 3",
            params.len()
        )));
    };
    for word in [dest, low, high] {
        if word.len() != 32 {
            return Err(SxError::InvalidMessage("relayer param is not a 32-byte word".to_string()));
        }
    }
    if dest[..12].iter().any(|b| *b != 0) {
        return Err(SxError::InvalidMessage("relayer destination is not an address".to_string()));
    }
    let low = U256::from_be_slice(low);
    let high = U256::from_be_slice(high);
    let limit = U256::from(u128::MAX);
    if low > limit || high > limit {
        return Err(SxError::InvalidMessage("execution hash limb exceeds 128 bits".to_string()));
    }
    Ok(RelayerParams {
        destination: Address::from_slice(&dest[12..]),
        execution_hash: B256::from((low + (high << 128usize)).to_be_bytes::<32>()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use sx_types::{MetaTransaction, Operation};

    fn intent() -> ExecutionIntent {
        ExecutionIntent::new(vec![MetaTransaction {
            to: Address::repeat_byte(0x77),
            value: U256::from(1u8),
            data: Bytes::from_static(&[0xab]),
            operation: Operation::Call,
            salt: U256::from(42u8),
        }])
        .with_destination(Address::repeat_byte(0x99))
    }

    #[test]
    fn test_params_carry_destination_and_hash() {
        let out = encode(&intent()).unwrap();
        let decoded = decode(&out.execution_params).unwrap();
        assert_eq!(decoded.destination, Address::repeat_byte(0x99));
        assert_eq!(Some(decoded.execution_hash), out.execution_hash);
        assert_eq!(decoded.execution_hash, execution_hash(&intent().transactions));
    }

    #[test]
    fn test_destination_required() {
        let mut no_dest = intent();
        no_dest.destination = None;
        assert!(matches!(encode(&no_dest), Err(SxError::Configuration(_))));
    }

    #[test]
    fn test_decode_rejects_bad_layout() {
        assert!(decode(&[Bytes::new()]).is_err());
        let mut params = encode(&intent()).unwrap().execution_params;
        params[1] = Bytes::from(vec![0xff; 32]);
        assert!(decode(&params).is_err());
    }
}
