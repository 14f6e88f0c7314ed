//! Address spaces understood by the pipeline.
//!
//! The governance chain addresses contracts and accounts with a single 32-byte word, while
//! voters and authors may also come from an EVM chain with 20-byte addresses. The two spaces
//! are kept apart in the type system; a string is classified by its hex digit count.

use std::fmt;
use std::str::FromStr;

use alloy_primitives::{Address, U256};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

static ETHEREUM_ADDRESS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^0x[0-9a-fA-F]{40}$").expect("static regex"));
static NATIVE_ADDRESS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^0x[0-9a-fA-F]{1,64}$").expect("static regex"));

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AddressError {
    #[error("malformed address: {0}")]
    Malformed(String),
    #[error("expected a governance chain address, got ethereum address {0}")]
    NotNative(Address),
}

/// A 32-byte governance chain address (contract or account).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NativeAddress(pub U256);

impl NativeAddress {
    pub const ZERO: NativeAddress = NativeAddress(U256::ZERO);

    pub const fn from_word(word: U256) -> Self {
        NativeAddress(word)
    }

    pub fn from_u64(value: u64) -> Self {
        NativeAddress(U256::from(value))
    }

    pub fn word(&self) -> U256 {
        self.0
    }

    pub fn to_bytes(&self) -> [u8; 32] {
        self.0.to_be_bytes::<32>()
    }
}

impl fmt::Display for NativeAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.to_bytes()))
    }
}

impl FromStr for NativeAddress {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.parse::<ChainAddress>()? {
            ChainAddress::Native(addr) => Ok(addr),
            ChainAddress::Ethereum(addr) => Err(AddressError::NotNative(addr)),
        }
    }
}

impl Serialize for NativeAddress {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for NativeAddress {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// An author/voter address from either address space.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ChainAddress {
    Ethereum(Address),
    Native(NativeAddress),
}

impl ChainAddress {
    /// Address type tag used in calldata and relayed messages: 0 native, 1 ethereum.
    pub fn address_type(&self) -> u8 {
        match self {
            ChainAddress::Native(_) => 0,
            ChainAddress::Ethereum(_) => 1,
        }
    }

    /// The address as a single word, ethereum addresses left-padded.
    pub fn to_word(&self) -> U256 {
        match self {
            ChainAddress::Native(addr) => addr.word(),
            ChainAddress::Ethereum(addr) => U256::from_be_slice(addr.as_slice()),
        }
    }

    pub fn from_parts(address_type: u8, word: U256) -> Result<Self, AddressError> {
        match address_type {
            0 => Ok(ChainAddress::Native(NativeAddress(word))),
            1 => {
                if word >> 160usize != U256::ZERO {
                    return Err(AddressError::Malformed(format!("{word:#x}")));
                }
                let bytes = word.to_be_bytes::<32>();
                Ok(ChainAddress::Ethereum(Address::from_slice(&bytes[12..])))
            }
            other => Err(AddressError::Malformed(format!("address type {other}"))),
        }
    }

    pub fn is_ethereum(&self) -> bool {
        matches!(self, ChainAddress::Ethereum(_))
    }
}

impl From<Address> for ChainAddress {
    fn from(addr: Address) -> Self {
        ChainAddress::Ethereum(addr)
    }
}

impl From<NativeAddress> for ChainAddress {
    fn from(addr: NativeAddress) -> Self {
        ChainAddress::Native(addr)
    }
}

impl fmt::Display for ChainAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChainAddress::Ethereum(addr) => f.write_str(&addr.to_checksum(None)),
            ChainAddress::Native(addr) => addr.fmt(f),
        }
    }
}

impl FromStr for ChainAddress {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if ETHEREUM_ADDRESS.is_match(s) {
            let addr = s
                .parse::<Address>()
                .map_err(|_| AddressError::Malformed(s.to_string()))?;
            return Ok(ChainAddress::Ethereum(addr));
        }
        if NATIVE_ADDRESS.is_match(s) {
            let word = U256::from_str_radix(&s[2..], 16)
                .map_err(|_| AddressError::Malformed(s.to_string()))?;
            return Ok(ChainAddress::Native(NativeAddress(word)));
        }
        Err(AddressError::Malformed(s.to_string()))
    }
}

impl Serialize for ChainAddress {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ChainAddress {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forty_hex_digits_is_ethereum() {
        let addr: ChainAddress = "0x2842c82E20ab600F443646e1BC8550B44a513D82".parse().unwrap();
        assert!(addr.is_ethereum());
        assert_eq!(addr.address_type(), 1);
    }

    #[test]
    fn test_short_and_full_words_are_native() {
        let short: ChainAddress = "0x1".parse().unwrap();
        assert_eq!(short, ChainAddress::Native(NativeAddress::from_u64(1)));

        let full = format!("0x{}", "ab".repeat(32));
        let addr: NativeAddress = full.parse().unwrap();
        assert_eq!(addr.to_string(), full);
    }

    #[test]
    fn test_native_parse_rejects_ethereum() {
        let err = "0x2842c82E20ab600F443646e1BC8550B44a513D82"
            .parse::<NativeAddress>()
            .unwrap_err();
        assert!(matches!(err, AddressError::NotNative(_)));
    }

    #[test]
    fn test_malformed_addresses() {
        assert!("2842".parse::<ChainAddress>().is_err());
        assert!("0x".parse::<ChainAddress>().is_err());
        assert!(format!("0x{}", "1".repeat(65)).parse::<ChainAddress>().is_err());
        assert!("0xzz".parse::<ChainAddress>().is_err());
    }

    #[test]
    fn test_word_round_trip_through_parts() {
        let eth: ChainAddress = "0x2842c82E20ab600F443646e1BC8550B44a513D82".parse().unwrap();
        let back = ChainAddress::from_parts(eth.address_type(), eth.to_word()).unwrap();
        assert_eq!(back, eth);
        assert!(ChainAddress::from_parts(1, U256::MAX).is_err());
        assert!(ChainAddress::from_parts(7, U256::ZERO).is_err());
    }

    #[test]
    fn test_serde_as_string() {
        let addr = NativeAddress::from_u64(0x42);
        let json = serde_json::to_string(&addr).unwrap();
        assert_eq!(json, format!("\"0x{:0>64}\"", "42"));
        let back: NativeAddress = serde_json::from_str(&json).unwrap();
        assert_eq!(back, addr);
    }
}
