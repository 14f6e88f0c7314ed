//! Per-space signer derivation.
//!
//! `secret = HMAC-SHA256(master, "sx-relayer" ‖ chain_id (u64 BE) ‖ space (32 bytes))`. The same
//! secret controls the space's governance chain account and its L1 wallet.

use std::collections::{HashMap, VecDeque};

use hmac::{Hmac, Mac};
use parking_lot::Mutex;
use sha2::Sha256;
use sx_client::{EthWallet, LocalNativeAccount, Result, SxError};
use sx_types::NativeAddress;
use tracing::debug;

type HmacSha256 = Hmac<Sha256>;

const DOMAIN: &[u8] = b"sx-relayer";

#[derive(Clone, Debug)]
pub struct DerivedSigner {
    pub account: LocalNativeAccount,
    /// Not connected to a provider.
    pub wallet: EthWallet,
}

type Key = (u64, NativeAddress);

struct Cache {
    entries: HashMap<Key, DerivedSigner>,
    /// Least recently used first.
    order: VecDeque<Key>,
}

pub struct SignerDerivation {
    master: Vec<u8>,
    capacity: usize,
    cache: Mutex<Cache>,
}

impl SignerDerivation {
    pub fn new(master: Vec<u8>, capacity: usize) -> Self {
        SignerDerivation {
            master,
            capacity: capacity.max(1),
            cache: Mutex::new(Cache { entries: HashMap::new(), order: VecDeque::new() }),
        }
    }

    pub fn secret(&self, chain_id: u64, space: NativeAddress) -> Result<[u8; 32]> {
        let mut mac = HmacSha256::new_from_slice(&self.master)
            .map_err(|e| SxError::Configuration(format!("invalid master secret: {e}")))?;
        mac.update(DOMAIN);
        mac.update(&chain_id.to_be_bytes());
        mac.update(&space.to_bytes());
        Ok(mac.finalize().into_bytes().into())
    }

    /// Signer for `space` on `chain_id`, from the cache when present.
    pub fn signer(&self, chain_id: u64, space: NativeAddress) -> Result<DerivedSigner> {
        let key = (chain_id, space);
        {
            let mut cache = self.cache.lock();
            if let Some(signer) = cache.entries.get(&key).cloned() {
                cache.order.retain(|k| *k != key);
                cache.order.push_back(key);
                return Ok(signer);
            }
        }

        let secret = self.secret(chain_id, space)?;
        let signer = DerivedSigner {
            account: LocalNativeAccount::from_bytes(&secret)?,
            wallet: EthWallet::from_bytes(&secret)?,
        };
        debug!(chain_id, %space, wallet = %signer.wallet.address(), "derived signer");

        let mut cache = self.cache.lock();
        if cache.entries.insert(key, signer.clone()).is_none() {
            cache.order.push_back(key);
        }
        while cache.entries.len() > self.capacity {
            match cache.order.pop_front() {
                Some(evicted) => {
                    cache.entries.remove(&evicted);
                }
                None => break,
            }
        }
        Ok(signer)
    }

    pub fn cached(&self) -> usize {
        self.cache.lock().entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sx_client::NativeAccount;

    fn derivation(capacity: usize) -> SignerDerivation {
        SignerDerivation::new(vec![7u8; 32], capacity)
    }

    #[test]
    fn test_derivation_is_deterministic_and_scoped() {
        let d = derivation(8);
        let space = NativeAddress::from_u64(0x51);
        let a = d.signer(1, space).unwrap();
        let b = derivation(8).signer(1, space).unwrap();
        assert_eq!(a.account.address(), b.account.address());
        assert_eq!(a.wallet.address(), b.wallet.address());

        let other_chain = d.signer(2, space).unwrap();
        let other_space = d.signer(1, NativeAddress::from_u64(0x52)).unwrap();
        assert_ne!(a.account.address(), other_chain.account.address());
        assert_ne!(a.account.address(), other_space.account.address());
    }

    #[test]
    fn test_cache_is_bounded() {
        let d = derivation(2);
        for i in 0..5 {
            d.signer(1, NativeAddress::from_u64(i)).unwrap();
        }
        assert_eq!(d.cached(), 2);

        // Evicted signers are recomputed, not lost.
        let again = d.signer(1, NativeAddress::from_u64(0)).unwrap();
        assert_eq!(again.wallet.address(), derivation(2).signer(1, NativeAddress::from_u64(0)).unwrap().wallet.address());
    }
}
