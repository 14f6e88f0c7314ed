//! Signing handles.
//!
//! Purpose:
//! - `EthWallet`: an ethereum key, optionally connected to an L1 provider (required for
//!   transaction-commit flows and chain id lookups);
//! - `NativeAccount`: a governance chain account that signs invocations and typed data.
//!
//! Governance chain accounts are counterfactual: the address is derived from the owner key, so
//! any party can verify an account signature without a registry.

use std::fmt;
use std::sync::Arc;

use alloy_primitives::{Address, B256, U256};
use async_trait::async_trait;
use k256::ecdsa::{RecoveryId, Signature, SigningKey, VerifyingKey};
use sx_types::NativeAddress;

use crate::calldata::keccak256_bytes;
use crate::errors::{Result, SxError};
use crate::provider::EvmProvider;

/// Recoverable secp256k1 signature with `v` in {27, 28}.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EcdsaSignature {
    pub r: U256,
    pub s: U256,
    pub v: u8,
}

impl EcdsaSignature {
    /// `[r, s, v]`.
    pub fn to_words(&self) -> Vec<U256> {
        vec![self.r, self.s, U256::from(self.v)]
    }

    pub fn from_words(words: &[U256]) -> Result<Self> {
        match words {
            [r, s, v] if *v == U256::from(27u8) || *v == U256::from(28u8) => Ok(EcdsaSignature {
                r: *r,
                s: *s,
                v: v.as_limbs()[0] as u8,
            }),
            _ => Err(SxError::Signing(format!("malformed signature of {} words", words.len()))),
        }
    }
}

pub fn sign_digest(key: &SigningKey, digest: B256) -> Result<EcdsaSignature> {
    let (signature, recid) = key.sign_prehash_recoverable(digest.as_slice())?;
    let (r, s) = signature.split_bytes();
    Ok(EcdsaSignature {
        r: U256::from_be_slice(r.as_slice()),
        s: U256::from_be_slice(s.as_slice()),
        v: 27 + recid.to_byte(),
    })
}

/// Recover the signing address, like the `ecrecover` precompile.
pub fn recover_signer(digest: B256, signature: &EcdsaSignature) -> Result<Address> {
    let mut raw = [0u8; 64];
    raw[..32].copy_from_slice(&signature.r.to_be_bytes::<32>());
    raw[32..].copy_from_slice(&signature.s.to_be_bytes::<32>());
    let sig = Signature::from_slice(&raw)?;
    let recid = signature
        .v
        .checked_sub(27)
        .and_then(RecoveryId::from_byte)
        .ok_or_else(|| SxError::Signing(format!("invalid recovery byte {}", signature.v)))?;
    let key = VerifyingKey::recover_from_prehash(digest.as_slice(), &sig, recid)?;
    Ok(address_of(&key))
}

pub fn address_of(key: &VerifyingKey) -> Address {
    let point = key.to_encoded_point(false);
    let hash = keccak256_bytes(&point.as_bytes()[1..]);
    Address::from_slice(&hash[12..])
}

/// Address of the governance chain account controlled by `owner`.
pub fn native_account_address(owner: Address) -> NativeAddress {
    let mut buf = Vec::with_capacity(10 + 20);
    buf.extend_from_slice(b"sx-account");
    buf.extend_from_slice(owner.as_slice());
    NativeAddress(U256::from_be_bytes(keccak256_bytes(&buf).0))
}

/// Governance chain account that produced `signature` over `hash`.
pub fn recover_native_account(hash: B256, signature: &[U256]) -> Result<NativeAddress> {
    let signature = EcdsaSignature::from_words(signature)?;
    Ok(native_account_address(recover_signer(hash, &signature)?))
}

/// Signs EIP-712 digests on behalf of an ethereum address.
#[async_trait]
pub trait TypedDataSigner: Send + Sync {
    fn address(&self) -> Address;

    async fn sign_digest(&self, digest: B256) -> Result<EcdsaSignature>;
}

#[derive(Clone)]
pub struct EthWallet {
    key: SigningKey,
    address: Address,
    provider: Option<Arc<dyn EvmProvider>>,
}

impl EthWallet {
    pub fn from_bytes(secret: &[u8]) -> Result<Self> {
        let key = SigningKey::from_slice(secret)?;
        let address = address_of(key.verifying_key());
        Ok(EthWallet { key, address, provider: None })
    }

    pub fn from_hex(secret: &str) -> Result<Self> {
        let raw = hex::decode(secret.trim_start_matches("0x"))
            .map_err(|e| SxError::Configuration(format!("invalid private key: {e}")))?;
        Self::from_bytes(&raw)
    }

    pub fn random() -> Self {
        let key = SigningKey::random(&mut rand::thread_rng());
        let address = address_of(key.verifying_key());
        EthWallet { key, address, provider: None }
    }

    pub fn connect(mut self, provider: Arc<dyn EvmProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn provider(&self) -> Result<&Arc<dyn EvmProvider>> {
        self.provider.as_ref().ok_or_else(|| {
            SxError::Configuration(format!("wallet {} is not connected to a provider", self.address))
        })
    }

    /// Chain id of the connected provider.
    pub async fn chain_id(&self) -> Result<u64> {
        self.provider()?.chain_id().await
    }

    pub fn secret_bytes(&self) -> [u8; 32] {
        let mut out = [0u8; 32];
        out.copy_from_slice(&self.key.to_bytes());
        out
    }
}

impl fmt::Debug for EthWallet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EthWallet")
            .field("address", &self.address)
            .field("connected", &self.provider.is_some())
            .finish()
    }
}

#[async_trait]
impl TypedDataSigner for EthWallet {
    fn address(&self) -> Address {
        self.address
    }

    async fn sign_digest(&self, digest: B256) -> Result<EcdsaSignature> {
        sign_digest(&self.key, digest)
    }
}

/// A governance chain account.
#[async_trait]
pub trait NativeAccount: Send + Sync {
    fn address(&self) -> NativeAddress;

    /// Sign a hash; returns the account's signature words.
    async fn sign_hash(&self, hash: B256) -> Result<Vec<U256>>;
}

#[derive(Clone)]
pub struct LocalNativeAccount {
    key: SigningKey,
    address: NativeAddress,
}

impl LocalNativeAccount {
    pub fn from_key(key: SigningKey) -> Self {
        let address = native_account_address(address_of(key.verifying_key()));
        LocalNativeAccount { key, address }
    }

    pub fn from_bytes(secret: &[u8]) -> Result<Self> {
        Ok(Self::from_key(SigningKey::from_slice(secret)?))
    }

    pub fn random() -> Self {
        Self::from_key(SigningKey::random(&mut rand::thread_rng()))
    }

    /// Ethereum address of the controlling key.
    pub fn owner(&self) -> Address {
        address_of(self.key.verifying_key())
    }
}

impl fmt::Debug for LocalNativeAccount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocalNativeAccount").field("address", &self.address).finish()
    }
}

#[async_trait]
impl NativeAccount for LocalNativeAccount {
    fn address(&self) -> NativeAddress {
        self.address
    }

    async fn sign_hash(&self, hash: B256) -> Result<Vec<U256>> {
        Ok(sign_digest(&self.key, hash)?.to_words())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY: [u8; 32] = [0x42; 32];

    #[test]
    fn test_sign_and_recover() {
        let wallet = EthWallet::from_bytes(&KEY).unwrap();
        let digest = keccak256_bytes(b"digest");
        let sig = sign_digest(&wallet.key, digest).unwrap();
        assert!(sig.v == 27 || sig.v == 28);
        assert_eq!(recover_signer(digest, &sig).unwrap(), wallet.address());

        let other = keccak256_bytes(b"other");
        assert_ne!(recover_signer(other, &sig).ok(), Some(wallet.address()));
    }

    #[test]
    fn test_signature_words() {
        let sig = EcdsaSignature { r: U256::from(1u8), s: U256::from(2u8), v: 28 };
        assert_eq!(EcdsaSignature::from_words(&sig.to_words()).unwrap(), sig);
        assert!(EcdsaSignature::from_words(&[U256::from(1u8), U256::from(2u8), U256::from(1u8)]).is_err());
        assert!(EcdsaSignature::from_words(&[U256::from(1u8)]).is_err());
    }

    #[tokio::test]
    async fn test_wallet_without_provider_has_no_chain_id() {
        let wallet = EthWallet::from_bytes(&KEY).unwrap();
        assert!(matches!(wallet.chain_id().await, Err(SxError::Configuration(_))));
    }

    #[tokio::test]
    async fn test_native_account_signature_recovers_account() {
        let account = LocalNativeAccount::from_bytes(&KEY).unwrap();
        assert_eq!(account.address(), native_account_address(account.owner()));
        let hash = keccak256_bytes(b"invoke");
        let words = account.sign_hash(hash).await.unwrap();
        assert_eq!(recover_native_account(hash, &words).unwrap(), account.address());
    }
}
