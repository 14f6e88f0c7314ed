use std::sync::Arc;

use alloy_primitives::U256;
use sx_types::{ActionPayload, ChainAddress, Envelope, NativeAddress, SignatureData, SignedPayload};
use tracing::info;

use super::{action_body, expect_authenticator, SaltSource};
use crate::errors::Result;
use crate::network::{AuthenticatorKind, NetworkConfig};
use crate::signer::NativeAccount;
use crate::strategies::StrategyRegistry;
use crate::typed_data::{digest, SigningDomain, TypedMessage};

/// Typed-data signatures from governance chain accounts.
///
/// The domain is bound to the authenticator contract and the digest to the signing account.
pub struct NativeSigAuthenticator {
    network: Arc<NetworkConfig>,
    strategies: StrategyRegistry,
    salt: SaltSource,
}

impl NativeSigAuthenticator {
    pub fn new(network: Arc<NetworkConfig>) -> Self {
        NativeSigAuthenticator { network, strategies: StrategyRegistry::default(), salt: SaltSource::Random }
    }

    pub fn with_strategies(mut self, strategies: StrategyRegistry) -> Self {
        self.strategies = strategies;
        self
    }

    pub fn with_salt(mut self, salt: SaltSource) -> Self {
        self.salt = salt;
        self
    }

    pub fn domain(&self, authenticator: NativeAddress) -> SigningDomain {
        SigningDomain::Native { chain_id: self.network.chain_id, verifying_contract: authenticator }
    }

    pub async fn sign(&self, account: &dyn NativeAccount, action: ActionPayload) -> Result<Envelope> {
        let authenticator = expect_authenticator(&self.network, &action, AuthenticatorKind::NativeSig)?;
        let author = ChainAddress::Native(account.address());
        let body = action_body(&self.network, &self.strategies, author, &action).await?;
        let salt = if body.has_salt() { self.salt.next() } else { U256::ZERO };

        let domain = self.domain(authenticator);
        let message = TypedMessage { authenticator, space: action.space(), author, body: &body, salt };
        let signature = account.sign_hash(digest(&domain, &message)?).await?;
        info!(space = %action.space(), %author, action = %action.kind(), "signed native envelope");

        let signature_data = SignatureData {
            address: author,
            types: domain.types(&body),
            signed: Some(SignedPayload { signature, salt }),
        };
        Ok(Envelope::new(signature_data, action))
    }
}
