use std::sync::Arc;

use alloy_primitives::U256;
use sx_types::{ActionPayload, ChainAddress, Envelope, SignatureData, SignedPayload};
use tracing::info;

use super::{action_body, expect_authenticator, SaltSource};
use crate::errors::Result;
use crate::network::{AuthenticatorKind, NetworkConfig};
use crate::signer::TypedDataSigner;
use crate::strategies::StrategyRegistry;
use crate::typed_data::{digest, SigningDomain, TypedMessage};

/// EIP-712 signatures from ethereum accounts.
pub struct EthSigAuthenticator {
    network: Arc<NetworkConfig>,
    strategies: StrategyRegistry,
    salt: SaltSource,
}

impl EthSigAuthenticator {
    pub fn new(network: Arc<NetworkConfig>) -> Self {
        EthSigAuthenticator { network, strategies: StrategyRegistry::default(), salt: SaltSource::Random }
    }

    pub fn with_strategies(mut self, strategies: StrategyRegistry) -> Self {
        self.strategies = strategies;
        self
    }

    pub fn with_salt(mut self, salt: SaltSource) -> Self {
        self.salt = salt;
        self
    }

    pub fn domain(&self) -> SigningDomain {
        SigningDomain::Ethereum { chain_id: self.network.eip712_chain_id }
    }

    /// Sign `action` and wrap it in a portable envelope.
    pub async fn sign(&self, signer: &dyn TypedDataSigner, action: ActionPayload) -> Result<Envelope> {
        let authenticator = expect_authenticator(&self.network, &action, AuthenticatorKind::EthSig)?;
        let author = ChainAddress::Ethereum(signer.address());
        let body = action_body(&self.network, &self.strategies, author, &action).await?;
        let salt = if body.has_salt() { self.salt.next() } else { U256::ZERO };

        let domain = self.domain();
        let message = TypedMessage { authenticator, space: action.space(), author, body: &body, salt };
        let signature = signer.sign_digest(digest(&domain, &message)?).await?;
        info!(space = %action.space(), %author, action = %action.kind(), "signed eip-712 envelope");

        let signature_data = SignatureData {
            address: author,
            types: domain.types(&body),
            signed: Some(SignedPayload { signature: signature.to_words(), salt }),
        };
        Ok(Envelope::new(signature_data, action))
    }
}
