//! Authenticator strategies.
//!
//! Purpose: turn a raw action into something the matching on-chain authenticator accepts.
//!
//! - Message-signature variants (`EthSigAuthenticator`, `NativeSigAuthenticator`) sign typed
//!   data and return a portable envelope that anyone can submit.
//! - Transaction-commit variants (`EthTxAuthenticator`, `NativeTxAuthenticator`) send a
//!   commitment from the signer's own account first; the returned envelope only names the
//!   signer and is accepted because the authenticator finds the commitment.
//!
//! A later commitment for the same (signer, space, proposal) replaces the earlier one on-chain.
//! Nothing is tracked client-side.

pub mod eth_sig;
pub mod eth_tx;
pub mod native_sig;
pub mod native_tx;

use alloy_primitives::U256;
use rand::Rng;
use sx_types::{ActionPayload, ChainAddress, Envelope, NativeAddress, SignatureData};

use crate::calldata::ActionBody;
use crate::errors::{Result, SxError};
use crate::network::{AuthenticatorKind, NetworkConfig};
use crate::provider::Receipt;
use crate::strategies::{StrategyCall, StrategyRegistry};

pub use eth_sig::EthSigAuthenticator;
pub use eth_tx::EthTxAuthenticator;
pub use native_sig::NativeSigAuthenticator;
pub use native_tx::NativeTxAuthenticator;

/// Salt embedded in signed payloads.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SaltSource {
    /// Fresh 248-bit salt per call.
    #[default]
    Random,
    /// Fixed salt, for reproducible fixtures.
    Pinned(U256),
}

impl SaltSource {
    pub fn next(&self) -> U256 {
        match self {
            SaltSource::Random => {
                let mut bytes = [0u8; 32];
                rand::thread_rng().fill(&mut bytes[1..]);
                U256::from_be_bytes(bytes)
            }
            SaltSource::Pinned(salt) => *salt,
        }
    }
}

/// Output of the first step of a transaction-commit flow.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Committed {
    pub receipt: Receipt,
    /// Envelope for the second step; names the committer only.
    pub envelope: Envelope,
}

/// Author-independent call body of an authenticated action.
pub async fn action_body(
    network: &NetworkConfig,
    strategies: &StrategyRegistry,
    author: ChainAddress,
    action: &ActionPayload,
) -> Result<ActionBody> {
    match action {
        ActionPayload::Propose(a) => {
            let params = strategies
                .indexed_params(network, StrategyCall::Propose, author, &a.strategies)
                .await?;
            Ok(ActionBody::propose(a, &params))
        }
        ActionPayload::Vote(a) => {
            let params = strategies
                .indexed_params(network, StrategyCall::Vote, author, &a.strategies)
                .await?;
            Ok(ActionBody::vote(a, params))
        }
        ActionPayload::UpdateProposal(a) => Ok(ActionBody::update_proposal(a)),
        ActionPayload::Cancel(_) | ActionPayload::AdminSetting(_) => Err(SxError::Configuration(
            format!("{} is sent by the space owner, not through an authenticator", action.kind()),
        )),
    }
}

/// The action's authenticator, checked to be of `kind` on this network.
pub(crate) fn expect_authenticator(
    network: &NetworkConfig,
    action: &ActionPayload,
    kind: AuthenticatorKind,
) -> Result<NativeAddress> {
    let authenticator = action.authenticator().ok_or_else(|| {
        SxError::Configuration(format!("{} does not go through an authenticator", action.kind()))
    })?;
    let configured = network.authenticator_kind(authenticator)?;
    if configured != kind {
        return Err(SxError::Configuration(format!(
            "authenticator {authenticator} is {configured}, not {kind}"
        )));
    }
    Ok(authenticator)
}

/// Envelope accepted by the vanilla authenticator.
pub fn vanilla_envelope(author: ChainAddress, action: ActionPayload) -> Envelope {
    Envelope::new(SignatureData::address_only(author), action)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pinned_salt_is_stable() {
        let salt = SaltSource::Pinned(U256::ZERO);
        assert_eq!(salt.next(), U256::ZERO);
        assert_eq!(salt.next(), salt.next());
    }

    #[test]
    fn test_random_salt_varies() {
        let a = SaltSource::Random.next();
        let b = SaltSource::Random.next();
        assert_ne!(a, b);
        assert!(a < (U256::from(1u8) << 248usize));
    }
}
