use std::time::Duration;

use alloy_primitives::B256;
use sx_types::{ActionKind, AddressError, MessageError};

pub type Result<T, E = SxError> = std::result::Result<T, E>;

/// Errors surfaced by every public client operation.
#[derive(Debug, thiserror::Error)]
pub enum SxError {
    /// Missing signer, provider or network mapping.
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("unsupported network: chain id {0}")]
    UnsupportedNetwork(u64),

    #[error("unsupported address space: {0}")]
    UnsupportedAddressSpace(String),

    /// Fail-closed gate: the relayed execution hash does not match the intent.
    #[error("execution hash mismatch: message carries {expected}, intent hashes to {actual}")]
    ExecutionHashMismatch { expected: B256, actual: B256 },

    #[error("execution reverted: {reason}")]
    ExecutionReverted { reason: String },

    #[error("transport error: {0}")]
    Transport(String),

    /// The relayed message was not observable before the caller's deadline.
    #[error("relay pending for proposal {proposal_id} after {waited:?}")]
    RelayPending { proposal_id: u64, waited: Duration },

    /// Unmapped (action, authenticator) pair; `authenticator` is `none` for direct calls.
    #[error("no entry point for {action} through {authenticator}")]
    UnsupportedAuthenticator {
        action: ActionKind,
        authenticator: String,
    },

    #[error("invalid message: {0}")]
    InvalidMessage(String),

    #[error("signing failed: {0}")]
    Signing(String),
}

impl SxError {
    pub fn reverted(reason: impl Into<String>) -> Self {
        SxError::ExecutionReverted { reason: reason.into() }
    }

    /// Whether a read-only call failing with this error may be retried.
    pub fn is_retryable(&self) -> bool {
        matches!(self, SxError::Transport(_))
    }
}

impl From<MessageError> for SxError {
    fn from(err: MessageError) -> Self {
        SxError::InvalidMessage(err.to_string())
    }
}

impl From<AddressError> for SxError {
    fn from(err: AddressError) -> Self {
        match err {
            AddressError::NotNative(addr) => SxError::UnsupportedAddressSpace(format!(
                "ethereum address {addr} where a governance chain address is required"
            )),
            other => SxError::Configuration(other.to_string()),
        }
    }
}

impl From<k256::ecdsa::Error> for SxError {
    fn from(err: k256::ecdsa::Error) -> Self {
        SxError::Signing(err.to_string())
    }
}

impl From<alloy_sol_types::Error> for SxError {
    fn from(err: alloy_sol_types::Error) -> Self {
        SxError::InvalidMessage(err.to_string())
    }
}
