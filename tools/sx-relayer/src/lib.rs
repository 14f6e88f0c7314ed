//! Relay service for sx spaces: submits signed envelopes and executions on behalf of users with
//! signers derived per space, over JSON-RPC.

pub mod config;
pub mod derivation;
pub mod locks;
pub mod rpc;
pub mod service;
pub mod sponsor;

pub use derivation::{DerivedSigner, SignerDerivation};
pub use service::{RelayError, RelayService};
pub use sponsor::{SponsorClient, SponsorError};

#[cfg(test)]
mod tests;
