//! Client for sx governance spaces on a governance chain, with cross-chain execution on L1.

pub mod abi;
pub mod authenticators;
pub mod calldata;
pub mod client;
pub mod cross_chain;
pub mod devnet;
pub mod errors;
pub mod executors;
pub mod indexer;
pub mod network;
pub mod provider;
pub mod signer;
pub mod strategies;
pub mod transport;
pub mod typed_data;

pub use client::{EntryPoint, SpaceClient, Submission, Target};
pub use cross_chain::{CrossChainExecution, L1Destination, L1DestinationKind, RelayState};
pub use errors::{Result, SxError};
pub use network::{AuthenticatorKind, ExecutionStrategyType, NetworkConfig, NetworkMap};
pub use provider::{EvmProvider, EvmTransaction, NativeProvider, Receipt, RetryPolicy};
pub use signer::{EthWallet, LocalNativeAccount, NativeAccount};
