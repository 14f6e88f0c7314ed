//! Shared data model for sx governance actions.
//!
//! Everything in this crate is plain data: envelopes exchanged between the client, the relay
//! service and the chain, the execution intents handed to execution strategy encoders, and the
//! record layout of messages relayed from the governance chain to L1.

pub mod address;
pub mod envelope;
pub mod execution;
pub mod message;

pub use address::{AddressError, ChainAddress, NativeAddress};
pub use envelope::{
    ActionKind, ActionPayload, CancelAction, Choice, Envelope, ExecutionStrategyInput,
    ProposeAction, SettingAction, SignatureData, SignedPayload, SpaceSetting, StrategyConfig,
    TypedField, UpdateProposalAction, VoteAction,
};
pub use execution::{ExecutionIntent, MetaTransaction, Operation};
pub use message::{split_limbs, MessageError, RelayedMessage, RelayedProposal, RELAYED_MESSAGE_LEN};
