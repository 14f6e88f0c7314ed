//! Chain access seams.
//!
//! `NativeProvider` talks to the governance chain, `EvmProvider` to L1. Both are implemented by
//! the in-process devnet and, for L1, by the ethers-backed transport.
//!
//! Only read-only calls go through `with_read_retry`. Submissions are attempted exactly once.

use std::future::Future;
use std::time::Duration;

use alloy_primitives::{Address, Bytes, B256, U256};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sx_types::NativeAddress;
use tracing::warn;

use crate::calldata::NativeCall;
use crate::errors::Result;
use crate::signer::{EthWallet, NativeAccount};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Receipt {
    pub transaction_hash: B256,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EvmTransaction {
    pub to: Address,
    pub data: Bytes,
    pub value: U256,
}

impl EvmTransaction {
    pub fn call(to: Address, data: impl Into<Bytes>) -> Self {
        EvmTransaction { to, data: data.into(), value: U256::ZERO }
    }
}

#[async_trait]
pub trait NativeProvider: Send + Sync {
    async fn chain_id(&self) -> Result<u64>;

    /// Submit a transaction from `account`.
    async fn invoke(&self, account: &dyn NativeAccount, call: NativeCall) -> Result<Receipt>;

    /// Read-only call.
    async fn call(&self, call: NativeCall) -> Result<Vec<U256>>;

    /// Payloads of messages sent from `from` to the L1 contract `to` that the messaging layer
    /// has propagated so far.
    async fn messages_to_l1(&self, from: NativeAddress, to: Address) -> Result<Vec<Vec<U256>>>;
}

#[async_trait]
pub trait EvmProvider: Send + Sync {
    async fn chain_id(&self) -> Result<u64>;

    /// Sign `tx` with `wallet` and submit it.
    async fn send_transaction(&self, wallet: &EthWallet, tx: EvmTransaction) -> Result<Receipt>;

    /// Read-only call.
    async fn call(&self, tx: EvmTransaction) -> Result<Bytes>;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            max_attempts: 4,
            initial_backoff: Duration::from_millis(200),
            max_backoff: Duration::from_secs(2),
        }
    }
}

/// Run a read-only operation, retrying transport failures with exponential backoff.
pub async fn with_read_retry<T, F, Fut>(policy: RetryPolicy, what: &str, mut op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut backoff = policy.initial_backoff;
    let mut attempt = 1;
    loop {
        match op().await {
            Err(err) if err.is_retryable() && attempt < policy.max_attempts => {
                warn!(what, attempt, error = %err, "read failed, retrying");
                tokio::time::sleep(backoff).await;
                backoff = (backoff * 2).min(policy.max_backoff);
                attempt += 1;
            }
            other => return other,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;
    use crate::errors::SxError;

    fn fast() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(1),
            max_backoff: Duration::from_millis(2),
        }
    }

    #[tokio::test]
    async fn test_transport_errors_are_retried() {
        let calls = AtomicU32::new(0);
        let out = with_read_retry(fast(), "test", || async {
            if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                Err(SxError::Transport("connection reset".to_string()))
            } else {
                Ok(7u64)
            }
        })
        .await
        .unwrap();
        assert_eq!(out, 7);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_attempts_are_bounded() {
        let calls = AtomicU32::new(0);
        let out: Result<()> = with_read_retry(fast(), "test", || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(SxError::Transport("timeout".to_string()))
        })
        .await;
        assert!(matches!(out, Err(SxError::Transport(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_reverts_are_not_retried() {
        let calls = AtomicU32::new(0);
        let out: Result<()> = with_read_retry(fast(), "test", || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(SxError::reverted("nope"))
        })
        .await;
        assert!(matches!(out, Err(SxError::ExecutionReverted { .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
