use std::sync::Arc;

use dashmap::DashMap;
use sx_types::NativeAddress;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// One in-flight submission per signer account.
///
/// An account's entry lives only while someone holds or waits for its lock.
#[derive(Default)]
pub struct SignerLocks {
    locks: DashMap<NativeAddress, Arc<Mutex<()>>>,
}

/// Held for the duration of one submission.
pub struct SignerGuard<'a> {
    guard: Option<OwnedMutexGuard<()>>,
    locks: &'a SignerLocks,
    account: NativeAddress,
}

impl Drop for SignerGuard<'_> {
    fn drop(&mut self) {
        // Unlock first so our own guard no longer counts as a holder.
        drop(self.guard.take());
        self.locks.locks.remove_if(&self.account, |_, lock| Arc::strong_count(lock) == 1);
    }
}

impl SignerLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Waits for the account's previous submission to finish.
    pub async fn acquire(&self, account: NativeAddress) -> SignerGuard<'_> {
        // Clone out of the map so the shard lock is not held across the await.
        let lock = self.locks.entry(account).or_default().clone();
        let guard = lock.lock_owned().await;
        SignerGuard { guard: Some(guard), locks: self, account }
    }

    /// Accounts currently holding or waiting for a lock.
    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}
