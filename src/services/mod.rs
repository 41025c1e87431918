pub mod delete_service;
pub mod hashing;
pub mod search_service;
pub mod stats_service;
pub mod storage;
pub mod upload_service;

use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

type LockTable = Arc<DashMap<String, Arc<Mutex<()>>>>;

/// Locks shared by the mutating engines. Owner locks serialize the
/// quota check-then-update per user; content locks serialize reference
/// creation against original deletion for one content digest. Acquisition
/// order is always owner before content and owner locks never nest, so
/// the ordering is acyclic.
#[derive(Debug, Clone, Default)]
pub struct VaultLocks {
    owners: LockTable,
    content: LockTable,
}

impl VaultLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serialize mutations of one owner's records and counters.
    pub async fn lock_owner(&self, owner_id: &str) -> VaultLockGuard {
        Self::acquire(&self.owners, owner_id).await
    }

    /// Serialize reference creation against original deletion for one
    /// content digest.
    pub async fn lock_content(&self, content_hash: &str) -> VaultLockGuard {
        Self::acquire(&self.content, content_hash).await
    }

    async fn acquire(table: &LockTable, key: &str) -> VaultLockGuard {
        let slot = table.entry(key.to_string()).or_default().value().clone();

        VaultLockGuard {
            permit: Some(slot.lock_owned().await),
            key: key.to_string(),
            table: table.clone(),
        }
    }
}

/// Held for the duration of one engine operation. Dropping the guard
/// releases the lock and evicts the slot once nothing else holds or
/// awaits it, so the tables track live owners and digests rather than
/// every key ever seen.
pub struct VaultLockGuard {
    permit: Option<OwnedMutexGuard<()>>,
    key: String,
    table: LockTable,
}

impl Drop for VaultLockGuard {
    fn drop(&mut self) {
        drop(self.permit.take());
        // Waiters hold their own clone of the slot; a count of one means
        // the table entry is the last reference left.
        self.table
            .remove_if(&self.key, |_, slot| Arc::strong_count(slot) == 1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_same_key_is_exclusive() {
        let locks = VaultLocks::new();
        let guard = locks.lock_owner("alice").await;

        let contended = locks.lock_owner("alice");
        tokio::pin!(contended);
        assert!(
            tokio::time::timeout(Duration::from_millis(20), contended.as_mut())
                .await
                .is_err()
        );

        drop(guard);
        contended.await;
    }

    #[tokio::test]
    async fn test_distinct_keys_do_not_block() {
        let locks = VaultLocks::new();
        let _alice = locks.lock_owner("alice").await;
        let _bob = locks.lock_owner("bob").await;
        // The owner and content tables are independent even for equal keys
        let _digest = locks.lock_content("alice").await;
    }

    #[tokio::test]
    async fn test_slot_evicted_when_last_guard_drops() {
        let locks = VaultLocks::new();
        let guard = locks.lock_owner("alice").await;
        assert!(locks.owners.contains_key("alice"));

        drop(guard);
        assert!(!locks.owners.contains_key("alice"));
    }
}
