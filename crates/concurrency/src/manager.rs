//! Transaction manager for coordinating commit operations
//!
//! Provides atomic commit by orchestrating validation (first-committer-wins)
//! and storage application (visibility).
//!
//! ## Commit Sequence
//!
//! ```text
//! 1. Acquire the commit lock
//! 2. txn.commit()          - Active -> Validating -> Committed | Aborted
//! 3. IF conflicts: return ValidationFailed
//! 4. allocate_version()    - next global commit version
//! 5. apply_writes()        - publish all writes at that version in one batch
//! 6. Release the commit lock, return the commit version
//! ```
//!
//! Validation and application run under the same lock, so no other commit can
//! slip in between a successful check and the writes it guarded.

use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use tracing::error;

use kdb_core::{KdbResult, Storage};

use crate::{CommitError, TransactionContext, TransactionStatus};

/// Manages transaction ids, commit versions and the commit critical section
pub struct TransactionManager {
    /// Highest allocated commit version
    version: AtomicU64,

    /// Next transaction ID to hand out
    next_txn_id: AtomicU64,

    commit_lock: Mutex<()>,
}

impl TransactionManager {
    /// Create a manager whose versions continue after `initial_version`
    pub fn new(initial_version: u64) -> Self {
        Self::with_txn_id(initial_version, 0)
    }

    /// Create a manager that also continues transaction ids after `max_txn_id`
    pub fn with_txn_id(initial_version: u64, max_txn_id: u64) -> Self {
        TransactionManager {
            version: AtomicU64::new(initial_version),
            next_txn_id: AtomicU64::new(max_txn_id + 1),
            commit_lock: Mutex::new(()),
        }
    }

    /// Highest allocated commit version
    pub fn current_version(&self) -> u64 {
        self.version.load(Ordering::SeqCst)
    }

    /// Allocate a transaction id
    pub fn next_txn_id(&self) -> u64 {
        self.next_txn_id.fetch_add(1, Ordering::SeqCst)
    }

    /// Allocate the next commit version
    pub fn allocate_version(&self) -> u64 {
        self.version.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Validate and apply a transaction, returning its commit version
    ///
    /// Read-only transactions commit without allocating a version; the
    /// returned version is the one they read at.
    pub fn commit<S: Storage + ?Sized>(
        &self,
        txn: &mut TransactionContext,
        store: &S,
    ) -> Result<u64, CommitError> {
        let _guard = self.commit_lock.lock();

        txn.commit(store)?;

        if txn.is_read_only() {
            return Ok(txn.start_version);
        }

        let commit_version = self.allocate_version();
        if let Err(e) = txn.apply_writes(store, commit_version) {
            error!(
                target: "kdb::txn",
                txn_id = txn.txn_id,
                commit_version,
                error = %e,
                "Storage application failed after validation"
            );
            txn.status = TransactionStatus::Aborted {
                reason: format!("Apply failed: {}", e),
            };
            return Err(CommitError::StorageFailure(e.to_string()));
        }

        Ok(commit_version)
    }

    /// Abort a transaction, discarding its buffered writes
    pub fn abort(&self, txn: &mut TransactionContext, reason: String) -> KdbResult<()> {
        txn.mark_aborted(reason)
    }

    /// Commit, making sure the transaction ends up Aborted on any failure
    pub fn commit_or_rollback<S: Storage + ?Sized>(
        &self,
        txn: &mut TransactionContext,
        store: &S,
    ) -> Result<u64, CommitError> {
        match self.commit(txn, store) {
            Ok(version) => Ok(version),
            Err(e) => {
                if txn.can_rollback() {
                    let _ = txn.mark_aborted(format!("Commit failed: {}", e));
                }
                Err(e)
            }
        }
    }
}

impl Default for TransactionManager {
    fn default() -> Self {
        Self::new(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kdb_storage::UnifiedStore;

    fn setup_test_env() -> (TransactionManager, UnifiedStore) {
        let store = UnifiedStore::new();
        let manager = TransactionManager::new(store.current_version());
        (manager, store)
    }

    fn begin(store: &UnifiedStore, manager: &TransactionManager) -> TransactionContext {
        TransactionContext::with_snapshot(manager.next_txn_id(), Box::new(store.create_snapshot()))
    }

    #[test]
    fn test_new_manager() {
        let manager = TransactionManager::new(100);
        assert_eq!(manager.current_version(), 100);
        assert_eq!(TransactionManager::default().current_version(), 0);
    }

    #[test]
    fn test_next_txn_id() {
        let manager = TransactionManager::new(0);
        assert_eq!(manager.next_txn_id(), 1);
        assert_eq!(manager.next_txn_id(), 2);
        let resumed = TransactionManager::with_txn_id(0, 41);
        assert_eq!(resumed.next_txn_id(), 42);
    }

    #[test]
    fn test_allocate_version() {
        let manager = TransactionManager::new(10);
        assert_eq!(manager.allocate_version(), 11);
        assert_eq!(manager.allocate_version(), 12);
        assert_eq!(manager.current_version(), 12);
    }

    #[test]
    fn test_atomic_commit_success() {
        let (manager, store) = setup_test_env();
        let mut txn = begin(&store, &manager);
        txn.put(b"key".to_vec(), b"42".to_vec()).unwrap();

        let commit_version = manager.commit(&mut txn, &store).unwrap();

        assert_eq!(txn.status, TransactionStatus::Committed);
        let stored = store.get(b"key").unwrap().unwrap();
        assert_eq!(stored.value, b"42".to_vec());
        assert_eq!(stored.version, commit_version);
        assert_eq!(store.current_version(), commit_version);
    }

    #[test]
    fn test_read_only_commit_allocates_nothing() {
        let (manager, store) = setup_test_env();
        let mut txn = begin(&store, &manager);
        txn.get(b"anything").unwrap();

        assert_eq!(manager.commit(&mut txn, &store).unwrap(), 0);
        assert_eq!(manager.current_version(), 0);
    }

    #[test]
    fn test_first_committer_wins() {
        let (manager, store) = setup_test_env();
        let mut seed = begin(&store, &manager);
        seed.put(b"counter".to_vec(), b"0".to_vec()).unwrap();
        manager.commit(&mut seed, &store).unwrap();

        let mut t1 = begin(&store, &manager);
        let mut t2 = begin(&store, &manager);
        t1.get(b"counter").unwrap();
        t2.get(b"counter").unwrap();
        t1.put(b"counter".to_vec(), b"1".to_vec()).unwrap();
        t2.put(b"counter".to_vec(), b"2".to_vec()).unwrap();

        assert!(manager.commit(&mut t1, &store).is_ok());
        let err = manager.commit(&mut t2, &store).unwrap_err();
        assert!(matches!(err, CommitError::ValidationFailed(_)));
        assert_eq!(store.get(b"counter").unwrap().unwrap().value, b"1".to_vec());
    }

    #[test]
    fn test_abort_discards_writes() {
        let (manager, store) = setup_test_env();
        let mut txn = begin(&store, &manager);
        txn.put(b"k".to_vec(), b"v".to_vec()).unwrap();
        manager.abort(&mut txn, "caller".to_string()).unwrap();

        assert!(manager.commit(&mut txn, &store).is_err());
        assert!(store.get(b"k").unwrap().is_none());
    }

    #[test]
    fn test_commit_or_rollback_leaves_aborted() {
        let (manager, store) = setup_test_env();
        let mut seed = begin(&store, &manager);
        seed.put(b"k".to_vec(), b"0".to_vec()).unwrap();
        manager.commit(&mut seed, &store).unwrap();

        let mut txn = begin(&store, &manager);
        txn.get(b"k").unwrap();
        txn.put(b"k".to_vec(), b"1".to_vec()).unwrap();
        let mut other = begin(&store, &manager);
        other.put(b"k".to_vec(), b"2".to_vec()).unwrap();
        manager.commit(&mut other, &store).unwrap();

        assert!(manager.commit_or_rollback(&mut txn, &store).is_err());
        assert!(txn.is_aborted());
    }
}
