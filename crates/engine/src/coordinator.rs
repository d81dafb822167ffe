//! Transaction coordinator for managing transaction lifecycle
//!
//! The TransactionCoordinator wraps TransactionManager and adds:
//! - Active transaction tracking
//! - Transaction metrics (started, committed, aborted)
//! - Commit rate calculation

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use kdb_concurrency::{TransactionContext, TransactionManager};
use kdb_core::{KdbError, KdbResult, SnapshotView, Storage};
use kdb_storage::UnifiedStore;
use tracing::{debug, warn};

/// Transaction coordinator for the database
///
/// Owns id and version allocation through the manager, and keeps
/// observational counters. The counters use Relaxed ordering: they
/// synchronize nothing and approximate values are fine for metrics.
pub struct TransactionCoordinator {
    manager: TransactionManager,
    active_count: AtomicU64,
    total_started: AtomicU64,
    total_committed: AtomicU64,
    total_aborted: AtomicU64,
}

impl TransactionCoordinator {
    /// Create a coordinator whose commit versions continue after `initial_version`
    pub fn new(initial_version: u64) -> Self {
        Self {
            manager: TransactionManager::new(initial_version),
            active_count: AtomicU64::new(0),
            total_started: AtomicU64::new(0),
            total_committed: AtomicU64::new(0),
            total_aborted: AtomicU64::new(0),
        }
    }

    /// Start a new transaction over a snapshot of `storage`
    ///
    /// Increments active count and total started metrics.
    pub fn start_transaction(&self, storage: &UnifiedStore) -> TransactionContext {
        let txn_id = self.manager.next_txn_id();
        let snapshot = storage.create_snapshot();
        self.record_start();

        debug!(target: "kdb::txn", txn_id, start_version = snapshot.version(), "Transaction started");

        TransactionContext::with_snapshot(txn_id, Box::new(snapshot))
    }

    /// Allocate commit version
    pub fn allocate_commit_version(&self) -> u64 {
        self.manager.allocate_version()
    }

    /// Commit a transaction through the concurrency layer
    ///
    /// Records commit/abort metrics and converts `CommitError` into
    /// `KdbError` (conflicts become `TransactionAborted`).
    pub fn commit<S: Storage + ?Sized>(&self, txn: &mut TransactionContext, store: &S) -> KdbResult<u64> {
        match self.manager.commit(txn, store) {
            Ok(version) => {
                self.record_commit();
                debug!(
                    target: "kdb::txn",
                    txn_id = txn.txn_id,
                    commit_version = version,
                    writes = txn.write_count(),
                    deletes = txn.delete_count(),
                    "Transaction committed"
                );
                Ok(version)
            }
            Err(e) => {
                self.record_abort();
                warn!(target: "kdb::txn", txn_id = txn.txn_id, error = %e, "Transaction aborted");
                Err(KdbError::from(e))
            }
        }
    }

    /// Record transaction start
    pub fn record_start(&self) {
        self.active_count.fetch_add(1, Ordering::Relaxed);
        self.total_started.fetch_add(1, Ordering::Relaxed);
    }

    /// Record transaction commit
    ///
    /// Decrements active count (saturating at 0) and increments committed count.
    pub fn record_commit(&self) {
        let _ = self
            .active_count
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |x| {
                Some(x.saturating_sub(1))
            });
        self.total_committed.fetch_add(1, Ordering::Relaxed);
    }

    /// Record transaction abort
    pub fn record_abort(&self) {
        let _ = self
            .active_count
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |x| {
                Some(x.saturating_sub(1))
            });
        self.total_aborted.fetch_add(1, Ordering::Relaxed);
    }

    /// Get current global version
    pub fn current_version(&self) -> u64 {
        self.manager.current_version()
    }

    /// Get next transaction ID
    pub fn next_txn_id(&self) -> u64 {
        self.manager.next_txn_id()
    }

    /// Snapshot of transaction statistics
    pub fn metrics(&self) -> TransactionMetrics {
        let started = self.total_started.load(Ordering::Relaxed);
        let committed = self.total_committed.load(Ordering::Relaxed);

        TransactionMetrics {
            active_count: self.active_count.load(Ordering::Relaxed),
            total_started: started,
            total_committed: committed,
            total_aborted: self.total_aborted.load(Ordering::Relaxed),
            commit_rate: if started > 0 {
                committed as f64 / started as f64
            } else {
                0.0
            },
        }
    }

    /// Get current active transaction count
    pub fn active_count(&self) -> u64 {
        self.active_count.load(Ordering::SeqCst)
    }

    /// Wait for all active transactions to complete
    ///
    /// Returns `false` if `timeout` expired with transactions still active.
    pub fn wait_for_idle(&self, timeout: Duration) -> bool {
        let start = Instant::now();
        let sleep_duration = Duration::from_millis(1);

        while self.active_count.load(Ordering::SeqCst) > 0 {
            if start.elapsed() > timeout {
                return false;
            }
            std::thread::sleep(sleep_duration);
        }
        true
    }
}

/// Transaction metrics
#[derive(Debug, Clone)]
pub struct TransactionMetrics {
    /// Number of currently active transactions
    pub active_count: u64,
    /// Total number of transactions started
    pub total_started: u64,
    /// Total number of transactions committed
    pub total_committed: u64,
    /// Total number of transactions aborted
    pub total_aborted: u64,
    /// Commit success rate (committed / started)
    pub commit_rate: f64,
}

impl TransactionMetrics {
    /// Total transactions that completed (committed + aborted)
    pub fn total_completed(&self) -> u64 {
        self.total_committed + self.total_aborted
    }

    /// Abort rate (aborted / started)
    pub fn abort_rate(&self) -> f64 {
        if self.total_started > 0 {
            self.total_aborted as f64 / self.total_started as f64
        } else {
            0.0
        }
    }
}
