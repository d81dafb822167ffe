//! Transaction context for OCC
//!
//! This module implements the core transaction data structure for optimistic
//! concurrency control. TransactionContext tracks all reads, writes and
//! deletes for a transaction, enabling validation at commit time.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::time::{Duration, Instant};

use kdb_core::{KdbError, KdbResult, SnapshotView, Storage};

use crate::validation::{validate_transaction, ValidationResult};

/// Error type for commit failures
///
/// - All-or-nothing commit: a transaction either commits or aborts entirely
/// - First-committer-wins: conflicts are detected based on the read set
#[derive(Debug, Clone)]
pub enum CommitError {
    /// Transaction aborted due to validation conflicts
    ValidationFailed(ValidationResult),

    /// Transaction was not in correct state for commit
    ///
    /// Commit requires Active state to transition to Validating
    InvalidState(String),

    /// Validation or application hit a storage failure
    StorageFailure(String),
}

impl std::fmt::Display for CommitError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CommitError::ValidationFailed(result) => {
                write!(f, "Commit failed: {} conflict(s)", result.conflict_count())
            }
            CommitError::InvalidState(msg) => write!(f, "Invalid state: {}", msg),
            CommitError::StorageFailure(msg) => write!(f, "Storage failure: {}", msg),
        }
    }
}

impl std::error::Error for CommitError {}

impl From<CommitError> for KdbError {
    fn from(e: CommitError) -> Self {
        match e {
            CommitError::ValidationFailed(result) => KdbError::TransactionAborted {
                reason: format!("Validation failed: {} conflict(s)", result.conflict_count()),
            },
            CommitError::InvalidState(msg) => KdbError::TransactionNotActive { state: msg },
            CommitError::StorageFailure(msg) => KdbError::storage(msg),
        }
    }
}

/// Result of applying transaction writes to storage
///
/// All keys in a transaction get the same commit version.
#[derive(Debug, Clone)]
pub struct ApplyResult {
    /// Version assigned to all writes in this transaction
    pub commit_version: u64,
    /// Number of puts applied
    pub puts_applied: usize,
    /// Number of deletes applied
    pub deletes_applied: usize,
}

impl ApplyResult {
    /// Total number of operations applied
    pub fn total_operations(&self) -> usize {
        self.puts_applied + self.deletes_applied
    }
}

/// Summary of pending operations that would be discarded on abort
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingOperations {
    /// Number of pending put operations
    pub puts: usize,
    /// Number of pending delete operations
    pub deletes: usize,
}

impl PendingOperations {
    /// Total number of pending operations
    pub fn total(&self) -> usize {
        self.puts + self.deletes
    }

    /// Check if there are no pending operations
    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }
}

/// Status of a transaction in its lifecycle
///
/// State transitions:
/// - `Active` → `Validating` (begin commit)
/// - `Validating` → `Committed` (validation passed)
/// - `Validating` → `Aborted` (conflict detected)
/// - `Active` → `Aborted` (user abort or error)
///
/// `Committed` and `Aborted` are terminal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransactionStatus {
    /// Transaction is executing, can read/write
    Active,
    /// Transaction is being validated for conflicts
    Validating,
    /// Transaction committed successfully
    Committed,
    /// Transaction was aborted
    Aborted {
        /// Human-readable reason for abort
        reason: String,
    },
}

/// Transaction context for OCC with snapshot isolation
///
/// # Read-Your-Writes Semantics
///
/// When reading a key, the transaction checks in order:
/// 1. **write_set**: Returns uncommitted write from this transaction
/// 2. **delete_set**: Returns None for uncommitted delete
/// 3. **snapshot**: Returns value from snapshot, tracks in read_set
///
/// Range scans merge the snapshot with both buffers the same way and record
/// every snapshot key they return.
///
/// # Lifecycle
///
/// 1. **BEGIN**: Create with `with_snapshot()`, status is `Active`
/// 2. **READ/WRITE**: Use `get()`, `scan_range()`, `put()`, `delete()`
/// 3. **VALIDATE/COMMIT**: `commit()` validates the read set
/// 4. **APPLY**: `apply_writes()` publishes the buffers at one version
pub struct TransactionContext {
    /// Unique transaction ID
    pub txn_id: u64,

    /// Version at transaction start (snapshot version)
    pub start_version: u64,

    snapshot: Option<Box<dyn SnapshotView>>,

    /// Keys read and their versions (for validation)
    ///
    /// Version 0 means the key did not exist when read.
    pub read_set: HashMap<Vec<u8>, u64>,

    /// Keys written with their new values (buffered)
    pub write_set: BTreeMap<Vec<u8>, Vec<u8>>,

    /// Keys to delete (buffered)
    pub delete_set: BTreeSet<Vec<u8>>,

    /// Current transaction status
    pub status: TransactionStatus,

    start_time: Instant,
}

impl TransactionContext {
    /// Create a transaction without a snapshot
    ///
    /// Reads fail until a snapshot is attached; used for write-only batches
    /// and tests.
    pub fn new(txn_id: u64, start_version: u64) -> Self {
        TransactionContext {
            txn_id,
            start_version,
            snapshot: None,
            read_set: HashMap::new(),
            write_set: BTreeMap::new(),
            delete_set: BTreeSet::new(),
            status: TransactionStatus::Active,
            start_time: Instant::now(),
        }
    }

    /// Create a transaction reading from `snapshot`
    pub fn with_snapshot(txn_id: u64, snapshot: Box<dyn SnapshotView>) -> Self {
        let mut txn = Self::new(txn_id, snapshot.version());
        txn.snapshot = Some(snapshot);
        txn
    }

    // === Read Operations ===

    /// Get a value with read-your-writes semantics
    pub fn get(&mut self, key: &[u8]) -> KdbResult<Option<Vec<u8>>> {
        self.ensure_active()?;

        if let Some(value) = self.write_set.get(key) {
            return Ok(Some(value.clone()));
        }
        if self.delete_set.contains(key) {
            return Ok(None);
        }

        let versioned = self.snapshot()?.get(key)?;
        match versioned {
            Some(vv) => {
                self.read_set.insert(key.to_vec(), vv.version);
                Ok(Some(vv.value))
            }
            None => {
                // If someone creates this key before we commit, we conflict
                self.read_set.insert(key.to_vec(), 0);
                Ok(None)
            }
        }
    }

    /// True when `get` would return a value
    pub fn exists(&mut self, key: &[u8]) -> KdbResult<bool> {
        Ok(self.get(key)?.is_some())
    }

    /// Scan `[start, end)` merging the snapshot with this transaction's buffers
    ///
    /// Entries come back ascending, or descending when `reverse` is set.
    /// Every snapshot key returned is tracked in the read set.
    pub fn scan_range(
        &mut self,
        start: &[u8],
        end: Option<&[u8]>,
        reverse: bool,
    ) -> KdbResult<Vec<(Vec<u8>, Vec<u8>)>> {
        self.ensure_active()?;

        let snapshot_results = self.snapshot()?.scan_range(start, end, false)?;
        let mut results: BTreeMap<Vec<u8>, Vec<u8>> = BTreeMap::new();

        for (key, vv) in snapshot_results {
            if !self.delete_set.contains(&key) {
                self.read_set.insert(key.clone(), vv.version);
                results.insert(key, vv.value);
            }
        }

        let in_range = |key: &[u8]| key >= start && end.map_or(true, |e| key < e);
        for (key, value) in &self.write_set {
            if in_range(key.as_slice()) {
                results.insert(key.clone(), value.clone());
            }
        }

        if reverse {
            Ok(results.into_iter().rev().collect())
        } else {
            Ok(results.into_iter().collect())
        }
    }

    /// Approximate byte size of a range as of the snapshot
    ///
    /// Buffered writes are not included and nothing is recorded in the read set.
    pub fn size_of_range(&self, start: &[u8], end: Option<&[u8]>) -> KdbResult<u64> {
        self.ensure_active()?;
        self.snapshot()?.size_of_range(start, end)
    }

    /// Version recorded for `key` in the read set, if it was read
    pub fn get_read_version(&self, key: &[u8]) -> Option<u64> {
        self.read_set.get(key).copied()
    }

    fn snapshot(&self) -> KdbResult<&dyn SnapshotView> {
        self.snapshot
            .as_deref()
            .ok_or_else(|| KdbError::internal(format!("Transaction {} has no snapshot for reads", self.txn_id)))
    }

    // === Write Operations ===

    /// Buffer a write
    pub fn put(&mut self, key: Vec<u8>, value: Vec<u8>) -> KdbResult<()> {
        self.ensure_active()?;
        self.delete_set.remove(&key);
        self.write_set.insert(key, value);
        Ok(())
    }

    /// Buffer a delete
    pub fn delete(&mut self, key: Vec<u8>) -> KdbResult<()> {
        self.ensure_active()?;
        self.write_set.remove(&key);
        self.delete_set.insert(key);
        Ok(())
    }

    // === State Management ===

    /// Check if transaction is in Active state
    pub fn is_active(&self) -> bool {
        matches!(self.status, TransactionStatus::Active)
    }

    /// Check if transaction is in Committed state
    pub fn is_committed(&self) -> bool {
        matches!(self.status, TransactionStatus::Committed)
    }

    /// Check if transaction is in Aborted state
    pub fn is_aborted(&self) -> bool {
        matches!(self.status, TransactionStatus::Aborted { .. })
    }

    /// Check if the transaction can still be rolled back
    pub fn can_rollback(&self) -> bool {
        matches!(
            self.status,
            TransactionStatus::Active | TransactionStatus::Validating
        )
    }

    /// Check if transaction has exceeded the given timeout
    pub fn is_expired(&self, timeout: Duration) -> bool {
        self.start_time.elapsed() > timeout
    }

    /// Time since the transaction began
    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Ensure transaction is in Active state
    pub fn ensure_active(&self) -> KdbResult<()> {
        if self.is_active() {
            Ok(())
        } else {
            Err(KdbError::TransactionNotActive {
                state: format!("transaction {} is {:?}", self.txn_id, self.status),
            })
        }
    }

    /// Transition from Active to Validating
    pub fn mark_validating(&mut self) -> KdbResult<()> {
        self.ensure_active()?;
        self.status = TransactionStatus::Validating;
        Ok(())
    }

    /// Transition from Validating to Committed
    pub fn mark_committed(&mut self) -> KdbResult<()> {
        match &self.status {
            TransactionStatus::Validating => {
                self.status = TransactionStatus::Committed;
                Ok(())
            }
            _ => Err(KdbError::TransactionNotActive {
                state: format!(
                    "cannot commit transaction {} from state {:?}",
                    self.txn_id, self.status
                ),
            }),
        }
    }

    /// Transition to Aborted, discarding buffered writes
    pub fn mark_aborted(&mut self, reason: String) -> KdbResult<()> {
        match &self.status {
            TransactionStatus::Committed => Err(KdbError::TransactionNotActive {
                state: format!("cannot abort committed transaction {}", self.txn_id),
            }),
            TransactionStatus::Aborted { .. } => Err(KdbError::TransactionNotActive {
                state: format!("transaction {} already aborted", self.txn_id),
            }),
            _ => {
                self.status = TransactionStatus::Aborted { reason };
                // Aborted transactions write nothing; read_set is kept for diagnostics
                self.write_set.clear();
                self.delete_set.clear();
                Ok(())
            }
        }
    }

    /// Summary of the buffered operations
    pub fn pending_operations(&self) -> PendingOperations {
        PendingOperations {
            puts: self.write_set.len(),
            deletes: self.delete_set.len(),
        }
    }

    // === Commit Operation ===

    /// Validate against `store` and mark the transaction committed
    ///
    /// Does not apply writes; the caller allocates a version and calls
    /// [`TransactionContext::apply_writes`] while still holding its commit lock.
    pub fn commit<S: Storage + ?Sized>(&mut self, store: &S) -> Result<(), CommitError> {
        if !self.is_active() {
            return Err(CommitError::InvalidState(format!(
                "Cannot commit transaction {} from {:?} state - must be Active",
                self.txn_id, self.status
            )));
        }
        self.status = TransactionStatus::Validating;

        let validation_result = match validate_transaction(self, store) {
            Ok(result) => result,
            Err(e) => {
                self.status = TransactionStatus::Aborted {
                    reason: format!("Validation error: {}", e),
                };
                return Err(CommitError::StorageFailure(e.to_string()));
            }
        };

        if !validation_result.is_valid() {
            let conflict_count = validation_result.conflict_count();
            self.status = TransactionStatus::Aborted {
                reason: format!("Commit failed: {} conflict(s) detected", conflict_count),
            };
            return Err(CommitError::ValidationFailed(validation_result));
        }

        self.status = TransactionStatus::Committed;
        Ok(())
    }

    /// Apply the buffered writes and deletes atomically at `commit_version`
    pub fn apply_writes<S: Storage + ?Sized>(&self, store: &S, commit_version: u64) -> KdbResult<ApplyResult> {
        if !self.is_committed() {
            return Err(KdbError::TransactionNotActive {
                state: format!(
                    "cannot apply writes: transaction {} is {:?}, must be Committed",
                    self.txn_id, self.status
                ),
            });
        }

        let writes: Vec<(Vec<u8>, Vec<u8>)> = self
            .write_set
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        let deletes: Vec<Vec<u8>> = self.delete_set.iter().cloned().collect();
        store.apply_batch(&writes, &deletes, commit_version)?;

        Ok(ApplyResult {
            commit_version,
            puts_applied: writes.len(),
            deletes_applied: deletes.len(),
        })
    }

    // === Introspection ===

    /// Number of keys in the read set
    pub fn read_count(&self) -> usize {
        self.read_set.len()
    }

    /// Number of buffered writes
    pub fn write_count(&self) -> usize {
        self.write_set.len()
    }

    /// Number of buffered deletes
    pub fn delete_count(&self) -> usize {
        self.delete_set.len()
    }

    /// True if nothing has been written or deleted
    pub fn is_read_only(&self) -> bool {
        self.write_set.is_empty() && self.delete_set.is_empty()
    }

    /// Reason for abort, if aborted
    pub fn abort_reason(&self) -> Option<&str> {
        match &self.status {
            TransactionStatus::Aborted { reason } => Some(reason),
            _ => None,
        }
    }
}

impl std::fmt::Debug for TransactionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransactionContext")
            .field("txn_id", &self.txn_id)
            .field("start_version", &self.start_version)
            .field("status", &self.status)
            .field("reads", &self.read_set.len())
            .field("writes", &self.write_set.len())
            .field("deletes", &self.delete_set.len())
            .finish()
    }
}
