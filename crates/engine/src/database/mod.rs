//! Database struct and open/close logic
//!
//! This module provides the main Database struct that orchestrates:
//! - Storage initialization (loading the checkpoint, if any)
//! - Single-instance-per-directory enforcement
//! - Transaction API
//! - Checkpointing and shutdown
//!
//! ## Transaction API
//!
//! The Database provides two ways to execute transactions:
//!
//! 1. **Closure API** (recommended): `db.transaction(|txn| { ... })`
//!    - Automatic commit on success, abort on error
//!    - Returns the closure's return value
//!
//! 2. **Manual API**: `begin_transaction()` + `commit_transaction()`
//!    - For cases requiring external control over commit timing

pub mod config;
mod registry;
mod transactions;

pub use config::{KdbConfig, PersistenceMode, CONFIG_FILE_NAME};
pub use registry::OPEN_DATABASES;
pub use transactions::RetryConfig;

use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use tracing::{debug, info, warn};

use kdb_concurrency::TransactionContext;
use kdb_core::{KdbError, KdbResult, Storage};
use kdb_storage::{read_checkpoint, write_checkpoint, UnifiedStore};

use crate::catalog::CollectionCatalog;
use crate::coordinator::{TransactionCoordinator, TransactionMetrics};
use crate::scan::ScanControl;

/// Lock file name placed in the data directory
const LOCK_FILE_NAME: &str = ".lock";

/// How long `close` waits for in-flight transactions
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);

/// Main database struct
///
/// Owns the ordered store, the transaction coordinator and the collection
/// catalog. Always handled as `Arc<Database>`; opening the same directory
/// twice in one process returns the same instance.
pub struct Database {
    /// Canonical data directory; empty for ephemeral databases
    data_dir: PathBuf,

    storage: Arc<UnifiedStore>,

    coordinator: TransactionCoordinator,

    persistence: PersistenceMode,

    config: RwLock<KdbConfig>,

    /// Flag to track if database is accepting new transactions
    accepting_transactions: AtomicBool,

    closed: AtomicBool,

    /// Write commits since the last checkpoint
    commits_since_checkpoint: AtomicU64,

    /// Serializes checkpoint writers
    checkpoint_lock: Mutex<()>,

    catalog: CollectionCatalog,

    /// Exclusive lock on `<data_dir>/.lock`, released on close
    lock_file: Mutex<Option<File>>,
}

impl Database {
    /// Open database at the given path
    ///
    /// Creates the directory if needed and writes a default `kdb.toml` on
    /// first open. The configuration is then read from that file.
    ///
    /// # Example
    ///
    /// ```text
    /// use kdb_engine::Database;
    ///
    /// let db = Database::open("/path/to/data")?;
    /// ```
    pub fn open<P: AsRef<Path>>(path: P) -> KdbResult<Arc<Self>> {
        let data_dir = path.as_ref().to_path_buf();
        std::fs::create_dir_all(&data_dir)?;

        let config_path = data_dir.join(CONFIG_FILE_NAME);
        KdbConfig::write_default_if_missing(&config_path)?;
        let cfg = KdbConfig::from_file(&config_path)?;

        Self::open_internal(&data_dir, cfg)
    }

    /// Open database at the given path with an explicit configuration
    ///
    /// The supplied config is written to `kdb.toml` so that a later
    /// `Database::open()` picks up the same settings.
    pub fn open_with_config<P: AsRef<Path>>(path: P, cfg: KdbConfig) -> KdbResult<Arc<Self>> {
        cfg.persistence_mode()?;

        let data_dir = path.as_ref().to_path_buf();
        std::fs::create_dir_all(&data_dir)?;
        cfg.write_to_file(&data_dir.join(CONFIG_FILE_NAME))?;

        Self::open_internal(&data_dir, cfg)
    }

    fn open_internal(data_dir: &Path, cfg: KdbConfig) -> KdbResult<Arc<Self>> {
        let persistence = cfg.persistence_mode()?;
        let canonical_path = data_dir.canonicalize()?;

        // Held for the whole open so two threads cannot both build an instance
        let mut registry = OPEN_DATABASES.lock();

        if let Some(weak) = registry.get(&canonical_path) {
            if let Some(db) = weak.upgrade() {
                debug!(target: "kdb::db", path = ?canonical_path, "Returning existing database instance");
                return Ok(db);
            }
        }

        let lock_path = canonical_path.join(LOCK_FILE_NAME);
        let lock_file = std::fs::OpenOptions::new()
            .create(true)
            .truncate(false)
            .read(true)
            .write(true)
            .open(&lock_path)
            .map_err(|e| KdbError::storage(format!("failed to open lock file: {}", e)))?;
        fs2::FileExt::try_lock_exclusive(&lock_file).map_err(|_| {
            KdbError::storage(format!(
                "database at '{}' is already in use by another process",
                canonical_path.display()
            ))
        })?;

        let storage = match persistence {
            PersistenceMode::Checkpoint => read_checkpoint(&canonical_path)?.unwrap_or_default(),
            PersistenceMode::Memory => UnifiedStore::new(),
        };

        info!(
            target: "kdb::db",
            path = ?canonical_path,
            persistence = ?persistence,
            version = storage.current_version(),
            keys = storage.len(),
            "Database opened"
        );

        let db = Arc::new(Self::build(canonical_path.clone(), storage, persistence, cfg, Some(lock_file)));
        registry.insert(canonical_path, Arc::downgrade(&db));
        Ok(db)
    }

    /// Create an in-memory database with no directory, lock file or registry entry
    ///
    /// Each call returns an independent instance.
    pub fn ephemeral() -> KdbResult<Arc<Self>> {
        Self::ephemeral_with_config(KdbConfig::in_memory())
    }

    /// Ephemeral database with explicit settings; persistence is forced to memory
    pub fn ephemeral_with_config(cfg: KdbConfig) -> KdbResult<Arc<Self>> {
        let cfg = KdbConfig {
            persistence: "memory".to_string(),
            ..cfg
        };
        Ok(Arc::new(Self::build(
            PathBuf::new(),
            UnifiedStore::new(),
            PersistenceMode::Memory,
            cfg,
            None,
        )))
    }

    fn build(
        data_dir: PathBuf,
        storage: UnifiedStore,
        persistence: PersistenceMode,
        cfg: KdbConfig,
        lock_file: Option<File>,
    ) -> Self {
        let coordinator = TransactionCoordinator::new(storage.current_version());
        Self {
            data_dir,
            storage: Arc::new(storage),
            coordinator,
            persistence,
            config: RwLock::new(cfg),
            accepting_transactions: AtomicBool::new(true),
            closed: AtomicBool::new(false),
            commits_since_checkpoint: AtomicU64::new(0),
            checkpoint_lock: Mutex::new(()),
            catalog: CollectionCatalog::new(),
            lock_file: Mutex::new(lock_file),
        }
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    /// Data directory; empty for ephemeral databases
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// True for databases created with [`Database::ephemeral`]
    pub fn is_ephemeral(&self) -> bool {
        self.data_dir.as_os_str().is_empty()
    }

    /// True until `close` begins
    pub fn is_open(&self) -> bool {
        self.accepting_transactions.load(Ordering::SeqCst)
    }

    /// Active persistence mode
    pub fn persistence_mode(&self) -> PersistenceMode {
        self.persistence
    }

    /// Copy of the current configuration
    pub fn config(&self) -> KdbConfig {
        self.config.read().clone()
    }

    /// Retry policy used by standalone collection operations
    pub fn retry_config(&self) -> RetryConfig {
        self.config.read().retry.clone()
    }

    /// Replace the retry policy for this instance (not written to `kdb.toml`)
    pub fn set_retry_config(&self, retry: RetryConfig) {
        self.config.write().retry = retry;
    }

    /// Highest committed version
    pub fn current_version(&self) -> u64 {
        self.coordinator.current_version()
    }

    /// Transaction statistics
    pub fn metrics(&self) -> TransactionMetrics {
        self.coordinator.metrics()
    }

    pub(crate) fn catalog(&self) -> &CollectionCatalog {
        &self.catalog
    }

    fn persists(&self) -> bool {
        self.persistence == PersistenceMode::Checkpoint && !self.is_ephemeral()
    }

    // ========================================================================
    // Transaction API
    // ========================================================================

    /// Check if the database is accepting transactions.
    fn check_accepting(&self) -> KdbResult<()> {
        if !self.accepting_transactions.load(Ordering::SeqCst) {
            return Err(KdbError::DatabaseClosed);
        }
        Ok(())
    }

    /// Execute one transaction attempt: commit on success, abort on error.
    fn run_single_attempt<T>(&self, txn: &mut TransactionContext, result: KdbResult<T>) -> KdbResult<(T, u64)> {
        match result {
            Ok(value) => {
                let commit_version = self.commit_internal(txn)?;
                Ok((value, commit_version))
            }
            Err(e) => {
                let _ = txn.mark_aborted(format!("Closure error: {}", e));
                self.coordinator.record_abort();
                Err(e)
            }
        }
    }

    /// Execute a transaction with the given closure
    ///
    /// Commits when the closure returns `Ok`, aborts (discarding every
    /// buffered write) when it returns `Err`. A conflict at commit time is
    /// returned as `TransactionAborted`.
    ///
    /// # Example
    /// ```text
    /// let previous = db.transaction(|txn| {
    ///     let val = txn.get(b"key")?;
    ///     txn.put(b"key".to_vec(), b"new".to_vec())?;
    ///     Ok(val)
    /// })?;
    /// ```
    pub fn transaction<F, T>(&self, f: F) -> KdbResult<T>
    where
        F: FnOnce(&mut TransactionContext) -> KdbResult<T>,
    {
        let mut txn = self.begin_transaction()?;
        let result = f(&mut txn);
        self.run_single_attempt(&mut txn, result).map(|(value, _)| value)
    }

    /// Execute a transaction, retrying OCC conflicts with backoff
    ///
    /// The closure runs once per attempt against a fresh snapshot, so any
    /// side effects it has outside the transaction may repeat.
    pub fn transaction_with_retry<F, T>(&self, config: RetryConfig, mut f: F) -> KdbResult<T>
    where
        F: FnMut(&mut TransactionContext) -> KdbResult<T>,
    {
        self.check_accepting()?;

        let mut last_error = None;

        for attempt in 0..=config.max_retries {
            let mut txn = self.begin_transaction()?;
            let result = f(&mut txn);
            match self.run_single_attempt(&mut txn, result) {
                Ok((value, _)) => return Ok(value),
                Err(e) if e.is_conflict() && attempt < config.max_retries => {
                    let delay = config.calculate_delay(attempt);
                    debug!(
                        target: "kdb::txn",
                        attempt = attempt + 1,
                        delay_ms = delay.as_millis() as u64,
                        "Retrying transaction after conflict"
                    );
                    last_error = Some(e);
                    std::thread::sleep(delay);
                }
                Err(e) => return Err(e),
            }
        }

        // The loop returns on every path; this only satisfies the compiler
        Err(last_error.unwrap_or_else(|| KdbError::internal("retry loop exited without returning a result")))
    }

    /// [`Database::transaction_with_retry`] with the configured retry policy
    pub fn transaction_with_default_retry<F, T>(&self, f: F) -> KdbResult<T>
    where
        F: FnMut(&mut TransactionContext) -> KdbResult<T>,
    {
        self.transaction_with_retry(self.retry_config(), f)
    }

    /// Begin a new transaction (for manual control)
    ///
    /// The returned transaction must be finished with `commit_transaction`
    /// or `abort_transaction`.
    pub fn begin_transaction(&self) -> KdbResult<TransactionContext> {
        self.check_accepting()?;
        Ok(self.coordinator.start_transaction(&self.storage))
    }

    /// Commit a transaction, returning its commit version
    ///
    /// Read-only transactions return the version they read at.
    pub fn commit_transaction(&self, txn: &mut TransactionContext) -> KdbResult<u64> {
        self.commit_internal(txn)
    }

    /// Abort a transaction, discarding its buffered writes
    pub fn abort_transaction(&self, txn: &mut TransactionContext) -> KdbResult<()> {
        txn.mark_aborted("aborted by caller".to_string())?;
        self.coordinator.record_abort();
        Ok(())
    }

    fn commit_internal(&self, txn: &mut TransactionContext) -> KdbResult<u64> {
        let wrote = !txn.is_read_only();
        let version = self.coordinator.commit(txn, self.storage.as_ref())?;
        if wrote {
            self.after_write_commit();
        }
        Ok(version)
    }

    fn after_write_commit(&self) {
        let every = self.config.read().checkpoint_every_commits;
        if every == 0 || !self.persists() {
            return;
        }
        let n = self.commits_since_checkpoint.fetch_add(1, Ordering::SeqCst) + 1;
        if n >= every {
            if let Err(e) = self.flush() {
                warn!(target: "kdb::db", error = %e, "Automatic checkpoint failed");
            }
        }
    }

    // ========================================================================
    // Debug helpers
    // ========================================================================

    /// Walk every raw key in the store, registry and counters included
    pub fn scan_all<F>(&self, mut visit: F) -> KdbResult<()>
    where
        F: FnMut(&[u8], &[u8]) -> KdbResult<ScanControl>,
    {
        self.transaction(|txn| {
            for (key, value) in txn.scan_range(&[], None, false)? {
                if visit(&key, &value)? == ScanControl::Stop {
                    break;
                }
            }
            Ok(())
        })
    }

    // ========================================================================
    // Persistence and shutdown
    // ========================================================================

    /// Write a checkpoint now
    ///
    /// A no-op for memory persistence and ephemeral databases.
    pub fn flush(&self) -> KdbResult<()> {
        if !self.persists() {
            return Ok(());
        }
        let _guard = self.checkpoint_lock.lock();
        let info = write_checkpoint(&self.data_dir, &self.storage)?;
        self.commits_since_checkpoint.store(0, Ordering::SeqCst);
        info!(
            target: "kdb::db",
            version = info.version,
            entries = info.entries,
            bytes = info.bytes,
            "Checkpoint written"
        );
        Ok(())
    }

    /// Graceful shutdown
    ///
    /// 1. Stops accepting new transactions
    /// 2. Waits for in-flight transactions
    /// 3. Writes the final checkpoint
    /// 4. Releases the lock file and leaves the registry
    ///
    /// Calling `close` again is a no-op.
    pub fn close(&self) -> KdbResult<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        self.accepting_transactions.store(false, Ordering::SeqCst);

        if !self.coordinator.wait_for_idle(SHUTDOWN_TIMEOUT) {
            warn!(
                target: "kdb::db",
                active = self.coordinator.active_count(),
                "Closing with transactions still active"
            );
        }

        let result = self.flush();

        self.lock_file.lock().take();
        if !self.is_ephemeral() {
            registry::unregister_closed(&self.data_dir);
        }
        info!(target: "kdb::db", path = ?self.data_dir, "Database closed");
        result
    }
}

impl Drop for Database {
    fn drop(&mut self) {
        if self.closed.load(Ordering::SeqCst) {
            return;
        }
        if let Err(e) = self.flush() {
            warn!(target: "kdb::db", path = ?self.data_dir, error = %e, "Final checkpoint failed during drop");
        }
        if !self.is_ephemeral() {
            registry::unregister(&self.data_dir);
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
