//! kdb - embedded collection store
//!
//! kdb layers two collection types over an ordered, transactional key-value
//! engine:
//!
//! - [`Hash`]: a map from byte keys to byte values,
//!   walked in key order, with an O(1) length counter
//! - [`List`]: an append-only sequence addressed by a monotonically growing
//!   index, popped from either end
//!
//! Every collection lives under a short key-space prefix handed out by the
//! prefix registry; dropping a collection returns its prefix for reuse.
//!
//! # Quick Start
//!
//! ```ignore
//! use kdb::{CollectionsExt, Database};
//!
//! let db = Database::open("./data")?;
//!
//! let users = db.hash(b"users")?;
//! users.set(b"alice", b"admin")?;
//!
//! let jobs = db.list(b"jobs")?;
//! jobs.push(&[b"build", b"test"])?;
//! assert_eq!(jobs.pop_left()?, Some(b"build".to_vec()));
//!
//! // Several collections in one atomic transaction
//! db.transaction(|txn| {
//!     users.bind(txn)?.set(b"bob", b"user")?;
//!     jobs.bind(txn)?.push(&[b"notify-bob"])?;
//!     Ok(())
//! })?;
//! ```
//!
//! # Architecture
//!
//! - `kdb-core`: key layout, error type, storage traits
//! - `kdb-storage`: in-memory ordered store and checkpoint files
//! - `kdb-concurrency`: optimistic transactions
//! - `kdb-engine`: database lifecycle, prefix registry, scans, sampling
//! - `kdb-primitives`: the Hash and List collections

pub use kdb_core::json::PathSegment;
pub use kdb_engine::{
    CollectionHandle, CollectionKind, Database, Direction, KdbConfig, KdbError, KdbResult,
    PersistenceMode, Prefix, RetryConfig, ScanControl, TransactionContext,
};
pub use kdb_primitives::{
    CollectionScope, CollectionsExt, EntryReader, EntryScanner, EntryWriter, Hash, HashTransaction, List,
    ListTransaction,
};

/// Lower-level building blocks
pub mod engine {
    pub use kdb_engine::{catalog, counter, prefix, sampler, scan};
    pub use kdb_storage::{checkpoint, UnifiedStore};
}
