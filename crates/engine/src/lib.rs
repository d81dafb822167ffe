//! Database engine for kdb
//!
//! This crate orchestrates the lower layers:
//! - Database: open/close, single instance per directory, checkpointing
//! - Transaction coordination and retry
//! - Prefix registry and free list
//! - Collection catalog (resolved handles and drop)
//! - Scan engine and random sampling over one collection's key space
//!
//! The engine is the only component that knows how collections are laid out
//! in the shared ordered key space. The typed collections themselves live in
//! `kdb-primitives`.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod catalog;
pub mod coordinator;
pub mod counter;
pub mod database;
pub mod prefix;
pub mod sampler;
pub mod scan;

pub use catalog::{CollectionCatalog, CollectionHandle};
pub use coordinator::{TransactionCoordinator, TransactionMetrics};
pub use database::{Database, KdbConfig, PersistenceMode, RetryConfig, CONFIG_FILE_NAME};
pub use scan::{Direction, ScanControl};

pub use kdb_concurrency::TransactionContext;
pub use kdb_core::{CollectionKind, KdbError, KdbResult, Prefix};
