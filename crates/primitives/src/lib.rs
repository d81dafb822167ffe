//! Collections layer for kdb
//!
//! Provides typed collections as cheap handles over the Database engine:
//! - **Hash**: named map of byte keys to byte values
//! - **List**: named sequence of byte values addressed by a growing index
//!
//! ## Design Principle: Handles, Not Owners
//!
//! A collection handle holds an `Arc<Database>` and the resolved prefix of
//! its collection. All state lives in the store, so any number of handles to
//! the same collection, on any number of threads, stay consistent.
//!
//! ## Cross-Collection Transactions
//!
//! Collections can be combined within a single transaction by binding each
//! one to the same transaction context:
//!
//! ```rust,ignore
//! use kdb_primitives::CollectionsExt;
//!
//! let users = db.hash(b"users")?;
//! let audit = db.list(b"audit")?;
//!
//! db.transaction(|txn| {
//!     users.bind(txn)?.set(b"alice", b"admin")?;
//!     audit.bind(txn)?.push(&[b"alice promoted"])?;
//!     Ok(())
//! })?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod extensions;
pub mod hash;
pub mod list;

pub use extensions::{CollectionScope, CollectionsExt, EntryReader, EntryScanner, EntryWriter};
pub use hash::{Hash, HashTransaction};
pub use list::{List, ListTransaction};
