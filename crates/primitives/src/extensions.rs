//! Capability traits for collection transaction handles
//!
//! ## Design Principle
//!
//! Each trait names one capability. Code that only needs to read entries can
//! take `&mut dyn EntryReader` and work against any collection handle that
//! provides it, without depending on the concrete collection type.
//!
//! The traits DELEGATE to the handles' inherent methods; they do not
//! reimplement logic, so trait calls and direct calls behave identically.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use kdb_primitives::extensions::*;
//!
//! db.transaction(|txn| {
//!     let mut users = users.bind(txn)?;
//!     copy_if_missing(&mut users, b"alice", b"bob")
//! })?;
//! ```
//!
//! [`CollectionsExt`] is the database-level entry point for opening
//! collections by name.

use std::sync::Arc;

use kdb_core::{CollectionKind, KdbResult, Prefix};
use kdb_engine::{Database, ScanControl};

use crate::hash::Hash;
use crate::list::List;

/// Visitor accepted by [`EntryScanner`]
pub type EntryVisitor<'v> = dyn FnMut(&[u8], &[u8]) -> KdbResult<ScanControl> + 'v;

/// Identity of the collection a handle is bound to
pub trait CollectionScope {
    /// Collection name
    fn name(&self) -> &[u8];

    /// Collection kind
    fn kind(&self) -> CollectionKind;

    /// Key-space prefix owning the collection's entries
    fn prefix(&self) -> &Prefix;
}

/// Point reads by subkey
pub trait EntryReader: CollectionScope {
    /// Value stored under `key`
    fn get(&mut self, key: &[u8]) -> KdbResult<Option<Vec<u8>>>;

    /// True when `key` is present
    fn exists(&mut self, key: &[u8]) -> KdbResult<bool>;

    /// Number of live entries
    fn len(&mut self) -> KdbResult<u64>;

    /// True when the collection holds no entries
    fn is_empty(&mut self) -> KdbResult<bool> {
        Ok(self.len()? == 0)
    }
}

/// Point writes by subkey
pub trait EntryWriter: CollectionScope {
    /// Insert or overwrite `key`
    fn set(&mut self, key: &[u8], value: &[u8]) -> KdbResult<()>;

    /// Remove `key`; returns whether it was present
    fn delete(&mut self, key: &[u8]) -> KdbResult<bool>;
}

/// Ordered walks over the collection's entries
///
/// Keys handed to the visitor have the prefix stripped. For lists they are
/// the 8-byte big-endian index.
pub trait EntryScanner: CollectionScope {
    /// Ascending walk
    fn range(&mut self, visit: &mut EntryVisitor<'_>) -> KdbResult<()>;

    /// Descending walk
    fn reverse(&mut self, visit: &mut EntryVisitor<'_>) -> KdbResult<()>;
}

/// Open collections by name on a shared database
pub trait CollectionsExt {
    /// Hash named `name`, created on first use
    fn hash(&self, name: &[u8]) -> KdbResult<Hash>;

    /// List named `name`, created on first use
    fn list(&self, name: &[u8]) -> KdbResult<List>;

    /// True when a hash named `name` exists
    fn hash_exists(&self, name: &[u8]) -> KdbResult<bool>;

    /// True when a list named `name` exists
    fn list_exists(&self, name: &[u8]) -> KdbResult<bool>;

    /// Names of every hash, ascending
    fn hash_names(&self) -> KdbResult<Vec<Vec<u8>>>;

    /// Names of every list, ascending
    fn list_names(&self) -> KdbResult<Vec<Vec<u8>>>;
}

impl CollectionsExt for Arc<Database> {
    fn hash(&self, name: &[u8]) -> KdbResult<Hash> {
        Hash::open(Arc::clone(self), name)
    }

    fn list(&self, name: &[u8]) -> KdbResult<List> {
        List::open(Arc::clone(self), name)
    }

    fn hash_exists(&self, name: &[u8]) -> KdbResult<bool> {
        Ok(self.get_prefix(CollectionKind::Hash, name)?.is_some())
    }

    fn list_exists(&self, name: &[u8]) -> KdbResult<bool> {
        Ok(self.get_prefix(CollectionKind::List, name)?.is_some())
    }

    fn hash_names(&self) -> KdbResult<Vec<Vec<u8>>> {
        self.collection_names(CollectionKind::Hash)
    }

    fn list_names(&self) -> KdbResult<Vec<Vec<u8>>> {
        self.collection_names(CollectionKind::List)
    }
}
