//! Collection catalog: resolved collection handles
//!
//! A [`CollectionHandle`] pins a collection name to the prefix it resolved
//! to. Handles are cached per database so repeated lookups of one name skip
//! the registry, and every clone of a cached handle observes a drop made
//! through any of them.
//!
//! The local `dropped` flag is only a fast path. Each operation also checks
//! the registry inside its transaction ([`CollectionHandle::ensure_live`]),
//! which catches drops made through a handle this catalog never saw and
//! makes a concurrent drop conflict with the operation.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tracing::debug;

use kdb_concurrency::TransactionContext;
use kdb_core::{CollectionKind, KdbError, KdbResult, Prefix};

use crate::counter::read_counter;
use crate::database::Database;
use crate::prefix;
use crate::scan::{self, Direction, ScanControl};

/// A named collection resolved to its prefix
#[derive(Debug)]
pub struct CollectionHandle {
    kind: CollectionKind,
    name: Vec<u8>,
    prefix: Prefix,
    dropped: AtomicBool,
}

impl CollectionHandle {
    /// Create a live handle
    pub fn new(kind: CollectionKind, name: impl Into<Vec<u8>>, prefix: Prefix) -> Self {
        Self {
            kind,
            name: name.into(),
            prefix,
            dropped: AtomicBool::new(false),
        }
    }

    /// Collection kind
    pub fn kind(&self) -> CollectionKind {
        self.kind
    }

    /// Collection name
    pub fn name(&self) -> &[u8] {
        &self.name
    }

    /// Prefix the name resolved to
    pub fn prefix(&self) -> &Prefix {
        &self.prefix
    }

    /// True once the collection was dropped through this handle or a clone
    pub fn is_dropped(&self) -> bool {
        self.dropped.load(Ordering::Acquire)
    }

    pub(crate) fn mark_dropped(&self) {
        self.dropped.store(true, Ordering::Release);
    }

    /// Error unless the registry still maps the name to this handle's prefix
    pub fn ensure_live(&self, txn: &mut TransactionContext) -> KdbResult<()> {
        if self.is_dropped() {
            return Err(self.dropped_error());
        }
        match prefix::get_prefix(txn, self.kind, &self.name)? {
            Some(current) if current == self.prefix => Ok(()),
            _ => Err(self.dropped_error()),
        }
    }

    fn dropped_error(&self) -> KdbError {
        KdbError::collection_dropped(self.kind, &self.name)
    }
}

/// Per-database cache of resolved handles
#[derive(Debug, Default)]
pub struct CollectionCatalog {
    handles: DashMap<(CollectionKind, Vec<u8>), Arc<CollectionHandle>>,
}

impl CollectionCatalog {
    /// Empty catalog
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached live handle for a name
    pub fn get(&self, kind: CollectionKind, name: &[u8]) -> Option<Arc<CollectionHandle>> {
        self.handles
            .get(&(kind, name.to_vec()))
            .map(|entry| Arc::clone(entry.value()))
            .filter(|handle| !handle.is_dropped())
    }

    /// Cache `handle`, keeping an equivalent live handle that won a race
    pub fn insert(&self, handle: CollectionHandle) -> Arc<CollectionHandle> {
        match self.handles.entry((handle.kind, handle.name.clone())) {
            Entry::Occupied(mut occupied) => {
                let current = occupied.get();
                if !current.is_dropped() && current.prefix == handle.prefix {
                    return Arc::clone(current);
                }
                let fresh = Arc::new(handle);
                occupied.insert(Arc::clone(&fresh));
                fresh
            }
            Entry::Vacant(vacant) => Arc::clone(vacant.insert(Arc::new(handle)).value()),
        }
    }

    /// Forget a name if it is still cached with `prefix`
    pub fn remove(&self, kind: CollectionKind, name: &[u8], prefix: &Prefix) {
        self.handles
            .remove_if(&(kind, name.to_vec()), |_, handle| handle.prefix == *prefix);
    }

    /// Number of cached handles
    pub fn len(&self) -> usize {
        self.handles.len()
    }

    /// True when nothing is cached
    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }
}

/// Delete every entry plus the count and sequence keys; returns the entry count
pub fn clear_collection(txn: &mut TransactionContext, prefix: &Prefix) -> KdbResult<u64> {
    // Read both counters so a concurrent insert or delete conflicts
    read_counter(txn, &prefix.count_key())?;
    read_counter(txn, &prefix.seq_key())?;

    let mut doomed = Vec::new();
    scan::scan(txn, prefix, Direction::Forward, |key, _| {
        doomed.push(prefix.entry_key(key));
        Ok(ScanControl::Continue)
    })?;
    let removed = doomed.len() as u64;
    for key in doomed {
        txn.delete(key)?;
    }
    txn.delete(prefix.count_key())?;
    txn.delete(prefix.seq_key())?;
    Ok(removed)
}

/// Remove a collection entirely and release its prefix, in `txn`
pub fn drop_collection(txn: &mut TransactionContext, handle: &CollectionHandle) -> KdbResult<u64> {
    handle.ensure_live(txn)?;
    let removed = clear_collection(txn, handle.prefix())?;
    prefix::release_prefix(txn, handle.kind(), handle.name(), handle.prefix())?;
    Ok(removed)
}

impl Database {
    /// Resolve `name` to a live handle, creating the collection on first use
    pub fn collection(&self, kind: CollectionKind, name: &[u8]) -> KdbResult<Arc<CollectionHandle>> {
        if let Some(handle) = self.catalog().get(kind, name) {
            return Ok(handle);
        }
        let prefix = self.record_prefix(kind, name)?;
        Ok(self.catalog().insert(CollectionHandle::new(kind, name, prefix)))
    }

    /// Resolve `name` only if the collection already exists
    pub fn existing_collection(&self, kind: CollectionKind, name: &[u8]) -> KdbResult<Option<Arc<CollectionHandle>>> {
        match self.get_prefix(kind, name)? {
            None => Ok(None),
            Some(prefix) => Ok(Some(self.catalog().insert(CollectionHandle::new(kind, name, prefix)))),
        }
    }

    /// Drop a collection in its own retrying transaction
    ///
    /// Returns the number of entries removed. The handle and all of its
    /// clones report `CollectionDropped` afterwards.
    pub fn drop_collection(&self, handle: &CollectionHandle) -> KdbResult<u64> {
        let removed = self.transaction_with_default_retry(|txn| drop_collection(txn, handle))?;
        self.forget_collection(handle);
        debug!(
            target: "kdb::collection",
            kind = %handle.kind(),
            name = %String::from_utf8_lossy(handle.name()),
            prefix = %handle.prefix(),
            removed,
            "Collection dropped"
        );
        Ok(removed)
    }

    /// Mark `handle` dropped and evict it from the cache
    ///
    /// Call after committing a transaction that ran [`drop_collection`].
    pub fn forget_collection(&self, handle: &CollectionHandle) {
        handle.mark_dropped();
        self.catalog().remove(handle.kind(), handle.name(), handle.prefix());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalog_insert_and_get() {
        let catalog = CollectionCatalog::new();
        let handle = catalog.insert(CollectionHandle::new(CollectionKind::Hash, b"h".to_vec(), Prefix::from_id(1)));
        let again = catalog.get(CollectionKind::Hash, b"h").unwrap();
        assert!(Arc::ptr_eq(&handle, &again));
        assert!(catalog.get(CollectionKind::List, b"h").is_none());
    }

    #[test]
    fn test_catalog_insert_keeps_existing_live_handle() {
        let catalog = CollectionCatalog::new();
        let first = catalog.insert(CollectionHandle::new(CollectionKind::Hash, b"h".to_vec(), Prefix::from_id(1)));
        let second = catalog.insert(CollectionHandle::new(CollectionKind::Hash, b"h".to_vec(), Prefix::from_id(1)));
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(catalog.len(), 1);
    }

    #[test]
    fn test_catalog_replaces_dropped_handle() {
        let catalog = CollectionCatalog::new();
        let first = catalog.insert(CollectionHandle::new(CollectionKind::List, b"l".to_vec(), Prefix::from_id(1)));
        first.mark_dropped();
        assert!(catalog.get(CollectionKind::List, b"l").is_none());

        let second = catalog.insert(CollectionHandle::new(CollectionKind::List, b"l".to_vec(), Prefix::from_id(1)));
        assert!(!Arc::ptr_eq(&first, &second));
        assert!(!second.is_dropped());
    }

    #[test]
    fn test_catalog_remove_checks_prefix() {
        let catalog = CollectionCatalog::new();
        catalog.insert(CollectionHandle::new(CollectionKind::Hash, b"h".to_vec(), Prefix::from_id(2)));
        catalog.remove(CollectionKind::Hash, b"h", &Prefix::from_id(3));
        assert_eq!(catalog.len(), 1);
        catalog.remove(CollectionKind::Hash, b"h", &Prefix::from_id(2));
        assert!(catalog.is_empty());
    }

    #[test]
    fn test_dropped_handle_errors_before_reading() {
        let handle = CollectionHandle::new(CollectionKind::Hash, b"gone".to_vec(), Prefix::from_id(1));
        handle.mark_dropped();
        let store = kdb_storage::UnifiedStore::new();
        let mut txn = TransactionContext::with_snapshot(1, Box::new(store.create_snapshot()));
        let err = handle.ensure_live(&mut txn).unwrap_err();
        assert!(err.is_collection_dropped());
        assert_eq!(txn.read_count(), 0);
    }
}
