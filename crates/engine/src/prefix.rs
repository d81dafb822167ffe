//! Prefix registry: durable mapping from collection names to key-space prefixes
//!
//! ## Layout
//!
//! - `px:<tag>:<name>` maps a live collection name to its prefix
//! - `px#alloc` holds the next allocation id (u64 big-endian)
//! - `pxb:<prefix>` marks a released prefix as reusable
//!
//! All registry reads and writes happen inside the caller's transaction.
//! Two first-time `record_prefix` calls for the same name both read the
//! registry key as absent; whichever commits second fails validation and, on
//! retry, finds the winner's prefix.
//!
//! ## Reclamation
//!
//! A prefix goes on the free list only after every entry under it, including
//! its count and sequence keys, has been deleted in the same transaction.
//! The emptiness check is repeated when a free-list entry is taken, and an
//! entry that fails it is skipped.

use tracing::{debug, warn};

use kdb_concurrency::TransactionContext;
use kdb_core::keys::{self, ALLOC_KEY, FREELIST_MARKER, FREELIST_PREFIX};
use kdb_core::{CollectionKind, KdbError, KdbResult, Prefix};

use crate::database::Database;

/// Prefix currently mapped to `name`, if any
pub fn get_prefix(txn: &mut TransactionContext, kind: CollectionKind, name: &[u8]) -> KdbResult<Option<Prefix>> {
    validate_name(name)?;
    match txn.get(&keys::registry_key(kind, name))? {
        None => Ok(None),
        Some(bytes) => Prefix::from_bytes(&bytes).map(Some).ok_or_else(|| {
            KdbError::corruption(format!(
                "registry entry for {} '{}' holds an invalid prefix",
                kind,
                String::from_utf8_lossy(name)
            ))
        }),
    }
}

/// Prefix for `name`, allocating one on first use
pub fn record_prefix(txn: &mut TransactionContext, kind: CollectionKind, name: &[u8]) -> KdbResult<Prefix> {
    if let Some(prefix) = get_prefix(txn, kind, name)? {
        return Ok(prefix);
    }

    let prefix = match take_free_prefix(txn)? {
        Some(prefix) => {
            debug!(target: "kdb::prefix", %kind, name = %String::from_utf8_lossy(name), %prefix, "Reusing released prefix");
            prefix
        }
        None => {
            let prefix = allocate_prefix(txn)?;
            debug!(target: "kdb::prefix", %kind, name = %String::from_utf8_lossy(name), %prefix, "Allocated prefix");
            prefix
        }
    };

    txn.put(keys::registry_key(kind, name), prefix.as_bytes().to_vec())?;
    Ok(prefix)
}

/// Unmap `name` and put `prefix` on the free list
///
/// Fails with `InvariantViolation` if `name` is not mapped to `prefix` or if
/// anything under the prefix is still visible in the transaction.
pub fn release_prefix(
    txn: &mut TransactionContext,
    kind: CollectionKind,
    name: &[u8],
    prefix: &Prefix,
) -> KdbResult<()> {
    match get_prefix(txn, kind, name)? {
        Some(current) if current == *prefix => {}
        other => {
            return Err(KdbError::invariant(format!(
                "cannot release {} for {} '{}': registry maps it to {:?}",
                prefix,
                kind,
                String::from_utf8_lossy(name),
                other
            )));
        }
    }
    if !key_space_is_empty(txn, prefix)? {
        return Err(KdbError::invariant(format!(
            "cannot release {}: entries remain under it",
            prefix
        )));
    }

    txn.delete(keys::registry_key(kind, name))?;
    txn.put(keys::freelist_key(prefix), FREELIST_MARKER.to_vec())?;
    debug!(target: "kdb::prefix", %kind, name = %String::from_utf8_lossy(name), %prefix, "Released prefix");
    Ok(())
}

/// Names of every live collection of `kind`, ascending
pub fn list_names(txn: &mut TransactionContext, kind: CollectionKind) -> KdbResult<Vec<Vec<u8>>> {
    let start = keys::registry_scan_prefix(kind);
    let end = keys::prefix_successor(&start);
    let items = txn.scan_range(&start, end.as_deref(), false)?;
    Ok(items
        .into_iter()
        .filter_map(|(key, _)| key.strip_prefix(start.as_slice()).map(<[u8]>::to_vec))
        .collect())
}

fn validate_name(name: &[u8]) -> KdbResult<()> {
    if name.is_empty() {
        return Err(KdbError::invalid_input("collection name must not be empty"));
    }
    Ok(())
}

fn allocate_prefix(txn: &mut TransactionContext) -> KdbResult<Prefix> {
    let id = match txn.get(ALLOC_KEY)? {
        None => 0,
        Some(bytes) => {
            let raw: [u8; 8] = bytes.as_slice().try_into().map_err(|_| {
                KdbError::corruption(format!("allocation counter has {} bytes, expected 8", bytes.len()))
            })?;
            u64::from_be_bytes(raw)
        }
    };
    let next = id
        .checked_add(1)
        .ok_or_else(|| KdbError::invariant("prefix allocation counter exhausted"))?;
    txn.put(ALLOC_KEY.to_vec(), next.to_be_bytes().to_vec())?;
    Ok(Prefix::from_id(id))
}

fn take_free_prefix(txn: &mut TransactionContext) -> KdbResult<Option<Prefix>> {
    let end = keys::prefix_successor(FREELIST_PREFIX);
    let candidates = txn.scan_range(FREELIST_PREFIX, end.as_deref(), false)?;

    for (key, _) in candidates {
        let Some(prefix) = Prefix::from_bytes(&key[FREELIST_PREFIX.len()..]) else {
            warn!(target: "kdb::prefix", key = ?key, "Ignoring malformed free-list entry");
            continue;
        };
        if key_space_is_empty(txn, &prefix)? {
            txn.delete(key)?;
            return Ok(Some(prefix));
        }
        warn!(target: "kdb::prefix", %prefix, "Skipping free-list prefix that still holds data");
    }
    Ok(None)
}

fn key_space_is_empty(txn: &mut TransactionContext, prefix: &Prefix) -> KdbResult<bool> {
    if txn.exists(&prefix.count_key())? || txn.exists(&prefix.seq_key())? {
        return Ok(false);
    }
    let end = prefix.end_key();
    Ok(txn.scan_range(prefix.first_key(), Some(end.as_slice()), false)?.is_empty())
}

// ============================================================================
// Standalone wrappers
// ============================================================================

impl Database {
    /// Prefix for `name`, allocating it in its own retrying transaction
    pub fn record_prefix(&self, kind: CollectionKind, name: &[u8]) -> KdbResult<Prefix> {
        self.transaction_with_default_retry(|txn| record_prefix(txn, kind, name))
    }

    /// Prefix for `name` if the collection exists
    pub fn get_prefix(&self, kind: CollectionKind, name: &[u8]) -> KdbResult<Option<Prefix>> {
        self.transaction(|txn| get_prefix(txn, kind, name))
    }

    /// Names of every live collection of `kind`, ascending
    pub fn collection_names(&self, kind: CollectionKind) -> KdbResult<Vec<Vec<u8>>> {
        self.transaction(|txn| list_names(txn, kind))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kdb_core::Storage;
    use kdb_storage::UnifiedStore;

    fn begin(store: &UnifiedStore) -> TransactionContext {
        TransactionContext::with_snapshot(1, Box::new(store.create_snapshot()))
    }

    fn commit(store: &UnifiedStore, txn: &mut TransactionContext) {
        txn.commit(store).unwrap();
        let version = store.current_version() + 1;
        txn.apply_writes(store, version).unwrap();
    }

    // ========================================
    // Allocation
    // ========================================

    #[test]
    fn test_record_prefix_is_idempotent() {
        let store = UnifiedStore::new();
        let mut txn = begin(&store);
        let a = record_prefix(&mut txn, CollectionKind::Hash, b"users").unwrap();
        let b = record_prefix(&mut txn, CollectionKind::Hash, b"users").unwrap();
        assert_eq!(a, b);
        commit(&store, &mut txn);

        let mut txn = begin(&store);
        assert_eq!(record_prefix(&mut txn, CollectionKind::Hash, b"users").unwrap(), a);
        assert_eq!(get_prefix(&mut txn, CollectionKind::Hash, b"users").unwrap(), Some(a));
    }

    #[test]
    fn test_distinct_names_get_distinct_prefixes() {
        let store = UnifiedStore::new();
        let mut txn = begin(&store);
        let a = record_prefix(&mut txn, CollectionKind::Hash, b"a").unwrap();
        let b = record_prefix(&mut txn, CollectionKind::Hash, b"b").unwrap();
        let c = record_prefix(&mut txn, CollectionKind::List, b"a").unwrap();
        assert_ne!(a, b);
        assert_ne!(a, c);
        assert_ne!(b, c);
        assert_eq!((a.id(), b.id(), c.id()), (0, 1, 2));
    }

    #[test]
    fn test_get_prefix_absent() {
        let store = UnifiedStore::new();
        let mut txn = begin(&store);
        assert_eq!(get_prefix(&mut txn, CollectionKind::List, b"nope").unwrap(), None);
        assert!(txn.is_read_only());
    }

    #[test]
    fn test_empty_name_rejected() {
        let store = UnifiedStore::new();
        let mut txn = begin(&store);
        let err = record_prefix(&mut txn, CollectionKind::Hash, b"").unwrap_err();
        assert!(matches!(err, KdbError::InvalidInput { .. }));
    }

    #[test]
    fn test_corrupt_registry_value() {
        let store = UnifiedStore::new();
        store
            .apply_batch(&[(keys::registry_key(CollectionKind::Hash, b"x"), b"junk".to_vec())], &[], 1)
            .unwrap();
        let mut txn = begin(&store);
        let err = get_prefix(&mut txn, CollectionKind::Hash, b"x").unwrap_err();
        assert!(matches!(err, KdbError::Corruption { .. }));
    }

    // ========================================
    // Release and reuse
    // ========================================

    #[test]
    fn test_release_then_reuse() {
        let store = UnifiedStore::new();
        let mut txn = begin(&store);
        let p = record_prefix(&mut txn, CollectionKind::Hash, b"old").unwrap();
        commit(&store, &mut txn);

        let mut txn = begin(&store);
        release_prefix(&mut txn, CollectionKind::Hash, b"old", &p).unwrap();
        assert_eq!(get_prefix(&mut txn, CollectionKind::Hash, b"old").unwrap(), None);
        commit(&store, &mut txn);

        let mut txn = begin(&store);
        let reused = record_prefix(&mut txn, CollectionKind::List, b"new").unwrap();
        assert_eq!(reused, p);
        // The free-list entry is consumed
        commit(&store, &mut txn);
        assert!(store.get(&keys::freelist_key(&p)).unwrap().is_none());
    }

    #[test]
    fn test_release_with_entries_is_invariant_violation() {
        let store = UnifiedStore::new();
        let mut txn = begin(&store);
        let p = record_prefix(&mut txn, CollectionKind::Hash, b"h").unwrap();
        txn.put(p.entry_key(b"field"), b"v".to_vec()).unwrap();

        let err = release_prefix(&mut txn, CollectionKind::Hash, b"h", &p).unwrap_err();
        assert!(matches!(err, KdbError::InvariantViolation { .. }));
    }

    #[test]
    fn test_release_with_count_key_is_invariant_violation() {
        let store = UnifiedStore::new();
        let mut txn = begin(&store);
        let p = record_prefix(&mut txn, CollectionKind::List, b"l").unwrap();
        txn.put(p.seq_key(), vec![3]).unwrap();
        assert!(release_prefix(&mut txn, CollectionKind::List, b"l", &p).is_err());
    }

    #[test]
    fn test_release_wrong_prefix_rejected() {
        let store = UnifiedStore::new();
        let mut txn = begin(&store);
        record_prefix(&mut txn, CollectionKind::Hash, b"h").unwrap();
        let err = release_prefix(&mut txn, CollectionKind::Hash, b"h", &Prefix::from_id(99)).unwrap_err();
        assert!(matches!(err, KdbError::InvariantViolation { .. }));
    }

    #[test]
    fn test_non_empty_free_entry_is_skipped() {
        let store = UnifiedStore::new();
        let dirty = Prefix::from_id(5);
        store
            .apply_batch(
                &[
                    (keys::freelist_key(&dirty), FREELIST_MARKER.to_vec()),
                    (dirty.entry_key(b"leftover"), b"x".to_vec()),
                    (ALLOC_KEY.to_vec(), 6u64.to_be_bytes().to_vec()),
                ],
                &[],
                1,
            )
            .unwrap();

        let mut txn = begin(&store);
        let p = record_prefix(&mut txn, CollectionKind::Hash, b"fresh").unwrap();
        assert_ne!(p, dirty);
        assert_eq!(p.id(), 6);
    }

    // ========================================
    // Listing
    // ========================================

    #[test]
    fn test_list_names_per_kind() {
        let store = UnifiedStore::new();
        let mut txn = begin(&store);
        let names: [&[u8]; 3] = [b"zeta", b"alpha", b"mid"];
        for name in names {
            record_prefix(&mut txn, CollectionKind::Hash, name).unwrap();
        }
        record_prefix(&mut txn, CollectionKind::List, b"queue").unwrap();

        let hashes = list_names(&mut txn, CollectionKind::Hash).unwrap();
        assert_eq!(hashes, vec![b"alpha".to_vec(), b"mid".to_vec(), b"zeta".to_vec()]);
        assert_eq!(list_names(&mut txn, CollectionKind::List).unwrap(), vec![b"queue".to_vec()]);
    }
}
