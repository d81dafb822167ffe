//! Core traits for storage and snapshot abstraction
//!
//! This module defines the Storage and SnapshotView traits that the
//! transaction layer is written against. Keys and values are raw bytes; the
//! layout on top of them is owned by [`crate::keys`].

use crate::error::KdbResult;
use crate::types::VersionedValue;

/// A scanned key with its versioned value
pub type ScanItem = (Vec<u8>, VersionedValue);

/// Ordered, versioned byte storage
///
/// Implementations must be thread-safe and must apply each batch atomically
/// with respect to snapshots.
pub trait Storage: Send + Sync {
    /// Latest committed value for a key
    fn get(&self, key: &[u8]) -> KdbResult<Option<VersionedValue>>;

    /// Entries with `start <= key < end` (unbounded above when `end` is `None`),
    /// ascending, or descending when `reverse` is set
    fn scan_range(&self, start: &[u8], end: Option<&[u8]>, reverse: bool) -> KdbResult<Vec<ScanItem>>;

    /// Approximate byte size (keys plus values) of a range
    fn size_of_range(&self, start: &[u8], end: Option<&[u8]>) -> KdbResult<u64>;

    /// Highest version applied so far
    fn current_version(&self) -> u64;

    /// Apply writes and deletes atomically, stamping every write with `version`
    fn apply_batch(
        &self,
        writes: &[(Vec<u8>, Vec<u8>)],
        deletes: &[Vec<u8>],
        version: u64,
    ) -> KdbResult<()>;
}

/// Immutable point-in-time view used for transaction reads
pub trait SnapshotView: Send + Sync {
    /// Value visible in this snapshot
    fn get(&self, key: &[u8]) -> KdbResult<Option<VersionedValue>>;

    /// Range scan with the same bounds and ordering as [`Storage::scan_range`]
    fn scan_range(&self, start: &[u8], end: Option<&[u8]>, reverse: bool) -> KdbResult<Vec<ScanItem>>;

    /// Approximate byte size of a range in this snapshot
    fn size_of_range(&self, start: &[u8], end: Option<&[u8]>) -> KdbResult<u64>;

    /// Version at which the snapshot was taken
    fn version(&self) -> u64;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use std::ops::Bound;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::RwLock;

    // ====================================================================
    // Minimal mock implementations for behavioral testing
    // ====================================================================

    struct MockStorage {
        data: RwLock<BTreeMap<Vec<u8>, VersionedValue>>,
        version: AtomicU64,
    }

    impl MockStorage {
        fn new() -> Self {
            MockStorage {
                data: RwLock::new(BTreeMap::new()),
                version: AtomicU64::new(0),
            }
        }

        fn snapshot(&self) -> MockSnapshot {
            MockSnapshot {
                data: self.data.read().unwrap().clone(),
                snap_version: self.current_version(),
            }
        }
    }

    fn range_of(
        data: &BTreeMap<Vec<u8>, VersionedValue>,
        start: &[u8],
        end: Option<&[u8]>,
        reverse: bool,
    ) -> Vec<ScanItem> {
        let upper = match end {
            Some(e) => Bound::Excluded(e.to_vec()),
            None => Bound::Unbounded,
        };
        let iter = data.range((Bound::Included(start.to_vec()), upper));
        let items = iter.map(|(k, v)| (k.clone(), v.clone()));
        if reverse {
            items.rev().collect()
        } else {
            items.collect()
        }
    }

    impl Storage for MockStorage {
        fn get(&self, key: &[u8]) -> KdbResult<Option<VersionedValue>> {
            Ok(self.data.read().unwrap().get(key).cloned())
        }

        fn scan_range(&self, start: &[u8], end: Option<&[u8]>, reverse: bool) -> KdbResult<Vec<ScanItem>> {
            Ok(range_of(&self.data.read().unwrap(), start, end, reverse))
        }

        fn size_of_range(&self, start: &[u8], end: Option<&[u8]>) -> KdbResult<u64> {
            Ok(self
                .scan_range(start, end, false)?
                .iter()
                .map(|(k, v)| (k.len() + v.value.len()) as u64)
                .sum())
        }

        fn current_version(&self) -> u64 {
            self.version.load(Ordering::SeqCst)
        }

        fn apply_batch(
            &self,
            writes: &[(Vec<u8>, Vec<u8>)],
            deletes: &[Vec<u8>],
            version: u64,
        ) -> KdbResult<()> {
            let mut data = self.data.write().unwrap();
            for (k, v) in writes {
                data.insert(k.clone(), VersionedValue::new(v.clone(), version));
            }
            for k in deletes {
                data.remove(k);
            }
            self.version.fetch_max(version, Ordering::SeqCst);
            Ok(())
        }
    }

    struct MockSnapshot {
        data: BTreeMap<Vec<u8>, VersionedValue>,
        snap_version: u64,
    }

    impl SnapshotView for MockSnapshot {
        fn get(&self, key: &[u8]) -> KdbResult<Option<VersionedValue>> {
            Ok(self.data.get(key).cloned())
        }

        fn scan_range(&self, start: &[u8], end: Option<&[u8]>, reverse: bool) -> KdbResult<Vec<ScanItem>> {
            Ok(range_of(&self.data, start, end, reverse))
        }

        fn size_of_range(&self, start: &[u8], end: Option<&[u8]>) -> KdbResult<u64> {
            Ok(range_of(&self.data, start, end, false)
                .iter()
                .map(|(k, v)| (k.len() + v.value.len()) as u64)
                .sum())
        }

        fn version(&self) -> u64 {
            self.snap_version
        }
    }

    // ====================================================================
    // Trait contract
    // ====================================================================

    #[test]
    fn test_storage_is_object_safe() {
        let store: Box<dyn Storage> = Box::new(MockStorage::new());
        assert_eq!(store.current_version(), 0);
    }

    #[test]
    fn test_apply_batch_then_scan_both_directions() {
        let store = MockStorage::new();
        let writes = vec![
            (b"a".to_vec(), b"1".to_vec()),
            (b"b".to_vec(), b"2".to_vec()),
            (b"c".to_vec(), b"3".to_vec()),
        ];
        store.apply_batch(&writes, &[], 1).unwrap();

        let fwd: Vec<_> = store.scan_range(b"a", Some(b"c".as_slice()), false).unwrap();
        assert_eq!(fwd.iter().map(|(k, _)| k.as_slice()).collect::<Vec<_>>(), vec![b"a".as_slice(), b"b".as_slice()]);

        let rev: Vec<_> = store.scan_range(b"a", None, true).unwrap();
        assert_eq!(rev[0].0, b"c".to_vec());
        assert_eq!(rev[0].1.version, 1);
    }

    #[test]
    fn test_snapshot_is_isolated_from_later_batches() {
        let store = MockStorage::new();
        store.apply_batch(&[(b"k".to_vec(), b"v1".to_vec())], &[], 1).unwrap();
        let snap = store.snapshot();

        store.apply_batch(&[(b"k".to_vec(), b"v2".to_vec())], &[], 2).unwrap();
        store.apply_batch(&[], &[b"k".to_vec()], 3).unwrap();

        assert_eq!(snap.get(b"k").unwrap().unwrap().value, b"v1".to_vec());
        assert_eq!(snap.version(), 1);
        assert!(store.get(b"k").unwrap().is_none());
        assert_eq!(store.current_version(), 3);
    }

    #[test]
    fn test_size_of_range_counts_keys_and_values() {
        let store = MockStorage::new();
        store
            .apply_batch(&[(b"ab".to_vec(), b"xyz".to_vec())], &[], 1)
            .unwrap();
        assert_eq!(store.size_of_range(b"a", None).unwrap(), 5);
        assert_eq!(store.snapshot().size_of_range(b"b", None).unwrap(), 0);
    }
}
