//! UnifiedStore: ordered in-memory storage with version management
//!
//! This module implements the Storage trait using:
//! - `BTreeMap<Vec<u8>, VersionedValue>` for ordered byte keys
//! - `parking_lot::RwLock` around an `Arc` of the map
//! - `AtomicU64` for the highest applied commit version
//!
//! # Design Notes
//!
//! - **No version history**: each key stores only its latest value. Transaction
//!   isolation comes from snapshots, not from multi-versioned keys.
//! - **Copy-on-write snapshots**: a snapshot is an `Arc` clone of the current map
//!   (O(1)). `apply_batch` mutates through `Arc::make_mut`, which clones the map
//!   only while some snapshot still shares it.
//! - **Batch atomicity**: a whole commit is applied under one write lock, so a
//!   snapshot sees either none or all of it.

use std::collections::BTreeMap;
use std::ops::Bound;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;

use kdb_core::{KdbResult, ScanItem, Storage, VersionedValue};

use crate::snapshot::SharedSnapshotView;

pub(crate) type OrderedMap = BTreeMap<Vec<u8>, VersionedValue>;

/// Ordered storage backend using BTreeMap with RwLock
///
/// Thread-safe through `parking_lot::RwLock` and `AtomicU64`.
#[derive(Debug)]
pub struct UnifiedStore {
    /// Current committed state, shared with outstanding snapshots
    data: RwLock<Arc<OrderedMap>>,
    /// Highest commit version applied
    version: AtomicU64,
}

impl UnifiedStore {
    /// Create a new empty UnifiedStore at version 0
    pub fn new() -> Self {
        Self {
            data: RwLock::new(Arc::new(BTreeMap::new())),
            version: AtomicU64::new(0),
        }
    }

    /// Rebuild a store from persisted entries, e.g. a checkpoint
    pub fn from_entries<I>(entries: I, version: u64) -> Self
    where
        I: IntoIterator<Item = (Vec<u8>, VersionedValue)>,
    {
        let map: OrderedMap = entries.into_iter().collect();
        Self {
            data: RwLock::new(Arc::new(map)),
            version: AtomicU64::new(version),
        }
    }

    /// Create a snapshot of the current state
    ///
    /// The read lock is taken before the version is read so the pair
    /// (data, version) always describes the same committed state.
    pub fn create_snapshot(&self) -> SharedSnapshotView {
        let data = self.data.read();
        let version = self.current_version();
        SharedSnapshotView::new(version, Arc::clone(&data))
    }

    /// Number of live keys
    pub fn len(&self) -> usize {
        self.data.read().len()
    }

    /// True when the store holds no keys
    pub fn is_empty(&self) -> bool {
        self.data.read().is_empty()
    }
}

impl Default for UnifiedStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Collect `[start, end)` from an ordered map in either direction
pub(crate) fn scan_map(
    data: &OrderedMap,
    start: &[u8],
    end: Option<&[u8]>,
    reverse: bool,
) -> Vec<ScanItem> {
    if let Some(end) = end {
        if start >= end {
            return Vec::new();
        }
    }
    let upper = match end {
        Some(end) => Bound::Excluded(end),
        None => Bound::Unbounded,
    };
    let range = data.range::<[u8], _>((Bound::Included(start), upper));
    let items = range.map(|(k, v)| (k.clone(), v.clone()));
    if reverse {
        items.rev().collect()
    } else {
        items.collect()
    }
}

/// Sum of key and value lengths in `[start, end)`
pub(crate) fn size_of_map_range(data: &OrderedMap, start: &[u8], end: Option<&[u8]>) -> u64 {
    if let Some(end) = end {
        if start >= end {
            return 0;
        }
    }
    let upper = match end {
        Some(end) => Bound::Excluded(end),
        None => Bound::Unbounded,
    };
    data.range::<[u8], _>((Bound::Included(start), upper))
        .map(|(k, v)| (k.len() + v.value.len()) as u64)
        .sum()
}

impl Storage for UnifiedStore {
    fn get(&self, key: &[u8]) -> KdbResult<Option<VersionedValue>> {
        Ok(self.data.read().get(key).cloned())
    }

    fn scan_range(&self, start: &[u8], end: Option<&[u8]>, reverse: bool) -> KdbResult<Vec<ScanItem>> {
        let data = self.data.read();
        Ok(scan_map(&data, start, end, reverse))
    }

    fn size_of_range(&self, start: &[u8], end: Option<&[u8]>) -> KdbResult<u64> {
        let data = self.data.read();
        Ok(size_of_map_range(&data, start, end))
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
        let mut guard = self.data.write();
        let data = Arc::make_mut(&mut *guard);

        for (key, value) in writes {
            data.insert(key.clone(), VersionedValue::new(value.clone(), version));
        }
        for key in deletes {
            data.remove(key);
        }

        // Still under the write lock: snapshots pair data and version consistently
        self.version.fetch_max(version, Ordering::SeqCst);
        Ok(())
    }
}
