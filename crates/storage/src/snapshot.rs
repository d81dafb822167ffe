//! SharedSnapshotView: point-in-time view sharing the store's map
//!
//! A snapshot holds an `Arc` of the map that was current when it was taken.
//! The store never mutates a map that a snapshot still references (it copies
//! on write), so the view is immutable for its whole lifetime and can be
//! shared freely across threads.

use std::sync::Arc;

use kdb_core::{KdbResult, ScanItem, SnapshotView, VersionedValue};

use crate::unified::{scan_map, size_of_map_range, OrderedMap};

/// Immutable snapshot produced by [`crate::UnifiedStore::create_snapshot`]
#[derive(Debug, Clone)]
pub struct SharedSnapshotView {
    /// The version at which this snapshot was created
    version: u64,
    data: Arc<OrderedMap>,
}

impl SharedSnapshotView {
    pub(crate) fn new(version: u64, data: Arc<OrderedMap>) -> Self {
        Self { version, data }
    }

    /// Number of keys visible in the snapshot
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// True when the snapshot holds no keys
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Iterate every entry in key order without copying
    pub fn iter(&self) -> impl Iterator<Item = (&[u8], &VersionedValue)> + '_ {
        self.data.iter().map(|(k, v)| (k.as_slice(), v))
    }
}

impl SnapshotView for SharedSnapshotView {
    fn get(&self, key: &[u8]) -> KdbResult<Option<VersionedValue>> {
        Ok(self.data.get(key).cloned())
    }

    fn scan_range(&self, start: &[u8], end: Option<&[u8]>, reverse: bool) -> KdbResult<Vec<ScanItem>> {
        Ok(scan_map(&self.data, start, end, reverse))
    }

    fn size_of_range(&self, start: &[u8], end: Option<&[u8]>) -> KdbResult<u64> {
        Ok(size_of_map_range(&self.data, start, end))
    }

    fn version(&self) -> u64 {
        self.version
    }
}
