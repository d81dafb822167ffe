//! Global database registry for singleton management
//!
//! Ensures only one Database instance exists per filesystem path.
//! Uses weak references so a database leaves the registry once every handle
//! has been dropped.

use once_cell::sync::Lazy;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Weak;

use super::Database;

// =============================================================================
// Global Database Registry
// =============================================================================
//
// Opening the same path twice returns the same Database instance, so two
// instances can never hold diverging in-memory stores over one checkpoint
// file. The exclusive lock file covers other processes.

/// Global registry of open databases (path -> weak reference)
pub static OPEN_DATABASES: Lazy<Mutex<HashMap<PathBuf, Weak<Database>>>> =
    Lazy::new(|| Mutex::new(HashMap::new()));

/// Remove `path` unless a live instance registered there since
pub(crate) fn unregister(path: &Path) {
    let mut registry = OPEN_DATABASES.lock();
    if let Some(weak) = registry.get(path) {
        if weak.strong_count() == 0 {
            registry.remove(path);
        }
    }
}

/// Remove `path` unconditionally (explicit close)
pub(crate) fn unregister_closed(path: &Path) {
    OPEN_DATABASES.lock().remove(path);
}
