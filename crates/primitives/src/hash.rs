//! Hash: a named map of byte keys to byte values
//!
//! ## Design
//!
//! A `Hash` is a cheap handle: an `Arc<Database>` plus the resolved
//! [`CollectionHandle`]. Entries live at `prefix ++ key`; the live entry
//! count lives at the collection's count key and is updated in the same
//! transaction as every insert and delete, so `len()` never scans.
//!
//! ## API
//!
//! - **Single-Operation API**: `get`, `set`, `delete`, `pop`, `union`, ...
//!   Each operation runs in its own transaction and retries conflicts with
//!   the database's retry policy.
//!
//! - **Multi-Operation API**: `transaction` / `view` with [`HashTransaction`]
//!   Multiple operations run atomically in a single transaction.
//!
//! - **Bound API**: `bind(txn)` scopes the hash to a caller-managed
//!   transaction, so several collections can change atomically.
//!
//! ## Dropped Handles
//!
//! After `drop_collection()` every operation on this handle, or on any handle
//! resolved to the same prefix, fails with `CollectionDropped`.

use std::ops::Bound;
use std::sync::Arc;

use tracing::debug;

use kdb_concurrency::TransactionContext;
use kdb_core::json::{self, PathSegment};
use kdb_core::{CollectionKind, KdbError, KdbResult, Prefix};
use kdb_engine::counter::{adjust_counter, read_counter};
use kdb_engine::prefix::get_prefix;
use kdb_engine::scan::{self, Direction, ScanControl};
use kdb_engine::{CollectionHandle, Database};

use crate::extensions::{CollectionScope, EntryReader, EntryScanner, EntryVisitor, EntryWriter};

/// Named byte map stored in a shared [`Database`]
///
/// # Example
///
/// ```ignore
/// use kdb_primitives::{CollectionsExt, Hash};
///
/// let db = Database::open("/path/to/data")?;
/// let users = db.hash(b"users")?;
///
/// users.set(b"alice", b"admin")?;
/// assert_eq!(users.get(b"alice")?, Some(b"admin".to_vec()));
/// assert_eq!(users.len()?, 1);
/// ```
#[derive(Clone)]
pub struct Hash {
    db: Arc<Database>,
    handle: Arc<CollectionHandle>,
}

impl std::fmt::Debug for Hash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Hash")
            .field("name", &String::from_utf8_lossy(self.handle.name()))
            .field("prefix", self.handle.prefix())
            .field("dropped", &self.handle.is_dropped())
            .finish()
    }
}

impl Hash {
    /// Open the hash named `name`, creating it on first use
    pub fn open(db: Arc<Database>, name: &[u8]) -> KdbResult<Self> {
        let handle = db
            .collection(CollectionKind::Hash, name)
            .map_err(|e| e.with_operation("hash.open"))?;
        Ok(Self { db, handle })
    }

    /// Open the hash named `name` only if it already exists
    pub fn existing(db: Arc<Database>, name: &[u8]) -> KdbResult<Option<Self>> {
        let handle = db
            .existing_collection(CollectionKind::Hash, name)
            .map_err(|e| e.with_operation("hash.open"))?;
        Ok(handle.map(|handle| Self { db, handle }))
    }

    /// Hash name
    pub fn name(&self) -> &[u8] {
        self.handle.name()
    }

    /// Prefix owning this hash's entries
    pub fn prefix(&self) -> &Prefix {
        self.handle.prefix()
    }

    /// The underlying database
    pub fn database(&self) -> &Arc<Database> {
        &self.db
    }

    /// True once this hash was dropped through this handle or a clone
    pub fn is_dropped(&self) -> bool {
        self.handle.is_dropped()
    }

    fn run<T, F>(&self, operation: &'static str, mut f: F) -> KdbResult<T>
    where
        F: FnMut(&mut HashTransaction<'_>) -> KdbResult<T>,
    {
        self.db
            .transaction_with_default_retry(|txn| {
                let mut hash = HashTransaction::new(txn, &self.handle)?;
                f(&mut hash)
            })
            .map_err(|e| e.with_operation(operation))
    }

    // ========== Single-Operation API ==========

    /// Value stored under `key`
    pub fn get(&self, key: &[u8]) -> KdbResult<Option<Vec<u8>>> {
        self.run("hash.get", |h| h.get(key))
    }

    /// Element at `path` inside the JSON document stored under `key`
    pub fn get_json(&self, key: &[u8], path: &[PathSegment]) -> KdbResult<Option<serde_json::Value>> {
        self.run("hash.get_json", |h| h.get_json(key, path))
    }

    /// Values for several keys from one snapshot, in input order
    pub fn get_many<K: AsRef<[u8]>>(&self, keys: &[K]) -> KdbResult<Vec<Option<Vec<u8>>>> {
        self.run("hash.get_many", |h| h.get_many(keys))
    }

    /// Insert or overwrite `key`
    pub fn set(&self, key: &[u8], value: &[u8]) -> KdbResult<()> {
        self.run("hash.set", |h| h.set(key, value))
    }

    /// Insert or overwrite several keys atomically
    pub fn set_many<K: AsRef<[u8]>, V: AsRef<[u8]>>(&self, pairs: &[(K, V)]) -> KdbResult<()> {
        self.run("hash.set_many", |h| h.set_many(pairs))
    }

    /// Store `value` under `key`, returning the value it replaced
    pub fn get_set(&self, key: &[u8], value: &[u8]) -> KdbResult<Option<Vec<u8>>> {
        self.run("hash.get_set", |h| h.get_set(key, value))
    }

    /// Remove `keys`; returns how many were present
    pub fn delete<K: AsRef<[u8]>>(&self, keys: &[K]) -> KdbResult<u64> {
        self.run("hash.delete", |h| h.delete(keys))
    }

    /// True when `key` is present
    pub fn exists(&self, key: &[u8]) -> KdbResult<bool> {
        self.run("hash.exists", |h| h.exists(key))
    }

    /// Number of entries
    pub fn len(&self) -> KdbResult<u64> {
        self.run("hash.len", |h| h.len())
    }

    /// True when the hash holds no entries
    pub fn is_empty(&self) -> KdbResult<bool> {
        Ok(self.len()? == 0)
    }

    /// Pop entries from the highest key down while `visit` continues
    ///
    /// `Continue` deletes the visited entry, `Stop` keeps it and ends the pop,
    /// and an error aborts the whole pop. Returns the number deleted.
    pub fn pop<F>(&self, mut visit: F) -> KdbResult<u64>
    where
        F: FnMut(&[u8], &[u8]) -> KdbResult<ScanControl>,
    {
        self.run("hash.pop", |h| h.pop(&mut visit))
    }

    /// Like [`Hash::pop`], deleting at most `n` entries
    pub fn pop_n<F>(&self, n: u64, mut visit: F) -> KdbResult<u64>
    where
        F: FnMut(&[u8], &[u8]) -> KdbResult<ScanControl>,
    {
        self.run("hash.pop_n", |h| h.pop_n(n, &mut visit))
    }

    /// Pop up to `n` uniformly chosen entries, visited in key order
    pub fn pop_random<F>(&self, n: u64, mut visit: F) -> KdbResult<u64>
    where
        F: FnMut(&[u8], &[u8]) -> KdbResult<ScanControl>,
    {
        self.run("hash.pop_random", |h| h.pop_random(n, &mut visit))
    }

    /// Visit up to `n` uniformly chosen entries without removing them
    pub fn random<F>(&self, n: u64, mut visit: F) -> KdbResult<()>
    where
        F: FnMut(&[u8], &[u8]) -> KdbResult<ScanControl>,
    {
        self.run("hash.random", |h| h.random(n, &mut visit))
    }

    /// Visit entries in ascending key order
    pub fn range<F>(&self, mut visit: F) -> KdbResult<()>
    where
        F: FnMut(&[u8], &[u8]) -> KdbResult<ScanControl>,
    {
        self.run("hash.range", |h| h.range(&mut visit))
    }

    /// Visit entries whose key lies within the given bounds, ascending
    pub fn range_between<F>(&self, start: Bound<&[u8]>, end: Bound<&[u8]>, mut visit: F) -> KdbResult<()>
    where
        F: FnMut(&[u8], &[u8]) -> KdbResult<ScanControl>,
    {
        self.run("hash.range_between", |h| h.range_between(start, end, &mut visit))
    }

    /// Visit entries in descending key order
    pub fn reverse<F>(&self, mut visit: F) -> KdbResult<()>
    where
        F: FnMut(&[u8], &[u8]) -> KdbResult<ScanControl>,
    {
        self.run("hash.reverse", |h| h.reverse(&mut visit))
    }

    /// Visit entries whose key matches the regular expression `pattern`
    pub fn range_with_pattern<F>(&self, pattern: &str, mut visit: F) -> KdbResult<()>
    where
        F: FnMut(&[u8], &[u8]) -> KdbResult<ScanControl>,
    {
        self.run("hash.range_with_pattern", |h| h.range_with_pattern(pattern, &mut visit))
    }

    /// Visit entries for which `predicate(key, value)` holds
    pub fn range_with_filter<P, F>(&self, mut predicate: P, mut visit: F) -> KdbResult<()>
    where
        P: FnMut(&[u8], &[u8]) -> bool,
        F: FnMut(&[u8], &[u8]) -> KdbResult<ScanControl>,
    {
        self.run("hash.range_with_filter", |h| h.range_with_filter(&mut predicate, &mut visit))
    }

    /// Every entry, ascending
    pub fn entries(&self) -> KdbResult<Vec<(Vec<u8>, Vec<u8>)>> {
        self.run("hash.entries", |h| h.entries())
    }

    /// Every key, ascending
    pub fn keys(&self) -> KdbResult<Vec<Vec<u8>>> {
        self.run("hash.keys", |h| h.keys())
    }

    /// Replace every value with `f(key, value)` in one transaction
    ///
    /// Returns the number of entries rewritten.
    pub fn map<F>(&self, mut f: F) -> KdbResult<u64>
    where
        F: FnMut(&[u8], &[u8]) -> KdbResult<Vec<u8>>,
    {
        self.run("hash.map", |h| h.map(&mut f))
    }

    /// Move every entry of the hashes named in `others` into this one
    ///
    /// Each source is merged in its own transaction. Colliding keys take the
    /// source's value. Sources stay registered and empty; drop them to reuse
    /// their prefixes. Absent sources are skipped. Returns the number of
    /// entries moved.
    pub fn union<K: AsRef<[u8]>>(&self, others: &[K]) -> KdbResult<u64> {
        if others.iter().any(|name| name.as_ref() == self.name()) {
            return Err(KdbError::invalid_input("cannot union a hash with itself").with_operation("hash.union"));
        }

        let mut moved = 0;
        for other in others {
            let source = other.as_ref();
            let n = self.run("hash.union", |h| h.union_from(source))?;
            debug!(
                target: "kdb::collection",
                into = %String::from_utf8_lossy(self.name()),
                from = %String::from_utf8_lossy(source),
                moved = n,
                "Hash union"
            );
            moved += n;
        }
        Ok(moved)
    }

    /// Estimated bytes stored, from the engine's size estimate
    pub fn approximate_size(&self) -> KdbResult<u64> {
        self.run("hash.approximate_size", |h| h.approximate_size())
    }

    /// Delete every entry and release the prefix; returns the entries removed
    pub fn drop_collection(&self) -> KdbResult<u64> {
        self.db
            .drop_collection(&self.handle)
            .map_err(|e| e.with_operation("hash.drop"))
    }

    // ========== Multi-Operation API ==========

    /// Run several operations atomically, retrying conflicts
    ///
    /// The closure may run more than once.
    ///
    /// # Example
    ///
    /// ```ignore
    /// counters.transaction(|h| {
    ///     let hits = h.get(b"hits")?.map_or(0, |v| v[0]);
    ///     h.set(b"hits", &[hits + 1])
    /// })?;
    /// ```
    pub fn transaction<T, F>(&self, f: F) -> KdbResult<T>
    where
        F: FnMut(&mut HashTransaction<'_>) -> KdbResult<T>,
    {
        self.run("hash.transaction", f)
    }

    /// Run read-only operations against one snapshot
    ///
    /// Any write inside the closure fails the view with `InvalidInput` and
    /// nothing is committed.
    pub fn view<T, F>(&self, mut f: F) -> KdbResult<T>
    where
        F: FnMut(&mut HashTransaction<'_>) -> KdbResult<T>,
    {
        self.run("hash.view", |h| {
            let out = f(h)?;
            if !h.txn.is_read_only() {
                return Err(KdbError::invalid_input("write attempted inside a read-only view"));
            }
            Ok(out)
        })
    }

    /// Scope this hash to a caller-managed transaction
    pub fn bind<'a>(&'a self, txn: &'a mut TransactionContext) -> KdbResult<HashTransaction<'a>> {
        HashTransaction::new(txn, &self.handle)
    }
}

/// Hash operations within one transaction
///
/// Created by [`Hash::transaction`], [`Hash::view`] or [`Hash::bind`]. All
/// changes become visible together when the transaction commits.
pub struct HashTransaction<'a> {
    txn: &'a mut TransactionContext,
    handle: &'a CollectionHandle,
}

impl<'a> HashTransaction<'a> {
    /// Bind `handle` to `txn`, failing if the hash has been dropped
    pub fn new(txn: &'a mut TransactionContext, handle: &'a CollectionHandle) -> KdbResult<Self> {
        if handle.kind() != CollectionKind::Hash {
            return Err(KdbError::invariant(format!(
                "{} '{}' bound as a hash",
                handle.kind(),
                String::from_utf8_lossy(handle.name())
            )));
        }
        handle.ensure_live(txn)?;
        Ok(Self { txn, handle })
    }

    fn entry_key(&self, key: &[u8]) -> KdbResult<Vec<u8>> {
        if key.is_empty() {
            return Err(KdbError::invalid_input("hash key must not be empty"));
        }
        Ok(self.handle.prefix().entry_key(key))
    }

    fn adjust_count(&mut self, delta: i64) -> KdbResult<u64> {
        let handle = self.handle;
        adjust_counter(self.txn, &handle.prefix().count_key(), delta)
    }

    /// Value stored under `key`
    pub fn get(&mut self, key: &[u8]) -> KdbResult<Option<Vec<u8>>> {
        let key = self.entry_key(key)?;
        self.txn.get(&key)
    }

    /// Element at `path` inside the JSON document stored under `key`
    ///
    /// `None` when the key is absent or the path does not resolve. A value
    /// that is not JSON is `InvalidInput`.
    pub fn get_json(&mut self, key: &[u8], path: &[PathSegment]) -> KdbResult<Option<serde_json::Value>> {
        match self.get(key)? {
            None => Ok(None),
            Some(bytes) => json::lookup(&bytes, path),
        }
    }

    /// Values for several keys, in input order
    pub fn get_many<K: AsRef<[u8]>>(&mut self, keys: &[K]) -> KdbResult<Vec<Option<Vec<u8>>>> {
        keys.iter().map(|key| self.get(key.as_ref())).collect()
    }

    /// True when `key` is present
    pub fn exists(&mut self, key: &[u8]) -> KdbResult<bool> {
        let key = self.entry_key(key)?;
        self.txn.exists(&key)
    }

    /// Insert or overwrite `key`
    pub fn set(&mut self, key: &[u8], value: &[u8]) -> KdbResult<()> {
        self.get_set(key, value).map(|_| ())
    }

    /// Insert or overwrite several keys; a key repeated in `pairs` counts once
    pub fn set_many<K: AsRef<[u8]>, V: AsRef<[u8]>>(&mut self, pairs: &[(K, V)]) -> KdbResult<()> {
        for (key, value) in pairs {
            self.set(key.as_ref(), value.as_ref())?;
        }
        Ok(())
    }

    /// Store `value` under `key`, returning the value it replaced
    pub fn get_set(&mut self, key: &[u8], value: &[u8]) -> KdbResult<Option<Vec<u8>>> {
        let key = self.entry_key(key)?;
        let previous = self.txn.get(&key)?;
        self.txn.put(key, value.to_vec())?;
        if previous.is_none() {
            self.adjust_count(1)?;
        }
        Ok(previous)
    }

    /// Remove `keys`; the count drops by the number confirmed present
    pub fn delete<K: AsRef<[u8]>>(&mut self, keys: &[K]) -> KdbResult<u64> {
        let mut removed = 0u64;
        for key in keys {
            let key = self.entry_key(key.as_ref())?;
            if self.txn.exists(&key)? {
                self.txn.delete(key)?;
                removed += 1;
            }
        }
        if removed > 0 {
            self.adjust_count(-(removed as i64))?;
        }
        Ok(removed)
    }

    /// Number of entries
    pub fn len(&mut self) -> KdbResult<u64> {
        let handle = self.handle;
        read_counter(self.txn, &handle.prefix().count_key())
    }

    /// True when the hash holds no entries
    pub fn is_empty(&mut self) -> KdbResult<bool> {
        Ok(self.len()? == 0)
    }

    /// Pop entries from the highest key down while `visit` continues
    pub fn pop<F>(&mut self, visit: F) -> KdbResult<u64>
    where
        F: FnMut(&[u8], &[u8]) -> KdbResult<ScanControl>,
    {
        self.pop_n(u64::MAX, visit)
    }

    /// Pop at most `n` entries from the highest key down
    pub fn pop_n<F>(&mut self, n: u64, visit: F) -> KdbResult<u64>
    where
        F: FnMut(&[u8], &[u8]) -> KdbResult<ScanControl>,
    {
        if n == 0 {
            return Ok(0);
        }
        let handle = self.handle;
        let mut candidates = Vec::new();
        scan::scan(self.txn, handle.prefix(), Direction::Reverse, |key, value| {
            candidates.push((key.to_vec(), value.to_vec()));
            if candidates.len() as u64 >= n {
                Ok(ScanControl::Stop)
            } else {
                Ok(ScanControl::Continue)
            }
        })?;
        self.consume(candidates, visit)
    }

    /// Pop up to `n` uniformly chosen entries, visited in key order
    pub fn pop_random<F>(&mut self, n: u64, visit: F) -> KdbResult<u64>
    where
        F: FnMut(&[u8], &[u8]) -> KdbResult<ScanControl>,
    {
        let count = self.len()?;
        let handle = self.handle;
        let mut candidates = Vec::new();
        scan::random_scan(self.txn, handle.prefix(), count, n, |key, value| {
            candidates.push((key.to_vec(), value.to_vec()));
            Ok(ScanControl::Continue)
        })?;
        self.consume(candidates, visit)
    }

    /// Visit-then-delete each candidate until `visit` stops
    fn consume<F>(&mut self, candidates: Vec<(Vec<u8>, Vec<u8>)>, mut visit: F) -> KdbResult<u64>
    where
        F: FnMut(&[u8], &[u8]) -> KdbResult<ScanControl>,
    {
        let handle = self.handle;
        let mut removed = 0u64;
        for (key, value) in candidates {
            if visit(&key, &value)? == ScanControl::Stop {
                break;
            }
            self.txn.delete(handle.prefix().entry_key(&key))?;
            removed += 1;
        }
        if removed > 0 {
            self.adjust_count(-(removed as i64))?;
        }
        Ok(removed)
    }

    /// Visit up to `n` uniformly chosen entries without removing them
    pub fn random<F>(&mut self, n: u64, visit: F) -> KdbResult<()>
    where
        F: FnMut(&[u8], &[u8]) -> KdbResult<ScanControl>,
    {
        let count = self.len()?;
        let handle = self.handle;
        scan::random_scan(self.txn, handle.prefix(), count, n, visit)
    }

    /// Visit entries in ascending key order
    pub fn range<F>(&mut self, visit: F) -> KdbResult<()>
    where
        F: FnMut(&[u8], &[u8]) -> KdbResult<ScanControl>,
    {
        let handle = self.handle;
        scan::scan(self.txn, handle.prefix(), Direction::Forward, visit)
    }

    /// Visit entries whose key lies within the given bounds, ascending
    pub fn range_between<F>(&mut self, start: Bound<&[u8]>, end: Bound<&[u8]>, visit: F) -> KdbResult<()>
    where
        F: FnMut(&[u8], &[u8]) -> KdbResult<ScanControl>,
    {
        let handle = self.handle;
        scan::scan_range(self.txn, handle.prefix(), start, end, Direction::Forward, visit)
    }

    /// Visit entries in descending key order
    pub fn reverse<F>(&mut self, visit: F) -> KdbResult<()>
    where
        F: FnMut(&[u8], &[u8]) -> KdbResult<ScanControl>,
    {
        let handle = self.handle;
        scan::scan(self.txn, handle.prefix(), Direction::Reverse, visit)
    }

    /// Visit entries whose key matches the regular expression `pattern`
    pub fn range_with_pattern<F>(&mut self, pattern: &str, visit: F) -> KdbResult<()>
    where
        F: FnMut(&[u8], &[u8]) -> KdbResult<ScanControl>,
    {
        let handle = self.handle;
        scan::scan_with_pattern(self.txn, handle.prefix(), Direction::Forward, pattern, visit)
    }

    /// Visit entries for which `predicate(key, value)` holds
    pub fn range_with_filter<P, F>(&mut self, predicate: P, visit: F) -> KdbResult<()>
    where
        P: FnMut(&[u8], &[u8]) -> bool,
        F: FnMut(&[u8], &[u8]) -> KdbResult<ScanControl>,
    {
        let handle = self.handle;
        scan::scan_with_filter(self.txn, handle.prefix(), Direction::Forward, predicate, visit)
    }

    /// Every entry, ascending
    pub fn entries(&mut self) -> KdbResult<Vec<(Vec<u8>, Vec<u8>)>> {
        let handle = self.handle;
        scan::entries(self.txn, handle.prefix(), Direction::Forward)
    }

    /// Every key, ascending
    pub fn keys(&mut self) -> KdbResult<Vec<Vec<u8>>> {
        Ok(self.entries()?.into_iter().map(|(key, _)| key).collect())
    }

    /// Replace every value with `f(key, value)`
    pub fn map<F>(&mut self, mut f: F) -> KdbResult<u64>
    where
        F: FnMut(&[u8], &[u8]) -> KdbResult<Vec<u8>>,
    {
        let handle = self.handle;
        let mut rewritten = 0u64;
        for (key, value) in self.entries()? {
            let new_value = f(&key, &value)?;
            self.txn.put(handle.prefix().entry_key(&key), new_value)?;
            rewritten += 1;
        }
        Ok(rewritten)
    }

    /// Move every entry of each named hash into this one
    pub fn union<K: AsRef<[u8]>>(&mut self, others: &[K]) -> KdbResult<u64> {
        let mut moved = 0;
        for other in others {
            moved += self.union_from(other.as_ref())?;
        }
        Ok(moved)
    }

    /// Move every entry of the hash named `source` into this one
    fn union_from(&mut self, source: &[u8]) -> KdbResult<u64> {
        let handle = self.handle;
        if source == handle.name() {
            return Err(KdbError::invalid_input("cannot union a hash with itself"));
        }
        let Some(source_prefix) = get_prefix(self.txn, CollectionKind::Hash, source)? else {
            return Ok(0);
        };

        let moving = scan::entries(self.txn, &source_prefix, Direction::Forward)?;
        let mut added = 0i64;
        for (key, value) in &moving {
            let target = handle.prefix().entry_key(key);
            if !self.txn.exists(&target)? {
                added += 1;
            }
            self.txn.put(target, value.clone())?;
            self.txn.delete(source_prefix.entry_key(key))?;
        }

        if added > 0 {
            self.adjust_count(added)?;
        }
        // Reads the source count even when nothing moved, so a concurrent
        // insert into the source conflicts
        adjust_counter(self.txn, &source_prefix.count_key(), -(moving.len() as i64))?;
        Ok(moving.len() as u64)
    }

    /// Estimated bytes stored, as of the transaction's snapshot
    pub fn approximate_size(&self) -> KdbResult<u64> {
        scan::approximate_size(&*self.txn, self.handle.prefix())
    }

    /// The underlying transaction
    pub fn txn(&mut self) -> &mut TransactionContext {
        &mut *self.txn
    }
}

// ========== Capability traits ==========

impl CollectionScope for HashTransaction<'_> {
    fn name(&self) -> &[u8] {
        self.handle.name()
    }

    fn kind(&self) -> CollectionKind {
        CollectionKind::Hash
    }

    fn prefix(&self) -> &Prefix {
        self.handle.prefix()
    }
}

impl EntryReader for HashTransaction<'_> {
    fn get(&mut self, key: &[u8]) -> KdbResult<Option<Vec<u8>>> {
        HashTransaction::get(self, key)
    }

    fn exists(&mut self, key: &[u8]) -> KdbResult<bool> {
        HashTransaction::exists(self, key)
    }

    fn len(&mut self) -> KdbResult<u64> {
        HashTransaction::len(self)
    }
}

impl EntryWriter for HashTransaction<'_> {
    fn set(&mut self, key: &[u8], value: &[u8]) -> KdbResult<()> {
        HashTransaction::set(self, key, value)
    }

    fn delete(&mut self, key: &[u8]) -> KdbResult<bool> {
        Ok(HashTransaction::delete(self, &[key])? == 1)
    }
}

impl EntryScanner for HashTransaction<'_> {
    fn range(&mut self, visit: &mut EntryVisitor<'_>) -> KdbResult<()> {
        HashTransaction::range(self, visit)
    }

    fn reverse(&mut self, visit: &mut EntryVisitor<'_>) -> KdbResult<()> {
        HashTransaction::reverse(self, visit)
    }
}
