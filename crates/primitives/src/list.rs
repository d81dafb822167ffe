//! List: a named sequence of byte values addressed by index
//!
//! ## Layout
//!
//! Element `i` lives at `prefix ++ u64::to_be_bytes(i)`, so key order is
//! index order. New indices come from the list's sequence key, a permanent
//! counter that only grows. Pops never renumber the remaining elements, and
//! a push after a left pop can never collide with a live index.
//!
//! The element count is kept at the count key, like [`crate::Hash`].
//!
//! ## API
//!
//! Standalone operations each run in their own retrying transaction;
//! `transaction`, `view` and `bind` group several operations atomically
//! through [`ListTransaction`].

use std::ops::Bound;
use std::sync::Arc;

use kdb_concurrency::TransactionContext;
use kdb_core::keys::{decode_index, encode_index};
use kdb_core::{CollectionKind, KdbError, KdbResult, Prefix};
use kdb_engine::counter::{adjust_counter, read_counter, write_counter};
use kdb_engine::scan::{self, Direction, ScanControl};
use kdb_engine::{CollectionHandle, Database};

use crate::extensions::{CollectionScope, EntryScanner, EntryVisitor};

/// Named index-addressed sequence stored in a shared [`Database`]
///
/// # Example
///
/// ```ignore
/// use kdb_primitives::CollectionsExt;
///
/// let queue = db.list(b"jobs")?;
/// queue.push(&[b"a", b"b", b"c"])?;
/// assert_eq!(queue.pop_left()?, Some(b"a".to_vec()));
/// assert_eq!(queue.pop_right()?, Some(b"c".to_vec()));
/// ```
#[derive(Clone)]
pub struct List {
    db: Arc<Database>,
    handle: Arc<CollectionHandle>,
}

impl std::fmt::Debug for List {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("List")
            .field("name", &String::from_utf8_lossy(self.handle.name()))
            .field("prefix", self.handle.prefix())
            .field("dropped", &self.handle.is_dropped())
            .finish()
    }
}

impl List {
    /// Open the list named `name`, creating it on first use
    pub fn open(db: Arc<Database>, name: &[u8]) -> KdbResult<Self> {
        let handle = db
            .collection(CollectionKind::List, name)
            .map_err(|e| e.with_operation("list.open"))?;
        Ok(Self { db, handle })
    }

    /// Open the list named `name` only if it already exists
    pub fn existing(db: Arc<Database>, name: &[u8]) -> KdbResult<Option<Self>> {
        let handle = db
            .existing_collection(CollectionKind::List, name)
            .map_err(|e| e.with_operation("list.open"))?;
        Ok(handle.map(|handle| Self { db, handle }))
    }

    /// List name
    pub fn name(&self) -> &[u8] {
        self.handle.name()
    }

    /// Prefix owning this list's elements
    pub fn prefix(&self) -> &Prefix {
        self.handle.prefix()
    }

    /// The underlying database
    pub fn database(&self) -> &Arc<Database> {
        &self.db
    }

    /// True once this list was dropped through this handle or a clone
    pub fn is_dropped(&self) -> bool {
        self.handle.is_dropped()
    }

    fn run<T, F>(&self, operation: &'static str, mut f: F) -> KdbResult<T>
    where
        F: FnMut(&mut ListTransaction<'_>) -> KdbResult<T>,
    {
        self.db
            .transaction_with_default_retry(|txn| {
                let mut list = ListTransaction::new(txn, &self.handle)?;
                f(&mut list)
            })
            .map_err(|e| e.with_operation(operation))
    }

    // ========== Single-Operation API ==========

    /// Append `values`; returns the new length
    pub fn push<V: AsRef<[u8]>>(&self, values: &[V]) -> KdbResult<u64> {
        self.run("list.push", |l| l.push(values))
    }

    /// Remove and return the lowest-index element
    pub fn pop_left(&self) -> KdbResult<Option<Vec<u8>>> {
        self.run("list.pop_left", |l| l.pop_left())
    }

    /// Remove and return the highest-index element
    pub fn pop_right(&self) -> KdbResult<Option<Vec<u8>>> {
        self.run("list.pop_right", |l| l.pop_right())
    }

    /// Remove up to `n` elements from the left, in index order
    pub fn pop_left_n(&self, n: u64) -> KdbResult<Vec<Vec<u8>>> {
        self.run("list.pop_left_n", |l| l.pop_left_n(n))
    }

    /// Remove up to `n` elements from the right, highest index first
    pub fn pop_right_n(&self, n: u64) -> KdbResult<Vec<Vec<u8>>> {
        self.run("list.pop_right_n", |l| l.pop_right_n(n))
    }

    /// Element at index `i`
    pub fn index(&self, i: u64) -> KdbResult<Option<Vec<u8>>> {
        self.run("list.index", |l| l.index(i))
    }

    /// Overwrite the element at index `i`; `NotFound` if there is none
    pub fn set(&self, i: u64, value: &[u8]) -> KdbResult<()> {
        self.run("list.set", |l| l.set(i, value))
    }

    /// Lowest-index element with its index
    pub fn first(&self) -> KdbResult<Option<(u64, Vec<u8>)>> {
        self.run("list.first", |l| l.first())
    }

    /// Highest-index element with its index
    pub fn last(&self) -> KdbResult<Option<(u64, Vec<u8>)>> {
        self.run("list.last", |l| l.last())
    }

    /// Elements with indices in `[start, end]`, ascending
    pub fn range(&self, start: u64, end: u64) -> KdbResult<Vec<(u64, Vec<u8>)>> {
        self.run("list.range", |l| l.range(start, end))
    }

    /// The `n` highest-index elements, ascending
    pub fn last_n(&self, n: u64) -> KdbResult<Vec<(u64, Vec<u8>)>> {
        self.run("list.last_n", |l| l.last_n(n))
    }

    /// Every element, ascending
    pub fn entries(&self) -> KdbResult<Vec<(u64, Vec<u8>)>> {
        self.run("list.entries", |l| l.entries())
    }

    /// Number of elements
    pub fn len(&self) -> KdbResult<u64> {
        self.run("list.len", |l| l.len())
    }

    /// True when the list holds no elements
    pub fn is_empty(&self) -> KdbResult<bool> {
        Ok(self.len()? == 0)
    }

    /// Delete every element and release the prefix; returns the elements removed
    pub fn drop_collection(&self) -> KdbResult<u64> {
        self.db
            .drop_collection(&self.handle)
            .map_err(|e| e.with_operation("list.drop"))
    }

    // ========== Multi-Operation API ==========

    /// Run several operations atomically, retrying conflicts
    ///
    /// The closure may run more than once.
    pub fn transaction<T, F>(&self, f: F) -> KdbResult<T>
    where
        F: FnMut(&mut ListTransaction<'_>) -> KdbResult<T>,
    {
        self.run("list.transaction", f)
    }

    /// Run read-only operations against one snapshot
    ///
    /// Any write inside the closure fails the view with `InvalidInput`.
    pub fn view<T, F>(&self, mut f: F) -> KdbResult<T>
    where
        F: FnMut(&mut ListTransaction<'_>) -> KdbResult<T>,
    {
        self.run("list.view", |l| {
            let out = f(l)?;
            if !l.txn.is_read_only() {
                return Err(KdbError::invalid_input("write attempted inside a read-only view"));
            }
            Ok(out)
        })
    }

    /// Scope this list to a caller-managed transaction
    pub fn bind<'a>(&'a self, txn: &'a mut TransactionContext) -> KdbResult<ListTransaction<'a>> {
        ListTransaction::new(txn, &self.handle)
    }
}

/// List operations within one transaction
pub struct ListTransaction<'a> {
    txn: &'a mut TransactionContext,
    handle: &'a CollectionHandle,
}

impl<'a> ListTransaction<'a> {
    /// Bind `handle` to `txn`, failing if the list has been dropped
    pub fn new(txn: &'a mut TransactionContext, handle: &'a CollectionHandle) -> KdbResult<Self> {
        if handle.kind() != CollectionKind::List {
            return Err(KdbError::invariant(format!(
                "{} '{}' bound as a list",
                handle.kind(),
                String::from_utf8_lossy(handle.name())
            )));
        }
        handle.ensure_live(txn)?;
        Ok(Self { txn, handle })
    }

    fn element_key(&self, i: u64) -> Vec<u8> {
        self.handle.prefix().entry_key(&encode_index(i))
    }

    /// Append `values`; returns the new length
    pub fn push<V: AsRef<[u8]>>(&mut self, values: &[V]) -> KdbResult<u64> {
        if values.is_empty() {
            return self.len();
        }
        let handle = self.handle;
        let seq_key = handle.prefix().seq_key();
        let next = read_counter(self.txn, &seq_key)?;

        let mut index = next;
        for value in values {
            let key = self.element_key(index);
            self.txn.put(key, value.as_ref().to_vec())?;
            index = index
                .checked_add(1)
                .ok_or_else(|| KdbError::invariant("list index space exhausted"))?;
        }
        write_counter(self.txn, &seq_key, index)?;
        adjust_counter(self.txn, &handle.prefix().count_key(), values.len() as i64)
    }

    /// Remove and return the lowest-index element
    pub fn pop_left(&mut self) -> KdbResult<Option<Vec<u8>>> {
        Ok(self.pop_n(Direction::Forward, 1)?.pop())
    }

    /// Remove and return the highest-index element
    pub fn pop_right(&mut self) -> KdbResult<Option<Vec<u8>>> {
        Ok(self.pop_n(Direction::Reverse, 1)?.pop())
    }

    /// Remove up to `n` elements from the left, in index order
    pub fn pop_left_n(&mut self, n: u64) -> KdbResult<Vec<Vec<u8>>> {
        self.pop_n(Direction::Forward, n)
    }

    /// Remove up to `n` elements from the right, highest index first
    pub fn pop_right_n(&mut self, n: u64) -> KdbResult<Vec<Vec<u8>>> {
        self.pop_n(Direction::Reverse, n)
    }

    fn pop_n(&mut self, direction: Direction, n: u64) -> KdbResult<Vec<Vec<u8>>> {
        let taken = self.take(direction, n)?;
        if taken.is_empty() {
            return Ok(Vec::new());
        }
        for (i, _) in &taken {
            let key = self.element_key(*i);
            self.txn.delete(key)?;
        }
        let handle = self.handle;
        adjust_counter(self.txn, &handle.prefix().count_key(), -(taken.len() as i64))?;
        Ok(taken.into_iter().map(|(_, value)| value).collect())
    }

    /// Up to `n` elements from one end, in walk order
    fn take(&mut self, direction: Direction, n: u64) -> KdbResult<Vec<(u64, Vec<u8>)>> {
        if n == 0 {
            return Ok(Vec::new());
        }
        let handle = self.handle;
        let mut out = Vec::new();
        let mut malformed = None;
        scan::scan(self.txn, handle.prefix(), direction, |key, value| {
            match decode_index(key) {
                Some(i) => out.push((i, value.to_vec())),
                None => {
                    malformed = Some(key.to_vec());
                    return Ok(ScanControl::Stop);
                }
            }
            Ok(if out.len() as u64 >= n {
                ScanControl::Stop
            } else {
                ScanControl::Continue
            })
        })?;
        if let Some(key) = malformed {
            return Err(malformed_index(handle, &key));
        }
        Ok(out)
    }

    /// Element at index `i`
    pub fn index(&mut self, i: u64) -> KdbResult<Option<Vec<u8>>> {
        let key = self.element_key(i);
        self.txn.get(&key)
    }

    /// Overwrite the element at index `i`; `NotFound` if there is none
    pub fn set(&mut self, i: u64, value: &[u8]) -> KdbResult<()> {
        let key = self.element_key(i);
        if !self.txn.exists(&key)? {
            return Err(KdbError::not_found(format!(
                "index {} in list '{}'",
                i,
                String::from_utf8_lossy(self.handle.name())
            )));
        }
        self.txn.put(key, value.to_vec())
    }

    /// Lowest-index element with its index
    pub fn first(&mut self) -> KdbResult<Option<(u64, Vec<u8>)>> {
        Ok(self.take(Direction::Forward, 1)?.pop())
    }

    /// Highest-index element with its index
    pub fn last(&mut self) -> KdbResult<Option<(u64, Vec<u8>)>> {
        Ok(self.take(Direction::Reverse, 1)?.pop())
    }

    /// Elements with indices in `[start, end]`, ascending; empty when `start > end`
    pub fn range(&mut self, start: u64, end: u64) -> KdbResult<Vec<(u64, Vec<u8>)>> {
        if start > end {
            return Ok(Vec::new());
        }
        let (lo, hi) = (encode_index(start), encode_index(end));
        let handle = self.handle;
        let mut out = Vec::new();
        scan::scan_range(
            self.txn,
            handle.prefix(),
            Bound::Included(lo.as_slice()),
            Bound::Included(hi.as_slice()),
            Direction::Forward,
            |key, value| {
                let i = decode_index(key).ok_or_else(|| malformed_index(handle, key))?;
                out.push((i, value.to_vec()));
                Ok(ScanControl::Continue)
            },
        )?;
        Ok(out)
    }

    /// The `n` highest-index elements, ascending
    pub fn last_n(&mut self, n: u64) -> KdbResult<Vec<(u64, Vec<u8>)>> {
        let mut out = self.take(Direction::Reverse, n)?;
        out.reverse();
        Ok(out)
    }

    /// Every element, ascending
    pub fn entries(&mut self) -> KdbResult<Vec<(u64, Vec<u8>)>> {
        self.take(Direction::Forward, u64::MAX)
    }

    /// Number of elements
    pub fn len(&mut self) -> KdbResult<u64> {
        let handle = self.handle;
        read_counter(self.txn, &handle.prefix().count_key())
    }

    /// True when the list holds no elements
    pub fn is_empty(&mut self) -> KdbResult<bool> {
        Ok(self.len()? == 0)
    }

    /// The underlying transaction
    pub fn txn(&mut self) -> &mut TransactionContext {
        &mut *self.txn
    }
}

fn malformed_index(handle: &CollectionHandle, key: &[u8]) -> KdbError {
    KdbError::corruption(format!(
        "list '{}' holds a key that is not an 8-byte index: {:?}",
        String::from_utf8_lossy(handle.name()),
        key
    ))
}

// ========== Capability traits ==========

impl CollectionScope for ListTransaction<'_> {
    fn name(&self) -> &[u8] {
        self.handle.name()
    }

    fn kind(&self) -> CollectionKind {
        CollectionKind::List
    }

    fn prefix(&self) -> &Prefix {
        self.handle.prefix()
    }
}

impl EntryScanner for ListTransaction<'_> {
    fn range(&mut self, visit: &mut EntryVisitor<'_>) -> KdbResult<()> {
        let handle = self.handle;
        scan::scan(self.txn, handle.prefix(), Direction::Forward, visit)
    }

    fn reverse(&mut self, visit: &mut EntryVisitor<'_>) -> KdbResult<()> {
        let handle = self.handle;
        scan::scan(self.txn, handle.prefix(), Direction::Reverse, visit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extensions::CollectionsExt;

    fn setup() -> (Arc<Database>, List) {
        let db = Database::ephemeral().unwrap();
        let list = db.list(b"test").unwrap();
        (db, list)
    }

    // ========== Push / pop ==========

    #[test]
    fn test_push_returns_length() {
        let (_db, list) = setup();
        assert_eq!(list.push(&[b"a", b"b"]).unwrap(), 2);
        assert_eq!(list.push(&[b"c"]).unwrap(), 3);
        assert_eq!(list.len().unwrap(), 3);
    }

    #[test]
    fn test_push_empty_is_noop() {
        let (_db, list) = setup();
        let nothing: [&[u8]; 0] = [];
        assert_eq!(list.push(&nothing).unwrap(), 0);
        assert!(list.is_empty().unwrap());
    }

    #[test]
    fn test_pop_ordering() {
        let (_db, list) = setup();
        list.push(&[b"a", b"b", b"c"]).unwrap();
        assert_eq!(list.pop_left().unwrap(), Some(b"a".to_vec()));
        assert_eq!(list.pop_left().unwrap(), Some(b"b".to_vec()));

        list.push(&[b"d"]).unwrap();
        assert_eq!(list.pop_right().unwrap(), Some(b"d".to_vec()));
        assert_eq!(list.pop_right().unwrap(), Some(b"c".to_vec()));
        assert_eq!(list.pop_right().unwrap(), None);
        assert_eq!(list.len().unwrap(), 0);
    }

    #[test]
    fn test_pop_right_order() {
        let (_db, list) = setup();
        list.push(&[b"a", b"b", b"c"]).unwrap();
        assert_eq!(list.pop_right().unwrap(), Some(b"c".to_vec()));
        assert_eq!(list.pop_right().unwrap(), Some(b"b".to_vec()));
    }

    #[test]
    fn test_pop_n_both_ends() {
        let (_db, list) = setup();
        list.push(&[b"1", b"2", b"3", b"4", b"5"]).unwrap();
        assert_eq!(list.pop_left_n(2).unwrap(), vec![b"1".to_vec(), b"2".to_vec()]);
        assert_eq!(list.pop_right_n(2).unwrap(), vec![b"5".to_vec(), b"4".to_vec()]);
        assert_eq!(list.pop_left_n(10).unwrap(), vec![b"3".to_vec()]);
        assert!(list.pop_left_n(1).unwrap().is_empty());
    }

    #[test]
    fn test_indices_never_renumbered() {
        let (_db, list) = setup();
        list.push(&[b"a", b"b", b"c"]).unwrap();
        list.pop_left().unwrap();
        list.push(&[b"d"]).unwrap();

        assert_eq!(list.index(0).unwrap(), None);
        assert_eq!(list.index(1).unwrap(), Some(b"b".to_vec()));
        assert_eq!(list.index(3).unwrap(), Some(b"d".to_vec()));
        assert_eq!(list.first().unwrap(), Some((1, b"b".to_vec())));
        assert_eq!(list.last().unwrap(), Some((3, b"d".to_vec())));
    }

    #[test]
    fn test_indices_keep_growing_after_emptying() {
        let (_db, list) = setup();
        list.push(&[b"a", b"b"]).unwrap();
        list.pop_left_n(2).unwrap();
        list.push(&[b"c"]).unwrap();
        assert_eq!(list.first().unwrap(), Some((2, b"c".to_vec())));
    }

    // ========== Indexed access ==========

    #[test]
    fn test_set_existing_index() {
        let (_db, list) = setup();
        list.push(&[b"a", b"b"]).unwrap();
        list.set(1, b"B").unwrap();
        assert_eq!(list.index(1).unwrap(), Some(b"B".to_vec()));
        assert_eq!(list.len().unwrap(), 2);
    }

    #[test]
    fn test_set_missing_index_is_not_found() {
        let (_db, list) = setup();
        let err = list.set(7, b"x").unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(list.len().unwrap(), 0);
    }

    #[test]
    fn test_range_inclusive() {
        let (_db, list) = setup();
        list.push(&[b"a", b"b", b"c", b"d"]).unwrap();
        assert_eq!(
            list.range(1, 2).unwrap(),
            vec![(1, b"b".to_vec()), (2, b"c".to_vec())]
        );
        assert!(list.range(3, 1).unwrap().is_empty());
        assert_eq!(list.range(0, u64::MAX).unwrap().len(), 4);
    }

    #[test]
    fn test_last_n_ascending() {
        let (_db, list) = setup();
        list.push(&[b"a", b"b", b"c", b"d"]).unwrap();
        assert_eq!(
            list.last_n(2).unwrap(),
            vec![(2, b"c".to_vec()), (3, b"d".to_vec())]
        );
        assert_eq!(list.last_n(10).unwrap().len(), 4);
        assert!(list.last_n(0).unwrap().is_empty());
    }

    #[test]
    fn test_empty_list_accessors() {
        let (_db, list) = setup();
        assert_eq!(list.first().unwrap(), None);
        assert_eq!(list.last().unwrap(), None);
        assert_eq!(list.pop_left().unwrap(), None);
        assert!(list.entries().unwrap().is_empty());
    }

    // ========== Batches and drop ==========

    #[test]
    fn test_transaction_push_and_pop_atomically() {
        let (_db, list) = setup();
        list.push(&[b"job1"]).unwrap();
        let taken = list
            .transaction(|l| {
                l.push(&[b"job2"])?;
                l.pop_left()
            })
            .unwrap();
        assert_eq!(taken, Some(b"job1".to_vec()));
        assert_eq!(list.entries().unwrap(), vec![(1, b"job2".to_vec())]);
    }

    #[test]
    fn test_view_rejects_writes() {
        let (_db, list) = setup();
        let err = list.view(|l| l.push(&[b"x"])).unwrap_err();
        assert!(matches!(err.root(), KdbError::InvalidInput { .. }));
        assert!(list.is_empty().unwrap());
    }

    #[test]
    fn test_scanner_sees_index_keys() {
        let (db, list) = setup();
        list.push(&[b"a", b"b"]).unwrap();
        let keys = db
            .transaction(|txn| {
                let mut bound = list.bind(txn)?;
                let mut keys = Vec::new();
                EntryScanner::reverse(&mut bound, &mut |k: &[u8], _: &[u8]| {
                    keys.push(k.to_vec());
                    Ok(ScanControl::Continue)
                })?;
                Ok(keys)
            })
            .unwrap();
        assert_eq!(keys, vec![encode_index(1).to_vec(), encode_index(0).to_vec()]);
    }

    #[test]
    fn test_drop_resets_sequence() {
        let (db, list) = setup();
        list.push(&[b"a", b"b"]).unwrap();
        assert_eq!(list.drop_collection().unwrap(), 2);
        assert!(list.push(&[b"c"]).unwrap_err().is_collection_dropped());

        let fresh = db.list(b"test").unwrap();
        fresh.push(&[b"c"]).unwrap();
        assert_eq!(fresh.first().unwrap(), Some((0, b"c".to_vec())));
    }
}
