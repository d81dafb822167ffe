//! Varint counters stored under meta keys
//!
//! Used for a collection's element count (`cnt:` key) and a list's next
//! append index (`seq:` key). An absent key reads as 0, and writing 0 removes
//! the key so an empty collection leaves nothing behind.

use kdb_concurrency::TransactionContext;
use kdb_core::keys::{counter_bytes, parse_counter};
use kdb_core::{KdbError, KdbResult};

/// Read a counter; absent is 0
pub fn read_counter(txn: &mut TransactionContext, key: &[u8]) -> KdbResult<u64> {
    match txn.get(key)? {
        None => Ok(0),
        Some(bytes) => parse_counter(&bytes).ok_or_else(|| {
            KdbError::corruption(format!(
                "malformed counter at key {:?}: {:?}",
                String::from_utf8_lossy(key),
                bytes
            ))
        }),
    }
}

/// Overwrite a counter
pub fn write_counter(txn: &mut TransactionContext, key: &[u8], value: u64) -> KdbResult<()> {
    if value == 0 {
        txn.delete(key.to_vec())
    } else {
        txn.put(key.to_vec(), counter_bytes(value))
    }
}

/// Add `delta` to a counter and return the new value
///
/// Going below zero means the counter and the entries disagree, which is an
/// `InvariantViolation`.
pub fn adjust_counter(txn: &mut TransactionContext, key: &[u8], delta: i64) -> KdbResult<u64> {
    let current = read_counter(txn, key)?;
    if delta == 0 {
        return Ok(current);
    }
    let next = if delta > 0 {
        current.checked_add(delta.unsigned_abs())
    } else {
        current.checked_sub(delta.unsigned_abs())
    };
    let next = next.ok_or_else(|| {
        KdbError::invariant(format!(
            "counter {:?} out of range: {} {:+}",
            String::from_utf8_lossy(key),
            current,
            delta
        ))
    })?;
    write_counter(txn, key, next)?;
    Ok(next)
}

#[cfg(test)]
mod tests {
    use super::*;
    use kdb_storage::UnifiedStore;

    fn begin(store: &UnifiedStore) -> TransactionContext {
        TransactionContext::with_snapshot(1, Box::new(store.create_snapshot()))
    }

    #[test]
    fn test_absent_counter_reads_zero() {
        let store = UnifiedStore::new();
        let mut txn = begin(&store);
        assert_eq!(read_counter(&mut txn, b"cnt:x").unwrap(), 0);
        // The absence is recorded so a concurrent creation conflicts
        assert_eq!(txn.get_read_version(b"cnt:x"), Some(0));
    }

    #[test]
    fn test_adjust_up_and_down() {
        let store = UnifiedStore::new();
        let mut txn = begin(&store);
        assert_eq!(adjust_counter(&mut txn, b"c", 5).unwrap(), 5);
        assert_eq!(adjust_counter(&mut txn, b"c", -2).unwrap(), 3);
        assert_eq!(read_counter(&mut txn, b"c").unwrap(), 3);
        assert_eq!(adjust_counter(&mut txn, b"c", 0).unwrap(), 3);
    }

    #[test]
    fn test_zero_removes_key() {
        let store = UnifiedStore::new();
        let mut txn = begin(&store);
        write_counter(&mut txn, b"c", 2).unwrap();
        adjust_counter(&mut txn, b"c", -2).unwrap();
        assert!(txn.get(b"c").unwrap().is_none());
    }

    #[test]
    fn test_underflow_is_invariant_violation() {
        let store = UnifiedStore::new();
        let mut txn = begin(&store);
        write_counter(&mut txn, b"c", 1).unwrap();
        let err = adjust_counter(&mut txn, b"c", -2).unwrap_err();
        assert!(matches!(err, KdbError::InvariantViolation { .. }));
        assert_eq!(read_counter(&mut txn, b"c").unwrap(), 1);
    }

    #[test]
    fn test_malformed_counter_is_corruption() {
        let store = UnifiedStore::new();
        let mut txn = begin(&store);
        txn.put(b"c".to_vec(), vec![0x80]).unwrap();
        let err = read_counter(&mut txn, b"c").unwrap_err();
        assert!(matches!(err, KdbError::Corruption { .. }));
    }
}
