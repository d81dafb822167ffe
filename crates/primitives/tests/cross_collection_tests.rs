//! Cross-Collection Transaction Tests
//!
//! Tests verifying that several collections can participate in one atomic
//! transaction by binding each to the same transaction context.

use std::sync::Arc;

use kdb_engine::{Database, KdbError};
use kdb_primitives::{CollectionsExt, EntryReader, EntryWriter};
use tempfile::TempDir;

fn setup() -> (Arc<Database>, TempDir) {
    let temp_dir = TempDir::new().unwrap();
    let db = Database::open(temp_dir.path()).unwrap();
    (db, temp_dir)
}

#[test]
fn test_hash_and_list_commit_together() {
    let (db, _temp) = setup();
    let users = db.hash(b"users").unwrap();
    let audit = db.list(b"audit").unwrap();

    db.transaction(|txn| {
        users.bind(txn)?.set(b"alice", b"admin")?;
        audit.bind(txn)?.push(&[b"alice promoted"])?;
        Ok(())
    })
    .unwrap();

    assert_eq!(users.get(b"alice").unwrap(), Some(b"admin".to_vec()));
    assert_eq!(audit.entries().unwrap(), vec![(0, b"alice promoted".to_vec())]);
}

#[test]
fn test_error_rolls_back_every_collection() {
    let (db, _temp) = setup();
    let users = db.hash(b"users").unwrap();
    let audit = db.list(b"audit").unwrap();

    let result: Result<(), KdbError> = db.transaction(|txn| {
        users.bind(txn)?.set(b"alice", b"admin")?;
        audit.bind(txn)?.push(&[b"alice promoted"])?;
        Err(KdbError::invalid_input("changed my mind"))
    });

    assert!(result.is_err());
    assert!(users.is_empty().unwrap());
    assert!(audit.is_empty().unwrap());
}

#[test]
fn test_capability_traits_across_hashes() {
    let (db, _temp) = setup();
    let pending = db.hash(b"pending").unwrap();
    let done = db.hash(b"done").unwrap();
    pending.set(b"job", b"payload").unwrap();

    db.transaction(|txn| {
        // A bound handle borrows the transaction; bind one collection at a time
        let payload = {
            let mut p = pending.bind(txn)?;
            let value = EntryReader::get(&mut p, b"job")?;
            value.ok_or_else(|| KdbError::not_found("job"))?
        };
        let mut p = pending.bind(txn)?;
        EntryWriter::delete(&mut p, b"job")?;
        let mut d = done.bind(txn)?;
        EntryWriter::set(&mut d, b"job", &payload)
    })
    .unwrap();

    assert!(!pending.exists(b"job").unwrap());
    assert_eq!(done.get(b"job").unwrap(), Some(b"payload".to_vec()));
    assert_eq!(pending.len().unwrap(), 0);
    assert_eq!(done.len().unwrap(), 1);
}
