//! Property tests for the hash count invariant
//!
//! After any sequence of set/delete/get_set/pop operations, `len()` must equal
//! the number of entries a full scan finds, and the contents must match a
//! `BTreeMap` model.

use std::collections::BTreeMap;

use kdb_engine::{Database, ScanControl};
use kdb_primitives::CollectionsExt;
use proptest::prelude::*;

#[derive(Debug, Clone)]
enum Op {
    Set(u8, u8),
    GetSet(u8, u8),
    Delete(Vec<u8>),
    PopN(u8),
}

fn op_strategy() -> impl Strategy<Value = Op> {
    // A small key alphabet makes overwrites and repeated deletes common
    prop_oneof![
        4 => (0u8..8, any::<u8>()).prop_map(|(k, v)| Op::Set(k, v)),
        2 => (0u8..8, any::<u8>()).prop_map(|(k, v)| Op::GetSet(k, v)),
        3 => prop::collection::vec(0u8..8, 0..4).prop_map(Op::Delete),
        1 => (0u8..3).prop_map(Op::PopN),
    ]
}

fn key(k: u8) -> Vec<u8> {
    vec![b'k', k]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn prop_len_matches_scan(ops in prop::collection::vec(op_strategy(), 1..40)) {
        let db = Database::ephemeral().unwrap();
        let hash = db.hash(b"prop").unwrap();
        let mut model: BTreeMap<Vec<u8>, Vec<u8>> = BTreeMap::new();

        for op in ops {
            match op {
                Op::Set(k, v) => {
                    hash.set(&key(k), &[v]).unwrap();
                    model.insert(key(k), vec![v]);
                }
                Op::GetSet(k, v) => {
                    let previous = hash.get_set(&key(k), &[v]).unwrap();
                    prop_assert_eq!(previous, model.insert(key(k), vec![v]));
                }
                Op::Delete(ks) => {
                    let keys: Vec<Vec<u8>> = ks.iter().map(|k| key(*k)).collect();
                    let removed = hash.delete(&keys).unwrap();
                    let mut expected = 0u64;
                    for k in &keys {
                        if model.remove(k).is_some() {
                            expected += 1;
                        }
                    }
                    prop_assert_eq!(removed, expected);
                }
                Op::PopN(n) => {
                    let mut popped = Vec::new();
                    hash.pop_n(n as u64, |k, _| {
                        popped.push(k.to_vec());
                        Ok(ScanControl::Continue)
                    })
                    .unwrap();
                    let expected: Vec<Vec<u8>> = model.keys().rev().take(n as usize).cloned().collect();
                    prop_assert_eq!(&popped, &expected);
                    for k in popped {
                        model.remove(&k);
                    }
                }
            }

            let scanned = hash.entries().unwrap();
            prop_assert_eq!(hash.len().unwrap(), scanned.len() as u64);
            prop_assert_eq!(hash.len().unwrap(), model.len() as u64);
        }

        let scanned: BTreeMap<Vec<u8>, Vec<u8>> = hash.entries().unwrap().into_iter().collect();
        prop_assert_eq!(scanned, model);
    }
}
