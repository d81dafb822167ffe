//! Scan engine: ordered walks over one collection's entries
//!
//! Every walk is bounded to `[prefix, successor(prefix))`, so it can never
//! leave the collection's key space. Keys handed to visitors have the prefix
//! stripped. A visitor returns [`ScanControl`] to continue or stop; an `Err`
//! from the visitor is propagated unchanged.
//!
//! Reads go through the transaction, so every entry a scan returns lands in
//! the read set and a concurrent change to it aborts the scanning writer.

use std::ops::Bound;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use regex::bytes::Regex;

use kdb_concurrency::TransactionContext;
use kdb_core::{KdbError, KdbResult, Prefix};

use crate::sampler::sample_indices_with;

/// What a visitor wants the walk to do next
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanControl {
    /// Keep walking
    Continue,
    /// End the walk; the scan itself still succeeds
    Stop,
}

/// Walk order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Direction {
    /// Ascending byte order
    #[default]
    Forward,
    /// Strictly descending byte order
    Reverse,
}

impl Direction {
    /// True for [`Direction::Reverse`]
    pub fn is_reverse(self) -> bool {
        matches!(self, Direction::Reverse)
    }
}

/// Walk every entry under `prefix`
pub fn scan<F>(txn: &mut TransactionContext, prefix: &Prefix, direction: Direction, visit: F) -> KdbResult<()>
where
    F: FnMut(&[u8], &[u8]) -> KdbResult<ScanControl>,
{
    scan_range(txn, prefix, Bound::Unbounded, Bound::Unbounded, direction, visit)
}

/// Walk entries whose stripped key lies within `(start, end)` bounds
pub fn scan_range<F>(
    txn: &mut TransactionContext,
    prefix: &Prefix,
    start: Bound<&[u8]>,
    end: Bound<&[u8]>,
    direction: Direction,
    mut visit: F,
) -> KdbResult<()>
where
    F: FnMut(&[u8], &[u8]) -> KdbResult<ScanControl>,
{
    let lower = match start {
        Bound::Included(s) => prefix.entry_key(s),
        Bound::Excluded(s) => successor_key(prefix.entry_key(s)),
        Bound::Unbounded => prefix.first_key().to_vec(),
    };
    let upper = match end {
        Bound::Included(e) => successor_key(prefix.entry_key(e)),
        Bound::Excluded(e) => prefix.entry_key(e),
        Bound::Unbounded => prefix.end_key(),
    };
    if lower >= upper {
        return Ok(());
    }

    let items = txn.scan_range(&lower, Some(upper.as_slice()), direction.is_reverse())?;
    for (key, value) in items {
        let Some(subkey) = prefix.strip(&key) else {
            continue;
        };
        if visit(subkey, &value)? == ScanControl::Stop {
            break;
        }
    }
    Ok(())
}

/// Walk only entries for which `predicate(key, value)` holds
pub fn scan_with_filter<P, F>(
    txn: &mut TransactionContext,
    prefix: &Prefix,
    direction: Direction,
    mut predicate: P,
    mut visit: F,
) -> KdbResult<()>
where
    P: FnMut(&[u8], &[u8]) -> bool,
    F: FnMut(&[u8], &[u8]) -> KdbResult<ScanControl>,
{
    scan(txn, prefix, direction, |key, value| {
        if predicate(key, value) {
            visit(key, value)
        } else {
            Ok(ScanControl::Continue)
        }
    })
}

/// Walk only entries whose key matches `pattern`
///
/// The pattern is compiled before anything is read; a bad pattern is
/// `InvalidPattern`.
pub fn scan_with_pattern<F>(
    txn: &mut TransactionContext,
    prefix: &Prefix,
    direction: Direction,
    pattern: &str,
    visit: F,
) -> KdbResult<()>
where
    F: FnMut(&[u8], &[u8]) -> KdbResult<ScanControl>,
{
    let regex = compile_pattern(pattern)?;
    scan_with_filter(txn, prefix, direction, |key, _| regex.is_match(key), visit)
}

/// Compile a key pattern
pub fn compile_pattern(pattern: &str) -> KdbResult<Regex> {
    Regex::new(pattern).map_err(|e| KdbError::InvalidPattern {
        pattern: pattern.to_string(),
        reason: e.to_string(),
    })
}

/// Every entry under `prefix`, materialised
pub fn entries(
    txn: &mut TransactionContext,
    prefix: &Prefix,
    direction: Direction,
) -> KdbResult<Vec<(Vec<u8>, Vec<u8>)>> {
    let mut out = Vec::new();
    scan(txn, prefix, direction, |key, value| {
        out.push((key.to_vec(), value.to_vec()));
        Ok(ScanControl::Continue)
    })?;
    Ok(out)
}

/// Count entries with a full walk
pub fn count_entries(txn: &mut TransactionContext, prefix: &Prefix) -> KdbResult<u64> {
    let mut n = 0u64;
    scan(txn, prefix, Direction::Forward, |_, _| {
        n += 1;
        Ok(ScanControl::Continue)
    })?;
    Ok(n)
}

/// Approximate bytes stored under `prefix`, as the engine estimates them
pub fn approximate_size(txn: &TransactionContext, prefix: &Prefix) -> KdbResult<u64> {
    let end = prefix.end_key();
    txn.size_of_range(prefix.first_key(), Some(end.as_slice()))
}

/// Visit up to `k` uniformly chosen entries among the first `n`
///
/// `n` is the collection's element count. The sample is drawn first, then
/// one forward walk visits the chosen ordinals in natural order.
pub fn random_scan<F>(txn: &mut TransactionContext, prefix: &Prefix, n: u64, k: u64, visit: F) -> KdbResult<()>
where
    F: FnMut(&[u8], &[u8]) -> KdbResult<ScanControl>,
{
    let mut rng = StdRng::from_entropy();
    random_scan_with(txn, prefix, n, k, &mut rng, visit)
}

/// Same as [`random_scan`] with a caller-supplied RNG
pub fn random_scan_with<R, F>(
    txn: &mut TransactionContext,
    prefix: &Prefix,
    n: u64,
    k: u64,
    rng: &mut R,
    mut visit: F,
) -> KdbResult<()>
where
    R: Rng,
    F: FnMut(&[u8], &[u8]) -> KdbResult<ScanControl>,
{
    let picked = sample_indices_with(rng, n, k);
    if picked.is_empty() {
        return Ok(());
    }

    let mut ordinal = 0u64;
    let mut remaining = picked.len();
    scan(txn, prefix, Direction::Forward, |key, value| {
        let hit = picked.contains(&ordinal);
        ordinal += 1;
        if !hit {
            return Ok(ScanControl::Continue);
        }
        remaining -= 1;
        match visit(key, value)? {
            ScanControl::Continue if remaining > 0 => Ok(ScanControl::Continue),
            _ => Ok(ScanControl::Stop),
        }
    })
}

/// Smallest key strictly greater than `key`
fn successor_key(mut key: Vec<u8>) -> Vec<u8> {
    key.push(0);
    key
}
