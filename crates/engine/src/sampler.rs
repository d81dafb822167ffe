//! Uniform sampling of k distinct ordinals out of n
//!
//! Positions are drawn uniformly from `[0, n)` and duplicates are rejected
//! until `k` distinct values are held. Every k-subset is equally likely.

use std::collections::BTreeSet;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Pick `min(k, n)` distinct ordinals in `[0, n)` using a fresh entropy-seeded RNG
///
/// `k >= n` returns every ordinal; `k == 0` or `n == 0` returns nothing.
pub fn sample_indices(n: u64, k: u64) -> BTreeSet<u64> {
    let mut rng = StdRng::from_entropy();
    sample_indices_with(&mut rng, n, k)
}

/// Same as [`sample_indices`] with a caller-supplied RNG
pub fn sample_indices_with<R: Rng>(rng: &mut R, n: u64, k: u64) -> BTreeSet<u64> {
    if n == 0 || k == 0 {
        return BTreeSet::new();
    }
    if k >= n {
        return (0..n).collect();
    }

    let mut picked = BTreeSet::new();
    while (picked.len() as u64) < k {
        picked.insert(rng.gen_range(0..n));
    }
    picked
}
