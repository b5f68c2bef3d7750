//! Sorted Key Index
//!
//! The key index mirrors the set of keys held across all shards as a sorted,
//! deduplicated vector. It is never used to look values up; it exists so the
//! expiry sweeper can draw random keys without walking every shard.
//!
//! ## Concurrency
//!
//! The vector lives behind its own lock, separate from every shard lock,
//! because it is addressed by the whole key space. Writers always take a
//! shard lock first and this lock second.
//!
//! Mutations are copy-on-write: a new vector is built and the `Arc` swapped.
//! Readers call [`KeyIndex::snapshot`] and release the lock immediately, so
//! the sweeper never holds the index lock while it waits on a shard.

use parking_lot::RwLock;
use rand::seq::index;
use rand::Rng;
use std::sync::Arc;

/// Sorted, deduplicated set of every key present in the shard store.
#[derive(Debug, Default)]
pub struct KeyIndex {
    keys: RwLock<Arc<Vec<u64>>>,
}

impl KeyIndex {
    /// Creates an empty index.
    pub fn new() -> Self {
        Self::default()
    }

    /// Binary-searches for `key`.
    ///
    /// Returns `Ok(position)` when present, or `Err(position)` with the
    /// insertion point (first position whose key is ≥ `key`).
    pub fn find(&self, key: u64) -> Result<usize, usize> {
        self.keys.read().binary_search(&key)
    }

    /// Returns true if `key` is indexed.
    pub fn contains(&self, key: u64) -> bool {
        self.find(key).is_ok()
    }

    /// Inserts `key` in sorted position.
    ///
    /// Returns `false` (and leaves the index untouched) if it was already present.
    pub fn insert(&self, key: u64) -> bool {
        let mut guard = self.keys.write();
        let pos = match guard.binary_search(&key) {
            Ok(_) => return false,
            Err(pos) => pos,
        };

        let mut next = Vec::with_capacity(guard.len() + 1);
        next.extend_from_slice(&guard[..pos]);
        next.push(key);
        next.extend_from_slice(&guard[pos..]);
        *guard = Arc::new(next);
        true
    }

    /// Removes `key`.
    ///
    /// Returns `false` if it was not present.
    pub fn remove(&self, key: u64) -> bool {
        let mut guard = self.keys.write();
        match guard.len() {
            0 => return false,
            1 => {
                if guard[0] != key {
                    return false;
                }
                *guard = Arc::new(Vec::new());
                return true;
            }
            _ => {}
        }

        let pos = match guard.binary_search(&key) {
            Ok(pos) => pos,
            Err(_) => return false,
        };

        let mut next = Vec::with_capacity(guard.len() - 1);
        next.extend_from_slice(&guard[..pos]);
        next.extend_from_slice(&guard[pos + 1..]);
        *guard = Arc::new(next);
        true
    }

    /// Number of indexed keys.
    pub fn len(&self) -> usize {
        self.keys.read().len()
    }

    /// Returns true if no keys are indexed.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the current key vector. Later mutations do not affect it.
    pub fn snapshot(&self) -> Arc<Vec<u64>> {
        let guard = self.keys.read();
        Arc::clone(&*guard)
    }

    /// Draws keys to check for expiry.
    ///
    /// With `full` set, or when the index holds at most `count` keys, every
    /// key is returned. Otherwise `count` distinct keys are drawn uniformly.
    /// Keys come back in ascending order either way.
    pub fn sample(&self, count: usize, full: bool) -> Vec<u64> {
        self.sample_with(&mut rand::thread_rng(), count, full)
    }

    /// [`KeyIndex::sample`] with a caller-supplied RNG.
    pub fn sample_with<R: Rng + ?Sized>(&self, rng: &mut R, count: usize, full: bool) -> Vec<u64> {
        let keys = self.snapshot();
        sample_positions(rng, keys.len(), count, full)
            .into_iter()
            .map(|pos| keys[pos])
            .collect()
    }
}

/// Picks positions in `0..len` for a sweep.
///
/// Returns all of `0..len` when `full` is set or `len <= count`; otherwise
/// `count` distinct positions drawn uniformly. The result is ascending.
pub fn sample_positions<R: Rng + ?Sized>(
    rng: &mut R,
    len: usize,
    count: usize,
    full: bool,
) -> Vec<usize> {
    if full || len <= count {
        return (0..len).collect();
    }

    let mut positions = index::sample(rng, len, count).into_vec();
    positions.sort_unstable();
    positions
}
