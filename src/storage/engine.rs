//! Sharded Store with Key Index
//!
//! This module implements the concurrent core of the cache: a fixed set of
//! shards, each a `HashMap<u64, Expirable<V>>` behind its own lock, plus the
//! shared [`KeyIndex`] the sweeper samples from.
//!
//! ## Concurrency Model
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                        ShardStore                        │
//! │  ┌─────────┐ ┌─────────┐ ┌─────────┐ ┌─────────┐         │
//! │  │ Shard 0 │ │ Shard 1 │ │ Shard 2 │ │ Shard N │         │
//! │  │ RwLock  │ │ RwLock  │ │ RwLock  │ │ RwLock  │         │
//! │  │ HashMap │ │ HashMap │ │ HashMap │ │ HashMap │         │
//! │  └─────────┘ └─────────┘ └─────────┘ └─────────┘         │
//! │                                                          │
//! │  ┌────────────────────────────────────────────┐          │
//! │  │ KeyIndex (own RwLock, sorted Vec<u64>)     │          │
//! │  └────────────────────────────────────────────┘          │
//! └───────────────────────────┬──────────────────────────────┘
//!                             │ evicted payloads
//!                             ▼
//!                     EvictionPipeline
//! ```
//!
//! A key lives in shard `key % shard_count`. Every path that changes both a
//! shard and the index takes the shard lock first and the index lock second,
//! and keeps the shard lock until the index is updated, so the two never
//! disagree once an operation returns.
//!
//! Evicted payloads are taken out under the shard lock but handed to the
//! pipeline after it is released; a full pipeline stalls the caller, not
//! the shard.

use crate::eviction::EvictionPipeline;
use crate::storage::entry::Expirable;
use crate::storage::index::KeyIndex;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// A single shard containing a portion of the key space.
#[derive(Debug)]
struct Shard<V> {
    data: RwLock<HashMap<u64, Expirable<V>>>,
}

impl<V> Shard<V> {
    fn new() -> Self {
        Self {
            data: RwLock::new(HashMap::new()),
        }
    }
}

/// Why an entry left the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Removal {
    Expired,
    Deleted,
}

/// The sharded key/value store.
///
/// Designed to be wrapped in an `Arc` and shared between callers and the
/// expiry sweeper. All operations are thread-safe and none of them fail.
pub struct ShardStore<V> {
    shards: Vec<Shard<V>>,

    /// Sorted mirror of every key currently stored
    index: KeyIndex,

    /// Where removed payloads go
    pipeline: Arc<EvictionPipeline<V>>,

    /// Statistics: total number of keys
    key_count: AtomicU64,

    /// Statistics: total GET operations
    get_count: AtomicU64,

    /// Statistics: total PUT operations
    put_count: AtomicU64,

    /// Statistics: total DELETE operations
    del_count: AtomicU64,

    /// Statistics: entries removed because they expired
    expired_count: AtomicU64,

    /// Statistics: live entries removed by DELETE
    deleted_count: AtomicU64,
}

impl<V> std::fmt::Debug for ShardStore<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShardStore")
            .field("shards", &self.shards.len())
            .field("key_count", &self.key_count.load(Ordering::Relaxed))
            .field("get_count", &self.get_count.load(Ordering::Relaxed))
            .field("put_count", &self.put_count.load(Ordering::Relaxed))
            .finish()
    }
}

impl<V: Clone + Send + 'static> ShardStore<V> {
    /// Creates a store with `shard_count` shards feeding `pipeline`.
    ///
    /// # Panics
    ///
    /// Panics if `shard_count` is zero.
    pub fn new(shard_count: usize, pipeline: Arc<EvictionPipeline<V>>) -> Self {
        assert!(shard_count > 0, "shard_count must be at least 1");

        Self {
            shards: (0..shard_count).map(|_| Shard::new()).collect(),
            index: KeyIndex::new(),
            pipeline,
            key_count: AtomicU64::new(0),
            get_count: AtomicU64::new(0),
            put_count: AtomicU64::new(0),
            del_count: AtomicU64::new(0),
            expired_count: AtomicU64::new(0),
            deleted_count: AtomicU64::new(0),
        }
    }

    #[inline]
    fn shard(&self, key: u64) -> &Shard<V> {
        &self.shards[(key % self.shards.len() as u64) as usize]
    }

    /// Stores `entry` under `key`, replacing any previous entry.
    ///
    /// A replaced entry is discarded without notifying the callback.
    pub fn put(&self, key: u64, entry: Expirable<V>) {
        self.put_count.fetch_add(1, Ordering::Relaxed);

        let mut data = self.shard(key).data.write();
        if data.insert(key, entry).is_none() {
            self.key_count.fetch_add(1, Ordering::Relaxed);
        }
        self.index.insert(key);
    }

    /// Returns a copy of the payload if `key` is present and alive at `now`.
    ///
    /// An expired entry is removed here and its payload sent to the pipeline.
    pub fn get(&self, key: u64, now: Instant) -> Option<V> {
        self.get_count.fetch_add(1, Ordering::Relaxed);

        let shard = self.shard(key);

        // Fast path: read lock for present, live keys
        {
            let data = shard.data.read();
            match data.get(&key) {
                None => return None,
                Some(entry) => {
                    if let Some(value) = entry.get(now) {
                        return Some(value.clone());
                    }
                }
            }
        }

        // Key looked expired - retake as writer to remove it
        let evicted = {
            let mut data = shard.data.write();
            let live = match data.get(&key) {
                None => return None,
                Some(entry) => entry.get(now).cloned(),
            };
            // Race: another thread replaced the entry in between
            if live.is_some() {
                return live;
            }
            self.remove_locked(&mut data, key, Removal::Expired)
        };

        if let Some(entry) = evicted {
            self.pipeline.enqueue(entry.into_value());
        }
        None
    }

    /// Checks whether `key` is present and alive, without cloning the payload.
    pub fn contains(&self, key: u64, now: Instant) -> bool {
        self.shard(key)
            .data
            .read()
            .get(&key)
            .is_some_and(|entry| entry.is_alive(now))
    }

    /// Removes `key` and sends its payload to the pipeline.
    ///
    /// Always acknowledges with `true`; deleting an absent key is a no-op
    /// and enqueues nothing. Use [`remove`](Self::remove) to learn whether
    /// an entry was actually there.
    pub fn delete(&self, key: u64) -> bool {
        self.remove(key);
        true
    }

    /// Removes `key` like [`delete`](Self::delete), returning `true` only if
    /// an entry was present.
    pub fn remove(&self, key: u64) -> bool {
        self.del_count.fetch_add(1, Ordering::Relaxed);

        let now = Instant::now();
        let evicted = {
            let mut data = self.shard(key).data.write();
            let removal = match data.get(&key) {
                None => return false,
                Some(entry) if entry.is_alive(now) => Removal::Deleted,
                Some(_) => Removal::Expired,
            };
            self.remove_locked(&mut data, key, removal)
        };

        match evicted {
            Some(entry) => {
                self.pipeline.enqueue(entry.into_value());
                true
            }
            None => false,
        }
    }

    /// Removes `key` if it has expired at `now`, sending the payload to the
    /// pipeline. Used by the sweeper.
    ///
    /// Returns `true` if the key was removed.
    pub fn check_key(&self, key: u64, now: Instant) -> bool {
        let evicted = {
            let mut data = self.shard(key).data.write();
            let expired = data.get(&key).is_some_and(|entry| !entry.is_alive(now));
            if !expired {
                return false;
            }
            self.remove_locked(&mut data, key, Removal::Expired)
        };

        match evicted {
            Some(entry) => {
                self.pipeline.enqueue(entry.into_value());
                true
            }
            None => false,
        }
    }

    /// Removes an entry from a locked shard and from the index.
    fn remove_locked(
        &self,
        data: &mut HashMap<u64, Expirable<V>>,
        key: u64,
        removal: Removal,
    ) -> Option<Expirable<V>> {
        let entry = data.remove(&key)?;
        self.index.remove(key);
        self.key_count.fetch_sub(1, Ordering::Relaxed);

        match removal {
            Removal::Expired => self.expired_count.fetch_add(1, Ordering::Relaxed),
            Removal::Deleted => self.deleted_count.fetch_add(1, Ordering::Relaxed),
        };

        Some(entry)
    }

    /// Clones every stored payload, live or not, without removing anything.
    pub fn values(&self) -> Vec<V> {
        let mut values = Vec::with_capacity(self.len());
        for shard in &self.shards {
            let data = shard.data.read();
            values.extend(data.values().map(|entry| entry.value().clone()));
        }
        values
    }
}

impl<V> ShardStore<V> {
    /// Draws keys from the index for an expiry sweep.
    pub fn sample_keys(&self, count: usize, full: bool) -> Vec<u64> {
        self.index.sample(count, full)
    }

    /// Returns the approximate number of stored entries.
    ///
    /// This is an approximation because it uses relaxed atomic ordering.
    pub fn len(&self) -> usize {
        self.key_count.load(Ordering::Relaxed) as usize
    }

    /// Returns true if the store is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of keys in the index.
    pub fn index_len(&self) -> usize {
        self.index.len()
    }

    /// Copy of the sorted key index.
    pub fn index_snapshot(&self) -> Vec<u64> {
        self.index.snapshot().to_vec()
    }

    /// Number of shards.
    pub fn shard_count(&self) -> usize {
        self.shards.len()
    }

    /// The pipeline this store evicts into.
    pub fn pipeline(&self) -> &EvictionPipeline<V> {
        &self.pipeline
    }

    /// Returns storage statistics.
    pub fn stats(&self) -> StorageStats {
        StorageStats {
            keys: self.key_count.load(Ordering::Relaxed),
            get_ops: self.get_count.load(Ordering::Relaxed),
            put_ops: self.put_count.load(Ordering::Relaxed),
            del_ops: self.del_count.load(Ordering::Relaxed),
            expired: self.expired_count.load(Ordering::Relaxed),
            deleted: self.deleted_count.load(Ordering::Relaxed),
        }
    }
}

/// Storage statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StorageStats {
    /// Number of keys currently stored
    pub keys: u64,
    /// Total GET operations
    pub get_ops: u64,
    /// Total PUT operations
    pub put_ops: u64,
    /// Total DELETE operations
    pub del_ops: u64,
    /// Entries removed because they had expired
    pub expired: u64,
    /// Live entries removed by DELETE
    pub deleted: u64,
}
