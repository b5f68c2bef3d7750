//! The public cache handle.
//!
//! [`ExpiryCache`] owns the shard store, the eviction pipeline and the
//! background sweeper, and exposes the operations callers use.

use crate::config::CacheConfig;
use crate::error::{CacheError, Result};
use crate::eviction::pipeline::invoke_isolated;
use crate::eviction::{EvictionCallback, EvictionPipeline, PipelineStats};
use crate::storage::{
    run_sweep, Expirable, ExpiryConfig, ExpirySweeper, ShardStore, StorageStats, SweepKind,
    SweepOutcome, SweepStats,
};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::runtime::Handle;
use tracing::{info, warn};

/// Combined statistics for a cache.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub storage: StorageStats,
    pub sweeps: SweepStats,
    pub evictions: PipelineStats,
}

/// A concurrent cache of `u64` keys whose values carry an expiry instant.
///
/// Expired entries are removed lazily on `get` and actively by a background
/// sweeper. Every removed payload is handed exactly once to the callback
/// given at construction, on one of the pipeline's worker threads.
///
/// # Example
///
/// ```no_run
/// use sweepcache::{ExpiryCache, Expirable};
/// use std::time::{Duration, Instant};
///
/// # #[tokio::main]
/// # async fn main() -> sweepcache::Result<()> {
/// let cache = ExpiryCache::new(
///     Duration::from_millis(500),
///     |value: u32| println!("evicted {value}"),
///     4,  // callback workers
///     3,  // full sweep from 03:00 local time
///     16, // shards
/// )?;
///
/// let now = Instant::now();
/// cache.put(1, Expirable::new(100, now, 1));
/// assert_eq!(cache.get(1, now), Some(100));
/// # Ok(())
/// # }
/// ```
pub struct ExpiryCache<V> {
    store: Arc<ShardStore<V>>,
    pipeline: Arc<EvictionPipeline<V>>,
    sweeper: ExpirySweeper,
    callback: EvictionCallback<V>,
    config: CacheConfig,
}

impl<V> std::fmt::Debug for ExpiryCache<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExpiryCache")
            .field("store", &self.store)
            .field("pipeline", &self.pipeline)
            .field("config", &self.config)
            .finish()
    }
}

impl<V: Clone + Send + Sync + 'static> ExpiryCache<V> {
    /// Creates a cache with the default sample size and queue capacity.
    ///
    /// Must be called from within a Tokio runtime, which hosts the sweeper.
    pub fn new<F>(
        sweep_interval: Duration,
        callback: F,
        worker_count: usize,
        full_sweep_hour: u32,
        shard_count: usize,
    ) -> Result<Self>
    where
        F: Fn(V) + Send + Sync + 'static,
    {
        let config = CacheConfig::default()
            .with_sweep_interval(sweep_interval)
            .with_worker_count(worker_count)
            .with_full_sweep_hour(full_sweep_hour)
            .with_shard_count(shard_count);
        Self::with_config(config, callback)
    }

    /// Creates a cache from a full configuration.
    ///
    /// Must be called from within a Tokio runtime, which hosts the sweeper.
    pub fn with_config<F>(config: CacheConfig, callback: F) -> Result<Self>
    where
        F: Fn(V) + Send + Sync + 'static,
    {
        config.validate()?;
        let runtime = Handle::try_current().map_err(|_| CacheError::NoRuntime)?;

        let callback: EvictionCallback<V> = Arc::new(callback);
        let pipeline = Arc::new(EvictionPipeline::start(
            Arc::clone(&callback),
            config.worker_count,
            config.queue_capacity,
        )?);
        let store = Arc::new(ShardStore::new(config.shard_count, Arc::clone(&pipeline)));
        let sweeper = ExpirySweeper::start(
            Arc::clone(&store),
            ExpiryConfig::from(&config),
            &runtime,
        );

        info!(
            shards = config.shard_count,
            workers = config.worker_count,
            interval_ms = config.sweep_interval.as_millis() as u64,
            full_sweep_hour = config.full_sweep_hour,
            "Expiry cache initialized"
        );

        Ok(Self {
            store,
            pipeline,
            sweeper,
            callback,
            config,
        })
    }

    /// Stores `entry` under `key`, replacing any previous entry.
    pub fn put(&self, key: u64, entry: Expirable<V>) {
        self.store.put(key, entry);
    }

    /// Stores `value` under `key`, expiring `ttl` from now.
    pub fn put_with_ttl(&self, key: u64, value: V, ttl: Duration) {
        self.store
            .put(key, Expirable::with_ttl(value, Instant::now(), ttl));
    }

    /// Returns the payload for `key` if it is alive at `now`.
    ///
    /// An expired entry is removed and handed to the callback. This may
    /// block while the eviction queue is full.
    pub fn get(&self, key: u64, now: Instant) -> Option<V> {
        self.store.get(key, now)
    }

    /// Checks whether `key` is present and alive at `now`.
    pub fn contains(&self, key: u64, now: Instant) -> bool {
        self.store.contains(key, now)
    }

    /// Removes `key`, handing its payload to the callback.
    ///
    /// Never fails and always acknowledges with `true`, including for an
    /// absent key, which is left alone. This may block while the eviction
    /// queue is full.
    pub fn delete(&self, key: u64) -> bool {
        self.store.delete(key)
    }

    /// Same as [`delete`](Self::delete), but returns `true` only if an entry
    /// was present and removed.
    pub fn remove(&self, key: u64) -> bool {
        self.store.remove(key)
    }

    /// Runs one sweep on the calling thread.
    pub fn sweep_now(&self, kind: SweepKind) -> SweepOutcome {
        run_sweep(&self.store, kind, self.config.sample_size)
    }

    /// Hands a clone of every stored payload to the callback on the calling
    /// thread, without removing anything.
    ///
    /// Returns the number of payloads handed over.
    pub fn save_all(&self) -> usize {
        let values = self.store.values();
        let count = values.len();

        let mut panics = 0usize;
        for value in values {
            if !invoke_isolated(&*self.callback, value) {
                panics += 1;
            }
        }

        if panics > 0 {
            warn!(panics, "Eviction callback panicked during save_all");
        }
        info!(saved = count, "Saved all cached values");
        count
    }
}

impl<V> ExpiryCache<V> {
    /// Returns the approximate number of stored entries.
    pub fn len(&self) -> usize {
        self.store.len()
    }

    /// Returns true if the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    /// Number of keys in the sampling index.
    pub fn index_len(&self) -> usize {
        self.store.index_len()
    }

    /// Copy of the sorted sampling index.
    pub fn index_snapshot(&self) -> Vec<u64> {
        self.store.index_snapshot()
    }

    /// The configuration this cache was built with.
    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Returns cache statistics.
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            storage: self.store.stats(),
            sweeps: self.sweeper.stats(),
            evictions: self.pipeline.stats(),
        }
    }

    /// Stops the sweeper and stops accepting evictions.
    ///
    /// Payloads already queued are still delivered. Payloads evicted after
    /// this call are dropped without reaching the callback.
    pub fn drop_callback(&self) {
        self.sweeper.stop();
        self.pipeline.close();
    }

    /// Like [`drop_callback`](Self::drop_callback), then waits for the
    /// workers to finish delivering queued payloads.
    pub fn shutdown(&self) {
        self.drop_callback();
        self.pipeline.shutdown();
        info!("Expiry cache shut down");
    }
}

impl<V> Drop for ExpiryCache<V> {
    fn drop(&mut self) {
        self.drop_callback();
    }
}
