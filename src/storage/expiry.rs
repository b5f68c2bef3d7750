//! Background Expiry Sweeper
//!
//! This module implements "active expiry": a background task that wakes on
//! a fixed interval, draws keys from the key index and removes the ones that
//! have expired. Lazy expiry on `get` alone would leave keys that are never
//! read again in memory forever.
//!
//! ## Sample and Full Sweeps
//!
//! Most ticks run a *sample sweep*: a fixed number of random keys is checked,
//! so the cost does not grow with the size of the cache. Once per calendar
//! day, on the first tick at or after the configured local hour, the sweeper
//! runs a *full sweep* that checks every key, bounding how long an expired
//! key can linger unsampled.
//!
//! ## Failure Isolation
//!
//! Each tick runs on Tokio's blocking pool, since checking keys takes shard
//! locks and may block on a full eviction queue. A panic inside a tick is
//! logged and counted, and the loop carries on with the next tick.

use crate::config::CacheConfig;
use crate::storage::ShardStore;
use chrono::{Local, NaiveDate, Timelike};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::runtime::Handle;
use tokio::sync::watch;
use tracing::{debug, info, trace, warn};

/// Kind of sweep performed on a tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SweepKind {
    /// Check a bounded random sample of keys
    Sample,
    /// Check every key
    Full,
}

impl SweepKind {
    pub fn is_full(self) -> bool {
        matches!(self, SweepKind::Full)
    }
}

/// Result of a single sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepOutcome {
    /// Keys checked
    pub examined: usize,
    /// Keys removed because they had expired
    pub removed: usize,
}

/// Decides which ticks run the daily full sweep.
///
/// A full sweep is due on the first classification at or after
/// `full_sweep_hour` on a date that has not had one yet. Remembering the
/// date rather than a single flag means a process idle across midnight
/// still gets its sweep on the next day.
#[derive(Debug, Clone)]
pub struct SweepPolicy {
    full_sweep_hour: u32,
    last_full: Option<NaiveDate>,
}

impl SweepPolicy {
    pub fn new(full_sweep_hour: u32) -> Self {
        Self {
            full_sweep_hour,
            last_full: None,
        }
    }

    /// Classifies a tick happening at `hour` on `date`.
    pub fn classify(&mut self, date: NaiveDate, hour: u32) -> SweepKind {
        if hour < self.full_sweep_hour || self.last_full == Some(date) {
            return SweepKind::Sample;
        }
        self.last_full = Some(date);
        SweepKind::Full
    }

    /// Classifies a tick happening now, in local time.
    pub fn classify_now(&mut self) -> SweepKind {
        let now = Local::now();
        self.classify(now.date_naive(), now.hour())
    }
}

/// Runs one sweep over `store`.
///
/// A sample sweep checks at most `sample_size` keys; a full sweep checks
/// every key in the index at the time it was read.
pub fn run_sweep<V: Clone + Send + 'static>(
    store: &ShardStore<V>,
    kind: SweepKind,
    sample_size: usize,
) -> SweepOutcome {
    let now = Instant::now();
    let keys = store.sample_keys(sample_size, kind.is_full());

    // A key removed since the snapshot was taken is a no-op here.
    let removed = keys.iter().filter(|&&key| store.check_key(key, now)).count();

    SweepOutcome {
        examined: keys.len(),
        removed,
    }
}

/// Configuration for the expiry sweeper.
#[derive(Debug, Clone)]
pub struct ExpiryConfig {
    /// Interval between ticks
    pub interval: Duration,

    /// Keys checked by a sample sweep
    pub sample_size: usize,

    /// Local hour from which the daily full sweep may run
    pub full_sweep_hour: u32,
}

impl Default for ExpiryConfig {
    fn default() -> Self {
        Self::from(&CacheConfig::default())
    }
}

impl From<&CacheConfig> for ExpiryConfig {
    fn from(config: &CacheConfig) -> Self {
        Self {
            interval: config.sweep_interval,
            sample_size: config.sample_size,
            full_sweep_hour: config.full_sweep_hour,
        }
    }
}

#[derive(Debug, Default)]
struct SweepCounters {
    sample_sweeps: AtomicU64,
    full_sweeps: AtomicU64,
    failed_sweeps: AtomicU64,
    examined: AtomicU64,
    removed: AtomicU64,
}

/// Snapshot of sweeper counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepStats {
    /// Completed sample sweeps
    pub sample_sweeps: u64,
    /// Completed full sweeps
    pub full_sweeps: u64,
    /// Ticks that panicked
    pub failed_sweeps: u64,
    /// Keys checked across all sweeps
    pub keys_examined: u64,
    /// Keys removed across all sweeps
    pub keys_removed: u64,
}

/// A handle to the running expiry sweeper.
///
/// When this handle is dropped, the sweeper task will be stopped.
#[derive(Debug)]
pub struct ExpirySweeper {
    /// Sender to signal shutdown
    shutdown_tx: watch::Sender<bool>,
    counters: Arc<SweepCounters>,
}

impl ExpirySweeper {
    /// Starts sweeping `store` as a task on `runtime`.
    pub fn start<V>(store: Arc<ShardStore<V>>, config: ExpiryConfig, runtime: &Handle) -> Self
    where
        V: Clone + Send + Sync + 'static,
    {
        let sample_size = config.sample_size;
        Self::spawn_with(
            move |kind| run_sweep(&store, kind, sample_size),
            config,
            runtime,
        )
    }

    /// Starts a sweeper whose ticks run `tick`.
    pub(crate) fn spawn_with<F>(tick: F, config: ExpiryConfig, runtime: &Handle) -> Self
    where
        F: Fn(SweepKind) -> SweepOutcome + Send + Sync + 'static,
    {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let counters = Arc::new(SweepCounters::default());

        runtime.spawn(sweeper_loop(
            Arc::new(tick),
            config,
            Arc::clone(&counters),
            shutdown_rx,
        ));

        info!("Background expiry sweeper started");

        Self {
            shutdown_tx,
            counters,
        }
    }

    /// Stops the expiry sweeper.
    ///
    /// This is called automatically when the handle is dropped. A tick that
    /// is already running finishes first.
    pub fn stop(&self) {
        if !self.shutdown_tx.send_replace(true) {
            info!("Background expiry sweeper stopped");
        }
    }

    /// Returns true once [`stop`](Self::stop) has been called.
    pub fn is_stopped(&self) -> bool {
        *self.shutdown_tx.borrow()
    }

    /// Returns sweeper counters.
    pub fn stats(&self) -> SweepStats {
        SweepStats {
            sample_sweeps: self.counters.sample_sweeps.load(Ordering::Relaxed),
            full_sweeps: self.counters.full_sweeps.load(Ordering::Relaxed),
            failed_sweeps: self.counters.failed_sweeps.load(Ordering::Relaxed),
            keys_examined: self.counters.examined.load(Ordering::Relaxed),
            keys_removed: self.counters.removed.load(Ordering::Relaxed),
        }
    }
}

impl Drop for ExpirySweeper {
    fn drop(&mut self) {
        self.stop();
    }
}

/// The main sweeper loop.
async fn sweeper_loop<F>(
    tick: Arc<F>,
    config: ExpiryConfig,
    counters: Arc<SweepCounters>,
    mut shutdown_rx: watch::Receiver<bool>,
) where
    F: Fn(SweepKind) -> SweepOutcome + Send + Sync + 'static,
{
    let mut policy = SweepPolicy::new(config.full_sweep_hour);

    loop {
        // Wait for the interval or shutdown signal
        tokio::select! {
            _ = tokio::time::sleep(config.interval) => {}
            result = shutdown_rx.changed() => {
                if result.is_err() || *shutdown_rx.borrow() {
                    debug!("Expiry sweeper received shutdown signal");
                    return;
                }
            }
        }

        let kind = policy.classify_now();
        let tick = Arc::clone(&tick);

        match tokio::task::spawn_blocking(move || tick(kind)).await {
            Ok(outcome) => {
                let counter = match kind {
                    SweepKind::Sample => &counters.sample_sweeps,
                    SweepKind::Full => &counters.full_sweeps,
                };
                counter.fetch_add(1, Ordering::Relaxed);
                counters
                    .examined
                    .fetch_add(outcome.examined as u64, Ordering::Relaxed);
                counters
                    .removed
                    .fetch_add(outcome.removed as u64, Ordering::Relaxed);

                if kind.is_full() {
                    info!(
                        examined = outcome.examined,
                        removed = outcome.removed,
                        "Full expiry sweep finished"
                    );
                } else if outcome.removed > 0 {
                    debug!(
                        examined = outcome.examined,
                        removed = outcome.removed,
                        "Expired keys cleaned up"
                    );
                } else {
                    trace!(examined = outcome.examined, "Sample sweep found nothing");
                }
            }
            Err(err) if err.is_panic() => {
                counters.failed_sweeps.fetch_add(1, Ordering::Relaxed);
                warn!(kind = ?kind, "Expiry sweep panicked, continuing on next tick");
            }
            Err(_) => {
                debug!("Expiry sweep cancelled, runtime shutting down");
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::eviction::EvictionPipeline;
    use crate::storage::Expirable;
    use std::sync::atomic::AtomicUsize;

    fn date(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, day).unwrap()
    }

    fn fast_config() -> ExpiryConfig {
        ExpiryConfig {
            interval: Duration::from_millis(10),
            sample_size: 16,
            full_sweep_hour: 3,
        }
    }

    fn new_store(shards: usize) -> Arc<ShardStore<u64>> {
        let pipeline = EvictionPipeline::<u64>::start(Arc::new(|_: u64| {}), 2, 64).unwrap();
        Arc::new(ShardStore::new(shards, Arc::new(pipeline)))
    }

    #[test]
    fn test_policy_sample_before_cutoff() {
        let mut policy = SweepPolicy::new(3);
        for hour in 0..3 {
            assert_eq!(policy.classify(date(1), hour), SweepKind::Sample);
        }
    }

    #[test]
    fn test_policy_one_full_sweep_per_day() {
        let mut policy = SweepPolicy::new(3);

        assert_eq!(policy.classify(date(1), 2), SweepKind::Sample);
        assert_eq!(policy.classify(date(1), 3), SweepKind::Full);
        assert_eq!(policy.classify(date(1), 3), SweepKind::Sample);
        assert_eq!(policy.classify(date(1), 23), SweepKind::Sample);

        // Next day re-arms
        assert_eq!(policy.classify(date(2), 0), SweepKind::Sample);
        assert_eq!(policy.classify(date(2), 4), SweepKind::Full);
        assert_eq!(policy.classify(date(2), 5), SweepKind::Sample);
    }

    #[test]
    fn test_policy_rearms_after_idle_midnight() {
        let mut policy = SweepPolicy::new(3);

        assert_eq!(policy.classify(date(1), 22), SweepKind::Full);
        // No tick observed before the cutoff on day 2
        assert_eq!(policy.classify(date(2), 10), SweepKind::Full);
    }

    #[test]
    fn test_run_sweep_sample_is_bounded() {
        let store = new_store(4);
        let now = Instant::now();
        for key in 0..100 {
            store.put(key, Expirable::new(key, now, 0));
        }

        let outcome = run_sweep(&store, SweepKind::Sample, 16);
        assert_eq!(outcome.examined, 16);
        assert_eq!(outcome.removed, 16);
        assert_eq!(store.len(), 84);
        assert_eq!(store.index_len(), 84);
    }

    #[test]
    fn test_run_sweep_full_checks_everything() {
        let store = new_store(4);
        let now = Instant::now();
        for key in 0..100 {
            let ttl = if key % 2 == 0 { 0 } else { 60 };
            store.put(key, Expirable::new(key, now, ttl));
        }

        let outcome = run_sweep(&store, SweepKind::Full, 16);
        assert_eq!(outcome.examined, 100);
        assert_eq!(outcome.removed, 50);
        assert_eq!(store.len(), 50);
        assert!(store.index_snapshot().iter().all(|k| k % 2 == 1));
    }

    #[tokio::test]
    async fn test_sweeper_cleans_expired_keys() {
        let store = new_store(4);
        let now = Instant::now();

        // Add some keys with short TTL
        for key in 0..10 {
            store.put(key, Expirable::with_ttl(key, now, Duration::from_millis(50)));
        }

        // Add a long-lived key
        store.put(99, Expirable::new(99, now, 3600));

        assert_eq!(store.len(), 11);

        let sweeper = ExpirySweeper::start(Arc::clone(&store), fast_config(), &Handle::current());

        // Wait for keys to expire and be cleaned up
        tokio::time::sleep(Duration::from_millis(300)).await;

        // Only the long-lived key should remain
        assert_eq!(store.len(), 1);
        assert_eq!(store.index_snapshot(), vec![99]);
        assert!(sweeper.stats().keys_removed >= 10);
    }

    #[tokio::test]
    async fn test_sweeper_survives_panicking_tick() {
        let ticks = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&ticks);

        let sweeper = ExpirySweeper::spawn_with(
            move |_| {
                if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                    panic!("first tick fails");
                }
                SweepOutcome::default()
            },
            fast_config(),
            &Handle::current(),
        );

        tokio::time::sleep(Duration::from_millis(200)).await;

        assert!(ticks.load(Ordering::SeqCst) >= 3);
        let stats = sweeper.stats();
        assert_eq!(stats.failed_sweeps, 1);
        assert!(stats.sample_sweeps + stats.full_sweeps >= 2);
    }

    #[tokio::test]
    async fn test_sweeper_stops_on_drop() {
        let ticks = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&ticks);

        {
            let _sweeper = ExpirySweeper::spawn_with(
                move |_| {
                    counter.fetch_add(1, Ordering::SeqCst);
                    SweepOutcome::default()
                },
                fast_config(),
                &Handle::current(),
            );
            tokio::time::sleep(Duration::from_millis(50)).await;
            // Sweeper is dropped here
        }

        tokio::time::sleep(Duration::from_millis(20)).await;
        let after_stop = ticks.load(Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(100)).await;

        assert_eq!(ticks.load(Ordering::SeqCst), after_stop);
    }
}
