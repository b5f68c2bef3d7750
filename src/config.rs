//! Cache configuration.

use crate::error::{CacheError, Result};
use std::time::Duration;

/// Default interval between sweep ticks.
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_millis(500);

/// Default number of eviction callback workers.
pub const DEFAULT_WORKER_COUNT: usize = 4;

/// Default local hour (0-23) at which the daily full sweep is armed.
pub const DEFAULT_FULL_SWEEP_HOUR: u32 = 3;

/// Default number of shards.
pub const DEFAULT_SHARD_COUNT: usize = 16;

/// Keys examined by one sample sweep.
pub const DEFAULT_SAMPLE_SIZE: usize = 16;

/// Slots in the eviction queue.
pub const DEFAULT_QUEUE_CAPACITY: usize = 18;

/// Configuration for an [`ExpiryCache`](crate::ExpiryCache).
///
/// Every value is fixed for the lifetime of the cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheConfig {
    /// Interval between sweep ticks
    pub sweep_interval: Duration,

    /// Number of threads invoking the eviction callback
    pub worker_count: usize,

    /// Local hour (0-23) from which the daily full sweep may run
    pub full_sweep_hour: u32,

    /// Number of independently locked partitions
    pub shard_count: usize,

    /// Keys drawn from the index by a sample sweep
    pub sample_size: usize,

    /// Capacity of the eviction queue
    pub queue_capacity: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            sweep_interval: DEFAULT_SWEEP_INTERVAL,
            worker_count: DEFAULT_WORKER_COUNT,
            full_sweep_hour: DEFAULT_FULL_SWEEP_HOUR,
            shard_count: DEFAULT_SHARD_COUNT,
            sample_size: DEFAULT_SAMPLE_SIZE,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }
}

impl CacheConfig {
    /// Sets the interval between sweeper ticks.
    pub fn with_sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval = interval;
        self
    }

    /// Sets the number of eviction worker threads.
    pub fn with_worker_count(mut self, count: usize) -> Self {
        self.worker_count = count;
        self
    }

    /// Sets the local hour (0-23) from which the daily full sweep may run.
    pub fn with_full_sweep_hour(mut self, hour: u32) -> Self {
        self.full_sweep_hour = hour;
        self
    }

    /// Sets the number of shards.
    pub fn with_shard_count(mut self, count: usize) -> Self {
        self.shard_count = count;
        self
    }

    /// Sets the number of keys checked by a sample sweep.
    pub fn with_sample_size(mut self, size: usize) -> Self {
        self.sample_size = size;
        self
    }

    /// Sets the eviction queue capacity.
    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    /// Checks that every value is in range.
    pub fn validate(&self) -> Result<()> {
        if self.sweep_interval.is_zero() {
            return Err(CacheError::InvalidConfig(
                "sweep_interval must be greater than zero".to_string(),
            ));
        }
        if self.worker_count == 0 {
            return Err(CacheError::InvalidConfig(
                "worker_count must be at least 1".to_string(),
            ));
        }
        if self.full_sweep_hour > 23 {
            return Err(CacheError::InvalidConfig(format!(
                "full_sweep_hour must be 0-23, got {}",
                self.full_sweep_hour
            )));
        }
        if self.shard_count == 0 {
            return Err(CacheError::InvalidConfig(
                "shard_count must be at least 1".to_string(),
            ));
        }
        if self.sample_size == 0 {
            return Err(CacheError::InvalidConfig(
                "sample_size must be at least 1".to_string(),
            ));
        }
        if self.queue_capacity == 0 {
            return Err(CacheError::InvalidConfig(
                "queue_capacity must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = CacheConfig::default();
        assert_eq!(config.sweep_interval, Duration::from_millis(500));
        assert_eq!(config.worker_count, 4);
        assert_eq!(config.full_sweep_hour, 3);
        assert_eq!(config.shard_count, 16);
        assert_eq!(config.sample_size, 16);
        assert_eq!(config.queue_capacity, 18);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_rejects_bad_hour() {
        let config = CacheConfig::default().with_full_sweep_hour(24);
        assert!(matches!(
            config.validate(),
            Err(CacheError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_config_rejects_zero_counts() {
        for config in [
            CacheConfig::default().with_worker_count(0),
            CacheConfig::default().with_shard_count(0),
            CacheConfig::default().with_sample_size(0),
            CacheConfig::default().with_queue_capacity(0),
            CacheConfig::default().with_sweep_interval(Duration::ZERO),
        ] {
            assert!(config.validate().is_err(), "{config:?} should be rejected");
        }
    }
}
