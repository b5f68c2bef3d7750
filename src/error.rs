//! Error types for cache construction.
//!
//! Cache operations themselves never fail: a missing or expired key is a
//! plain `None`/`false`. Only building a cache can go wrong.

use thiserror::Error;

/// Errors raised while constructing an [`ExpiryCache`](crate::ExpiryCache).
#[derive(Debug, Error)]
pub enum CacheError {
    /// A configuration value is out of range
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// The sweep scheduler needs a Tokio runtime to run on
    #[error("no Tokio runtime available to host the expiry sweeper")]
    NoRuntime,

    /// An eviction worker thread could not be spawned
    #[error("failed to spawn eviction worker: {0}")]
    WorkerSpawn(#[source] std::io::Error),
}

/// Convenience Result type for cache construction.
pub type Result<T> = std::result::Result<T, CacheError>;
