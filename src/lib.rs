//! # sweepcache - A Concurrent Expiring Cache for `u64` Keys
//!
//! sweepcache is an in-process key/value cache for long-running services
//! that hold many short-lived objects (sessions, computed results). Every
//! value carries an absolute expiry instant; expired values are removed and
//! handed to an owner-supplied callback so they can be persisted or cleaned
//! up elsewhere.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                             ExpiryCache                                 │
//! │                                                                         │
//! │   put / get / delete                                                    │
//! │          │                                                              │
//! │          ▼                                                              │
//! │  ┌──────────────────────────────────────────────┐                       │
//! │  │                 ShardStore                   │                       │
//! │  │  ┌────────┐ ┌────────┐ ┌────────┐ ┌────────┐ │   ┌───────────────┐   │
//! │  │  │Shard 0 │ │Shard 1 │ │Shard 2 │ │...N    │ │──>│ KeyIndex      │   │
//! │  │  │RwLock  │ │RwLock  │ │RwLock  │ │shards  │ │   │ (sorted keys) │   │
//! │  │  └────────┘ └────────┘ └────────┘ └────────┘ │   └───────▲───────┘   │
//! │  └──────────────┬───────────────────────────────┘           │ sample    │
//! │                 │ evicted payloads         ┌────────────────┴───────┐   │
//! │                 ▼                          │     ExpirySweeper      │   │
//! │  ┌──────────────────────────────┐          │ (Background Tokio Task)│   │
//! │  │ EvictionPipeline             │          └────────────────────────┘   │
//! │  │ bounded queue + worker pool  │──> callback(value)                    │
//! │  └──────────────────────────────┘                                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```no_run
//! use sweepcache::{ExpiryCache, Expirable};
//! use std::time::{Duration, Instant};
//!
//! #[tokio::main]
//! async fn main() -> sweepcache::Result<()> {
//!     let cache = ExpiryCache::new(
//!         Duration::from_millis(500),
//!         |session: String| println!("session {session} expired"),
//!         4,
//!         3,
//!         16,
//!     )?;
//!
//!     cache.put(42, Expirable::new("alice".to_string(), Instant::now(), 30));
//!     assert_eq!(cache.get(42, Instant::now()).as_deref(), Some("alice"));
//!
//!     cache.shutdown();
//!     Ok(())
//! }
//! ```
//!
//! ## Design Highlights
//!
//! ### Lock Discipline
//!
//! Each shard has its own lock and the key index has one more. Operations
//! that touch both always lock the shard first, so operations on different
//! shards run in parallel and never deadlock on the index.
//!
//! ### Lazy + Active Expiry
//!
//! 1. **Lazy**: `get` removes an expired entry it runs into
//! 2. **Active**: the sweeper checks a small random sample of keys on every
//!    tick, and every key once a day
//!
//! ### Eviction Backpressure
//!
//! The eviction queue is bounded. When the callback falls behind, whoever
//! is evicting blocks until a slot frees up; no payload is lost. A panicking
//! callback is isolated to that one invocation.
//!
//! ## Module Overview
//!
//! - [`storage`]: expirable values, key index, shard store and sweeper
//! - [`eviction`]: bounded queue and callback workers
//! - [`config`]: cache configuration
//! - [`error`]: construction errors

pub mod cache;
pub mod config;
pub mod error;
pub mod eviction;
pub mod storage;

// Re-export commonly used types for convenience
pub use cache::{CacheStats, ExpiryCache};
pub use config::CacheConfig;
pub use error::{CacheError, Result};
pub use eviction::{EvictionCallback, EvictionPipeline};
pub use storage::{Expirable, ShardStore, SweepKind, SweepOutcome};

/// Version of sweepcache
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
