//! Storage Module
//!
//! This module provides the core storage functionality for sweepcache:
//! a sharded, thread-safe map of `u64` keys to expirable values, the sorted
//! key index used for sampling, and the background expiry sweeper.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                       ShardStore                            │
//! │  ┌─────────┐ ┌─────────┐ ┌─────────┐ ┌─────────┐            │
//! │  │ Shard 0 │ │ Shard 1 │ │ Shard 2 │ │ ...N    │  KeyIndex  │
//! │  │ RwLock  │ │ RwLock  │ │ RwLock  │ │ shards  │  (RwLock)  │
//! │  └─────────┘ └─────────┘ └─────────┘ └─────────┘            │
//! └─────────────────────────────────────────────────────────────┘
//!                            ▲
//!                            │ sample / check_key
//!              ┌─────────────┴─────────────┐
//!              │     ExpirySweeper         │
//!              │  (Background Tokio Task)  │
//!              └───────────────────────────┘
//! ```
//!
//! ## Features
//!
//! - **Sharded Storage**: independent shards reduce lock contention
//! - **Key Index**: sorted key vector with its own lock, sampled by the sweeper
//! - **Lazy Expiry**: expired keys are removed on access
//! - **Active Expiry**: bounded sample sweeps plus one full sweep per day

pub mod engine;
pub mod entry;
pub mod expiry;
pub mod index;

// Re-export commonly used types
pub use engine::{ShardStore, StorageStats};
pub use entry::Expirable;
pub use expiry::{
    run_sweep, ExpiryConfig, ExpirySweeper, SweepKind, SweepOutcome, SweepPolicy, SweepStats,
};
pub use index::{sample_positions, KeyIndex};
