//! Eviction Module
//!
//! Delivers evicted payloads to the owner's callback off the caller's and
//! the sweeper's critical path.

pub mod pipeline;

pub use pipeline::{EvictionCallback, EvictionPipeline, PipelineStats};
