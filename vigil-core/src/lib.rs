//! Vigil Core - indicator data model for the threat intelligence pipeline
//!
//! This crate provides the foundational primitives:
//! - Typed indicator records keyed by (value, type)
//! - The idempotent, associative merge policy
//! - Raw feed record normalization with per-type validation
//! - The opaque threat scorer capability

pub mod indicator;
pub mod normalize;
pub mod scorer;

pub use indicator::*;
pub use normalize::*;
pub use scorer::*;

/// Default per-sink delivery/search timeout in seconds
pub const DEFAULT_SINK_TIMEOUT_SECS: u64 = 5;

/// Default feed fetch timeout in seconds
pub const DEFAULT_FEED_TIMEOUT_SECS: u64 = 30;

/// Maximum confidence score
pub const MAX_CONFIDENCE: u8 = 100;
