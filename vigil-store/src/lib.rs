//! Canonical indicator store
//!
//! The store is the single mutable shared resource in the pipeline. It is
//! referenced only through the [`CanonicalStore`] trait; implementations
//! must make `upsert` an atomic read-merge-write so that concurrent cycles
//! targeting the same business key serialize and no update is lost.

pub mod memory;

pub use memory::MemoryStore;

use async_trait::async_trait;
use serde::Serialize;
use std::collections::BTreeMap;
use thiserror::Error;

use vigil_core::{IndicatorKey, IndicatorRecord};

/// Errors from the canonical store
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    /// The backing store cannot be reached; fatal for the cycle
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// A merge could not be applied; the incoming update is dropped
    #[error("merge conflict for {key}: {detail}")]
    MergeConflict { key: String, detail: String },
}

/// Aggregate counts over the live store
#[derive(Debug, Clone, Default, Serialize)]
pub struct StoreStats {
    pub total: usize,
    pub active: usize,
    pub by_severity: BTreeMap<String, usize>,
    pub by_type: BTreeMap<String, usize>,
}

/// Abstract repository for canonical indicator records
#[async_trait]
pub trait CanonicalStore: Send + Sync {
    /// Fetch the live record for a business key
    async fn get(&self, key: &IndicatorKey) -> Result<Option<IndicatorRecord>, StoreError>;

    /// Atomic read-merge-write. Returns the merged record.
    ///
    /// Concurrent upserts of the same key must serialize: the stored value
    /// is always the fold of all observed updates in some order.
    async fn upsert(&self, incoming: IndicatorRecord) -> Result<IndicatorRecord, StoreError>;

    /// Point-in-time snapshot of all live records.
    ///
    /// Must not block concurrent writers; strict serializability against
    /// in-flight upserts is not required.
    async fn snapshot(&self) -> Result<Vec<IndicatorRecord>, StoreError>;

    /// Aggregate counts for the status summary
    async fn stats(&self) -> Result<StoreStats, StoreError>;
}
