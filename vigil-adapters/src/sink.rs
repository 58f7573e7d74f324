//! Common interface for intelligence sinks

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

use vigil_core::IndicatorRecord;

/// Errors from sink operations
///
/// All variants are per-sink and non-fatal to a fanout or aggregation; the
/// pipeline records them in the report instead of propagating.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SinkError {
    #[error("timeout after {0}s")]
    Timeout(u64),

    #[error("sink rejected the record: {0}")]
    Rejected(String),

    #[error("sink unreachable: {0}")]
    Unreachable(String),

    #[error("cancelled")]
    Cancelled,
}

/// Connectivity status reported by a sink
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SinkHealth {
    pub connected: bool,
    pub detail: String,
}

impl SinkHealth {
    pub fn connected(detail: &str) -> Self {
        Self {
            connected: true,
            detail: detail.to_string(),
        }
    }

    pub fn disconnected(detail: &str) -> Self {
        Self {
            connected: false,
            detail: detail.to_string(),
        }
    }
}

/// An external intelligence sink (search/index backend)
///
/// Sinks are treated as read-only configuration for the duration of a
/// cycle; one adapter instance serves concurrent deliveries and searches.
#[async_trait]
pub trait SinkAdapter: Send + Sync {
    /// Stable sink identifier used in reports
    fn id(&self) -> &str;

    /// Deliver one indicator record. Writes are expected to be idempotent
    /// under the record's document id, so at-least-once delivery suffices.
    async fn deliver(&self, record: &IndicatorRecord) -> Result<(), SinkError>;

    /// Query the sink for indicators matching `query`
    async fn search(&self, query: &str, limit: usize)
        -> Result<Vec<IndicatorRecord>, SinkError>;

    /// Probe connectivity
    async fn health(&self) -> SinkHealth;
}

/// Shared handle to a sink adapter
pub type SharedSink = Arc<dyn SinkAdapter>;
