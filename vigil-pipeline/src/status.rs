//! Status and health summary
//!
//! Aggregates the last cycle's counts with live per-sink connectivity
//! probes. Overall health: all sinks connected is healthy, some is
//! degraded, none is unhealthy.

use chrono::{DateTime, Utc};
use futures::future::join_all;
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::BTreeMap;

use vigil_adapters::{SharedSink, SinkHealth};

use crate::{CorrelationReport, CycleReport};

/// Overall platform health derived from sink connectivity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthState {
    Healthy,
    Degraded,
    Unhealthy,
}

/// Aggregated status snapshot for callers and the API layer
#[derive(Debug, Clone, Serialize)]
pub struct StatusSummary {
    pub generated_at: DateTime<Utc>,
    pub overall: HealthState,
    pub sinks: BTreeMap<String, SinkHealth>,
    pub last_cycle: Option<CycleReport>,
    pub last_correlation: Option<CorrelationReport>,
}

/// Records the most recent cycle reports and produces status summaries
#[derive(Default)]
pub struct StatusTracker {
    last_cycle: Mutex<Option<CycleReport>>,
    last_correlation: Mutex<Option<CorrelationReport>>,
}

impl StatusTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_cycle(&self, report: CycleReport) {
        *self.last_cycle.lock() = Some(report);
    }

    pub fn record_correlation(&self, report: CorrelationReport) {
        *self.last_correlation.lock() = Some(report);
    }

    /// Probe all sinks concurrently and assemble the summary
    pub async fn summary(&self, sinks: &[SharedSink]) -> StatusSummary {
        let probes = join_all(sinks.iter().map(|sink| {
            let sink = sink.clone();
            async move { (sink.id().to_string(), sink.health().await) }
        }))
        .await;

        let connected = probes.iter().filter(|(_, h)| h.connected).count();
        let overall = if !probes.is_empty() && connected == probes.len() {
            HealthState::Healthy
        } else if connected > 0 {
            HealthState::Degraded
        } else {
            HealthState::Unhealthy
        };

        StatusSummary {
            generated_at: Utc::now(),
            overall,
            sinks: probes.into_iter().collect(),
            last_cycle: self.last_cycle.lock().clone(),
            last_correlation: self.last_correlation.lock().clone(),
        }
    }
}
