//! Distributor - concurrent fanout of one record to all active sinks
//!
//! Each sink gets one delivery attempt with an independent timeout. A sink
//! that fails, times out, or hangs degrades the report for that sink only;
//! sibling deliveries are never cancelled by it. There is no automatic
//! retry inside a fanout call; retry is a caller decision across cycles.

use futures::future::join_all;
use serde::Serialize;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{debug, warn};

use vigil_adapters::SharedSink;
use vigil_core::IndicatorRecord;

use crate::CancelToken;

/// Outcome of one delivery attempt to one sink
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "reason", rename_all = "snake_case")]
pub enum DeliveryOutcome {
    /// Attempt not yet resolved
    Pending,
    Delivered,
    Failed(String),
    /// Abandoned because the cycle was cancelled
    Cancelled,
}

/// Per-record delivery accounting across all active sinks
#[derive(Debug, Clone, Serialize)]
pub struct FanoutReport {
    /// Document id of the distributed record
    pub doc_id: String,
    pub per_sink: BTreeMap<String, DeliveryOutcome>,
    /// True iff every active sink reported Delivered
    pub overall_success: bool,
}

/// Fans records out to all active sinks concurrently
pub struct Distributor {
    sinks: Vec<SharedSink>,
    timeout: Duration,
}

impl Distributor {
    pub fn new(sinks: Vec<SharedSink>, timeout: Duration) -> Self {
        Self { sinks, timeout }
    }

    pub fn sinks(&self) -> &[SharedSink] {
        &self.sinks
    }

    /// Deliver `record` to every active sink concurrently.
    ///
    /// Returns within roughly one timeout bound regardless of sink
    /// behavior.
    pub async fn fanout(&self, record: &IndicatorRecord, cancel: &CancelToken) -> FanoutReport {
        let mut per_sink: BTreeMap<String, DeliveryOutcome> = self
            .sinks
            .iter()
            .map(|s| (s.id().to_string(), DeliveryOutcome::Pending))
            .collect();

        let timeout = self.timeout;
        let tasks = self.sinks.iter().map(|sink| {
            let sink = sink.clone();
            let record = record.clone();
            let cancel = cancel.clone();
            tokio::spawn(async move {
                let outcome = tokio::select! {
                    _ = cancel.cancelled() => DeliveryOutcome::Cancelled,
                    res = tokio::time::timeout(timeout, sink.deliver(&record)) => match res {
                        Ok(Ok(())) => DeliveryOutcome::Delivered,
                        Ok(Err(e)) => DeliveryOutcome::Failed(e.to_string()),
                        Err(_) => {
                            DeliveryOutcome::Failed(format!("timeout after {}s", timeout.as_secs()))
                        }
                    },
                };
                (sink.id().to_string(), outcome)
            })
        });

        for result in join_all(tasks).await {
            match result {
                Ok((id, outcome)) => {
                    if outcome != DeliveryOutcome::Delivered {
                        warn!("Delivery to sink {} failed: {:?}", id, outcome);
                    }
                    per_sink.insert(id, outcome);
                }
                Err(e) => warn!("Delivery task panicked: {e}"),
            }
        }

        // Vacuously true with no active sinks; a sink-less deployment
        // still completes its cycles cleanly.
        let overall_success = per_sink
            .values()
            .all(|o| *o == DeliveryOutcome::Delivered);

        debug!(
            "Fanout for {} complete: {}/{} delivered",
            record.key,
            per_sink
                .values()
                .filter(|o| **o == DeliveryOutcome::Delivered)
                .count(),
            per_sink.len()
        );

        FanoutReport {
            doc_id: record.doc_id(),
            per_sink,
            overall_success,
        }
    }
}
