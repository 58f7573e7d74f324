//! Federated search aggregator
//!
//! Queries all active sinks concurrently with independent timeouts, then
//! merges the union by business key using the same merge policy as
//! ingestion, so corroborating signal from a second sink is never dropped.
//! The combined ordering is deterministic: severity desc, confidence desc,
//! last_seen desc, business key asc.

use futures::future::join_all;
use serde::Serialize;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{debug, warn};

use vigil_adapters::SharedSink;
use vigil_core::{merge, IndicatorKey, IndicatorRecord};

/// Per-sink search accounting
#[derive(Debug, Clone, Serialize)]
pub struct SinkSearchOutcome {
    /// Results contributed by this sink before dedup
    pub count: usize,
    /// Error annotation if the sink failed or timed out
    pub error: Option<String>,
}

/// Federated search result
#[derive(Debug, Clone, Serialize)]
pub struct AggregatedResult {
    pub query: String,
    pub per_sink: BTreeMap<String, SinkSearchOutcome>,
    /// Deduplicated, merged, and ranked union across sinks
    pub combined: Vec<IndicatorRecord>,
}

/// Fans a query out to all active sinks and combines the results
pub struct SearchAggregator {
    sinks: Vec<SharedSink>,
    timeout: Duration,
}

impl SearchAggregator {
    pub fn new(sinks: Vec<SharedSink>, timeout: Duration) -> Self {
        Self { sinks, timeout }
    }

    pub async fn search(&self, query: &str, limit: usize) -> AggregatedResult {
        let timeout = self.timeout;
        let tasks = self.sinks.iter().map(|sink| {
            let sink = sink.clone();
            let query = query.to_string();
            tokio::spawn(async move {
                let result = match tokio::time::timeout(timeout, sink.search(&query, limit)).await
                {
                    Ok(Ok(records)) => Ok(records),
                    Ok(Err(e)) => Err(e.to_string()),
                    Err(_) => Err(format!("timeout after {}s", timeout.as_secs())),
                };
                (sink.id().to_string(), result)
            })
        });

        let mut per_sink = BTreeMap::new();
        let mut groups: BTreeMap<IndicatorKey, IndicatorRecord> = BTreeMap::new();

        for task in join_all(tasks).await {
            let (id, result) = match task {
                Ok(pair) => pair,
                Err(e) => {
                    warn!("Search task panicked: {e}");
                    continue;
                }
            };
            match result {
                Ok(records) => {
                    per_sink.insert(
                        id,
                        SinkSearchOutcome {
                            count: records.len(),
                            error: None,
                        },
                    );
                    for record in records {
                        groups
                            .entry(record.key.clone())
                            .and_modify(|existing| *existing = merge(existing, &record))
                            .or_insert(record);
                    }
                }
                Err(reason) => {
                    warn!("Sink {} search failed: {}", id, reason);
                    per_sink.insert(
                        id,
                        SinkSearchOutcome {
                            count: 0,
                            error: Some(reason),
                        },
                    );
                }
            }
        }

        let mut combined: Vec<IndicatorRecord> = groups.into_values().collect();
        combined.sort_by(|a, b| {
            b.severity
                .cmp(&a.severity)
                .then(b.confidence.cmp(&a.confidence))
                .then(b.last_seen.cmp(&a.last_seen))
                .then(a.key.cmp(&b.key))
        });
        combined.truncate(limit);

        debug!(
            "Federated search {:?}: {} combined results from {} sinks",
            query,
            combined.len(),
            per_sink.len()
        );

        AggregatedResult {
            query: query.to_string(),
            per_sink,
            combined,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use vigil_adapters::{MemorySink, SinkAdapter, SinkMode};
    use vigil_core::{IndicatorType, Severity};

    fn record(value: &str, severity: Severity, confidence: u8) -> IndicatorRecord {
        IndicatorRecord::new(
            IndicatorKey::new(value, IndicatorType::Ip),
            severity,
            confidence,
            "feed",
        )
    }

    #[tokio::test]
    async fn test_dedup_merges_corroborating_sinks() {
        let s1 = Arc::new(MemorySink::new("s1"));
        let s2 = Arc::new(MemorySink::new("s2"));
        s1.deliver(&record("1.2.3.4", Severity::High, 60))
            .await
            .unwrap();
        s2.deliver(&record("1.2.3.4", Severity::Medium, 90))
            .await
            .unwrap();

        let aggregator = SearchAggregator::new(vec![s1, s2], Duration::from_secs(5));
        let result = aggregator.search("1.2.3.4", 10).await;

        assert_eq!(result.combined.len(), 1);
        let hit = &result.combined[0];
        assert_eq!(hit.severity, Severity::High);
        assert_eq!(hit.confidence, 90);
        assert_eq!(result.per_sink["s1"].count, 1);
        assert_eq!(result.per_sink["s2"].count, 1);
    }

    #[tokio::test]
    async fn test_sink_error_annotated_not_fatal() {
        let s1 = Arc::new(MemorySink::new("s1"));
        let s2 = Arc::new(MemorySink::with_mode("s2", SinkMode::Unreachable));
        s1.deliver(&record("5.6.7.8", Severity::Low, 30))
            .await
            .unwrap();

        let aggregator = SearchAggregator::new(vec![s1, s2], Duration::from_secs(5));
        let result = aggregator.search("5.6.7.8", 10).await;

        assert_eq!(result.combined.len(), 1);
        assert!(result.per_sink["s2"].error.is_some());
        assert_eq!(result.per_sink["s2"].count, 0);
    }

    #[tokio::test]
    async fn test_hanging_sink_times_out() {
        let s1 = Arc::new(MemorySink::new("s1"));
        let s2 = Arc::new(MemorySink::with_mode("s2", SinkMode::Hang));
        s1.deliver(&record("9.9.9.9", Severity::Low, 10))
            .await
            .unwrap();

        let aggregator = SearchAggregator::new(vec![s1, s2], Duration::from_millis(100));
        let result = aggregator.search("9.9.9.9", 10).await;

        assert_eq!(result.combined.len(), 1);
        let err = result.per_sink["s2"].error.as_deref().unwrap();
        assert!(err.contains("timeout"));
    }

    #[tokio::test]
    async fn test_ordering_and_limit() {
        let s1 = Arc::new(MemorySink::new("s1"));
        let base = chrono::Utc::now();

        // Tag them all so one query matches, with distinct last_seen values.
        for (i, (value, severity, confidence)) in [
            ("1.1.1.1", Severity::Low, 90),
            ("2.2.2.2", Severity::Critical, 20),
            ("3.3.3.3", Severity::Critical, 80),
        ]
        .into_iter()
        .enumerate()
        {
            let mut r = record(value, severity, confidence);
            r.tags.insert("shared".to_string());
            r.last_seen = base + chrono::Duration::seconds(i as i64);
            s1.deliver(&r).await.unwrap();
        }

        let aggregator = SearchAggregator::new(vec![s1], Duration::from_secs(5));
        let result = aggregator.search("shared", 2).await;

        assert_eq!(result.combined.len(), 2);
        assert_eq!(result.combined[0].key.value, "3.3.3.3");
        assert_eq!(result.combined[1].key.value, "2.2.2.2");
    }
}
