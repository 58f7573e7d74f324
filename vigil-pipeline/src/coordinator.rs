//! Ingestion coordinator
//!
//! One cycle: fetch all feeds concurrently, normalize, fold records by
//! business key within the cycle, merge each fold into the canonical store
//! atomically, then hand each merged record to the distributor. One feed's
//! failure never aborts the cycle; malformed records are dropped and
//! counted. A key sighted by several feeds in the same cycle produces one
//! upsert and one fanout.

use chrono::{DateTime, Utc};
use futures::future::join_all;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use vigil_adapters::{FeedError, SharedFeed};
use vigil_core::{normalize, merge, IndicatorKey, IndicatorRecord, RawIndicator, ThreatScorer};
use vigil_store::{CanonicalStore, StoreError};

use crate::{CancelToken, Distributor, FanoutReport};

/// Terminal state of a cycle; individual item failures never escalate to a
/// failed cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CycleStatus {
    Completed,
    CompletedWithErrors,
}

/// Report for one ingestion cycle
#[derive(Debug, Clone, Serialize)]
pub struct CycleReport {
    pub cycle_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub status: CycleStatus,
    /// Raw records observed across all feeds
    pub records_seen: usize,
    /// Unique business keys merged into the store
    pub records_merged: usize,
    /// Records dropped as malformed during normalization
    pub records_malformed: usize,
    /// Records dropped as benign by the scorer
    pub records_benign: usize,
    /// Feed name -> error for feeds that failed to fetch
    pub feed_errors: BTreeMap<String, String>,
    /// Store-level errors; an unavailable store aborts merging
    pub store_errors: Vec<String>,
    /// One fanout report per merged record
    pub distribution: Vec<FanoutReport>,
}

/// Pulls from feeds, merges into the store, and distributes to sinks
pub struct IngestionCoordinator {
    feeds: Vec<SharedFeed>,
    store: Arc<dyn CanonicalStore>,
    distributor: Distributor,
    scorer: Arc<dyn ThreatScorer>,
    feed_timeout: Duration,
}

impl IngestionCoordinator {
    pub fn new(
        feeds: Vec<SharedFeed>,
        store: Arc<dyn CanonicalStore>,
        distributor: Distributor,
        scorer: Arc<dyn ThreatScorer>,
        feed_timeout: Duration,
    ) -> Self {
        Self {
            feeds,
            store,
            distributor,
            scorer,
            feed_timeout,
        }
    }

    /// Run one bounded ingestion cycle
    pub async fn run_cycle(&self, cancel: &CancelToken) -> CycleReport {
        let cycle_id = Uuid::new_v4();
        let started_at = Utc::now();
        info!("Ingestion cycle {} starting ({} feeds)", cycle_id, self.feeds.len());

        let mut report = CycleReport {
            cycle_id,
            started_at,
            finished_at: started_at,
            status: CycleStatus::Completed,
            records_seen: 0,
            records_merged: 0,
            records_malformed: 0,
            records_benign: 0,
            feed_errors: BTreeMap::new(),
            store_errors: Vec::new(),
            distribution: Vec::new(),
        };

        // Fetch all feeds concurrently, each bounded by the fetch timeout.
        let fetches = join_all(self.feeds.iter().map(|feed| {
            let feed = feed.clone();
            let timeout = self.feed_timeout;
            async move {
                let result = match tokio::time::timeout(timeout, feed.fetch()).await {
                    Ok(res) => res,
                    Err(_) => Err(FeedError::Timeout(timeout.as_secs())),
                };
                (feed.name().to_string(), result)
            }
        }))
        .await;

        // Normalize and fold by business key within the cycle.
        let mut folded: BTreeMap<IndicatorKey, IndicatorRecord> = BTreeMap::new();
        let now = Utc::now();

        for (feed_name, result) in fetches {
            let raws = match result {
                Ok(raws) => raws,
                Err(e) => {
                    warn!("Feed {} failed: {}", feed_name, e);
                    report.feed_errors.insert(feed_name, e.to_string());
                    continue;
                }
            };

            for raw in raws {
                report.records_seen += 1;
                let raw = match self.apply_scorer(raw) {
                    Some(raw) => raw,
                    None => {
                        report.records_benign += 1;
                        continue;
                    }
                };
                match normalize(&raw, &feed_name, now) {
                    Ok(record) => {
                        folded
                            .entry(record.key.clone())
                            .and_modify(|existing| *existing = merge(existing, &record))
                            .or_insert(record);
                    }
                    Err(e) => {
                        debug!("Dropping malformed record from {}: {}", feed_name, e);
                        report.records_malformed += 1;
                    }
                }
            }
        }

        // Merge into the store and distribute, one fanout per unique key.
        for (key, record) in folded {
            if cancel.is_cancelled() {
                info!("Cycle {} cancelled; skipping remaining records", cycle_id);
                break;
            }

            let merged = match self.store.upsert(record).await {
                Ok(merged) => merged,
                Err(e @ StoreError::Unavailable(_)) => {
                    error!("Store unavailable, aborting cycle {}: {}", cycle_id, e);
                    report.store_errors.push(e.to_string());
                    break;
                }
                Err(e) => {
                    warn!("Dropping update for {}: {}", key, e);
                    report.store_errors.push(e.to_string());
                    continue;
                }
            };
            report.records_merged += 1;

            let fanout = self.distributor.fanout(&merged, cancel).await;
            report.distribution.push(fanout);
        }

        report.finished_at = Utc::now();
        report.status = if report.feed_errors.is_empty()
            && report.store_errors.is_empty()
            && report.distribution.iter().all(|f| f.overall_success)
        {
            CycleStatus::Completed
        } else {
            CycleStatus::CompletedWithErrors
        };

        info!(
            "Ingestion cycle {} finished: {} seen, {} merged, {} malformed, {} feed errors",
            cycle_id,
            report.records_seen,
            report.records_merged,
            report.records_malformed,
            report.feed_errors.len()
        );
        report
    }

    /// Fill in severity/confidence for feature-only records via the
    /// injected scorer. Returns None when the verdict is benign.
    fn apply_scorer(&self, mut raw: RawIndicator) -> Option<RawIndicator> {
        if raw.severity.is_some() || raw.confidence.is_some() || raw.features.is_none() {
            return Some(raw);
        }
        let score = self.scorer.score(raw.features.as_deref().unwrap_or(&[]));
        if !score.is_threat {
            return None;
        }
        raw.severity = Some(score.severity.as_str().to_string());
        raw.confidence = Some(score.confidence);
        Some(raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use vigil_adapters::{FeedSource, MemorySink, SharedSink, StaticFeed};
    use vigil_core::{IndicatorType, Severity, ThresholdScorer};
    use vigil_store::MemoryStore;

    struct BrokenFeed;

    #[async_trait]
    impl FeedSource for BrokenFeed {
        fn name(&self) -> &str {
            "broken"
        }

        async fn fetch(&self) -> Result<Vec<RawIndicator>, FeedError> {
            Err(FeedError::Unreachable("connection refused".to_string()))
        }
    }

    fn coordinator(
        feeds: Vec<SharedFeed>,
        store: Arc<MemoryStore>,
        sinks: Vec<SharedSink>,
    ) -> IngestionCoordinator {
        IngestionCoordinator::new(
            feeds,
            store,
            Distributor::new(sinks, Duration::from_secs(5)),
            Arc::new(ThresholdScorer::default()),
            Duration::from_secs(5),
        )
    }

    #[tokio::test]
    async fn test_two_feeds_one_key_single_fanout() {
        let feed_a = Arc::new(StaticFeed::new(
            "feed-a",
            vec![RawIndicator::new("evil.com", "domain")
                .with_severity("high")
                .with_confidence(70)],
        ));
        let feed_b = Arc::new(StaticFeed::new(
            "feed-b",
            vec![RawIndicator::new("evil.com", "domain")
                .with_severity("critical")
                .with_confidence(50)
                .with_tag("c2")],
        ));
        let store = Arc::new(MemoryStore::new());
        let sink = Arc::new(MemorySink::new("s1"));

        let coordinator = coordinator(
            vec![feed_a, feed_b],
            store.clone(),
            vec![sink.clone()],
        );
        let report = coordinator.run_cycle(&CancelToken::new()).await;

        assert_eq!(report.status, CycleStatus::Completed);
        assert_eq!(report.records_seen, 2);
        assert_eq!(report.records_merged, 1);
        assert_eq!(report.distribution.len(), 1);
        assert_eq!(sink.len(), 1);

        let key = IndicatorKey::new("evil.com", IndicatorType::Domain);
        let stored = store.get(&key).await.unwrap().unwrap();
        assert_eq!(stored.severity, Severity::Critical);
        assert_eq!(stored.confidence, 70);
        assert!(stored.tags.contains("c2"));
    }

    #[tokio::test]
    async fn test_cycle_without_sinks_completes_cleanly() {
        let feed = Arc::new(StaticFeed::new(
            "feed",
            vec![RawIndicator::new("203.0.113.5", "ip").with_severity("medium")],
        ));
        let store = Arc::new(MemoryStore::new());

        let coordinator = coordinator(vec![feed], store.clone(), vec![]);
        let report = coordinator.run_cycle(&CancelToken::new()).await;

        assert_eq!(report.status, CycleStatus::Completed);
        assert_eq!(report.records_merged, 1);
        assert!(report.distribution.iter().all(|f| f.overall_success));
    }

    #[tokio::test]
    async fn test_feed_failure_does_not_abort_cycle() {
        let good = Arc::new(StaticFeed::new(
            "good",
            vec![RawIndicator::new("203.0.113.9", "ip").with_severity("low")],
        ));
        let store = Arc::new(MemoryStore::new());
        let sink = Arc::new(MemorySink::new("s1"));

        let coordinator = coordinator(
            vec![Arc::new(BrokenFeed), good],
            store.clone(),
            vec![sink],
        );
        let report = coordinator.run_cycle(&CancelToken::new()).await;

        assert_eq!(report.status, CycleStatus::CompletedWithErrors);
        assert_eq!(report.records_merged, 1);
        assert!(report.feed_errors.contains_key("broken"));
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_malformed_records_counted_not_fatal() {
        let feed = Arc::new(StaticFeed::new(
            "mixed",
            vec![
                RawIndicator::new("999.999.0.1", "ip"),
                RawIndicator::new("", "domain"),
                RawIndicator::new("ok.example.net", "domain").with_severity("medium"),
            ],
        ));
        let store = Arc::new(MemoryStore::new());

        let coordinator = coordinator(vec![feed], store.clone(), vec![]);
        let report = coordinator.run_cycle(&CancelToken::new()).await;

        assert_eq!(report.records_seen, 3);
        assert_eq!(report.records_malformed, 2);
        assert_eq!(report.records_merged, 1);
    }

    #[tokio::test]
    async fn test_scorer_fills_verdict_and_drops_benign() {
        let feed = Arc::new(StaticFeed::new(
            "sensor",
            vec![
                RawIndicator::new("198.51.100.77", "ip").with_features(vec![3.0, 3.0]),
                RawIndicator::new("192.0.2.10", "ip").with_features(vec![0.1, 0.1]),
            ],
        ));
        let store = Arc::new(MemoryStore::new());

        let coordinator = coordinator(vec![feed], store.clone(), vec![]);
        let report = coordinator.run_cycle(&CancelToken::new()).await;

        assert_eq!(report.records_benign, 1);
        assert_eq!(report.records_merged, 1);
        let key = IndicatorKey::new("198.51.100.77", IndicatorType::Ip);
        let stored = store.get(&key).await.unwrap().unwrap();
        assert_eq!(stored.severity, Severity::High);
        assert_eq!(stored.confidence, 100);
    }

    #[tokio::test]
    async fn test_concurrent_cycles_same_key_lose_no_tags() {
        let store = Arc::new(MemoryStore::new());

        let make = |tag: &str| {
            let feed = Arc::new(StaticFeed::new(
                "feed",
                vec![RawIndicator::new("evil.com", "domain")
                    .with_severity("low")
                    .with_tag(tag)],
            ));
            coordinator(vec![feed], store.clone(), vec![])
        };
        let c1 = make("a");
        let c2 = make("b");

        let cancel = CancelToken::new();
        let (r1, r2) = tokio::join!(c1.run_cycle(&cancel), c2.run_cycle(&cancel));
        assert_eq!(r1.records_merged, 1);
        assert_eq!(r2.records_merged, 1);

        let key = IndicatorKey::new("evil.com", IndicatorType::Domain);
        let stored = store.get(&key).await.unwrap().unwrap();
        assert!(stored.tags.contains("a") && stored.tags.contains("b"));
    }
}
