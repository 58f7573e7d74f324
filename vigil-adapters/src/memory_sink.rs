//! In-process sink
//!
//! Stores delivered records in a map keyed by document id, which makes
//! delivery idempotent the same way a real index backend is. Failure modes
//! are injectable so pipeline tests can exercise partial-failure paths:
//! rejecting, unreachable, and hanging sinks.

use async_trait::async_trait;
use dashmap::DashMap;

use vigil_core::IndicatorRecord;

use crate::{SinkAdapter, SinkError, SinkHealth};

/// Behavior of a [`MemorySink`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SinkMode {
    /// Accept deliveries and searches
    #[default]
    Healthy,
    /// Reject every delivery
    Reject,
    /// Fail every operation as unreachable
    Unreachable,
    /// Never return; the caller's timeout must fire
    Hang,
}

/// In-process sink for tests, demos, and single-process deployments
pub struct MemorySink {
    id: String,
    mode: SinkMode,
    docs: DashMap<String, IndicatorRecord>,
}

impl MemorySink {
    pub fn new(id: &str) -> Self {
        Self::with_mode(id, SinkMode::Healthy)
    }

    pub fn with_mode(id: &str, mode: SinkMode) -> Self {
        Self {
            id: id.to_string(),
            mode,
            docs: DashMap::new(),
        }
    }

    /// Number of stored documents
    pub fn len(&self) -> usize {
        self.docs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }

    /// Fetch a stored document by id
    pub fn get(&self, doc_id: &str) -> Option<IndicatorRecord> {
        self.docs.get(doc_id).map(|r| r.clone())
    }
}

#[async_trait]
impl SinkAdapter for MemorySink {
    fn id(&self) -> &str {
        &self.id
    }

    async fn deliver(&self, record: &IndicatorRecord) -> Result<(), SinkError> {
        match self.mode {
            SinkMode::Healthy => {
                self.docs.insert(record.doc_id(), record.clone());
                Ok(())
            }
            SinkMode::Reject => Err(SinkError::Rejected("delivery refused".to_string())),
            SinkMode::Unreachable => Err(SinkError::Unreachable("connection refused".to_string())),
            SinkMode::Hang => {
                futures::future::pending::<()>().await;
                unreachable!()
            }
        }
    }

    async fn search(
        &self,
        query: &str,
        limit: usize,
    ) -> Result<Vec<IndicatorRecord>, SinkError> {
        match self.mode {
            SinkMode::Healthy => {
                let needle = query.to_lowercase();
                let mut hits: Vec<IndicatorRecord> = self
                    .docs
                    .iter()
                    .filter(|r| {
                        r.key.value.to_lowercase().contains(&needle)
                            || r.tags.iter().any(|t| t.to_lowercase().contains(&needle))
                    })
                    .map(|r| r.clone())
                    .collect();
                hits.sort_by(|a, b| b.last_seen.cmp(&a.last_seen));
                hits.truncate(limit);
                Ok(hits)
            }
            SinkMode::Reject => Err(SinkError::Rejected("search refused".to_string())),
            SinkMode::Unreachable => Err(SinkError::Unreachable("connection refused".to_string())),
            SinkMode::Hang => {
                futures::future::pending::<()>().await;
                unreachable!()
            }
        }
    }

    async fn health(&self) -> SinkHealth {
        match self.mode {
            SinkMode::Healthy => SinkHealth::connected("in-memory"),
            SinkMode::Reject => SinkHealth::connected("in-memory (read-only)"),
            SinkMode::Unreachable | SinkMode::Hang => {
                SinkHealth::disconnected("connection refused")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vigil_core::{IndicatorKey, IndicatorType, Severity};

    fn record(value: &str) -> IndicatorRecord {
        IndicatorRecord::new(
            IndicatorKey::new(value, IndicatorType::Domain),
            Severity::High,
            80,
            "feed",
        )
        .with_tag("c2")
    }

    #[tokio::test]
    async fn test_deliver_is_idempotent() {
        let sink = MemorySink::new("s1");
        let r = record("evil.com");
        sink.deliver(&r).await.unwrap();
        sink.deliver(&r).await.unwrap();
        assert_eq!(sink.len(), 1);
    }

    #[tokio::test]
    async fn test_search_matches_value_and_tags() {
        let sink = MemorySink::new("s1");
        sink.deliver(&record("evil.com")).await.unwrap();
        sink.deliver(&record("benign-looking.net")).await.unwrap();

        let by_value = sink.search("evil", 10).await.unwrap();
        assert_eq!(by_value.len(), 1);

        let by_tag = sink.search("c2", 10).await.unwrap();
        assert_eq!(by_tag.len(), 2);
    }

    #[tokio::test]
    async fn test_reject_mode() {
        let sink = MemorySink::with_mode("s1", SinkMode::Reject);
        let err = sink.deliver(&record("evil.com")).await.unwrap_err();
        assert!(matches!(err, SinkError::Rejected(_)));
        assert_eq!(sink.len(), 0);
    }

    #[tokio::test]
    async fn test_unreachable_health() {
        let sink = MemorySink::with_mode("s1", SinkMode::Unreachable);
        assert!(!sink.health().await.connected);
    }
}
