//! In-memory canonical store
//!
//! Backed by a `DashMap`; the entry guard is held across the
//! read-merge-write in `upsert`, which serializes concurrent upserts of the
//! same business key. Snapshots iterate shard by shard without stopping
//! writers.

use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use vigil_core::{merge, IndicatorKey, IndicatorRecord};

use crate::{CanonicalStore, StoreError, StoreStats};

/// DashMap-backed store for tests, demos, and single-process deployments
#[derive(Debug, Default)]
pub struct MemoryStore {
    rows: DashMap<IndicatorKey, IndicatorRecord>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

#[async_trait]
impl CanonicalStore for MemoryStore {
    async fn get(&self, key: &IndicatorKey) -> Result<Option<IndicatorRecord>, StoreError> {
        Ok(self.rows.get(key).map(|r| r.clone()))
    }

    async fn upsert(&self, incoming: IndicatorRecord) -> Result<IndicatorRecord, StoreError> {
        // The entry guard serializes concurrent upserts of this key.
        let merged = match self.rows.entry(incoming.key.clone()) {
            Entry::Occupied(mut entry) => {
                let merged = merge(entry.get(), &incoming);
                entry.insert(merged.clone());
                merged
            }
            Entry::Vacant(entry) => {
                entry.insert(incoming.clone());
                incoming
            }
        };
        Ok(merged)
    }

    async fn snapshot(&self) -> Result<Vec<IndicatorRecord>, StoreError> {
        Ok(self.rows.iter().map(|r| r.clone()).collect())
    }

    async fn stats(&self) -> Result<StoreStats, StoreError> {
        let mut stats = StoreStats {
            total: self.rows.len(),
            ..Default::default()
        };
        for row in self.rows.iter() {
            if row.is_active {
                stats.active += 1;
                *stats
                    .by_severity
                    .entry(row.severity.as_str().to_string())
                    .or_insert(0) += 1;
                *stats
                    .by_type
                    .entry(row.key.kind.as_str().to_string())
                    .or_insert(0) += 1;
            }
        }
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use vigil_core::{IndicatorType, Severity};

    fn record(tags: &[&str], severity: Severity, confidence: u8) -> IndicatorRecord {
        let mut r = IndicatorRecord::new(
            IndicatorKey::new("evil.com", IndicatorType::Domain),
            severity,
            confidence,
            "feed",
        );
        for t in tags {
            r.tags.insert(t.to_string());
        }
        r
    }

    #[tokio::test]
    async fn test_upsert_merges_existing() {
        let store = MemoryStore::new();
        store
            .upsert(record(&["a"], Severity::High, 60))
            .await
            .unwrap();
        let merged = store
            .upsert(record(&["b"], Severity::Medium, 90))
            .await
            .unwrap();

        assert_eq!(merged.severity, Severity::High);
        assert_eq!(merged.confidence, 90);
        assert_eq!(store.len(), 1);

        let key = IndicatorKey::new("evil.com", IndicatorType::Domain);
        let stored = store.get(&key).await.unwrap().unwrap();
        assert!(stored.tags.contains("a") && stored.tags.contains("b"));
    }

    #[tokio::test]
    async fn test_concurrent_upserts_same_key_lose_nothing() {
        let store = Arc::new(MemoryStore::new());
        let mut handles = Vec::new();

        for i in 0..32 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                let tag = format!("tag-{i}");
                store
                    .upsert(record(&[&tag], Severity::Low, i as u8))
                    .await
                    .unwrap();
            }));
        }
        for h in handles {
            h.await.unwrap();
        }

        let key = IndicatorKey::new("evil.com", IndicatorType::Domain);
        let stored = store.get(&key).await.unwrap().unwrap();
        assert_eq!(stored.tags.len(), 32);
        assert_eq!(stored.confidence, 31);
    }

    #[tokio::test]
    async fn test_stats_counts_active_only() {
        let store = MemoryStore::new();
        store
            .upsert(record(&[], Severity::Critical, 80))
            .await
            .unwrap();
        let mut inactive = IndicatorRecord::new(
            IndicatorKey::new("198.51.100.9", IndicatorType::Ip),
            Severity::Low,
            10,
            "feed",
        );
        inactive.is_active = false;
        store.upsert(inactive).await.unwrap();

        let stats = store.stats().await.unwrap();
        assert_eq!(stats.total, 2);
        assert_eq!(stats.active, 1);
        assert_eq!(stats.by_severity["Critical"], 1);
    }
}
