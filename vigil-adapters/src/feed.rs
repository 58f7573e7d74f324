//! Upstream feed sources

use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

use vigil_core::RawIndicator;

/// Errors from feed operations (per-feed, non-fatal to the cycle)
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FeedError {
    #[error("feed unreachable: {0}")]
    Unreachable(String),

    #[error("malformed payload: {0}")]
    Malformed(String),

    #[error("fetch timed out after {0}s")]
    Timeout(u64),
}

/// An upstream threat intelligence feed
#[async_trait]
pub trait FeedSource: Send + Sync {
    /// Feed name used in reports and as the record source
    fn name(&self) -> &str;

    /// Fetch the current batch of raw indicator records
    async fn fetch(&self) -> Result<Vec<RawIndicator>, FeedError>;
}

/// Shared handle to a feed source
pub type SharedFeed = Arc<dyn FeedSource>;

/// A feed serving a fixed batch of records
///
/// Used for tests and for sample feeds configured without a URL.
pub struct StaticFeed {
    name: String,
    records: Vec<RawIndicator>,
}

impl StaticFeed {
    pub fn new(name: &str, records: Vec<RawIndicator>) -> Self {
        Self {
            name: name.to_string(),
            records,
        }
    }

    /// A small sample batch, one record per indicator type
    pub fn sample(name: &str) -> Self {
        let records = vec![
            RawIndicator::new("198.51.100.23", "ip")
                .with_severity("high")
                .with_confidence(95)
                .with_tag("blacklist")
                .with_description("Malicious IP from sample feed"),
            RawIndicator::new("evil.example.com", "domain")
                .with_severity("medium")
                .with_confidence(78)
                .with_tag("c2"),
            RawIndicator::new(
                "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855",
                "file_hash",
            )
            .with_severity("critical")
            .with_confidence(99)
            .with_tag("ransomware"),
        ];
        Self::new(name, records)
    }
}

#[async_trait]
impl FeedSource for StaticFeed {
    fn name(&self) -> &str {
        &self.name
    }

    async fn fetch(&self) -> Result<Vec<RawIndicator>, FeedError> {
        Ok(self.records.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_static_feed_fetch() {
        let feed = StaticFeed::sample("sample");
        let records = feed.fetch().await.unwrap();
        assert_eq!(records.len(), 3);
        assert_eq!(feed.name(), "sample");
    }
}
