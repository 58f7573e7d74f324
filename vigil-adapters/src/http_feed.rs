//! HTTP JSON feed adapter
//!
//! Fetches a JSON array of raw indicator tuples from a feed URL.

use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use tracing::debug;

use vigil_core::RawIndicator;

use crate::{FeedError, FeedSource};

/// HTTP threat feed serving a JSON array of raw indicators
pub struct HttpFeed {
    name: String,
    url: String,
    timeout_secs: u64,
    client: Client,
}

impl HttpFeed {
    pub fn new(name: &str, url: &str, timeout_secs: u64) -> Result<Self, FeedError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| FeedError::Unreachable(e.to_string()))?;
        Ok(Self {
            name: name.to_string(),
            url: url.to_string(),
            timeout_secs,
            client,
        })
    }
}

#[async_trait]
impl FeedSource for HttpFeed {
    fn name(&self) -> &str {
        &self.name
    }

    async fn fetch(&self) -> Result<Vec<RawIndicator>, FeedError> {
        debug!("Fetching feed {} from {}", self.name, self.url);

        let response = self.client.get(&self.url).send().await.map_err(|e| {
            if e.is_timeout() {
                FeedError::Timeout(self.timeout_secs)
            } else {
                FeedError::Unreachable(e.to_string())
            }
        })?;

        if !response.status().is_success() {
            return Err(FeedError::Unreachable(format!(
                "status {}",
                response.status()
            )));
        }

        let records: Vec<RawIndicator> = response
            .json()
            .await
            .map_err(|e| FeedError::Malformed(e.to_string()))?;

        debug!("Feed {} returned {} records", self.name, records.len());
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_feed_construction() {
        let feed = HttpFeed::new("kev", "https://example.org/kev.json", 30).unwrap();
        assert_eq!(feed.name(), "kev");
    }
}
