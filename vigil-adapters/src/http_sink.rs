//! Generic HTTP JSON sink adapter
//!
//! Speaks to any index backend exposing:
//! - `PUT  {base}/indicators/{doc_id}` - idempotent write of a record
//! - `GET  {base}/search?q=...&limit=...` - JSON array of records
//! - `GET  {base}/health` - liveness probe
//!
//! The document id is derived from the business key, so re-delivering the
//! same indicator overwrites the same document.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use std::time::Duration;
use tracing::debug;

use vigil_core::IndicatorRecord;

use crate::{SinkAdapter, SinkError, SinkHealth};

/// Configuration for an HTTP sink
#[derive(Debug, Clone)]
pub struct HttpSinkConfig {
    /// Sink identifier used in reports
    pub id: String,
    /// Base URL, no trailing slash
    pub base_url: String,
    /// HTTP client timeout in seconds
    pub timeout_secs: u64,
}

/// HTTP JSON index backend sink
pub struct HttpSink {
    config: HttpSinkConfig,
    client: Client,
}

impl HttpSink {
    pub fn new(config: HttpSinkConfig) -> Result<Self, SinkError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| SinkError::Unreachable(e.to_string()))?;
        Ok(Self { config, client })
    }
}

#[async_trait]
impl SinkAdapter for HttpSink {
    fn id(&self) -> &str {
        &self.config.id
    }

    async fn deliver(&self, record: &IndicatorRecord) -> Result<(), SinkError> {
        let url = format!(
            "{}/indicators/{}",
            self.config.base_url,
            record.doc_id()
        );
        debug!("Delivering {} to sink {}", record.key, self.config.id);

        let response = self
            .client
            .put(&url)
            .json(record)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    SinkError::Timeout(self.config.timeout_secs)
                } else {
                    SinkError::Unreachable(e.to_string())
                }
            })?;

        match response.status() {
            s if s.is_success() => Ok(()),
            s if s.is_client_error() => Err(SinkError::Rejected(format!("status {s}"))),
            s => Err(SinkError::Unreachable(format!("status {s}"))),
        }
    }

    async fn search(
        &self,
        query: &str,
        limit: usize,
    ) -> Result<Vec<IndicatorRecord>, SinkError> {
        let url = format!(
            "{}/search?q={}&limit={}",
            self.config.base_url,
            urlencoding::encode(query),
            limit
        );

        let response = self.client.get(&url).send().await.map_err(|e| {
            if e.is_timeout() {
                SinkError::Timeout(self.config.timeout_secs)
            } else {
                SinkError::Unreachable(e.to_string())
            }
        })?;

        if !response.status().is_success() {
            return Err(SinkError::Rejected(format!(
                "status {}",
                response.status()
            )));
        }

        let records: Vec<IndicatorRecord> = response
            .json()
            .await
            .map_err(|e| SinkError::Rejected(format!("bad response body: {e}")))?;

        debug!(
            "Sink {} returned {} results for {:?}",
            self.config.id,
            records.len(),
            query
        );
        Ok(records)
    }

    async fn health(&self) -> SinkHealth {
        let url = format!("{}/health", self.config.base_url);
        match self.client.get(&url).send().await {
            Ok(resp) if resp.status() == StatusCode::OK => {
                SinkHealth::connected(&self.config.base_url)
            }
            Ok(resp) => SinkHealth::disconnected(&format!("status {}", resp.status())),
            Err(e) => SinkHealth::disconnected(&e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sink_construction() {
        let sink = HttpSink::new(HttpSinkConfig {
            id: "elastic".to_string(),
            base_url: "http://localhost:9200".to_string(),
            timeout_secs: 5,
        })
        .unwrap();
        assert_eq!(sink.id(), "elastic");
    }
}
