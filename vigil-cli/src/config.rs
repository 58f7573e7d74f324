//! TOML configuration for feeds, sinks, and timeouts
//!
//! ```toml
//! sink_timeout_secs = 5
//! feed_timeout_secs = 30
//!
//! [[feeds]]
//! name = "cisa-kev"
//! url = "https://example.org/kev.json"
//!
//! [[feeds]]
//! name = "sample"           # no url: built-in sample feed
//!
//! [[sinks]]
//! name = "elastic"
//! url = "http://localhost:9200"
//! ```

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;
use std::sync::Arc;

use vigil_adapters::{HttpFeed, HttpSink, HttpSinkConfig, SharedFeed, SharedSink, StaticFeed};
use vigil_core::{DEFAULT_FEED_TIMEOUT_SECS, DEFAULT_SINK_TIMEOUT_SECS};

#[derive(Debug, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub feeds: Vec<FeedConfig>,
    #[serde(default)]
    pub sinks: Vec<SinkConfig>,
    #[serde(default = "default_sink_timeout")]
    pub sink_timeout_secs: u64,
    #[serde(default = "default_feed_timeout")]
    pub feed_timeout_secs: u64,
}

#[derive(Debug, Deserialize)]
pub struct FeedConfig {
    pub name: String,
    /// Feed URL; omitted means the built-in sample feed
    pub url: Option<String>,
    #[serde(default = "default_true")]
    pub active: bool,
}

#[derive(Debug, Deserialize)]
pub struct SinkConfig {
    pub name: String,
    pub url: String,
    #[serde(default = "default_true")]
    pub active: bool,
}

fn default_sink_timeout() -> u64 {
    DEFAULT_SINK_TIMEOUT_SECS
}

fn default_feed_timeout() -> u64 {
    DEFAULT_FEED_TIMEOUT_SECS
}

fn default_true() -> bool {
    true
}

impl Config {
    pub fn load(path: &Path) -> Result<Config> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        toml::from_str(&text).with_context(|| format!("parsing config {}", path.display()))
    }

    /// Construct feed adapters for all active feeds
    pub fn build_feeds(&self) -> Result<Vec<SharedFeed>> {
        let mut feeds: Vec<SharedFeed> = Vec::new();
        for feed in self.feeds.iter().filter(|f| f.active) {
            match &feed.url {
                Some(url) => feeds.push(Arc::new(
                    HttpFeed::new(&feed.name, url, self.feed_timeout_secs)
                        .with_context(|| format!("building feed {}", feed.name))?,
                )),
                None => feeds.push(Arc::new(StaticFeed::sample(&feed.name))),
            }
        }
        Ok(feeds)
    }

    /// Construct sink adapters for all active sinks
    pub fn build_sinks(&self) -> Result<Vec<SharedSink>> {
        let mut sinks: Vec<SharedSink> = Vec::new();
        for sink in self.sinks.iter().filter(|s| s.active) {
            sinks.push(Arc::new(
                HttpSink::new(HttpSinkConfig {
                    id: sink.name.clone(),
                    base_url: sink.url.trim_end_matches('/').to_string(),
                    timeout_secs: self.sink_timeout_secs,
                })
                .map_err(|e| anyhow::anyhow!("building sink {}: {e}", sink.name))?,
            ));
        }
        Ok(sinks)
    }
}
