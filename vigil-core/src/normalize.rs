//! Raw feed record normalization
//!
//! Feeds deliver loosely-typed tuples; normalization validates the value
//! against its declared type and produces a canonical [`IndicatorRecord`].
//! Malformed records are rejected with a [`NormalizeError`] so the caller
//! can count and drop them without aborting the cycle.

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::LazyLock;
use thiserror::Error;

use crate::{IndicatorKey, IndicatorRecord, IndicatorType, Severity, MAX_CONFIDENCE};

/// A raw indicator tuple as delivered by a feed
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawIndicator {
    /// The indicator value
    pub value: String,
    /// Declared indicator type label
    #[serde(rename = "type")]
    pub kind: String,
    /// Severity label, if the feed supplies one
    #[serde(default)]
    pub severity: Option<String>,
    /// Confidence 0-100, if the feed supplies one
    #[serde(default)]
    pub confidence: Option<u8>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub references: Vec<String>,
    #[serde(default)]
    pub metadata: BTreeMap<String, serde_json::Value>,
    /// Feature vector for the injected scorer, for feeds that report raw
    /// observations instead of a severity verdict
    #[serde(default)]
    pub features: Option<Vec<f64>>,
}

impl RawIndicator {
    pub fn new(value: &str, kind: &str) -> Self {
        Self {
            value: value.to_string(),
            kind: kind.to_string(),
            severity: None,
            confidence: None,
            description: None,
            tags: Vec::new(),
            references: Vec::new(),
            metadata: BTreeMap::new(),
            features: None,
        }
    }

    pub fn with_severity(mut self, severity: &str) -> Self {
        self.severity = Some(severity.to_string());
        self
    }

    pub fn with_confidence(mut self, confidence: u8) -> Self {
        self.confidence = Some(confidence);
        self
    }

    pub fn with_tag(mut self, tag: &str) -> Self {
        self.tags.push(tag.to_string());
        self
    }

    pub fn with_description(mut self, description: &str) -> Self {
        self.description = Some(description.to_string());
        self
    }

    pub fn with_features(mut self, features: Vec<f64>) -> Self {
        self.features = Some(features);
        self
    }
}

/// Errors from normalizing a raw feed record
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NormalizeError {
    #[error("empty indicator value")]
    EmptyValue,

    #[error("unknown indicator type: {0}")]
    UnknownType(String),

    #[error("value {value:?} is not a valid {kind}")]
    InvalidValue { kind: IndicatorType, value: String },

    #[error("unknown severity label: {0}")]
    UnknownSeverity(String),
}

// Validation patterns per indicator type, anchored to the full value
static IPV4_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:(?:25[0-5]|2[0-4][0-9]|[01]?[0-9][0-9]?)\.){3}(?:25[0-5]|2[0-4][0-9]|[01]?[0-9][0-9]?)$").unwrap()
});

static DOMAIN_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?\.)+[a-zA-Z]{2,}$").unwrap()
});

static URL_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"^https?://[^\s<>"']+$"#).unwrap());

static HASH_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:[a-fA-F0-9]{32}|[a-fA-F0-9]{40}|[a-fA-F0-9]{64})$").unwrap()
});

static EMAIL_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}$").unwrap()
});

fn validate_value(kind: IndicatorType, value: &str) -> bool {
    match kind {
        IndicatorType::Ip => IPV4_REGEX.is_match(value),
        IndicatorType::Domain => DOMAIN_REGEX.is_match(value),
        IndicatorType::Url => URL_REGEX.is_match(value),
        IndicatorType::FileHash => HASH_REGEX.is_match(value),
        IndicatorType::Email => EMAIL_REGEX.is_match(value),
    }
}

/// Normalize a raw feed record into a canonical indicator.
///
/// `source` is the feed name, `now` stamps first_seen/last_seen for this
/// sighting. Missing severity defaults to Low and missing confidence to 0;
/// feeds that want a scored verdict attach a feature vector instead and the
/// coordinator fills these in before calling normalize.
pub fn normalize(
    raw: &RawIndicator,
    source: &str,
    now: DateTime<Utc>,
) -> Result<IndicatorRecord, NormalizeError> {
    let value = raw.value.trim();
    if value.is_empty() {
        return Err(NormalizeError::EmptyValue);
    }

    let kind = IndicatorType::parse(&raw.kind)
        .ok_or_else(|| NormalizeError::UnknownType(raw.kind.clone()))?;

    if !validate_value(kind, value) {
        return Err(NormalizeError::InvalidValue {
            kind,
            value: value.to_string(),
        });
    }

    // URLs stay verbatim (paths can be case-sensitive); every other type
    // folds to lowercase so case variants share one business key.
    let value = match kind {
        IndicatorType::Url => value.to_string(),
        _ => value.to_ascii_lowercase(),
    };

    let severity = match &raw.severity {
        Some(s) => Severity::parse(s).ok_or_else(|| NormalizeError::UnknownSeverity(s.clone()))?,
        None => Severity::Low,
    };

    let mut record = IndicatorRecord::new(
        IndicatorKey::new(&value, kind),
        severity,
        raw.confidence.unwrap_or(0).min(MAX_CONFIDENCE),
        source,
    );
    record.description = raw.description.clone();
    record.tags = raw.tags.iter().cloned().collect();
    record.references = raw.references.iter().cloned().collect();
    record.metadata = raw.metadata.clone();
    record.first_seen = now;
    record.last_seen = now;

    Ok(record)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_ip() {
        let raw = RawIndicator::new("192.0.2.44", "ip")
            .with_severity("high")
            .with_confidence(85)
            .with_tag("scanner");
        let record = normalize(&raw, "AbuseIPDB", Utc::now()).unwrap();
        assert_eq!(record.key.kind, IndicatorType::Ip);
        assert_eq!(record.severity, Severity::High);
        assert_eq!(record.confidence, 85);
        assert!(record.tags.contains("scanner"));
        assert_eq!(record.source, "AbuseIPDB");
    }

    #[test]
    fn test_normalize_rejects_bad_ip() {
        let raw = RawIndicator::new("999.1.1.1", "ip");
        let err = normalize(&raw, "feed", Utc::now()).unwrap_err();
        assert!(matches!(err, NormalizeError::InvalidValue { .. }));
    }

    #[test]
    fn test_normalize_rejects_unknown_type() {
        let raw = RawIndicator::new("something", "registry_key");
        let err = normalize(&raw, "feed", Utc::now()).unwrap_err();
        assert_eq!(err, NormalizeError::UnknownType("registry_key".to_string()));
    }

    #[test]
    fn test_normalize_rejects_empty_value() {
        let raw = RawIndicator::new("   ", "domain");
        assert_eq!(
            normalize(&raw, "feed", Utc::now()).unwrap_err(),
            NormalizeError::EmptyValue
        );
    }

    #[test]
    fn test_normalize_hash_lengths() {
        for value in [
            "d41d8cd98f00b204e9800998ecf8427e",                                 // md5
            "da39a3ee5e6b4b0d3255bfef95601890afd80709",                         // sha1
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855", // sha256
        ] {
            assert!(normalize(&RawIndicator::new(value, "file_hash"), "f", Utc::now()).is_ok());
        }
        let short = RawIndicator::new("abcdef", "file_hash");
        assert!(normalize(&short, "f", Utc::now()).is_err());
    }

    #[test]
    fn test_normalize_domain_and_email() {
        assert!(normalize(&RawIndicator::new("evil.example.com", "domain"), "f", Utc::now()).is_ok());
        assert!(normalize(&RawIndicator::new("not a domain", "domain"), "f", Utc::now()).is_err());
        assert!(normalize(&RawIndicator::new("ops@evil.example.com", "email"), "f", Utc::now()).is_ok());
    }

    #[test]
    fn test_normalize_canonicalizes_case() {
        let upper = normalize(&RawIndicator::new("EVIL.Example.COM", "domain"), "f", Utc::now())
            .unwrap();
        let lower = normalize(&RawIndicator::new("evil.example.com", "domain"), "f", Utc::now())
            .unwrap();
        assert_eq!(upper.key, lower.key);
        assert_eq!(upper.doc_id(), lower.doc_id());

        let url = normalize(
            &RawIndicator::new("https://example.com/Payload.EXE", "url"),
            "f",
            Utc::now(),
        )
        .unwrap();
        assert_eq!(url.key.value, "https://example.com/Payload.EXE");
    }

    #[test]
    fn test_normalize_defaults() {
        let raw = RawIndicator::new("203.0.113.7", "ip");
        let record = normalize(&raw, "feed", Utc::now()).unwrap();
        assert_eq!(record.severity, Severity::Low);
        assert_eq!(record.confidence, 0);
        assert!(record.is_active);
    }
}
