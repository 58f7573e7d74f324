//! Canonical indicator records and the merge policy
//!
//! An indicator is identified by its business key (value, type). Every
//! sighting of the same key is folded into one canonical record: severity
//! and confidence only ratchet upward, tags and references accumulate, and
//! timestamps widen. The merge is idempotent and associative, so records
//! can arrive repeatedly and in any order.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use crate::MAX_CONFIDENCE;

/// Threat severity levels, ordered Low < Medium < High < Critical
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    #[default]
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    /// Parse a severity label (case-insensitive)
    pub fn parse(s: &str) -> Option<Severity> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Some(Severity::Low),
            "medium" => Some(Severity::Medium),
            "high" => Some(Severity::High),
            "critical" => Some(Severity::Critical),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "Low",
            Severity::Medium => "Medium",
            Severity::High => "High",
            Severity::Critical => "Critical",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Supported indicator types
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum IndicatorType {
    /// IPv4 address
    Ip,
    /// Domain name
    Domain,
    /// URL
    Url,
    /// MD5/SHA1/SHA256 file hash
    FileHash,
    /// Email address
    Email,
}

impl IndicatorType {
    /// Parse an indicator type label (case-insensitive)
    pub fn parse(s: &str) -> Option<IndicatorType> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ip" => Some(IndicatorType::Ip),
            "domain" => Some(IndicatorType::Domain),
            "url" => Some(IndicatorType::Url),
            "file_hash" | "hash" => Some(IndicatorType::FileHash),
            "email" => Some(IndicatorType::Email),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            IndicatorType::Ip => "ip",
            IndicatorType::Domain => "domain",
            IndicatorType::Url => "url",
            IndicatorType::FileHash => "file_hash",
            IndicatorType::Email => "email",
        }
    }
}

impl fmt::Display for IndicatorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Business key identifying a logical indicator across feeds and sinks
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct IndicatorKey {
    /// The indicator value (IP, domain, hash, ...)
    pub value: String,
    /// Type of indicator
    #[serde(rename = "type")]
    pub kind: IndicatorType,
}

impl IndicatorKey {
    pub fn new(value: &str, kind: IndicatorType) -> Self {
        Self {
            value: value.to_string(),
            kind,
        }
    }

    /// Stable document id for sink-side writes.
    ///
    /// Derived from the business key alone, so repeated deliveries of the
    /// same indicator overwrite the same document (idempotent at-least-once
    /// delivery). The value is hashed verbatim; normalization already
    /// canonicalizes case, so distinct keys never share a document.
    pub fn doc_id(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.value.as_bytes());
        hasher.update(b":");
        hasher.update(self.kind.as_str().as_bytes());
        format!("{:x}", hasher.finalize())[..16].to_string()
    }
}

impl fmt::Display for IndicatorKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.kind, self.value)
    }
}

/// A canonical threat indicator record
///
/// Exactly one live record exists per business key; all contributions from
/// all feeds are folded into it via [`merge`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndicatorRecord {
    /// Business key (value, type)
    pub key: IndicatorKey,
    /// Severity (never decreases across merges)
    pub severity: Severity,
    /// Confidence score 0-100 (never decreases across merges)
    pub confidence: u8,
    /// Associated tags
    pub tags: BTreeSet<String>,
    /// Reference URLs
    pub references: BTreeSet<String>,
    /// Last reporting feed (provenance display only)
    pub source: String,
    /// Human-readable context
    pub description: Option<String>,
    /// First sighting timestamp
    pub first_seen: DateTime<Utc>,
    /// Most recent sighting timestamp
    pub last_seen: DateTime<Utc>,
    /// Soft-deletion flag; ingestion never flips this
    pub is_active: bool,
    /// Opaque key-value context, shallow-merged on collision
    pub metadata: BTreeMap<String, serde_json::Value>,
}

impl IndicatorRecord {
    /// Create a record for a first sighting
    pub fn new(key: IndicatorKey, severity: Severity, confidence: u8, source: &str) -> Self {
        let now = Utc::now();
        Self {
            key,
            severity,
            confidence: confidence.min(MAX_CONFIDENCE),
            tags: BTreeSet::new(),
            references: BTreeSet::new(),
            source: source.to_string(),
            description: None,
            first_seen: now,
            last_seen: now,
            is_active: true,
            metadata: BTreeMap::new(),
        }
    }

    pub fn with_tag(mut self, tag: &str) -> Self {
        self.tags.insert(tag.to_string());
        self
    }

    pub fn with_reference(mut self, url: &str) -> Self {
        self.references.insert(url.to_string());
        self
    }

    pub fn with_description(mut self, description: &str) -> Self {
        self.description = Some(description.to_string());
        self
    }

    pub fn with_metadata(mut self, key: &str, value: serde_json::Value) -> Self {
        self.metadata.insert(key.to_string(), value);
        self
    }

    pub fn doc_id(&self) -> String {
        self.key.doc_id()
    }
}

/// Fold `incoming` into `existing` for the same business key.
///
/// Severity and confidence take the max, tag/reference sets union,
/// first_seen/last_seen widen, source and description are last-writer,
/// metadata is shallow-merged with incoming winning on key collision.
/// The existing `is_active` flag is preserved: sightings never reactivate
/// an administratively deactivated indicator.
///
/// Callers group records by business key before merging; the result keeps
/// the existing key.
pub fn merge(existing: &IndicatorRecord, incoming: &IndicatorRecord) -> IndicatorRecord {
    let mut metadata = existing.metadata.clone();
    for (k, v) in &incoming.metadata {
        metadata.insert(k.clone(), v.clone());
    }

    IndicatorRecord {
        key: existing.key.clone(),
        severity: existing.severity.max(incoming.severity),
        confidence: existing.confidence.max(incoming.confidence),
        tags: existing.tags.union(&incoming.tags).cloned().collect(),
        references: existing
            .references
            .union(&incoming.references)
            .cloned()
            .collect(),
        source: incoming.source.clone(),
        description: incoming
            .description
            .clone()
            .or_else(|| existing.description.clone()),
        first_seen: existing.first_seen.min(incoming.first_seen),
        last_seen: existing.last_seen.max(incoming.last_seen),
        is_active: existing.is_active,
        metadata,
    }
}
