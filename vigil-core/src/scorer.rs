//! Opaque threat scorer capability
//!
//! Some feeds report raw observations (a fixed-length feature vector)
//! instead of a severity verdict. The pipeline fills in severity and
//! confidence for those records through an injected [`ThreatScorer`], so
//! its correctness never depends on any particular model.

use crate::Severity;

/// Verdict produced by a scorer for one feature vector
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThreatScore {
    pub is_threat: bool,
    /// Confidence 0-100
    pub confidence: u8,
    pub severity: Severity,
}

/// Classification capability over a fixed-length feature vector
pub trait ThreatScorer: Send + Sync {
    fn score(&self, features: &[f64]) -> ThreatScore;
}

/// Reference scorer: mean absolute feature magnitude against a threshold.
///
/// Confidence maps the signal into 0-100; severity buckets follow the
/// usual confidence bands (>80 High, >60 Medium, else Low).
#[derive(Debug, Clone)]
pub struct ThresholdScorer {
    pub threshold: f64,
}

impl Default for ThresholdScorer {
    fn default() -> Self {
        Self { threshold: 1.0 }
    }
}

impl ThreatScorer for ThresholdScorer {
    fn score(&self, features: &[f64]) -> ThreatScore {
        if features.is_empty() {
            return ThreatScore {
                is_threat: false,
                confidence: 0,
                severity: Severity::Low,
            };
        }

        let signal = features.iter().map(|f| f.abs()).sum::<f64>() / features.len() as f64;
        let is_threat = signal > self.threshold;
        let confidence = ((signal / (self.threshold * 2.0)).clamp(0.0, 1.0) * 100.0) as u8;
        let severity = if confidence > 80 {
            Severity::High
        } else if confidence > 60 {
            Severity::Medium
        } else {
            Severity::Low
        };

        ThreatScore {
            is_threat,
            confidence,
            severity,
        }
    }
}
