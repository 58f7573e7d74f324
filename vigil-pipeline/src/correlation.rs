//! Correlation scheduler
//!
//! Periodically re-scans a point-in-time snapshot of the canonical store
//! with a set of enabled rules. Rules are stateless pure functions over the
//! snapshot; a rule that fails is logged and skipped, never aborting the
//! remaining rules.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

use vigil_core::{IndicatorKey, IndicatorRecord, IndicatorType, Severity};
use vigil_store::CanonicalStore;

use crate::CycleStatus;

/// A correlation discovered by a rule
#[derive(Debug, Clone, Serialize)]
pub struct Finding {
    pub id: Uuid,
    /// Name of the rule that produced this finding
    pub rule: String,
    pub summary: String,
    /// Indicators involved
    pub indicators: Vec<IndicatorKey>,
    pub detected_at: DateTime<Utc>,
}

impl Finding {
    pub fn new(rule: &str, summary: String, indicators: Vec<IndicatorKey>) -> Self {
        Self {
            id: Uuid::new_v4(),
            rule: rule.to_string(),
            summary,
            indicators,
            detected_at: Utc::now(),
        }
    }
}

/// Errors from rule evaluation (per-rule, non-fatal to the cycle)
#[derive(Debug, Clone, Error)]
pub enum RuleError {
    #[error("rule evaluation failed: {0}")]
    Evaluation(String),
}

/// A correlation rule over a read-only store snapshot
pub trait CorrelationRule: Send + Sync {
    fn name(&self) -> &str;

    fn evaluate(&self, snapshot: &[IndicatorRecord]) -> Result<Vec<Finding>, RuleError>;
}

/// Report for one correlation cycle
#[derive(Debug, Clone, Serialize)]
pub struct CorrelationReport {
    pub cycle_id: Uuid,
    pub status: CycleStatus,
    pub rules_evaluated: usize,
    pub findings: Vec<Finding>,
    /// Rule name -> error for rules that failed
    pub rule_errors: BTreeMap<String, String>,
}

/// Evaluates enabled correlation rules against store snapshots
pub struct CorrelationScheduler {
    store: Arc<dyn CanonicalStore>,
    rules: Vec<Box<dyn CorrelationRule>>,
}

impl CorrelationScheduler {
    pub fn new(store: Arc<dyn CanonicalStore>, rules: Vec<Box<dyn CorrelationRule>>) -> Self {
        Self { store, rules }
    }

    /// Scheduler with the built-in rule set
    pub fn with_default_rules(store: Arc<dyn CanonicalStore>) -> Self {
        Self::new(
            store,
            vec![
                Box::new(IpDomainOverlap),
                Box::new(TemporalCluster::default()),
            ],
        )
    }

    /// Run one correlation cycle
    pub async fn run_cycle(&self) -> CorrelationReport {
        let cycle_id = Uuid::new_v4();
        let mut report = CorrelationReport {
            cycle_id,
            status: CycleStatus::Completed,
            rules_evaluated: 0,
            findings: Vec::new(),
            rule_errors: BTreeMap::new(),
        };

        let snapshot = match self.store.snapshot().await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!("Correlation cycle {} could not snapshot store: {}", cycle_id, e);
                report.rule_errors.insert("snapshot".to_string(), e.to_string());
                report.status = CycleStatus::CompletedWithErrors;
                return report;
            }
        };

        for rule in &self.rules {
            report.rules_evaluated += 1;
            match rule.evaluate(&snapshot) {
                Ok(mut findings) => report.findings.append(&mut findings),
                Err(e) => {
                    warn!("Rule {} failed, skipping: {}", rule.name(), e);
                    report.rule_errors.insert(rule.name().to_string(), e.to_string());
                }
            }
        }

        if !report.rule_errors.is_empty() {
            report.status = CycleStatus::CompletedWithErrors;
        }
        info!(
            "Correlation cycle {}: {} rules, {} findings",
            cycle_id,
            report.rules_evaluated,
            report.findings.len()
        );
        report
    }
}

/// Flags tags shared between active IP and domain indicators
pub struct IpDomainOverlap;

impl CorrelationRule for IpDomainOverlap {
    fn name(&self) -> &str {
        "ip_domain_overlap"
    }

    fn evaluate(&self, snapshot: &[IndicatorRecord]) -> Result<Vec<Finding>, RuleError> {
        let mut by_tag: BTreeMap<&str, (Vec<&IndicatorRecord>, Vec<&IndicatorRecord>)> =
            BTreeMap::new();

        for record in snapshot.iter().filter(|r| r.is_active) {
            for tag in &record.tags {
                let entry = by_tag.entry(tag.as_str()).or_default();
                match record.key.kind {
                    IndicatorType::Ip => entry.0.push(record),
                    IndicatorType::Domain => entry.1.push(record),
                    _ => {}
                }
            }
        }

        let mut findings = Vec::new();
        for (tag, (ips, domains)) in by_tag {
            if ips.is_empty() || domains.is_empty() {
                continue;
            }
            let mut indicators: Vec<IndicatorKey> = ips
                .iter()
                .chain(domains.iter())
                .map(|r| r.key.clone())
                .collect();
            indicators.sort();
            findings.push(Finding::new(
                self.name(),
                format!(
                    "{} IPs and {} domains share tag {:?}",
                    ips.len(),
                    domains.len(),
                    tag
                ),
                indicators,
            ));
        }
        Ok(findings)
    }
}

/// Flags bursts of recent High/Critical indicators
pub struct TemporalCluster {
    /// Window measured back from the newest sighting in the snapshot
    pub window: Duration,
    /// Minimum number of severe indicators inside the window
    pub min_count: usize,
}

impl Default for TemporalCluster {
    fn default() -> Self {
        Self {
            window: Duration::hours(1),
            min_count: 3,
        }
    }
}

impl CorrelationRule for TemporalCluster {
    fn name(&self) -> &str {
        "temporal_cluster"
    }

    fn evaluate(&self, snapshot: &[IndicatorRecord]) -> Result<Vec<Finding>, RuleError> {
        let severe: Vec<&IndicatorRecord> = snapshot
            .iter()
            .filter(|r| r.is_active && r.severity >= Severity::High)
            .collect();

        let newest = match severe.iter().map(|r| r.last_seen).max() {
            Some(newest) => newest,
            None => return Ok(Vec::new()),
        };
        let cutoff = newest - self.window;

        let mut recent: Vec<IndicatorKey> = severe
            .iter()
            .filter(|r| r.last_seen >= cutoff)
            .map(|r| r.key.clone())
            .collect();
        recent.sort();

        if recent.len() < self.min_count {
            return Ok(Vec::new());
        }

        Ok(vec![Finding::new(
            self.name(),
            format!(
                "{} severe indicators sighted within {} minutes",
                recent.len(),
                self.window.num_minutes()
            ),
            recent,
        )])
    }
}
