//! Discrepancy types

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

use hlekkr_core::Severity;

/// The eight discrepancy categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscrepancyType {
    SourceInconsistency,
    MetadataMismatch,
    ChainIntegrityViolation,
    ContentHashMismatch,
    TemporalInconsistency,
    TrustScoreAnomaly,
    ProcessingAnomaly,
    SuspiciousPattern,
}

impl DiscrepancyType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SourceInconsistency => "source_inconsistency",
            Self::MetadataMismatch => "metadata_mismatch",
            Self::ChainIntegrityViolation => "chain_integrity_violation",
            Self::ContentHashMismatch => "content_hash_mismatch",
            Self::TemporalInconsistency => "temporal_inconsistency",
            Self::TrustScoreAnomaly => "trust_score_anomaly",
            Self::ProcessingAnomaly => "processing_anomaly",
            Self::SuspiciousPattern => "suspicious_pattern",
        }
    }
}

impl fmt::Display for DiscrepancyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One detected inconsistency.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Discrepancy {
    pub id: String,
    pub media_id: String,
    #[serde(rename = "type")]
    pub discrepancy_type: DiscrepancyType,
    pub severity: Severity,
    pub description: String,
    pub evidence: serde_json::Value,
    pub affected_components: Vec<String>,
    pub confidence: f64,
    pub recommended_actions: Vec<String>,
}

/// Severity roll-up over a detection run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscrepancySummary {
    pub total: usize,
    pub by_severity: HashMap<String, usize>,
    pub by_type: HashMap<String, usize>,
    pub requires_alert: bool,
    pub requires_quarantine: bool,
}

impl DiscrepancySummary {
    pub fn from_findings(findings: &[Discrepancy]) -> Self {
        let mut by_severity: HashMap<String, usize> = HashMap::new();
        let mut by_type: HashMap<String, usize> = HashMap::new();
        for finding in findings {
            *by_severity
                .entry(finding.severity.as_str().to_string())
                .or_insert(0) += 1;
            *by_type
                .entry(finding.discrepancy_type.as_str().to_string())
                .or_insert(0) += 1;
        }
        let critical = findings.iter().any(|f| f.severity == Severity::Critical);
        Self {
            total: findings.len(),
            by_severity,
            by_type,
            requires_alert: critical,
            requires_quarantine: critical,
        }
    }
}
