//! Shared severity scales

use serde::{Deserialize, Serialize};
use std::fmt;

/// Four-level severity used by discrepancies, threats, and alerts.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Five-level manipulation severity used by the technique classifier and the
/// trust-score penalty tables.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "snake_case")]
pub enum SeverityLevel {
    #[default]
    Minimal,
    Low,
    Moderate,
    High,
    Critical,
}

impl SeverityLevel {
    /// Numeric value used by the severity derivation formula.
    pub fn value(&self) -> f64 {
        match self {
            Self::Minimal => 0.5,
            Self::Low => 1.0,
            Self::Moderate => 2.0,
            Self::High => 3.0,
            Self::Critical => 4.0,
        }
    }

    /// Bucket a raw severity value back into a level.
    pub fn from_value(value: f64) -> Self {
        if value >= 4.0 {
            Self::Critical
        } else if value >= 3.0 {
            Self::High
        } else if value >= 2.0 {
            Self::Moderate
        } else if value >= 1.0 {
            Self::Low
        } else {
            Self::Minimal
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Minimal => "minimal",
            Self::Low => "low",
            Self::Moderate => "moderate",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }
}

impl fmt::Display for SeverityLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
