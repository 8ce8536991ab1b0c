//! Trust score types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Confidence grade derived from data completeness.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreConfidence {
    Low,
    Medium,
    High,
}

impl ScoreConfidence {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

/// Score range bucket, used as a query dimension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreRange {
    Critical,
    VeryLow,
    Low,
    Moderate,
    High,
    Excellent,
}

impl ScoreRange {
    pub fn from_score(score: f64) -> Self {
        if score >= 90.0 {
            Self::Excellent
        } else if score >= 70.0 {
            Self::High
        } else if score >= 50.0 {
            Self::Moderate
        } else if score >= 30.0 {
            Self::Low
        } else if score >= 10.0 {
            Self::VeryLow
        } else {
            Self::Critical
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Critical => "critical",
            Self::VeryLow => "very_low",
            Self::Low => "low",
            Self::Moderate => "moderate",
            Self::High => "high",
            Self::Excellent => "excellent",
        }
    }

    pub const ALL: [ScoreRange; 6] = [
        Self::Critical,
        Self::VeryLow,
        Self::Low,
        Self::Moderate,
        Self::High,
        Self::Excellent,
    ];
}

impl fmt::Display for ScoreRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The five component scores behind a composite.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    pub deepfake: f64,
    pub source_reliability: f64,
    pub metadata_consistency: f64,
    pub technical_integrity: f64,
    pub historical_pattern: f64,
}

impl ScoreBreakdown {
    pub fn components(&self) -> [(&'static str, f64); 5] {
        [
            ("deepfake", self.deepfake),
            ("sourceReliability", self.source_reliability),
            ("metadataConsistency", self.metadata_consistency),
            ("technicalIntegrity", self.technical_integrity),
            ("historicalPattern", self.historical_pattern),
        ]
    }
}

/// A factor entry explaining a score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrustFactor {
    pub component: String,
    pub impact: String,
    pub weight: String,
}

/// One immutable trust score version.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TrustScoreVersion {
    pub media_id: String,
    pub version: Uuid,
    pub calculation_timestamp: DateTime<Utc>,
    /// `YYYY-MM-DD`, the date-range query dimension
    pub calculation_date: String,
    pub composite_score: f64,
    pub confidence: ScoreConfidence,
    pub score_range: ScoreRange,
    pub breakdown: ScoreBreakdown,
    pub factors: Vec<TrustFactor>,
    pub recommendations: Vec<String>,
    pub is_latest: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_range_buckets() {
        assert_eq!(ScoreRange::from_score(95.0), ScoreRange::Excellent);
        assert_eq!(ScoreRange::from_score(70.0), ScoreRange::High);
        assert_eq!(ScoreRange::from_score(50.0), ScoreRange::Moderate);
        assert_eq!(ScoreRange::from_score(35.0), ScoreRange::Low);
        assert_eq!(ScoreRange::from_score(15.0), ScoreRange::VeryLow);
        assert_eq!(ScoreRange::from_score(2.0), ScoreRange::Critical);
    }
}
