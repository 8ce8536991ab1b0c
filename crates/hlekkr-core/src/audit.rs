//! Audit trail event types
//!
//! Every stage writes one audit event per media item; the trail is the
//! cross-stage data bus the scorer and discrepancy detector read from.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Audit event types, one per pipeline side-effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditEventType {
    MediaUpload,
    SecurityScan,
    MetadataExtraction,
    SourceVerification,
    DeepfakeAnalysis,
    TrustScoreCalculation,
    ReviewDecision,
    DiscrepancyDetected,
    ChainOfCustody,
    AiFeedback,
    ThreatIndicator,
}

impl AuditEventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MediaUpload => "media_upload",
            Self::SecurityScan => "security_scan",
            Self::MetadataExtraction => "metadata_extraction",
            Self::SourceVerification => "source_verification",
            Self::DeepfakeAnalysis => "deepfake_analysis",
            Self::TrustScoreCalculation => "trust_score_calculation",
            Self::ReviewDecision => "review_decision",
            Self::DiscrepancyDetected => "discrepancy_detected",
            Self::ChainOfCustody => "chain_of_custody",
            Self::AiFeedback => "ai_feedback",
            Self::ThreatIndicator => "threat_indicator",
        }
    }
}

impl FromStr for AuditEventType {
    type Err = crate::error::PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "media_upload" => Ok(Self::MediaUpload),
            "security_scan" => Ok(Self::SecurityScan),
            "metadata_extraction" => Ok(Self::MetadataExtraction),
            "source_verification" => Ok(Self::SourceVerification),
            "deepfake_analysis" => Ok(Self::DeepfakeAnalysis),
            "trust_score_calculation" => Ok(Self::TrustScoreCalculation),
            "review_decision" => Ok(Self::ReviewDecision),
            "discrepancy_detected" => Ok(Self::DiscrepancyDetected),
            "chain_of_custody" => Ok(Self::ChainOfCustody),
            "ai_feedback" => Ok(Self::AiFeedback),
            "threat_indicator" => Ok(Self::ThreatIndicator),
            other => Err(crate::error::PipelineError::input_invalid(format!(
                "unknown audit event type: {other}"
            ))),
        }
    }
}

impl fmt::Display for AuditEventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Single audit trail event. Append-only, immutable once written.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    pub media_id: String,
    pub timestamp: DateTime<Utc>,
    pub event_type: AuditEventType,
    /// Component that produced the event, e.g. `deepfake_analyzer`
    pub event_source: String,
    pub data: serde_json::Value,
}

impl AuditEvent {
    pub fn new(
        media_id: impl Into<String>,
        event_type: AuditEventType,
        event_source: impl Into<String>,
        data: serde_json::Value,
    ) -> Self {
        Self {
            media_id: media_id.into(),
            timestamp: Utc::now(),
            event_type,
            event_source: event_source.into(),
            data,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_event_type_round_trip() {
        for t in [
            AuditEventType::MediaUpload,
            AuditEventType::AiFeedback,
            AuditEventType::ThreatIndicator,
        ] {
            assert_eq!(AuditEventType::from_str(t.as_str()).unwrap(), t);
        }
    }

    #[test]
    fn test_strict_parse() {
        assert!(AuditEventType::from_str("media-upload").is_err());
    }

    #[test]
    fn test_serde_wire_format() {
        let event = AuditEvent::new(
            "media-1",
            AuditEventType::SecurityScan,
            "security_scanner",
            json!({"threatDetected": false}),
        );
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["event_type"], "security_scan");
        assert_eq!(value["media_id"], "media-1");
    }
}
