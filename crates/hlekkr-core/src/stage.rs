//! Pipeline stages

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Processing stages of the media verification pipeline, in pipeline order.
///
/// Parsing is strict: unrecognized input maps to [`ProcessingStage::Unknown`]
/// only through [`ProcessingStage::parse_lenient`]; `FromStr` rejects it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ProcessingStage {
    Upload,
    SecurityScan,
    MetadataExtraction,
    SourceVerification,
    DeepfakeAnalysis,
    TrustScoreCalculation,
    HumanReview,
    FinalVerification,
    #[default]
    Unknown,
}

impl ProcessingStage {
    /// Stages every media item must pass through before scoring.
    pub const MANDATORY: [ProcessingStage; 4] = [
        ProcessingStage::Upload,
        ProcessingStage::SecurityScan,
        ProcessingStage::MetadataExtraction,
        ProcessingStage::DeepfakeAnalysis,
    ];

    /// Wire name (snake_case, matches the persisted representation)
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Upload => "upload",
            Self::SecurityScan => "security_scan",
            Self::MetadataExtraction => "metadata_extraction",
            Self::SourceVerification => "source_verification",
            Self::DeepfakeAnalysis => "deepfake_analysis",
            Self::TrustScoreCalculation => "trust_score_calculation",
            Self::HumanReview => "human_review",
            Self::FinalVerification => "final_verification",
            Self::Unknown => "unknown",
        }
    }

    /// Parse, mapping unrecognized names to `Unknown` instead of failing.
    pub fn parse_lenient(s: &str) -> Self {
        Self::from_str(s).unwrap_or(Self::Unknown)
    }

    /// Position in the pipeline, used for temporal-order checks.
    pub fn order(&self) -> u8 {
        match self {
            Self::Upload => 0,
            Self::SecurityScan => 1,
            Self::MetadataExtraction => 2,
            Self::SourceVerification => 3,
            Self::DeepfakeAnalysis => 4,
            Self::TrustScoreCalculation => 5,
            Self::HumanReview => 6,
            Self::FinalVerification => 7,
            Self::Unknown => u8::MAX,
        }
    }
}

impl FromStr for ProcessingStage {
    type Err = crate::error::PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "upload" => Ok(Self::Upload),
            "security_scan" => Ok(Self::SecurityScan),
            "metadata_extraction" => Ok(Self::MetadataExtraction),
            "source_verification" => Ok(Self::SourceVerification),
            "deepfake_analysis" => Ok(Self::DeepfakeAnalysis),
            "trust_score_calculation" => Ok(Self::TrustScoreCalculation),
            "human_review" => Ok(Self::HumanReview),
            "final_verification" => Ok(Self::FinalVerification),
            other => Err(crate::error::PipelineError::input_invalid(format!(
                "unknown processing stage: {other}"
            ))),
        }
    }
}

impl fmt::Display for ProcessingStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
