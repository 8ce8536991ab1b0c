//! Manipulation technique classification
//!
//! Pure function over detected indicators and their per-indicator
//! confidences. No I/O; re-running over the same input yields the same
//! outcome.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

use hlekkr_core::SeverityLevel;

use crate::signatures::{builtin_signatures, ManipulationType, TechniqueSignature};

/// Graded strength of the evidence behind a classified technique.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvidenceStrength {
    None,
    VeryWeak,
    Weak,
    Moderate,
    Strong,
    VeryStrong,
}

impl EvidenceStrength {
    fn from_score(score: f64) -> Self {
        if score >= 0.8 {
            Self::VeryStrong
        } else if score >= 0.6 {
            Self::Strong
        } else if score >= 0.4 {
            Self::Moderate
        } else if score >= 0.2 {
            Self::Weak
        } else {
            Self::VeryWeak
        }
    }
}

/// A technique whose signature matched with sufficient confidence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifiedTechnique {
    pub signature_id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub manipulation_type: ManipulationType,
    pub confidence: f64,
    pub severity: SeverityLevel,
    pub matched_indicators: Vec<String>,
    pub evidence_strength: EvidenceStrength,
}

/// Risk grading in the analysis report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    MinimalRisk,
    LowRisk,
    MediumRisk,
    HighRisk,
}

/// Human-readable analysis report accompanying a classification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub summary: String,
    pub risk_level: RiskLevel,
    pub recommendation: String,
    /// Signature id of the highest-confidence technique
    pub primary_technique: Option<String>,
}

/// Full classification outcome.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassificationOutcome {
    pub classified_techniques: Vec<ClassifiedTechnique>,
    pub overall_severity: SeverityLevel,
    pub max_confidence: f64,
    pub report: AnalysisReport,
}

/// Classifier over the built-in signature set.
#[derive(Debug, Clone)]
pub struct TechniqueClassifier {
    signatures: &'static [TechniqueSignature],
}

impl Default for TechniqueClassifier {
    fn default() -> Self {
        Self::new()
    }
}

impl TechniqueClassifier {
    pub fn new() -> Self {
        Self {
            signatures: builtin_signatures(),
        }
    }

    /// Classify detected indicators into techniques.
    pub fn classify(
        &self,
        detected_indicators: &BTreeSet<String>,
        indicator_confidences: &HashMap<String, f64>,
    ) -> ClassificationOutcome {
        let mut classified = Vec::new();
        let mut overall_severity = SeverityLevel::Minimal;
        let mut max_confidence: f64 = 0.0;

        for signature in self.signatures {
            let Some(confidence) =
                technique_confidence(signature, detected_indicators, indicator_confidences)
            else {
                continue;
            };
            if confidence < signature.confidence_threshold {
                continue;
            }

            let severity = technique_severity(signature, confidence);
            let matched: Vec<String> = signature
                .indicators
                .iter()
                .filter(|i| detected_indicators.contains(**i))
                .map(|i| i.to_string())
                .collect();
            let evidence = evidence_strength(signature, &matched, indicator_confidences);

            max_confidence = max_confidence.max(confidence);
            overall_severity = overall_severity.max(severity);

            classified.push(ClassifiedTechnique {
                signature_id: signature.id.to_string(),
                name: signature.name.to_string(),
                manipulation_type: signature.manipulation_type,
                confidence,
                severity,
                matched_indicators: matched,
                evidence_strength: evidence,
            });
        }

        let report = build_report(&classified);

        ClassificationOutcome {
            classified_techniques: classified,
            overall_severity,
            max_confidence,
            report,
        }
    }
}

/// Confidence for one signature: 60% match ratio, 40% mean matched-indicator
/// confidence, then the type modifier, clamped to [0, 1]. `None` when no
/// indicator matched.
fn technique_confidence(
    signature: &TechniqueSignature,
    detected: &BTreeSet<String>,
    confidences: &HashMap<String, f64>,
) -> Option<f64> {
    let matched: Vec<&str> = signature
        .indicators
        .iter()
        .copied()
        .filter(|i| detected.contains(*i))
        .collect();
    if matched.is_empty() {
        return None;
    }

    let match_ratio = matched.len() as f64 / signature.indicators.len() as f64;
    let base = match_ratio * 0.6;

    let boost: f64 = matched
        .iter()
        .filter_map(|i| confidences.get(*i))
        .map(|c| c * 0.4 / matched.len() as f64)
        .sum();

    let total = (base + boost) * signature.manipulation_type.confidence_modifier();
    Some(total.min(1.0))
}

/// Severity: base level scaled by a confidence step function and the
/// manipulation type's impact weight, bucketed back to a level.
fn technique_severity(signature: &TechniqueSignature, confidence: f64) -> SeverityLevel {
    let modifier = if confidence >= 0.9 {
        1.2
    } else if confidence >= 0.8 {
        1.1
    } else if confidence >= 0.7 {
        1.0
    } else if confidence >= 0.6 {
        0.9
    } else {
        0.8
    };

    let raw = signature.severity_base.value()
        * modifier
        * signature.manipulation_type.severity_weight();
    SeverityLevel::from_value(raw)
}

/// Evidence score: 60% match ratio, 40% average confidence of matched
/// indicators (missing confidences default to 0.5).
fn evidence_strength(
    signature: &TechniqueSignature,
    matched: &[String],
    confidences: &HashMap<String, f64>,
) -> EvidenceStrength {
    if matched.is_empty() {
        return EvidenceStrength::None;
    }
    let match_ratio = matched.len() as f64 / signature.indicators.len() as f64;
    let avg_confidence: f64 = matched
        .iter()
        .map(|i| confidences.get(i).copied().unwrap_or(0.5))
        .sum::<f64>()
        / matched.len() as f64;

    EvidenceStrength::from_score(match_ratio * 0.6 + avg_confidence * 0.4)
}

fn build_report(classified: &[ClassifiedTechnique]) -> AnalysisReport {
    let Some(primary) = classified
        .iter()
        .max_by(|a, b| a.confidence.total_cmp(&b.confidence))
    else {
        return AnalysisReport {
            summary: "No manipulation techniques detected with sufficient confidence.".to_string(),
            risk_level: RiskLevel::MinimalRisk,
            recommendation: "Content appears to be authentic based on current analysis."
                .to_string(),
            primary_technique: None,
        };
    };

    let max_severity = classified
        .iter()
        .map(|t| t.severity)
        .max()
        .unwrap_or(SeverityLevel::Minimal);
    let max_confidence = primary.confidence;

    let (risk_level, recommendation) = if max_severity >= SeverityLevel::High
        && max_confidence >= 0.8
    {
        (
            RiskLevel::HighRisk,
            "Content shows strong evidence of sophisticated manipulation. Recommend human expert review.",
        )
    } else if max_severity >= SeverityLevel::Moderate && max_confidence >= 0.6 {
        (
            RiskLevel::MediumRisk,
            "Content shows evidence of manipulation. Additional verification recommended.",
        )
    } else if max_confidence >= 0.4 {
        (
            RiskLevel::LowRisk,
            "Weak evidence of manipulation detected. Content may be authentic with minor artifacts.",
        )
    } else {
        (
            RiskLevel::MinimalRisk,
            "No significant manipulation detected. Content appears authentic.",
        )
    };

    let mut summary = format!(
        "Primary manipulation: {} (confidence: {:.2})",
        primary.name, primary.confidence
    );
    if classified.len() > 1 {
        summary.push_str(&format!(
            " Additional techniques detected: {}",
            classified.len() - 1
        ));
    }

    AnalysisReport {
        summary,
        risk_level,
        recommendation: recommendation.to_string(),
        primary_technique: Some(primary.signature_id.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn indicators(pairs: &[(&str, f64)]) -> (BTreeSet<String>, HashMap<String, f64>) {
        let set = pairs.iter().map(|(k, _)| k.to_string()).collect();
        let map = pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect();
        (set, map)
    }

    #[test]
    fn test_face_swap_classification() {
        let (detected, confidences) = indicators(&[
            ("facial_asymmetry", 0.8),
            ("identity_inconsistency", 0.9),
            ("boundary_artifacts", 0.7),
            ("lighting_mismatch", 0.6),
            ("skin_texture_inconsistency", 0.75),
        ]);

        let outcome = TechniqueClassifier::new().classify(&detected, &confidences);

        assert!(outcome
            .classified_techniques
            .iter()
            .any(|t| t.signature_id == "deepfakes_face_swap"));
        assert!(outcome.overall_severity >= SeverityLevel::Moderate);
        assert!(outcome.max_confidence > 0.6);
        assert_eq!(
            outcome.report.primary_technique.as_deref(),
            Some("deepfakes_face_swap")
        );
    }

    #[test]
    fn test_no_indicators_yields_minimal() {
        let outcome =
            TechniqueClassifier::new().classify(&BTreeSet::new(), &HashMap::new());
        assert!(outcome.classified_techniques.is_empty());
        assert_eq!(outcome.overall_severity, SeverityLevel::Minimal);
        assert_eq!(outcome.max_confidence, 0.0);
        assert_eq!(outcome.report.risk_level, RiskLevel::MinimalRisk);
    }

    #[test]
    fn test_adding_indicator_never_decreases_confidence() {
        let classifier = TechniqueClassifier::new();
        let (detected, confidences) = indicators(&[
            ("facial_asymmetry", 0.8),
            ("identity_inconsistency", 0.9),
            ("boundary_artifacts", 0.7),
            ("lighting_mismatch", 0.6),
        ]);
        let before = classifier.classify(&detected, &confidences);
        let before_conf = before
            .classified_techniques
            .iter()
            .find(|t| t.signature_id == "deepfakes_face_swap")
            .map(|t| t.confidence)
            .unwrap_or(0.0);

        let (detected2, confidences2) = indicators(&[
            ("facial_asymmetry", 0.8),
            ("identity_inconsistency", 0.9),
            ("boundary_artifacts", 0.7),
            ("lighting_mismatch", 0.6),
            ("skin_texture_inconsistency", 0.95),
        ]);
        let after = classifier.classify(&detected2, &confidences2);
        let after_conf = after
            .classified_techniques
            .iter()
            .find(|t| t.signature_id == "deepfakes_face_swap")
            .map(|t| t.confidence)
            .unwrap();

        assert!(after_conf >= before_conf);
    }

    #[test]
    fn test_compression_signature_lower_confidence() {
        // Full match on compression indicators still gets the 0.8 damper
        let (detected, confidences) = indicators(&[
            ("jpeg_grid_inconsistency", 0.9),
            ("quantization_artifacts", 0.9),
            ("dct_coefficient_anomalies", 0.9),
            ("compression_history_mismatch", 0.9),
            ("quality_factor_inconsistency", 0.9),
        ]);
        let outcome = TechniqueClassifier::new().classify(&detected, &confidences);
        let technique = outcome
            .classified_techniques
            .iter()
            .find(|t| t.signature_id == "compression_manipulation")
            .unwrap();
        // (1.0*0.6 + 0.9*0.4) * 0.8 = 0.768
        assert!((technique.confidence - 0.768).abs() < 1e-9);
        assert_eq!(technique.severity, SeverityLevel::Minimal);
    }

    #[test]
    fn test_determinism() {
        let (detected, confidences) = indicators(&[
            ("gan_fingerprints", 0.95),
            ("latent_space_artifacts", 0.9),
            ("style_mixing_inconsistency", 0.85),
            ("high_frequency_suppression", 0.8),
            ("spectral_bias_artifacts", 0.9),
        ]);
        let classifier = TechniqueClassifier::new();
        let a = classifier.classify(&detected, &confidences);
        let b = classifier.classify(&detected, &confidences);
        assert_eq!(
            serde_json::to_value(&a).unwrap(),
            serde_json::to_value(&b).unwrap()
        );
    }

    #[test]
    fn test_stylegan_high_risk_report() {
        let (detected, confidences) = indicators(&[
            ("gan_fingerprints", 0.95),
            ("latent_space_artifacts", 0.9),
            ("style_mixing_inconsistency", 0.85),
            ("high_frequency_suppression", 0.8),
            ("spectral_bias_artifacts", 0.9),
        ]);
        let outcome = TechniqueClassifier::new().classify(&detected, &confidences);
        assert_eq!(outcome.report.risk_level, RiskLevel::HighRisk);
        assert_eq!(outcome.overall_severity, SeverityLevel::Critical);
    }
}
