//! Component score calculators
//!
//! Each component maps one slice of the analysis bundle into [0, 100].
//! Missing data yields the 50-point neutral sentinel (70 for the
//! historical component, which favors new content); the composite layer
//! treats the sentinel as uncertainty.

use chrono::Utc;

use hlekkr_analysis::{AgreementLevel, DetectionResult};
use hlekkr_core::{AuditEvent, AuditEventType, SeverityLevel};
use hlekkr_custody::{ChainVerdict, CustodySummary};
use hlekkr_extract::ExtractedMetadata;
use hlekkr_verify::{SourceVerification, VerificationStatus};

/// Neutral sentinel recorded when a component has no data.
pub const NEUTRAL_SCORE: f64 = 50.0;

/// Everything the engine gathered about one media item.
#[derive(Debug, Clone, Default)]
pub struct AnalysisBundle {
    pub media_id: String,
    pub detection: Option<DetectionResult>,
    pub source: Option<SourceVerification>,
    pub metadata: Option<ExtractedMetadata>,
    pub custody: Option<CustodySummary>,
    pub audit_events: Vec<AuditEvent>,
}

/// Deepfake component: inverse model confidence minus technique penalties.
pub fn deepfake_score(bundle: &AnalysisBundle) -> f64 {
    let Some(detection) = &bundle.detection else {
        return NEUTRAL_SCORE;
    };
    if detection.deepfake_confidence < 0.0 {
        // Analysis error sentinel
        return NEUTRAL_SCORE;
    }

    let base = (1.0 - detection.deepfake_confidence) * 100.0;

    let total_penalty = match &detection.classification {
        Some(classification) => {
            let severity_penalty = match classification.overall_severity {
                SeverityLevel::Minimal => 0.0,
                SeverityLevel::Low => 5.0,
                SeverityLevel::Moderate => 15.0,
                SeverityLevel::High => 30.0,
                SeverityLevel::Critical => 50.0,
            };

            let technique_penalty: f64 = classification
                .classified_techniques
                .iter()
                .map(|t| type_penalty(t.manipulation_type.as_str()) * t.confidence)
                .sum();

            let agreement_modifier = match detection.consensus.agreement {
                AgreementLevel::VeryHigh => 1.2,
                AgreementLevel::High => 1.1,
                AgreementLevel::Medium => 1.0,
                AgreementLevel::Low => 0.8,
                AgreementLevel::VeryLow => 0.6,
                AgreementLevel::None => 1.0,
            };

            (severity_penalty + technique_penalty) * agreement_modifier
        }
        None => detection.detected_techniques.len() as f64 * 8.0,
    };

    let final_penalty = total_penalty * confidence_modifier(detection);
    (base - final_penalty).max(0.0)
}

fn type_penalty(manipulation_type: &str) -> f64 {
    match manipulation_type {
        "entire_face_synthesis" => 25.0,
        "face_swap" => 20.0,
        "speech_synthesis" => 18.0,
        "face_reenactment" => 15.0,
        "expression_transfer" => 10.0,
        "attribute_editing" => 8.0,
        "traditional_editing" => 5.0,
        "compression_artifacts" => 2.0,
        _ => 5.0,
    }
}

/// Quality modifier for the penalty: more models and slower, deeper runs
/// increase its reliability. Clamped to [0.5, 2.0].
fn confidence_modifier(detection: &DetectionResult) -> f64 {
    let mut modifier: f64 = 1.0;
    if detection.consensus.models_count >= 3 {
        modifier *= 1.2;
    } else if detection.consensus.models_count >= 2 {
        modifier *= 1.1;
    }
    if detection.processing_time > 5.0 {
        modifier *= 1.1;
    } else if detection.processing_time < 0.5 {
        modifier *= 0.9;
    }
    modifier.clamp(0.5, 2.0)
}

/// Source reliability: verification status, reputation, custody, and
/// upload-path signals around a slightly-positive default.
pub fn source_reliability_score(bundle: &AnalysisBundle) -> f64 {
    if bundle.source.is_none() && bundle.metadata.is_none() {
        return NEUTRAL_SCORE;
    }

    let mut score: f64 = 60.0;

    if let Some(source) = &bundle.source {
        let status_adjustment = match source.status {
            VerificationStatus::Verified => 35.0,
            VerificationStatus::LikelyVerified => 20.0,
            VerificationStatus::Unverified => 0.0,
            VerificationStatus::Suspicious => -30.0,
            VerificationStatus::LikelyFake => -45.0,
            VerificationStatus::Error => 0.0,
        };
        score += status_adjustment * source.confidence;

        // Reputation enters centered so unknown (50) domains are neutral
        score += (source.reputation_score - 50.0) * 0.5;

        // Cross-reference bonus: 3 points per external source, capped at 15
        score += (source.external_sources.len() as f64 * 3.0).min(15.0);
    }

    if let Some(custody) = &bundle.custody {
        score += custody_bonus(custody);
    }

    if let Some(metadata) = &bundle.metadata {
        let key = &metadata.location.key;
        if key.contains("verified/") {
            score += 10.0;
        } else if key.contains("suspicious/") || key.contains("quarantine/") {
            score -= 20.0;
        }
        score += upload_timing_bonus(metadata);
    }

    score.clamp(0.0, 100.0)
}

fn custody_bonus(custody: &CustodySummary) -> f64 {
    if custody.event_count == 0 {
        return 0.0;
    }
    let mut bonus = 5.0;
    if custody.event_count >= 3 {
        bonus += 10.0;
    } else if custody.event_count >= 2 {
        bonus += 5.0;
    }
    match custody.integrity_status {
        ChainVerdict::Valid => bonus += 10.0,
        ChainVerdict::MostlyValid => bonus += 5.0,
        ChainVerdict::Compromised => bonus -= 15.0,
        ChainVerdict::BrokenChain => bonus -= 25.0,
        ChainVerdict::Empty => {}
    }
    bonus
}

fn upload_timing_bonus(metadata: &ExtractedMetadata) -> f64 {
    let age_seconds = (Utc::now() - metadata.upload_timestamp).num_seconds();
    if age_seconds < 86_400 {
        return 2.0;
    }
    if age_seconds > 31_536_000 {
        return -2.0;
    }
    use chrono::Timelike;
    match metadata.upload_timestamp.hour() {
        9..=17 => 1.0,
        2..=5 => -1.0,
        _ => 0.0,
    }
}

/// Metadata consistency: deductions from a perfect 100.
pub fn metadata_consistency_score(bundle: &AnalysisBundle) -> f64 {
    let Some(metadata) = &bundle.metadata else {
        return NEUTRAL_SCORE;
    };

    let mut score = 100.0;

    if metadata.file_size == 0 {
        score -= 20.0;
    }

    if let Some(last_modified) = metadata.last_modified {
        let drift = (metadata.upload_timestamp - last_modified).num_seconds().abs();
        if drift > 86_400 {
            score -= 15.0;
        }
    } else {
        score -= 5.0;
    }

    // Critical fields: filename, size, content type
    let mut missing = 0;
    if metadata.filename.is_empty() {
        missing += 1;
    }
    if metadata.file_size == 0 {
        missing += 1;
    }
    if metadata.content_type.is_none() {
        missing += 1;
    }
    score -= missing as f64 * 5.0;

    score.max(0.0)
}

/// Historical pattern: rapid-upload and erratic-processing penalties around
/// a neutral-positive 70 for new content.
pub fn historical_pattern_score(bundle: &AnalysisBundle) -> f64 {
    let mut score: f64 = 70.0;

    let mut upload_times: Vec<_> = bundle
        .audit_events
        .iter()
        .filter(|e| e.event_type == AuditEventType::MediaUpload)
        .map(|e| e.timestamp)
        .collect();
    upload_times.sort_unstable();

    if upload_times.len() > 1 {
        let gaps: Vec<f64> = upload_times
            .windows(2)
            .map(|pair| (pair[1] - pair[0]).num_seconds() as f64)
            .collect();
        let avg_gap = gaps.iter().sum::<f64>() / gaps.len() as f64;
        if avg_gap < 60.0 {
            score -= 20.0;
        } else if avg_gap < 300.0 {
            score -= 10.0;
        }
    }

    let processing_times: Vec<f64> = bundle
        .audit_events
        .iter()
        .filter_map(|e| e.data.get("processingTime").and_then(|v| v.as_f64()))
        .filter(|t| *t > 0.0)
        .collect();
    if processing_times.len() > 1 {
        let max = processing_times.iter().cloned().fold(f64::MIN, f64::max);
        let min = processing_times.iter().cloned().fold(f64::MAX, f64::min);
        if min > 0.0 && max / min > 10.0 {
            score -= 5.0;
        }
    }

    score.clamp(0.0, 100.0)
}

/// Technical integrity: storage-level integrity signals.
pub fn technical_integrity_score(bundle: &AnalysisBundle) -> f64 {
    let Some(metadata) = &bundle.metadata else {
        return NEUTRAL_SCORE;
    };

    let mut score: f64 = 80.0;
    if metadata.etag.is_none() {
        score -= 10.0;
    }
    if metadata.server_side_encryption.is_none() {
        score -= 5.0;
    }
    if metadata.storage_class.as_deref().unwrap_or("STANDARD") != "STANDARD" {
        score -= 2.0;
    }
    if metadata.technical_metadata.extraction_failed {
        score -= 15.0;
    }

    score.clamp(0.0, 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use hlekkr_analysis::ConsensusMetrics;
    use hlekkr_core::ObjectLocation;
    use hlekkr_extract::TechnicalMetadata;
    use serde_json::json;
    use std::collections::HashMap;

    fn detection(confidence: f64, techniques: &[&str]) -> DetectionResult {
        DetectionResult {
            media_id: "m1".to_string(),
            deepfake_confidence: confidence,
            detected_techniques: techniques.iter().map(|s| s.to_string()).collect(),
            model_results: Vec::new(),
            consensus: ConsensusMetrics::empty(),
            classification: None,
            processing_time: 2.0,
        }
    }

    fn metadata(size: u64) -> ExtractedMetadata {
        ExtractedMetadata {
            media_id: "m1".to_string(),
            location: ObjectLocation::new("media", "uploads/a.png"),
            filename: "a.png".to_string(),
            media_type: hlekkr_core::MediaKind::Image,
            file_size: size,
            content_type: Some("image/png".to_string()),
            etag: Some("abc".to_string()),
            last_modified: Some(Utc::now()),
            storage_class: Some("STANDARD".to_string()),
            server_side_encryption: Some("AES256".to_string()),
            upload_timestamp: Utc::now(),
            technical_metadata: TechnicalMetadata {
                extraction_method: "header_parse".to_string(),
                probe: None,
                error: None,
                extraction_failed: false,
            },
        }
    }

    fn source(status: VerificationStatus, reputation: f64, confidence: f64) -> SourceVerification {
        SourceVerification {
            media_id: "m1".to_string(),
            url: Some("https://www.reuters.com/a".to_string()),
            domain: Some("reuters.com".to_string()),
            status,
            reputation_score: reputation,
            confidence,
            methods: Vec::new(),
            external_sources: Vec::new(),
            discrepancies: Vec::new(),
            component_scores: HashMap::new(),
        }
    }

    #[test]
    fn test_deepfake_no_data_neutral() {
        assert_eq!(deepfake_score(&AnalysisBundle::default()), NEUTRAL_SCORE);
    }

    #[test]
    fn test_deepfake_error_sentinel_neutral() {
        let bundle = AnalysisBundle {
            detection: Some(detection(-1.0, &[])),
            ..Default::default()
        };
        assert_eq!(deepfake_score(&bundle), NEUTRAL_SCORE);
    }

    #[test]
    fn test_deepfake_inverse_base() {
        let bundle = AnalysisBundle {
            detection: Some(detection(0.3, &[])),
            ..Default::default()
        };
        assert_eq!(deepfake_score(&bundle), 70.0);
    }

    #[test]
    fn test_deepfake_fallback_technique_penalty() {
        let bundle = AnalysisBundle {
            detection: Some(detection(0.3, &["face_swap", "boundary_artifacts"])),
            ..Default::default()
        };
        // 70 - 2 techniques * 8 = 54
        assert_eq!(deepfake_score(&bundle), 54.0);
    }

    #[test]
    fn test_source_verified_high_reputation() {
        let bundle = AnalysisBundle {
            source: Some(source(VerificationStatus::Verified, 85.0, 0.8)),
            metadata: Some(metadata(1024)),
            ..Default::default()
        };
        // 60 + 35*0.8 + (85-50)*0.5 + recency bonus 2 = 107.5 -> clamped 100
        assert_eq!(source_reliability_score(&bundle), 100.0);
    }

    #[test]
    fn test_source_quarantine_path_penalized() {
        let mut meta = metadata(1024);
        meta.location = ObjectLocation::new("media", "quarantine/m1/a.png");
        let bundle = AnalysisBundle {
            metadata: Some(meta),
            ..Default::default()
        };
        // 60 - 20 + recency 2 = 42
        assert_eq!(source_reliability_score(&bundle), 42.0);
    }

    #[test]
    fn test_metadata_complete_is_perfect() {
        let bundle = AnalysisBundle {
            metadata: Some(metadata(1024)),
            ..Default::default()
        };
        assert_eq!(metadata_consistency_score(&bundle), 100.0);
    }

    #[test]
    fn test_metadata_zero_size_double_penalty() {
        let bundle = AnalysisBundle {
            metadata: Some(metadata(0)),
            ..Default::default()
        };
        // -20 zero size, -5 missing critical field (size)
        assert_eq!(metadata_consistency_score(&bundle), 75.0);
    }

    #[test]
    fn test_metadata_timestamp_drift() {
        let mut meta = metadata(1024);
        meta.last_modified = Some(Utc::now() - chrono::Duration::days(3));
        let bundle = AnalysisBundle {
            metadata: Some(meta),
            ..Default::default()
        };
        assert_eq!(metadata_consistency_score(&bundle), 85.0);
    }

    #[test]
    fn test_historical_rapid_uploads() {
        let now = Utc::now();
        let mut events = Vec::new();
        for i in 0..3 {
            let mut event = AuditEvent::new(
                "m1",
                AuditEventType::MediaUpload,
                "ingest",
                json!({}),
            );
            event.timestamp = now + chrono::Duration::seconds(i * 10);
            events.push(event);
        }
        let bundle = AnalysisBundle {
            audit_events: events,
            ..Default::default()
        };
        assert_eq!(historical_pattern_score(&bundle), 50.0);
    }

    #[test]
    fn test_historical_new_content_neutral_positive() {
        assert_eq!(historical_pattern_score(&AnalysisBundle::default()), 70.0);
    }

    #[test]
    fn test_technical_deductions() {
        let mut meta = metadata(1024);
        meta.etag = None;
        meta.server_side_encryption = None;
        meta.technical_metadata.extraction_failed = true;
        let bundle = AnalysisBundle {
            metadata: Some(meta),
            ..Default::default()
        };
        // 80 - 10 - 5 - 15 = 50
        assert_eq!(technical_integrity_score(&bundle), 50.0);
    }

    #[test]
    fn test_custody_bonus_levels() {
        let custody = CustodySummary {
            media_id: "m1".to_string(),
            event_count: 4,
            first_event: None,
            last_event: None,
            integrity_status: ChainVerdict::Valid,
            stages: vec![],
        };
        // 5 base + 10 length + 10 valid
        assert_eq!(custody_bonus(&custody), 25.0);
    }
}
