//! The discrepancy detector

use chrono::{DateTime, Utc};
use serde_json::json;
use uuid::Uuid;

use hlekkr_core::{AuditEvent, ProcessingStage, Severity};
use hlekkr_custody::CustodyEvent;
use hlekkr_extract::ExtractedMetadata;
use hlekkr_score::composite::component_variance;
use hlekkr_score::TrustScoreVersion;
use hlekkr_verify::{SourceVerification, VerificationStatus};

use crate::types::{Discrepancy, DiscrepancyType};

/// Everything recorded about one media item, assembled by the runtime.
#[derive(Debug, Clone, Default)]
pub struct MediaEvidence {
    pub media_id: String,
    pub source: Option<SourceVerification>,
    pub source_publication_date: Option<DateTime<Utc>>,
    pub metadata: Option<ExtractedMetadata>,
    pub custody_chain: Vec<CustodyEvent>,
    pub trust_score: Option<TrustScoreVersion>,
    pub audit_events: Vec<AuditEvent>,
    /// Uploads observed from the same source domain in the last hour
    pub domain_uploads_last_hour: usize,
}

/// Stages every complete run must leave in the custody chain.
const EXPECTED_STAGES: [ProcessingStage; 4] = [
    ProcessingStage::Upload,
    ProcessingStage::SecurityScan,
    ProcessingStage::MetadataExtraction,
    ProcessingStage::DeepfakeAnalysis,
];

/// Stages that must never transform content.
const READ_ONLY_STAGES: [ProcessingStage; 2] = [
    ProcessingStage::SecurityScan,
    ProcessingStage::SourceVerification,
];

/// The detector. Stateless; every analyzer is a pure function of the
/// evidence.
#[derive(Debug, Default)]
pub struct DiscrepancyDetector;

impl DiscrepancyDetector {
    pub fn new() -> Self {
        Self
    }

    /// Run all analyzers over one media item's evidence.
    pub fn analyze(&self, evidence: &MediaEvidence) -> Vec<Discrepancy> {
        let mut findings = Vec::new();
        self.check_source(evidence, &mut findings);
        self.check_metadata(evidence, &mut findings);
        self.check_chain_integrity(evidence, &mut findings);
        self.check_content_hashes(evidence, &mut findings);
        self.check_temporal_order(evidence, &mut findings);
        self.check_trust_score(evidence, &mut findings);
        self.check_processing_timeline(evidence, &mut findings);
        self.check_suspicious_patterns(evidence, &mut findings);

        tracing::info!(
            media_id = %evidence.media_id,
            findings = findings.len(),
            "discrepancy analysis completed"
        );
        findings
    }

    /// Keep only findings at or above a severity threshold.
    pub fn filter_by_severity(
        findings: Vec<Discrepancy>,
        threshold: Severity,
    ) -> Vec<Discrepancy> {
        findings
            .into_iter()
            .filter(|f| f.severity >= threshold)
            .collect()
    }

    fn check_source(&self, evidence: &MediaEvidence, findings: &mut Vec<Discrepancy>) {
        let Some(source) = &evidence.source else {
            return;
        };

        if source.status == VerificationStatus::Suspicious {
            findings.push(finding(
                evidence,
                DiscrepancyType::SourceInconsistency,
                Severity::High,
                "Source verification flagged the origin as suspicious",
                json!({"status": source.status.as_str(), "domain": source.domain}),
                &["source_verifier"],
                0.9,
                &["Review source manually", "Cross-check with external references"],
            ));
        }

        if source.reputation_score < 30.0 {
            findings.push(finding(
                evidence,
                DiscrepancyType::SourceInconsistency,
                Severity::Medium,
                "Source reputation below acceptance threshold",
                json!({"reputationScore": source.reputation_score}),
                &["source_verifier"],
                0.8,
                &["Treat source claims as unverified"],
            ));
        }

        if source.url.is_none() || source.domain.is_none() {
            findings.push(finding(
                evidence,
                DiscrepancyType::SourceInconsistency,
                Severity::Medium,
                "Required source fields missing",
                json!({"url": source.url, "domain": source.domain}),
                &["source_verifier"],
                0.7,
                &["Request complete source attribution"],
            ));
        }
    }

    fn check_metadata(&self, evidence: &MediaEvidence, findings: &mut Vec<Discrepancy>) {
        let Some(metadata) = &evidence.metadata else {
            return;
        };

        if let (Some(published), Some(modified)) =
            (evidence.source_publication_date, metadata.last_modified)
        {
            let drift = (published - modified).num_seconds().abs();
            if drift > 86_400 {
                findings.push(finding(
                    evidence,
                    DiscrepancyType::MetadataMismatch,
                    Severity::Medium,
                    "Claimed publication date disagrees with stored creation date by over 24h",
                    json!({"publicationDate": published, "lastModified": modified}),
                    &["metadata_extractor", "source_verifier"],
                    0.75,
                    &["Verify the claimed publication timeline"],
                ));
            }
        }

        if let (Some(declared), Some(probe)) = (
            metadata.content_type.as_deref(),
            metadata
                .technical_metadata
                .probe
                .as_ref()
                .and_then(|p| p.format.as_deref()),
        ) {
            if !declared.contains(probe) {
                findings.push(finding(
                    evidence,
                    DiscrepancyType::MetadataMismatch,
                    Severity::Low,
                    "Declared content type disagrees with probed container format",
                    json!({"declared": declared, "probed": probe}),
                    &["metadata_extractor"],
                    0.7,
                    &["Re-probe the object container"],
                ));
            }
        }
    }

    fn check_chain_integrity(&self, evidence: &MediaEvidence, findings: &mut Vec<Discrepancy>) {
        if evidence.custody_chain.is_empty() {
            return;
        }
        let present: Vec<ProcessingStage> =
            evidence.custody_chain.iter().map(|e| e.stage).collect();
        for expected in EXPECTED_STAGES {
            if !present.contains(&expected) {
                findings.push(finding(
                    evidence,
                    DiscrepancyType::ChainIntegrityViolation,
                    Severity::High,
                    &format!("Custody chain is missing the {expected} stage"),
                    json!({"missingStage": expected.as_str(), "presentStages": present.iter().map(|s| s.as_str()).collect::<Vec<_>>()}),
                    &["custody_ledger"],
                    0.9,
                    &["Verify the pipeline completed every stage", "Re-run the missing stage"],
                ));
            }
        }
    }

    fn check_content_hashes(&self, evidence: &MediaEvidence, findings: &mut Vec<Discrepancy>) {
        let chain = &evidence.custody_chain;

        for pair in chain.windows(2) {
            if let (Some(output), Some(input)) = (&pair[0].output_hash, &pair[1].input_hash) {
                if output != input {
                    findings.push(finding(
                        evidence,
                        DiscrepancyType::ContentHashMismatch,
                        Severity::Critical,
                        "Stage output hash does not match the next stage's input hash",
                        json!({
                            "stage": pair[0].stage.as_str(),
                            "nextStage": pair[1].stage.as_str(),
                            "outputHash": output,
                            "inputHash": input,
                        }),
                        &["custody_ledger"],
                        0.95,
                        &["Quarantine the media", "Audit the intervening processing step"],
                    ));
                }
            }
        }

        for event in chain {
            if READ_ONLY_STAGES.contains(&event.stage) {
                if let (Some(input), Some(output)) = (&event.input_hash, &event.output_hash) {
                    if input != output {
                        findings.push(finding(
                            evidence,
                            DiscrepancyType::ContentHashMismatch,
                            Severity::High,
                            &format!("Content modified during the read-only {} stage", event.stage),
                            json!({"stage": event.stage.as_str(), "inputHash": input, "outputHash": output}),
                            &["custody_ledger"],
                            0.85,
                            &["Audit the stage implementation"],
                        ));
                    }
                }
            }

            if ProcessingStage::MANDATORY.contains(&event.stage) && event.output_hash.is_none() {
                findings.push(finding(
                    evidence,
                    DiscrepancyType::ContentHashMismatch,
                    Severity::Medium,
                    &format!("Mandatory {} stage recorded no output hash", event.stage),
                    json!({"stage": event.stage.as_str(), "eventId": event.event_id}),
                    &["custody_ledger"],
                    0.7,
                    &["Ensure every mandatory stage hashes its output"],
                ));
            }
        }
    }

    fn check_temporal_order(&self, evidence: &MediaEvidence, findings: &mut Vec<Discrepancy>) {
        for pair in evidence.custody_chain.windows(2) {
            let earlier = &pair[0];
            let later = &pair[1];
            let order_regressed = later.stage.order() < earlier.stage.order()
                && later.stage != ProcessingStage::Unknown
                && earlier.stage != ProcessingStage::Unknown;
            if order_regressed {
                findings.push(finding(
                    evidence,
                    DiscrepancyType::TemporalInconsistency,
                    Severity::Medium,
                    "Custody events are out of pipeline order",
                    json!({
                        "earlierStage": earlier.stage.as_str(),
                        "laterStage": later.stage.as_str(),
                        "earlierTs": earlier.timestamp,
                        "laterTs": later.timestamp,
                    }),
                    &["custody_ledger"],
                    0.8,
                    &["Check for replayed or backdated events"],
                ));
            }
        }
    }

    fn check_trust_score(&self, evidence: &MediaEvidence, findings: &mut Vec<Discrepancy>) {
        let Some(score) = &evidence.trust_score else {
            return;
        };

        if score.composite_score < 20.0 {
            findings.push(finding(
                evidence,
                DiscrepancyType::TrustScoreAnomaly,
                Severity::Critical,
                "Composite trust score in the critical band",
                json!({"compositeScore": score.composite_score}),
                &["trust_score_engine"],
                0.9,
                &["Quarantine pending review", "Escalate to human review"],
            ));
        }

        let variance = component_variance(&score.breakdown);
        if variance > 1000.0 {
            findings.push(finding(
                evidence,
                DiscrepancyType::TrustScoreAnomaly,
                Severity::Medium,
                "Trust score components disagree strongly",
                json!({"componentVariance": variance}),
                &["trust_score_engine"],
                0.7,
                &["Review component inputs for partial failures"],
            ));
        }

        if let Some(source) = &evidence.source {
            let delta = (source.reputation_score - score.breakdown.source_reliability).abs();
            if delta > 30.0 {
                findings.push(finding(
                    evidence,
                    DiscrepancyType::TrustScoreAnomaly,
                    Severity::Medium,
                    "Source reputation and scored reliability diverge",
                    json!({
                        "sourceReputation": source.reputation_score,
                        "sourceReliabilityScore": score.breakdown.source_reliability,
                    }),
                    &["trust_score_engine", "source_verifier"],
                    0.7,
                    &["Recompute with fresh source verification"],
                ));
            }
        }
    }

    fn check_processing_timeline(&self, evidence: &MediaEvidence, findings: &mut Vec<Discrepancy>) {
        let chain = &evidence.custody_chain;
        if chain.len() < 2 {
            return;
        }

        let total = (chain[chain.len() - 1].timestamp - chain[0].timestamp).num_seconds();
        if total > 3600 {
            findings.push(finding(
                evidence,
                DiscrepancyType::ProcessingAnomaly,
                Severity::Low,
                "End-to-end processing exceeded one hour",
                json!({"totalSeconds": total}),
                &["pipeline"],
                0.6,
                &["Check worker backlog and stage budgets"],
            ));
        }

        for pair in chain.windows(2) {
            let gap = (pair[1].timestamp - pair[0].timestamp).num_seconds();
            if gap > 1800 {
                findings.push(finding(
                    evidence,
                    DiscrepancyType::ProcessingAnomaly,
                    Severity::Medium,
                    "Gap between consecutive stages exceeded 30 minutes",
                    json!({
                        "fromStage": pair[0].stage.as_str(),
                        "toStage": pair[1].stage.as_str(),
                        "gapSeconds": gap,
                    }),
                    &["pipeline"],
                    0.7,
                    &["Check for stalled or retried stages"],
                ));
            }
        }
    }

    fn check_suspicious_patterns(&self, evidence: &MediaEvidence, findings: &mut Vec<Discrepancy>) {
        if evidence.domain_uploads_last_hour > 10 {
            findings.push(finding(
                evidence,
                DiscrepancyType::SuspiciousPattern,
                Severity::Medium,
                "Upload flood from a single source domain",
                json!({"uploadsLastHour": evidence.domain_uploads_last_hour}),
                &["ingest"],
                0.75,
                &["Rate-limit the domain", "Review sibling uploads"],
            ));
        }

        if let (Some(score), Some(source)) = (&evidence.trust_score, &evidence.source) {
            if score.composite_score - source.reputation_score > 50.0 {
                findings.push(finding(
                    evidence,
                    DiscrepancyType::SuspiciousPattern,
                    Severity::High,
                    "High trust score despite a low-reputation source",
                    json!({
                        "compositeScore": score.composite_score,
                        "sourceReputation": source.reputation_score,
                    }),
                    &["trust_score_engine", "source_verifier"],
                    0.8,
                    &["Audit scoring inputs for manipulation"],
                ));
            }
        }

        let failed_steps = evidence
            .audit_events
            .iter()
            .filter(|e| {
                e.data
                    .get("extractionFailed")
                    .and_then(|v| v.as_bool())
                    .unwrap_or(false)
                    || e.data
                        .get("analysisFailed")
                        .and_then(|v| v.as_bool())
                        .unwrap_or(false)
                    || e.data.get("error").is_some()
            })
            .count();
        if failed_steps >= 3 {
            findings.push(finding(
                evidence,
                DiscrepancyType::SuspiciousPattern,
                Severity::Medium,
                "Repeated processing failures for this media item",
                json!({"failedSteps": failed_steps}),
                &["pipeline"],
                0.7,
                &["Inspect for adversarial inputs crafted to break processing"],
            ));
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn finding(
    evidence: &MediaEvidence,
    discrepancy_type: DiscrepancyType,
    severity: Severity,
    description: &str,
    evidence_payload: serde_json::Value,
    affected: &[&str],
    confidence: f64,
    actions: &[&str],
) -> Discrepancy {
    Discrepancy {
        id: Uuid::new_v4().to_string(),
        media_id: evidence.media_id.clone(),
        discrepancy_type,
        severity,
        description: description.to_string(),
        evidence: evidence_payload,
        affected_components: affected.iter().map(|s| s.to_string()).collect(),
        confidence,
        recommended_actions: actions.iter().map(|s| s.to_string()).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::DiscrepancySummary;
    use hlekkr_score::{ScoreBreakdown, ScoreConfidence, ScoreRange, TrustScoreVersion};
    use std::collections::HashMap;

    fn custody_event(
        stage: ProcessingStage,
        ts_offset_secs: i64,
        input: Option<&str>,
        output: Option<&str>,
    ) -> CustodyEvent {
        CustodyEvent {
            event_id: Uuid::new_v4().to_string(),
            media_id: "m1".to_string(),
            stage,
            timestamp: Utc::now() + chrono::Duration::seconds(ts_offset_secs),
            actor: "test".to_string(),
            action: format!("{stage}_completed"),
            input_hash: input.map(str::to_string),
            output_hash: output.map(str::to_string),
            transformation_details: json!({}),
            metadata: json!({}),
            previous_event_hash: None,
            integrity_proof: None,
            event_hash: "h".to_string(),
        }
    }

    fn trust_score(composite: f64, source_reliability: f64) -> TrustScoreVersion {
        TrustScoreVersion {
            media_id: "m1".to_string(),
            version: Uuid::new_v4(),
            calculation_timestamp: Utc::now(),
            calculation_date: "2026-08-01".to_string(),
            composite_score: composite,
            confidence: ScoreConfidence::Medium,
            score_range: ScoreRange::from_score(composite),
            breakdown: ScoreBreakdown {
                deepfake: composite,
                source_reliability,
                metadata_consistency: composite,
                technical_integrity: composite,
                historical_pattern: composite,
            },
            factors: Vec::new(),
            recommendations: Vec::new(),
            is_latest: true,
        }
    }

    fn source(status: VerificationStatus, reputation: f64) -> SourceVerification {
        SourceVerification {
            media_id: "m1".to_string(),
            url: Some("https://example.com/a".to_string()),
            domain: Some("example.com".to_string()),
            status,
            reputation_score: reputation,
            confidence: 0.8,
            methods: Vec::new(),
            external_sources: Vec::new(),
            discrepancies: Vec::new(),
            component_scores: HashMap::new(),
        }
    }

    fn full_chain() -> Vec<CustodyEvent> {
        vec![
            custody_event(ProcessingStage::Upload, 0, None, Some("h0")),
            custody_event(ProcessingStage::SecurityScan, 10, Some("h0"), Some("h0")),
            custody_event(ProcessingStage::MetadataExtraction, 20, Some("h0"), Some("h1")),
            custody_event(ProcessingStage::DeepfakeAnalysis, 30, Some("h1"), Some("h2")),
        ]
    }

    #[test]
    fn test_clean_evidence_yields_no_findings() {
        let evidence = MediaEvidence {
            media_id: "m1".to_string(),
            source: Some(source(VerificationStatus::Verified, 85.0)),
            trust_score: Some(trust_score(80.0, 85.0)),
            custody_chain: full_chain(),
            ..Default::default()
        };
        let findings = DiscrepancyDetector::new().analyze(&evidence);
        assert!(findings.is_empty(), "unexpected findings: {findings:#?}");
    }

    #[test]
    fn test_hash_chain_break_is_critical() {
        let mut chain = full_chain();
        chain[2].input_hash = Some("tampered".to_string());
        let evidence = MediaEvidence {
            media_id: "m1".to_string(),
            custody_chain: chain,
            ..Default::default()
        };
        let findings = DiscrepancyDetector::new().analyze(&evidence);
        assert!(findings.iter().any(|f| {
            f.discrepancy_type == DiscrepancyType::ContentHashMismatch
                && f.severity == Severity::Critical
        }));
    }

    #[test]
    fn test_scan_stage_modification_is_high() {
        let mut chain = full_chain();
        chain[1].output_hash = Some("mutated".to_string());
        let evidence = MediaEvidence {
            media_id: "m1".to_string(),
            custody_chain: chain,
            ..Default::default()
        };
        let findings = DiscrepancyDetector::new().analyze(&evidence);
        assert!(findings.iter().any(|f| {
            f.discrepancy_type == DiscrepancyType::ContentHashMismatch
                && f.severity == Severity::High
        }));
    }

    #[test]
    fn test_missing_stage_flagged() {
        let chain = vec![
            custody_event(ProcessingStage::Upload, 0, None, Some("h0")),
            custody_event(ProcessingStage::MetadataExtraction, 10, Some("h0"), Some("h1")),
        ];
        let evidence = MediaEvidence {
            media_id: "m1".to_string(),
            custody_chain: chain,
            ..Default::default()
        };
        let findings = DiscrepancyDetector::new().analyze(&evidence);
        let missing: Vec<_> = findings
            .iter()
            .filter(|f| f.discrepancy_type == DiscrepancyType::ChainIntegrityViolation)
            .collect();
        assert_eq!(missing.len(), 2); // security_scan and deepfake_analysis
    }

    #[test]
    fn test_critical_trust_score() {
        let evidence = MediaEvidence {
            media_id: "m1".to_string(),
            trust_score: Some(trust_score(10.0, 10.0)),
            ..Default::default()
        };
        let findings = DiscrepancyDetector::new().analyze(&evidence);
        assert!(findings.iter().any(|f| {
            f.discrepancy_type == DiscrepancyType::TrustScoreAnomaly
                && f.severity == Severity::Critical
        }));
        let summary = DiscrepancySummary::from_findings(&findings);
        assert!(summary.requires_alert);
    }

    #[test]
    fn test_high_trust_low_reputation_pattern() {
        let evidence = MediaEvidence {
            media_id: "m1".to_string(),
            source: Some(source(VerificationStatus::Unverified, 20.0)),
            trust_score: Some(trust_score(80.0, 45.0)),
            ..Default::default()
        };
        let findings = DiscrepancyDetector::new().analyze(&evidence);
        assert!(findings.iter().any(|f| {
            f.discrepancy_type == DiscrepancyType::SuspiciousPattern
                && f.severity == Severity::High
        }));
    }

    #[test]
    fn test_processing_gap_flagged() {
        let chain = vec![
            custody_event(ProcessingStage::Upload, 0, None, Some("h0")),
            custody_event(ProcessingStage::SecurityScan, 2000, Some("h0"), Some("h0")),
            custody_event(ProcessingStage::MetadataExtraction, 2010, Some("h0"), Some("h1")),
            custody_event(ProcessingStage::DeepfakeAnalysis, 2020, Some("h1"), Some("h2")),
        ];
        let evidence = MediaEvidence {
            media_id: "m1".to_string(),
            custody_chain: chain,
            ..Default::default()
        };
        let findings = DiscrepancyDetector::new().analyze(&evidence);
        assert!(findings.iter().any(|f| {
            f.discrepancy_type == DiscrepancyType::ProcessingAnomaly
                && f.severity == Severity::Medium
        }));
    }

    #[test]
    fn test_determinism_over_types() {
        let mut chain = full_chain();
        chain[2].input_hash = Some("tampered".to_string());
        let evidence = MediaEvidence {
            media_id: "m1".to_string(),
            source: Some(source(VerificationStatus::Suspicious, 15.0)),
            custody_chain: chain,
            trust_score: Some(trust_score(10.0, 15.0)),
            domain_uploads_last_hour: 20,
            ..Default::default()
        };
        let detector = DiscrepancyDetector::new();
        let types_a: Vec<_> = detector
            .analyze(&evidence)
            .iter()
            .map(|f| (f.discrepancy_type, f.severity))
            .collect();
        let types_b: Vec<_> = detector
            .analyze(&evidence)
            .iter()
            .map(|f| (f.discrepancy_type, f.severity))
            .collect();
        assert_eq!(types_a, types_b);
    }

    #[test]
    fn test_severity_filter() {
        let evidence = MediaEvidence {
            media_id: "m1".to_string(),
            source: Some(source(VerificationStatus::Suspicious, 15.0)),
            ..Default::default()
        };
        let findings = DiscrepancyDetector::new().analyze(&evidence);
        let high_only = DiscrepancyDetector::filter_by_severity(findings, Severity::High);
        assert!(high_only.iter().all(|f| f.severity >= Severity::High));
        assert!(!high_only.is_empty());
    }
}
