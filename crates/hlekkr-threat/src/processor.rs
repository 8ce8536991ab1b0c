//! The threat intelligence processor

use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use hlekkr_core::PipelineError;
use hlekkr_persist::DocumentBackend;
use hlekkr_review::{Decision, DecisionStore, DecisionType};

use crate::indicator::{extract_indicators, IndicatorStore, ThreatContext, ThreatIndicator};
use crate::patterns::{analyze_patterns, PatternAnalysis};
use crate::report::{build_report, should_generate_report, ReportStore, ThreatReport};

/// Recent-decision window for pattern analysis
const PATTERN_WINDOW_HOURS: i64 = 24;
/// Row cap on the backing query
const PATTERN_QUERY_LIMIT: usize = 500;

/// What processing one decision produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessOutcome {
    pub indicators: Vec<ThreatIndicator>,
    pub patterns: PatternAnalysis,
    pub report: Option<ThreatReport>,
    /// High/critical reports require an alert on the threat topic
    pub alert_required: bool,
}

/// The processor wires extraction, dedup, patterns, and reporting.
#[derive(Debug)]
pub struct ThreatIntelProcessor<B: DocumentBackend + ?Sized> {
    indicators: IndicatorStore<B>,
    reports: ReportStore<B>,
    decisions: DecisionStore<B>,
}

impl<B: DocumentBackend + ?Sized> ThreatIntelProcessor<B> {
    pub fn new(backend: Arc<B>) -> Self {
        Self {
            indicators: IndicatorStore::new(backend.clone()),
            reports: ReportStore::new(backend.clone()),
            decisions: DecisionStore::new(backend),
        }
    }

    pub fn indicators(&self) -> &IndicatorStore<B> {
        &self.indicators
    }

    pub fn reports(&self) -> &ReportStore<B> {
        &self.reports
    }

    /// Process one completed decision. Non-eligible decision types are a
    /// no-op with an empty outcome.
    pub async fn process_decision(
        &self,
        decision: &Decision,
        context: &ThreatContext,
    ) -> Result<ProcessOutcome, PipelineError> {
        if !matches!(decision.decision_type, DecisionType::Confirm)
            && context.suspicious_patterns.is_empty()
        {
            return Ok(ProcessOutcome {
                indicators: Vec::new(),
                patterns: PatternAnalysis::empty(),
                report: None,
                alert_required: false,
            });
        }

        // Novelty is checked before the upsert records the technique
        let mut novel_technique = context.novel_technique;
        for technique in &context.manipulation_techniques {
            if self.indicators.is_novel_technique(technique).await? {
                novel_technique = true;
            }
        }

        let extracted = extract_indicators(decision, context)?;
        let mut stored = Vec::with_capacity(extracted.len());
        for indicator in &extracted {
            stored.push(self.indicators.upsert(indicator).await?);
        }

        let patterns = self.analyze_recent_patterns().await?;

        let report = if should_generate_report(decision, &patterns, novel_technique) {
            let report = build_report(
                decision,
                stored.clone(),
                &patterns,
                &context.manipulation_techniques,
                novel_technique,
                context.ai_confidence,
            );
            self.reports.put(&report).await?;
            tracing::warn!(
                report_id = %report.report_id,
                threat_type = report.threat_type.as_str(),
                severity = %report.severity,
                "threat report generated"
            );
            Some(report)
        } else {
            None
        };

        let alert_required = report
            .as_ref()
            .is_some_and(|r| r.severity >= hlekkr_core::Severity::High);

        tracing::info!(
            media_id = %context.media_id,
            indicators = stored.len(),
            pattern_score = patterns.pattern_score,
            report = report.is_some(),
            "threat intelligence processed"
        );

        Ok(ProcessOutcome {
            indicators: stored,
            patterns,
            report,
            alert_required,
        })
    }

    /// Pattern analysis over the last 24 hours of decisions. Techniques
    /// come from `technique-*` tags; domains from the malicious-domain
    /// indicators already associated with each decision's media.
    async fn analyze_recent_patterns(&self) -> Result<PatternAnalysis, PipelineError> {
        let until = Utc::now();
        let since = until - Duration::hours(PATTERN_WINDOW_HOURS);
        let recent = self
            .decisions
            .recent(since, until, PATTERN_QUERY_LIMIT)
            .await?;

        let domain_indicators = self
            .indicators
            .by_type(crate::indicator::IndicatorType::MaliciousDomain)
            .await?;

        Ok(analyze_patterns(
            &recent,
            |decision| {
                decision
                    .tags
                    .iter()
                    .filter_map(|t| t.strip_prefix("technique-"))
                    .map(str::to_string)
                    .collect()
            },
            |decision| {
                domain_indicators
                    .iter()
                    .find(|i| i.associated_media_ids.contains(&decision.media_id))
                    .map(|i| i.value.clone())
            },
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hlekkr_core::Severity;
    use hlekkr_persist::MemoryBackend;
    use hlekkr_review::ConfidenceLevel;
    use uuid::Uuid;

    fn decision(confidence: ConfidenceLevel) -> Decision {
        Decision {
            decision_id: Uuid::new_v4().to_string(),
            review_id: "r1".to_string(),
            media_id: "m1".to_string(),
            moderator_id: "mod-1".to_string(),
            decision_type: DecisionType::Confirm,
            confidence_level: confidence,
            justification: "confirmed deepfake with clear artifacts".to_string(),
            trust_score_adjustment: Some(5.0),
            threat_level: None,
            tags: vec!["technique-face_swap".to_string()],
            additional_evidence: Vec::new(),
            completed_at: Utc::now(),
        }
    }

    fn context() -> ThreatContext {
        ThreatContext {
            media_id: "m1".to_string(),
            content_hash: Some("deadbeef".to_string()),
            source_domain: Some("fakenews.com".to_string()),
            manipulation_techniques: vec![
                "face_swap".to_string(),
                "voice_cloning".to_string(),
            ],
            suspicious_patterns: Vec::new(),
            file_signature: Some("ffd8".to_string()),
            novel_technique: false,
            ai_confidence: 0.92,
        }
    }

    fn processor() -> ThreatIntelProcessor<MemoryBackend> {
        ThreatIntelProcessor::new(Arc::new(MemoryBackend::new()))
    }

    #[tokio::test]
    async fn test_confirm_high_confidence_generates_report() {
        let processor = processor();
        let outcome = processor
            .process_decision(&decision(ConfidenceLevel::VeryHigh), &context())
            .await
            .unwrap();

        // hash + domain + 2 techniques + signature
        assert!(outcome.indicators.len() >= 4);
        let report = outcome.report.expect("report expected");
        assert_eq!(report.severity, Severity::High);
        assert!(outcome.alert_required);

        // Report persisted
        assert!(processor
            .reports()
            .get(&report.report_id)
            .await
            .unwrap()
            .is_some());
    }

    #[tokio::test]
    async fn test_non_confirm_is_noop() {
        let processor = processor();
        let mut d = decision(ConfidenceLevel::VeryHigh);
        d.decision_type = DecisionType::Inconclusive;
        let outcome = processor.process_decision(&d, &context()).await.unwrap();
        assert!(outcome.indicators.is_empty());
        assert!(outcome.report.is_none());
    }

    #[tokio::test]
    async fn test_repeat_decision_dedupes_indicators() {
        let processor = processor();
        processor
            .process_decision(&decision(ConfidenceLevel::VeryHigh), &context())
            .await
            .unwrap();

        let mut second_context = context();
        second_context.media_id = "m2".to_string();
        let outcome = processor
            .process_decision(&decision(ConfidenceLevel::VeryHigh), &second_context)
            .await
            .unwrap();

        let domain = outcome
            .indicators
            .iter()
            .find(|i| i.value == "fakenews.com")
            .unwrap();
        assert_eq!(domain.occurrence_count, 2);
        assert!(domain.associated_media_ids.contains(&"m2".to_string()));
    }

    #[tokio::test]
    async fn test_novel_technique_forces_report_at_medium_confidence() {
        let processor = processor();
        // Medium confidence alone would not generate a report
        let outcome = processor
            .process_decision(&decision(ConfidenceLevel::Medium), &context())
            .await
            .unwrap();
        // face_swap is unseen, so novelty triggers the report anyway
        assert!(outcome.report.is_some());
    }
}
