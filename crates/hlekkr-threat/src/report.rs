//! Threat reports

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use hlekkr_core::{PipelineError, Severity};
use hlekkr_persist::{retention, sort_key_ts, DocumentBackend, DocumentExt};
use hlekkr_review::{Decision, DecisionType};

use crate::indicator::ThreatIndicator;
use crate::patterns::PatternAnalysis;

/// Threat categories a report can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThreatType {
    DeepfakeConfirmed,
    CoordinatedCampaign,
    SourceManipulation,
    MetadataSpoofing,
    EvasionTechnique,
    NovelManipulation,
    MassDistribution,
    TargetedAttack,
}

impl ThreatType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DeepfakeConfirmed => "deepfake_confirmed",
            Self::CoordinatedCampaign => "coordinated_campaign",
            Self::SourceManipulation => "source_manipulation",
            Self::MetadataSpoofing => "metadata_spoofing",
            Self::EvasionTechnique => "evasion_technique",
            Self::NovelManipulation => "novel_manipulation",
            Self::MassDistribution => "mass_distribution",
            Self::TargetedAttack => "targeted_attack",
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            Self::DeepfakeConfirmed => "Confirmed Deepfake Content",
            Self::CoordinatedCampaign => "Coordinated Deepfake Campaign",
            Self::SourceManipulation => "Source Manipulation Attack",
            Self::MetadataSpoofing => "Metadata Spoofing Detected",
            Self::EvasionTechnique => "AI Evasion Technique",
            Self::NovelManipulation => "Novel Manipulation Technique",
            Self::MassDistribution => "Mass Distribution Campaign",
            Self::TargetedAttack => "Targeted Deepfake Attack",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThreatStatus {
    Active,
    Mitigated,
    Archived,
    FalsePositive,
}

/// A full threat report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThreatReport {
    pub report_id: String,
    pub threat_type: ThreatType,
    pub severity: Severity,
    pub status: ThreatStatus,
    pub title: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
    pub indicators: Vec<ThreatIndicator>,
    pub affected_media_count: usize,
    pub confirmed_by_humans: u32,
    pub ai_confidence: f64,
    pub mitigation_recommendations: Vec<String>,
    pub tags: Vec<String>,
}

/// Whether a decision warrants a threat report.
pub fn should_generate_report(
    decision: &Decision,
    patterns: &PatternAnalysis,
    novel_technique: bool,
) -> bool {
    let confidence = decision.confidence_level.score();
    if decision.decision_type == DecisionType::Confirm && confidence >= 0.8 {
        return true;
    }
    if patterns.pattern_score >= 0.7 {
        return true;
    }
    if novel_technique {
        return true;
    }
    patterns.likely_campaign
}

/// Classify the threat type and severity from the decision and patterns.
pub fn classify_threat(
    decision: &Decision,
    patterns: &PatternAnalysis,
) -> (ThreatType, Severity) {
    let confidence = decision.confidence_level.score();
    if decision.decision_type == DecisionType::Confirm {
        if patterns.pattern_score >= 0.8 {
            return (ThreatType::CoordinatedCampaign, Severity::Critical);
        }
        if confidence >= 0.9 {
            return (ThreatType::DeepfakeConfirmed, Severity::High);
        }
    }
    (ThreatType::DeepfakeConfirmed, Severity::Medium)
}

/// Fixed mitigation taxonomy plus campaign- and novelty-specific additions.
pub fn mitigation_recommendations(
    threat_type: ThreatType,
    novel_technique: bool,
) -> Vec<String> {
    let mut recommendations = vec![
        "Monitor for similar content patterns".to_string(),
        "Update detection algorithms with new indicators".to_string(),
        "Increase scrutiny of related sources".to_string(),
    ];
    if threat_type == ThreatType::CoordinatedCampaign {
        recommendations.extend([
            "Investigate coordinated distribution networks".to_string(),
            "Share intelligence with partner organizations".to_string(),
            "Implement enhanced monitoring for campaign indicators".to_string(),
        ]);
    }
    if novel_technique {
        recommendations.extend([
            "Update AI models with novel technique signatures".to_string(),
            "Conduct technical analysis of new manipulation methods".to_string(),
            "Share findings with research community".to_string(),
        ]);
    }
    recommendations
}

/// Tags for report categorization.
pub fn report_tags(
    decision: &Decision,
    patterns: &PatternAnalysis,
    techniques: &[String],
    novel_technique: bool,
) -> Vec<String> {
    let mut tags = vec!["human-confirmed".to_string()];
    tags.push(format!("decision-{}", decision.decision_type.as_str()));
    for technique in techniques {
        tags.push(format!(
            "technique-{}",
            technique.to_lowercase().replace(' ', "-")
        ));
    }
    if novel_technique {
        tags.push("novel-technique".to_string());
    }
    if patterns.pattern_score > 0.7 {
        tags.push("coordinated-campaign".to_string());
    }
    tags
}

/// Build the report description.
pub fn report_description(
    decision: &Decision,
    patterns: &PatternAnalysis,
    indicators: &[ThreatIndicator],
    techniques: &[String],
) -> String {
    let mut description = format!(
        "Human moderator issued a {} decision with {:.0}% confidence. ",
        decision.decision_type.as_str(),
        decision.confidence_level.score() * 100.0
    );
    if !techniques.is_empty() {
        description.push_str(&format!(
            "Manipulation techniques identified: {}. ",
            techniques.join(", ")
        ));
    }
    if indicators.len() > 1 {
        description.push_str(&format!(
            "Analysis extracted {} threat indicators. ",
            indicators.len()
        ));
    }
    if patterns.pattern_score > 0.5 {
        description.push_str(&format!(
            "Pattern analysis indicates potential coordinated activity (score: {:.2}). ",
            patterns.pattern_score
        ));
    }
    description
}

/// Report store: a queryable summary row plus the full JSON object.
#[derive(Debug)]
pub struct ReportStore<B: DocumentBackend + ?Sized> {
    backend: Arc<B>,
}

/// Summary row for type/date queries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportSummary {
    pub report_id: String,
    pub threat_type: ThreatType,
    pub severity: Severity,
    pub status: ThreatStatus,
    pub created_at: DateTime<Utc>,
    pub affected_media_count: usize,
}

impl<B: DocumentBackend + ?Sized> ReportStore<B> {
    pub fn new(backend: Arc<B>) -> Self {
        Self { backend }
    }

    fn report_key(report_id: &str) -> String {
        format!("threat_report:{report_id}")
    }

    fn type_index_key(report: &ThreatReport) -> String {
        format!(
            "threat_report~type:{}:{}:{}",
            report.threat_type.as_str(),
            sort_key_ts(report.created_at),
            report.report_id
        )
    }

    pub async fn put(&self, report: &ThreatReport) -> Result<(), PipelineError> {
        let expires_at = report.created_at + Duration::days(retention::THREAT_REPORT_DAYS);
        self.backend
            .put_with_ttl(&Self::report_key(&report.report_id), report, expires_at)
            .await
            .map_err(PipelineError::from)?;
        let summary = ReportSummary {
            report_id: report.report_id.clone(),
            threat_type: report.threat_type,
            severity: report.severity,
            status: report.status,
            created_at: report.created_at,
            affected_media_count: report.affected_media_count,
        };
        self.backend
            .put_with_ttl(&Self::type_index_key(report), &summary, expires_at)
            .await
            .map_err(PipelineError::from)
    }

    pub async fn get(&self, report_id: &str) -> Result<Option<ThreatReport>, PipelineError> {
        self.backend
            .get(&Self::report_key(report_id))
            .await
            .map_err(PipelineError::from)
    }

    /// Report summaries of one type inside a time window.
    pub async fn by_type(
        &self,
        threat_type: ThreatType,
        since: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Result<Vec<ReportSummary>, PipelineError> {
        let prefix = format!("threat_report~type:{}:", threat_type.as_str());
        let lower = format!("{prefix}{}", sort_key_ts(since));
        let upper = format!("{prefix}{}", sort_key_ts(until));
        let keys = self
            .backend
            .list_keys(&prefix)
            .await
            .map_err(PipelineError::from)?;
        let mut summaries = Vec::new();
        for key in keys {
            if key.as_str() < lower.as_str() || key.as_str() > upper.as_str() {
                continue;
            }
            if let Some(summary) = self
                .backend
                .get::<ReportSummary>(&key)
                .await
                .map_err(PipelineError::from)?
            {
                summaries.push(summary);
            }
        }
        Ok(summaries)
    }
}

/// Assemble a full report.
pub fn build_report(
    decision: &Decision,
    indicators: Vec<ThreatIndicator>,
    patterns: &PatternAnalysis,
    techniques: &[String],
    novel_technique: bool,
    ai_confidence: f64,
) -> ThreatReport {
    let (threat_type, severity) = classify_threat(decision, patterns);
    let affected: std::collections::BTreeSet<&str> = indicators
        .iter()
        .flat_map(|i| i.associated_media_ids.iter().map(String::as_str))
        .collect();

    ThreatReport {
        report_id: Uuid::new_v4().to_string(),
        threat_type,
        severity,
        status: ThreatStatus::Active,
        title: threat_type.title().to_string(),
        description: report_description(decision, patterns, &indicators, techniques),
        created_at: Utc::now(),
        affected_media_count: affected.len().max(1),
        confirmed_by_humans: 1,
        ai_confidence,
        mitigation_recommendations: mitigation_recommendations(threat_type, novel_technique),
        tags: report_tags(decision, patterns, techniques, novel_technique),
        indicators,
    }
}
