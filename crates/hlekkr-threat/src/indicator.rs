//! Threat indicators

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use hlekkr_core::{content_hash_value, PipelineError};
use hlekkr_persist::{DocumentBackend, DocumentExt};
use hlekkr_review::{Decision, DecisionType};

/// Indicator categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndicatorType {
    ContentHash,
    MaliciousDomain,
    ManipulationTechnique,
    MetadataPattern,
    FileSignature,
}

impl IndicatorType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ContentHash => "content_hash",
            Self::MaliciousDomain => "malicious_domain",
            Self::ManipulationTechnique => "manipulation_technique",
            Self::MetadataPattern => "metadata_pattern",
            Self::FileSignature => "file_signature",
        }
    }

    /// Minimum decision confidence required to emit this indicator type.
    pub fn min_confidence(&self) -> f64 {
        match self {
            Self::ContentHash | Self::MetadataPattern => 0.5,
            Self::ManipulationTechnique => 0.6,
            Self::MaliciousDomain | Self::FileSignature => 0.7,
        }
    }
}

/// One reusable threat artifact.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThreatIndicator {
    pub id: String,
    pub indicator_type: IndicatorType,
    pub value: String,
    pub confidence: f64,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
    pub occurrence_count: u64,
    pub associated_media_ids: Vec<String>,
    pub metadata: serde_json::Value,
}

/// Decision-side evidence the extractor draws from, assembled by the
/// runtime from the review snapshot and stored analysis.
#[derive(Debug, Clone, Default)]
pub struct ThreatContext {
    pub media_id: String,
    pub content_hash: Option<String>,
    pub source_domain: Option<String>,
    pub manipulation_techniques: Vec<String>,
    pub suspicious_patterns: Vec<serde_json::Value>,
    pub file_signature: Option<String>,
    pub novel_technique: bool,
    /// AI confidence from the original analysis
    pub ai_confidence: f64,
}

/// Extract indicators from a completed decision.
///
/// Only `confirm` decisions (and threat-eligible suspicious outcomes the
/// caller pre-filters) yield indicators; domain and file-signature
/// indicators additionally require an outright confirm. Each type applies
/// its own confidence floor.
pub fn extract_indicators(
    decision: &Decision,
    context: &ThreatContext,
) -> Result<Vec<ThreatIndicator>, PipelineError> {
    let confirm = decision.decision_type == DecisionType::Confirm;
    let confidence = decision.confidence_level.score();
    let now = Utc::now();
    let mut indicators = Vec::new();

    let mut push = |indicator_type: IndicatorType,
                    value: String,
                    confidence: f64,
                    metadata: serde_json::Value| {
        if confidence < indicator_type.min_confidence() {
            return;
        }
        indicators.push(ThreatIndicator {
            id: Uuid::new_v4().to_string(),
            indicator_type,
            value,
            confidence,
            first_seen: now,
            last_seen: now,
            occurrence_count: 1,
            associated_media_ids: vec![context.media_id.clone()],
            metadata,
        });
    };

    if let Some(content_hash) = &context.content_hash {
        push(
            IndicatorType::ContentHash,
            content_hash.clone(),
            confidence,
            serde_json::json!({
                "decisionType": decision.decision_type.as_str(),
                "humanConfirmed": true,
                "extractionMethod": "human_review",
            }),
        );
    }

    if confirm {
        if let Some(domain) = &context.source_domain {
            push(
                IndicatorType::MaliciousDomain,
                domain.clone(),
                confidence,
                serde_json::json!({
                    "decisionType": decision.decision_type.as_str(),
                    "threatType": "deepfake_distribution",
                    "humanConfirmed": true,
                }),
            );
        }
    }

    for technique in &context.manipulation_techniques {
        push(
            IndicatorType::ManipulationTechnique,
            technique.clone(),
            confidence,
            serde_json::json!({
                "decisionType": decision.decision_type.as_str(),
                "humanConfirmed": true,
            }),
        );
    }

    for pattern in &context.suspicious_patterns {
        let pattern_hash = content_hash_value(pattern)?;
        push(
            IndicatorType::MetadataPattern,
            pattern_hash[..16].to_string(),
            confidence * 0.8,
            serde_json::json!({
                "patternDetails": pattern,
                "decisionType": decision.decision_type.as_str(),
                "humanConfirmed": true,
            }),
        );
    }

    if confirm {
        if let Some(signature) = &context.file_signature {
            push(
                IndicatorType::FileSignature,
                signature.clone(),
                confidence,
                serde_json::json!({
                    "decisionType": decision.decision_type.as_str(),
                    "humanConfirmed": true,
                }),
            );
        }
    }

    Ok(indicators)
}

/// Indicator store with `(type, value)` dedup.
#[derive(Debug)]
pub struct IndicatorStore<B: DocumentBackend + ?Sized> {
    backend: Arc<B>,
}

impl<B: DocumentBackend + ?Sized> IndicatorStore<B> {
    pub fn new(backend: Arc<B>) -> Self {
        Self { backend }
    }

    fn key(indicator_type: IndicatorType, value: &str) -> String {
        format!("threat_indicator:{}:{value}", indicator_type.as_str())
    }

    /// Upsert: a new `(type, value)` pair is inserted; an existing one is
    /// merged — occurrence count bumped, last-seen refreshed, media ids and
    /// peak confidence merged.
    pub async fn upsert(
        &self,
        indicator: &ThreatIndicator,
    ) -> Result<ThreatIndicator, PipelineError> {
        let key = Self::key(indicator.indicator_type, &indicator.value);
        for _ in 0..3 {
            let existing: Option<ThreatIndicator> =
                self.backend.get(&key).await.map_err(PipelineError::from)?;
            match existing {
                None => {
                    match self.backend.cas(&key, None, indicator).await {
                        Ok(()) => return Ok(indicator.clone()),
                        Err(hlekkr_persist::StorageError::ConditionFailed(_)) => continue,
                        Err(e) => return Err(e.into()),
                    }
                }
                Some(current) => {
                    let mut merged = current.clone();
                    merged.occurrence_count += 1;
                    merged.last_seen = indicator.last_seen;
                    merged.confidence = merged.confidence.max(indicator.confidence);
                    for media_id in &indicator.associated_media_ids {
                        if !merged.associated_media_ids.contains(media_id) {
                            merged.associated_media_ids.push(media_id.clone());
                        }
                    }
                    match self.backend.cas(&key, Some(&current), &merged).await {
                        Ok(()) => return Ok(merged),
                        Err(hlekkr_persist::StorageError::ConditionFailed(_)) => continue,
                        Err(e) => return Err(e.into()),
                    }
                }
            }
        }
        Err(PipelineError::conflict(format!(
            "indicator upsert contention on {key}"
        )))
    }

    pub async fn get(
        &self,
        indicator_type: IndicatorType,
        value: &str,
    ) -> Result<Option<ThreatIndicator>, PipelineError> {
        self.backend
            .get(&Self::key(indicator_type, value))
            .await
            .map_err(PipelineError::from)
    }

    /// All indicators of one type.
    pub async fn by_type(
        &self,
        indicator_type: IndicatorType,
    ) -> Result<Vec<ThreatIndicator>, PipelineError> {
        let prefix = format!("threat_indicator:{}:", indicator_type.as_str());
        let keys = self
            .backend
            .list_keys(&prefix)
            .await
            .map_err(PipelineError::from)?;
        let mut indicators = Vec::with_capacity(keys.len());
        for key in keys {
            if let Some(indicator) = self
                .backend
                .get::<ThreatIndicator>(&key)
                .await
                .map_err(PipelineError::from)?
            {
                indicators.push(indicator);
            }
        }
        Ok(indicators)
    }

    /// Whether a technique has never been seen before (novelty check).
    pub async fn is_novel_technique(&self, technique: &str) -> Result<bool, PipelineError> {
        Ok(self
            .get(IndicatorType::ManipulationTechnique, technique)
            .await?
            .is_none())
    }
}
