//! The trust score engine

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use hlekkr_core::PipelineError;
use hlekkr_persist::DocumentBackend;

use crate::components::{
    deepfake_score, historical_pattern_score, metadata_consistency_score,
    source_reliability_score, technical_integrity_score, AnalysisBundle,
};
use crate::composite::composite_score;
use crate::storage::ScoreStore;
use crate::types::{
    ScoreBreakdown, ScoreConfidence, ScoreRange, TrustFactor, TrustScoreVersion,
};

/// Human review outcome folded into a recalculation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HumanDecisionInput {
    pub review_id: String,
    pub decision_type: String,
    /// Replaces the deepfake component, 0..100
    pub trust_score_adjustment: Option<f64>,
    pub confidence_level: String,
}

/// The engine: computes composites and persists versions.
#[derive(Debug)]
pub struct TrustScoreEngine<B: DocumentBackend + ?Sized> {
    store: ScoreStore<B>,
}

impl<B: DocumentBackend + ?Sized> TrustScoreEngine<B> {
    pub fn new(backend: Arc<B>) -> Self {
        Self {
            store: ScoreStore::new(backend),
        }
    }

    pub fn store(&self) -> &ScoreStore<B> {
        &self.store
    }

    /// Compute a version from the bundle without persisting it.
    pub fn compute(&self, bundle: &AnalysisBundle) -> TrustScoreVersion {
        let breakdown = ScoreBreakdown {
            deepfake: deepfake_score(bundle),
            source_reliability: source_reliability_score(bundle),
            metadata_consistency: metadata_consistency_score(bundle),
            technical_integrity: technical_integrity_score(bundle),
            historical_pattern: historical_pattern_score(bundle),
        };
        let composite = composite_score(&breakdown);
        self.assemble(bundle, breakdown, composite, Vec::new())
    }

    /// Compute and persist, returning the stored version.
    pub async fn calculate(
        &self,
        bundle: &AnalysisBundle,
    ) -> Result<TrustScoreVersion, PipelineError> {
        let version = self.compute(bundle);
        self.store.put_version(&version).await?;
        tracing::info!(
            media_id = %version.media_id,
            score = version.composite_score,
            range = version.score_range.as_str(),
            version = %version.version,
            "trust score calculated"
        );
        Ok(version)
    }

    /// Recalculate with a completed human decision: the deepfake component
    /// is replaced by the human adjustment and the final composite blends
    /// 60/40 toward the human classification over the machine composite.
    pub async fn recalculate_with_human(
        &self,
        bundle: &AnalysisBundle,
        human: &HumanDecisionInput,
    ) -> Result<TrustScoreVersion, PipelineError> {
        let machine = self.compute(bundle);

        let mut breakdown = machine.breakdown.clone();
        let blended = match human.trust_score_adjustment {
            Some(adjustment) => {
                if !(0.0..=100.0).contains(&adjustment) {
                    return Err(PipelineError::input_invalid(
                        "trust score adjustment must be within 0..100",
                    ));
                }
                breakdown.deepfake = adjustment;
                adjustment * 0.6 + machine.composite_score * 0.4
            }
            None => machine.composite_score,
        };

        let factors = vec![TrustFactor {
            component: "human_review".to_string(),
            impact: format!(
                "{} decision from review {}",
                human.decision_type, human.review_id
            ),
            weight: "high".to_string(),
        }];

        let version = self.assemble(bundle, breakdown, blended, factors);
        self.store.put_version(&version).await?;
        tracing::info!(
            media_id = %version.media_id,
            score = version.composite_score,
            review_id = %human.review_id,
            "trust score recalculated with human decision"
        );
        Ok(version)
    }

    fn assemble(
        &self,
        bundle: &AnalysisBundle,
        breakdown: ScoreBreakdown,
        composite: f64,
        extra_factors: Vec<TrustFactor>,
    ) -> TrustScoreVersion {
        let now = Utc::now();
        let composite = composite.clamp(0.0, 100.0);
        let mut factors = extra_factors;
        factors.extend(build_factors(bundle));

        TrustScoreVersion {
            media_id: bundle.media_id.clone(),
            version: Uuid::new_v4(),
            calculation_timestamp: now,
            calculation_date: now.format("%Y-%m-%d").to_string(),
            composite_score: composite,
            confidence: confidence_level(bundle),
            score_range: ScoreRange::from_score(composite),
            breakdown,
            factors,
            recommendations: build_recommendations(composite, bundle),
            is_latest: true,
        }
    }
}

/// Confidence tracks data completeness across the three primary inputs.
fn confidence_level(bundle: &AnalysisBundle) -> ScoreConfidence {
    let completeness = [
        bundle.metadata.is_some(),
        bundle.detection.is_some(),
        bundle.source.is_some(),
    ]
    .iter()
    .filter(|present| **present)
    .count();

    match completeness {
        3 => ScoreConfidence::High,
        2 => ScoreConfidence::Medium,
        _ => ScoreConfidence::Low,
    }
}

fn build_factors(bundle: &AnalysisBundle) -> Vec<TrustFactor> {
    let mut factors = Vec::new();

    if let Some(detection) = &bundle.detection {
        factors.push(TrustFactor {
            component: "deepfake_detection".to_string(),
            impact: if detection.deepfake_confidence > 0.5 {
                format!(
                    "negative: deepfake confidence {:.2}",
                    detection.deepfake_confidence
                )
            } else {
                format!(
                    "positive: deepfake confidence {:.2}",
                    detection.deepfake_confidence
                )
            },
            weight: "high".to_string(),
        });
    }

    if let Some(source) = &bundle.source {
        let impact = match source.status {
            hlekkr_verify::VerificationStatus::Verified => "positive",
            hlekkr_verify::VerificationStatus::Suspicious
            | hlekkr_verify::VerificationStatus::LikelyFake => "negative",
            _ => "neutral",
        };
        factors.push(TrustFactor {
            component: "source_verification".to_string(),
            impact: format!("{impact}: {}", source.status),
            weight: "high".to_string(),
        });
    }

    factors
}

fn build_recommendations(composite: f64, bundle: &AnalysisBundle) -> Vec<String> {
    let mut recommendations = Vec::new();

    if composite < 30.0 {
        recommendations
            .push("High risk content - recommend manual review before publication".to_string());
        recommendations
            .push("Consider additional verification from independent sources".to_string());
    } else if composite < 60.0 {
        recommendations
            .push("Medium risk content - verify source and context before use".to_string());
        recommendations.push("Consider cross-referencing with other media sources".to_string());
    } else if composite < 80.0 {
        recommendations.push("Generally trustworthy content with minor concerns".to_string());
        recommendations.push("Standard verification procedures recommended".to_string());
    } else {
        recommendations.push("High trust content suitable for publication".to_string());
        recommendations.push("Minimal additional verification required".to_string());
    }

    if let Some(detection) = &bundle.detection {
        if detection.deepfake_confidence > 0.7 {
            recommendations.push(
                "Strong deepfake indicators detected - expert review recommended".to_string(),
            );
        }
    }

    recommendations
}

#[cfg(test)]
mod tests {
    use super::*;
    use hlekkr_analysis::{ConsensusMetrics, DetectionResult};
    use hlekkr_core::{MediaKind, ObjectLocation};
    use hlekkr_extract::{ExtractedMetadata, TechnicalMetadata};
    use hlekkr_persist::MemoryBackend;
    use hlekkr_verify::{SourceVerification, VerificationStatus};
    use std::collections::HashMap;

    fn full_bundle() -> AnalysisBundle {
        AnalysisBundle {
            media_id: "m1".to_string(),
            detection: Some(DetectionResult {
                media_id: "m1".to_string(),
                deepfake_confidence: 0.3,
                detected_techniques: Vec::new(),
                model_results: Vec::new(),
                consensus: ConsensusMetrics::empty(),
                classification: None,
                processing_time: 2.0,
            }),
            source: Some(SourceVerification {
                media_id: "m1".to_string(),
                url: Some("https://www.reuters.com/a".to_string()),
                domain: Some("reuters.com".to_string()),
                status: VerificationStatus::Verified,
                reputation_score: 85.0,
                confidence: 0.8,
                methods: Vec::new(),
                external_sources: Vec::new(),
                discrepancies: Vec::new(),
                component_scores: HashMap::new(),
            }),
            metadata: Some(ExtractedMetadata {
                media_id: "m1".to_string(),
                location: ObjectLocation::new("media", "uploads/a.png"),
                filename: "a.png".to_string(),
                media_type: MediaKind::Image,
                file_size: 2048,
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
            }),
            custody: None,
            audit_events: Vec::new(),
        }
    }

    fn engine() -> TrustScoreEngine<MemoryBackend> {
        TrustScoreEngine::new(Arc::new(MemoryBackend::new()))
    }

    #[test]
    fn test_verified_source_scores_high_with_high_confidence() {
        let version = engine().compute(&full_bundle());
        assert!(
            version.composite_score > 70.0,
            "score = {}",
            version.composite_score
        );
        assert_eq!(version.confidence, ScoreConfidence::High);
    }

    #[test]
    fn test_composite_always_bounded() {
        let empty = engine().compute(&AnalysisBundle {
            media_id: "m1".to_string(),
            ..Default::default()
        });
        assert!((0.0..=100.0).contains(&empty.composite_score));

        let mut hostile = full_bundle();
        hostile.detection.as_mut().unwrap().deepfake_confidence = 1.0;
        hostile.source.as_mut().unwrap().status = VerificationStatus::LikelyFake;
        hostile.source.as_mut().unwrap().reputation_score = 0.0;
        let version = engine().compute(&hostile);
        assert!((0.0..=100.0).contains(&version.composite_score));
    }

    #[tokio::test]
    async fn test_calculate_persists_latest() {
        let engine = engine();
        let first = engine.calculate(&full_bundle()).await.unwrap();
        let second = engine.calculate(&full_bundle()).await.unwrap();
        assert_ne!(first.version, second.version);

        let latest = engine.store().latest("m1").await.unwrap().unwrap();
        assert_eq!(latest.version, second.version);
        let all = engine.store().versions("m1").await.unwrap();
        assert_eq!(all.iter().filter(|v| v.is_latest).count(), 1);
    }

    #[tokio::test]
    async fn test_human_recalculation_blends() {
        let engine = engine();
        let machine = engine.calculate(&full_bundle()).await.unwrap();

        let human = HumanDecisionInput {
            review_id: "r1".to_string(),
            decision_type: "override".to_string(),
            trust_score_adjustment: Some(10.0),
            confidence_level: "high".to_string(),
        };
        let rescored = engine
            .recalculate_with_human(&full_bundle(), &human)
            .await
            .unwrap();

        // The low human adjustment drags the score well below the machine one
        assert!(rescored.composite_score < machine.composite_score);
        assert_eq!(rescored.breakdown.deepfake, 10.0);
        assert!(rescored
            .factors
            .iter()
            .any(|f| f.component == "human_review"));
    }

    #[tokio::test]
    async fn test_human_adjustment_out_of_range_rejected() {
        let engine = engine();
        let human = HumanDecisionInput {
            review_id: "r1".to_string(),
            decision_type: "override".to_string(),
            trust_score_adjustment: Some(150.0),
            confidence_level: "high".to_string(),
        };
        let result = engine
            .recalculate_with_human(&full_bundle(), &human)
            .await;
        assert!(matches!(result, Err(PipelineError::InputInvalid(_))));
    }

    #[test]
    fn test_recommendations_track_score() {
        let engine = engine();
        let version = engine.compute(&full_bundle());
        assert!(version
            .recommendations
            .iter()
            .any(|r| r.contains("trust") || r.contains("trustworthy")));

        let mut hostile = full_bundle();
        hostile.detection.as_mut().unwrap().deepfake_confidence = 0.9;
        hostile.source.as_mut().unwrap().status = VerificationStatus::LikelyFake;
        let low = engine.compute(&hostile);
        assert!(low
            .recommendations
            .iter()
            .any(|r| r.contains("expert review")));
    }
}
