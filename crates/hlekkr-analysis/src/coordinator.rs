//! Deepfake ensemble coordination
//!
//! Fans one media item out to the selected models, normalizes every
//! response, fuses the results, and folds the classifier's verdict into the
//! detection result. A failed model never drops out of the ensemble; it is
//! synthesized as a neutral member so consensus math keeps its shape.

use base64::Engine;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Instant;

use hlekkr_core::{MediaItem, MediaKind, PipelineError};
use hlekkr_model::{parse_model_response, ModelInvoker, ModelRequest, NormalizedAnalysis};
use hlekkr_persist::ObjectStore;

use crate::classifier::{ClassificationOutcome, TechniqueClassifier};
use crate::ensemble::{
    self, consensus_metrics, ensemble_confidence, AnalysisDepth, ConsensusMetrics, ModelPlan,
    ModelPriority, ModelResult,
};
use crate::video::{aggregate_frames, FrameAnalysis, FrameExtractor, MAX_FRAMES};

/// Largest inline payload window read from the object store
const MAX_INLINE_BYTES: u64 = 8 * 1024 * 1024;

const ANALYSIS_PROMPT: &str = "Analyze this media for manipulation. Respond with JSON: \
{\"confidence\": 0..1, \"techniques\": [..], \"certainty\": \"very_low|low|medium|high|very_high\", \
\"details\": \"..\", \"key_indicators\": [..], \"indicator_confidences\": {..}}";

/// Model ids the coordinator selects between.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelRoster {
    pub detailed: String,
    pub fast: String,
    pub supplementary: String,
}

impl Default for ModelRoster {
    fn default() -> Self {
        Self {
            detailed: "detail-v2".to_string(),
            fast: "fast-v1".to_string(),
            supplementary: "supp-v1".to_string(),
        }
    }
}

/// Final output of deepfake analysis for one media item.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectionResult {
    pub media_id: String,
    /// 0..1, or -1.0 when analysis failed entirely
    pub deepfake_confidence: f64,
    pub detected_techniques: Vec<String>,
    pub model_results: Vec<ModelResult>,
    pub consensus: ConsensusMetrics,
    pub classification: Option<ClassificationOutcome>,
    /// Seconds
    pub processing_time: f64,
}

impl DetectionResult {
    /// Sentinel result recorded when analysis could not run at all.
    pub fn error_result(media_id: &str) -> Self {
        Self {
            media_id: media_id.to_string(),
            deepfake_confidence: -1.0,
            detected_techniques: Vec::new(),
            model_results: Vec::new(),
            consensus: ConsensusMetrics::empty(),
            classification: None,
            processing_time: 0.0,
        }
    }
}

/// The ensemble coordinator.
#[derive(Debug)]
pub struct DeepfakeAnalyzer {
    invoker: Arc<dyn ModelInvoker>,
    objects: Arc<dyn ObjectStore>,
    frames: Arc<dyn FrameExtractor>,
    classifier: TechniqueClassifier,
    roster: ModelRoster,
    /// Backpressure flag: shed the supplementary tier when set
    degrade: std::sync::atomic::AtomicBool,
}

impl DeepfakeAnalyzer {
    pub fn new(
        invoker: Arc<dyn ModelInvoker>,
        objects: Arc<dyn ObjectStore>,
        frames: Arc<dyn FrameExtractor>,
        roster: ModelRoster,
    ) -> Self {
        Self {
            invoker,
            objects,
            frames,
            classifier: TechniqueClassifier::new(),
            roster,
            degrade: std::sync::atomic::AtomicBool::new(false),
        }
    }

    /// Toggle backpressure degradation (drops the supplementary model).
    pub fn set_degraded(&self, degraded: bool) {
        self.degrade
            .store(degraded, std::sync::atomic::Ordering::Relaxed);
    }

    /// Analyze one media item end to end.
    pub async fn analyze(&self, media: &MediaItem) -> Result<DetectionResult, PipelineError> {
        let started = Instant::now();
        let head = self
            .objects
            .head(&media.location.bucket, &media.location.key)
            .await
            .map_err(PipelineError::from)?;

        let result = match media.kind {
            MediaKind::Video => self.analyze_video(media, started).await?,
            _ => {
                self.analyze_inline(media, head.size, head.content_type.as_deref(), started)
                    .await?
            }
        };

        tracing::info!(
            media_id = %media.media_id,
            confidence = result.deepfake_confidence,
            models = result.model_results.len(),
            agreement = result.consensus.agreement.as_str(),
            "deepfake analysis completed"
        );
        Ok(result)
    }

    /// Image/audio path: one ensemble over the inline payload.
    async fn analyze_inline(
        &self,
        media: &MediaItem,
        size: u64,
        content_type: Option<&str>,
        started: Instant,
    ) -> Result<DetectionResult, PipelineError> {
        let window = size.min(MAX_INLINE_BYTES);
        let bytes = self
            .objects
            .get_range(&media.location.bucket, &media.location.key, 0..window)
            .await
            .map_err(PipelineError::from)?;
        let payload = base64::engine::general_purpose::STANDARD.encode(bytes);
        let content_type = content_type.unwrap_or("application/octet-stream").to_string();

        let degraded = self.degrade.load(std::sync::atomic::Ordering::Relaxed);
        let plans = ensemble::select_models(
            size,
            0.0,
            &self.roster.detailed,
            &self.roster.fast,
            &self.roster.supplementary,
            degraded,
        );

        let mut model_results = Vec::with_capacity(plans.len());
        let mut normalized_payloads = Vec::with_capacity(plans.len());
        for plan in &plans {
            let (result, normalized) = self
                .invoke_plan(media, plan, &payload, &content_type)
                .await;
            model_results.push(result);
            normalized_payloads.push(normalized);
        }

        Ok(self.fuse(media, model_results, normalized_payloads, started))
    }

    /// Run one planned model invocation; errors become neutral members.
    async fn invoke_plan(
        &self,
        media: &MediaItem,
        plan: &ModelPlan,
        payload: &str,
        content_type: &str,
    ) -> (ModelResult, Option<NormalizedAnalysis>) {
        let request = ModelRequest::new(
            &media.media_id,
            &plan.model_id,
            payload,
            content_type,
            ANALYSIS_PROMPT,
        )
        .with_max_tokens(plan.max_tokens);

        let call_started = Instant::now();
        match self.invoker.invoke(request).await {
            Ok(response) => {
                let normalized = parse_model_response(&response.content());
                let result = ModelResult {
                    model_id: plan.model_id.clone(),
                    priority: plan.priority,
                    confidence: normalized.confidence,
                    techniques: normalized.techniques.clone(),
                    certainty: normalized.certainty,
                    analysis_depth: depth_for(plan),
                    processing_time: call_started.elapsed().as_secs_f64(),
                    error: None,
                };
                (result, Some(normalized))
            }
            Err(e) => {
                tracing::warn!(
                    media_id = %media.media_id,
                    model_id = %plan.model_id,
                    error = %e,
                    "model invocation failed, synthesizing neutral result"
                );
                let result = ModelResult {
                    model_id: plan.model_id.clone(),
                    priority: plan.priority,
                    confidence: 0.5,
                    techniques: Vec::new(),
                    certainty: hlekkr_model::Certainty::Low,
                    analysis_depth: AnalysisDepth::Failed,
                    processing_time: call_started.elapsed().as_secs_f64(),
                    error: Some(e.to_string()),
                };
                (result, None)
            }
        }
    }

    /// Video path: sample frames, analyze each with the fast model,
    /// aggregate, and treat the aggregate as a single-model ensemble.
    async fn analyze_video(
        &self,
        media: &MediaItem,
        started: Instant,
    ) -> Result<DetectionResult, PipelineError> {
        let frames = self
            .frames
            .extract_frames(&media.location, MAX_FRAMES)
            .await?;
        if frames.is_empty() {
            return Ok(DetectionResult::error_result(&media.media_id));
        }

        let mut analyses = Vec::with_capacity(frames.len());
        let mut normalized_payloads = Vec::new();
        for frame in &frames {
            let request = ModelRequest::new(
                &media.media_id,
                &self.roster.fast,
                &frame.payload_base64,
                &frame.content_type,
                ANALYSIS_PROMPT,
            );
            match self.invoker.invoke(request).await {
                Ok(response) => {
                    let normalized = parse_model_response(&response.content());
                    analyses.push(FrameAnalysis {
                        frame_number: frame.frame_number,
                        timestamp: frame.timestamp,
                        confidence: normalized.confidence,
                        techniques: normalized.techniques.clone(),
                        error: None,
                    });
                    normalized_payloads.push(Some(normalized));
                }
                Err(e) => {
                    analyses.push(FrameAnalysis {
                        frame_number: frame.frame_number,
                        timestamp: frame.timestamp,
                        confidence: 0.5,
                        techniques: Vec::new(),
                        error: Some(e.to_string()),
                    });
                    normalized_payloads.push(None);
                }
            }
        }

        let aggregation = aggregate_frames(analyses);
        let model_results = vec![ModelResult {
            model_id: self.roster.fast.clone(),
            priority: ModelPriority::Standard,
            confidence: aggregation.confidence,
            techniques: aggregation.techniques.clone(),
            certainty: hlekkr_model::Certainty::Medium,
            analysis_depth: AnalysisDepth::Standard,
            processing_time: started.elapsed().as_secs_f64(),
            error: if aggregation.valid_frames == 0 {
                Some("no valid frame analyses".to_string())
            } else {
                None
            },
        }];

        Ok(self.fuse(media, model_results, normalized_payloads, started))
    }

    /// Fuse model results into the final detection verdict.
    fn fuse(
        &self,
        media: &MediaItem,
        model_results: Vec<ModelResult>,
        normalized_payloads: Vec<Option<NormalizedAnalysis>>,
        started: Instant,
    ) -> DetectionResult {
        let confidence = ensemble_confidence(&model_results);
        let consensus = consensus_metrics(&model_results);

        let mut detected_techniques: Vec<String> = Vec::new();
        for result in &model_results {
            for technique in &result.techniques {
                if !detected_techniques.contains(technique) {
                    detected_techniques.push(technique.clone());
                }
            }
        }

        // Classification runs over the union of reported indicators with
        // their highest reported confidence; technique names double as
        // indicators where models report no separate indicator list.
        let mut indicators: BTreeSet<String> = BTreeSet::new();
        let mut indicator_confidences: HashMap<String, f64> = HashMap::new();
        for normalized in normalized_payloads.into_iter().flatten() {
            for indicator in normalized
                .key_indicators
                .iter()
                .chain(normalized.techniques.iter())
            {
                indicators.insert(indicator.clone());
                let confidence = normalized
                    .indicator_confidences
                    .get(indicator)
                    .copied()
                    .unwrap_or(normalized.confidence);
                let entry = indicator_confidences
                    .entry(indicator.clone())
                    .or_insert(confidence);
                *entry = entry.max(confidence);
            }
        }

        let classification = if indicators.is_empty() {
            None
        } else {
            Some(self.classifier.classify(&indicators, &indicator_confidences))
        };

        DetectionResult {
            media_id: media.media_id.clone(),
            deepfake_confidence: confidence,
            detected_techniques,
            model_results,
            consensus,
            classification,
            processing_time: started.elapsed().as_secs_f64(),
        }
    }
}

fn depth_for(plan: &ModelPlan) -> AnalysisDepth {
    match plan.priority {
        ModelPriority::High => AnalysisDepth::Detailed,
        ModelPriority::Standard => AnalysisDepth::Standard,
        ModelPriority::Supplementary => AnalysisDepth::Supplementary,
        ModelPriority::Fallback => AnalysisDepth::Basic,
    }
}
