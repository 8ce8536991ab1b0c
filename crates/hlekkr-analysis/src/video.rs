//! Video frame sampling and aggregation
//!
//! Frame extraction requires a decoder the core does not ship; it sits
//! behind [`FrameExtractor`] so deployments plug in their own. The built-in
//! [`ByteWindowExtractor`] samples deterministic byte windows for
//! environments without a decoder capability.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use hlekkr_core::{ObjectLocation, PipelineError};
use hlekkr_persist::ObjectStore;

/// Maximum representative frames sampled per video
pub const MAX_FRAMES: usize = 5;

/// One sampled frame ready for model input.
#[derive(Debug, Clone)]
pub struct SampledFrame {
    pub frame_number: usize,
    /// Seconds from stream start
    pub timestamp: f64,
    pub payload_base64: String,
    pub content_type: String,
}

/// Per-frame analysis result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FrameAnalysis {
    pub frame_number: usize,
    pub timestamp: f64,
    pub confidence: f64,
    pub techniques: Vec<String>,
    pub error: Option<String>,
}

/// Aggregated video verdict over all analyzed frames.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FrameAggregation {
    pub confidence: f64,
    pub techniques: Vec<String>,
    pub frame_analyses: Vec<FrameAnalysis>,
    pub valid_frames: usize,
    pub total_frames: usize,
}

/// Capability seam for video frame extraction.
#[async_trait]
pub trait FrameExtractor: Send + Sync + std::fmt::Debug {
    /// Sample up to `max_frames` representative frames, evenly spaced.
    async fn extract_frames(
        &self,
        location: &ObjectLocation,
        max_frames: usize,
    ) -> Result<Vec<SampledFrame>, PipelineError>;
}

/// Deterministic fallback extractor: evenly spaced byte windows over the
/// stored object. Not a decoder; it exists so video analysis degrades
/// gracefully where no decoding capability is deployed.
#[derive(Debug)]
pub struct ByteWindowExtractor<S: ObjectStore + ?Sized> {
    store: std::sync::Arc<S>,
    window_bytes: u64,
}

impl<S: ObjectStore + ?Sized> ByteWindowExtractor<S> {
    pub fn new(store: std::sync::Arc<S>) -> Self {
        Self {
            store,
            window_bytes: 256 * 1024,
        }
    }
}

#[async_trait]
impl<S: ObjectStore + ?Sized> FrameExtractor for ByteWindowExtractor<S> {
    async fn extract_frames(
        &self,
        location: &ObjectLocation,
        max_frames: usize,
    ) -> Result<Vec<SampledFrame>, PipelineError> {
        use base64::Engine;

        let head = self
            .store
            .head(&location.bucket, &location.key)
            .await
            .map_err(hlekkr_core::PipelineError::from)?;
        if head.size == 0 {
            return Ok(Vec::new());
        }

        let count = max_frames.min(MAX_FRAMES).max(1);
        let stride = head.size / count as u64;
        let mut frames = Vec::with_capacity(count);
        for i in 0..count {
            let start = stride * i as u64;
            let end = (start + self.window_bytes).min(head.size);
            let bytes = self
                .store
                .get_range(&location.bucket, &location.key, start..end)
                .await
                .map_err(hlekkr_core::PipelineError::from)?;
            frames.push(SampledFrame {
                frame_number: i,
                timestamp: i as f64 * 10.0,
                payload_base64: base64::engine::general_purpose::STANDARD.encode(bytes),
                content_type: head
                    .content_type
                    .clone()
                    .unwrap_or_else(|| "application/octet-stream".to_string()),
            });
        }
        Ok(frames)
    }
}

/// Aggregate frame analyses into a single video verdict: mean confidence
/// over valid frames, deduplicated technique union, and a synthetic
/// `temporal_inconsistency_detected` technique when frame confidences spread
/// beyond 0.1 variance.
pub fn aggregate_frames(frame_analyses: Vec<FrameAnalysis>) -> FrameAggregation {
    let total_frames = frame_analyses.len();
    let valid: Vec<&FrameAnalysis> = frame_analyses
        .iter()
        .filter(|a| a.error.is_none())
        .collect();

    if valid.is_empty() {
        return FrameAggregation {
            confidence: 0.5,
            techniques: Vec::new(),
            frame_analyses,
            valid_frames: 0,
            total_frames,
        };
    }

    let avg_confidence =
        valid.iter().map(|a| a.confidence).sum::<f64>() / valid.len() as f64;

    // Union, de-duplicated, first-seen order preserved
    let mut techniques: Vec<String> = Vec::new();
    for analysis in &valid {
        for technique in &analysis.techniques {
            if !techniques.contains(technique) {
                techniques.push(technique.clone());
            }
        }
    }

    if valid.len() > 1 {
        let variance = valid
            .iter()
            .map(|a| (a.confidence - avg_confidence).powi(2))
            .sum::<f64>()
            / valid.len() as f64;
        if variance > 0.1 {
            techniques.push("temporal_inconsistency_detected".to_string());
        }
    }

    let valid_frames = valid.len();
    FrameAggregation {
        confidence: avg_confidence,
        techniques,
        frame_analyses,
        valid_frames,
        total_frames,
    }
}
