//! Ensemble fusion
//!
//! Weighted voting over per-model results with a consensus adjustment:
//! agreement between models scales the fused confidence up, disagreement
//! scales it down.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use hlekkr_model::Certainty;

/// Priority tier a model was selected at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelPriority {
    High,
    Standard,
    Supplementary,
    Fallback,
}

impl ModelPriority {
    fn weight(&self) -> f64 {
        match self {
            Self::High => 1.5,
            Self::Standard => 1.0,
            Self::Supplementary => 0.8,
            Self::Fallback => 0.6,
        }
    }
}

/// Depth of analysis a model performed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisDepth {
    Detailed,
    Standard,
    Basic,
    Supplementary,
    Failed,
}

impl AnalysisDepth {
    fn weight(&self) -> f64 {
        match self {
            Self::Detailed => 1.3,
            Self::Basic => 0.9,
            _ => 1.0,
        }
    }
}

/// One model's selection entry: which model to run and at what tier.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelPlan {
    pub model_id: String,
    pub name: String,
    pub priority: ModelPriority,
    pub use_case: String,
    pub max_tokens: u32,
}

/// One model's contribution to the ensemble.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelResult {
    pub model_id: String,
    pub priority: ModelPriority,
    pub confidence: f64,
    pub techniques: Vec<String>,
    pub certainty: Certainty,
    pub analysis_depth: AnalysisDepth,
    /// Seconds
    pub processing_time: f64,
    pub error: Option<String>,
}

impl ModelResult {
    fn is_valid(&self) -> bool {
        self.error.is_none() && (0.0..=1.0).contains(&self.confidence)
    }
}

/// Agreement bucket over the ensemble.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgreementLevel {
    VeryLow,
    Low,
    Medium,
    High,
    VeryHigh,
    None,
}

impl AgreementLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::VeryLow => "very_low",
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::VeryHigh => "very_high",
            Self::None => "none",
        }
    }
}

/// Detailed consensus metrics for the ensemble.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsensusMetrics {
    pub agreement: AgreementLevel,
    pub variance: f64,
    pub std_dev: f64,
    pub technique_agreement: f64,
    pub models_count: usize,
    pub mean_confidence: f64,
}

impl ConsensusMetrics {
    pub fn empty() -> Self {
        Self {
            agreement: AgreementLevel::None,
            variance: 0.0,
            std_dev: 0.0,
            technique_agreement: 0.0,
            models_count: 0,
            mean_confidence: 0.0,
        }
    }
}

/// Per-result weight: priority x depth x processing-time x certainty.
/// Invalid results (error, confidence out of range) weigh zero.
pub fn model_weight(result: &ModelResult) -> f64 {
    if !result.is_valid() {
        return 0.0;
    }
    let mut weight = result.priority.weight() * result.analysis_depth.weight();
    if result.processing_time > 3.0 {
        weight *= 1.1;
    } else if result.processing_time < 1.0 {
        weight *= 0.9;
    }
    match result.certainty {
        Certainty::High | Certainty::VeryHigh => weight *= 1.2,
        Certainty::Low | Certainty::VeryLow => weight *= 0.8,
        Certainty::Medium => {}
    }
    weight
}

fn variance_of(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mean = values.iter().sum::<f64>() / values.len() as f64;
    values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / values.len() as f64
}

/// Consensus factor over valid confidences: tight agreement boosts the
/// fused score, spread dampens it.
pub fn consensus_factor(results: &[ModelResult]) -> f64 {
    let confidences: Vec<f64> = results
        .iter()
        .filter(|r| r.is_valid())
        .map(|r| r.confidence)
        .collect();
    if confidences.len() < 2 {
        return 1.0;
    }
    let std_dev = variance_of(&confidences).sqrt();
    if std_dev < 0.05 {
        1.15
    } else if std_dev < 0.1 {
        1.1
    } else if std_dev < 0.15 {
        1.0
    } else if std_dev < 0.25 {
        0.9
    } else {
        0.8
    }
}

/// Fused ensemble confidence: weighted mean x consensus factor, clamped to
/// [0, 1]. Zero valid weight yields the neutral 0.5.
pub fn ensemble_confidence(results: &[ModelResult]) -> f64 {
    let mut weighted_sum = 0.0;
    let mut total_weight = 0.0;
    for result in results {
        let weight = model_weight(result);
        if weight > 0.0 {
            weighted_sum += result.confidence * weight;
            total_weight += weight;
        }
    }
    if total_weight == 0.0 {
        return 0.5;
    }
    let score = weighted_sum / total_weight * consensus_factor(results);
    score.clamp(0.0, 1.0)
}

/// Consensus metrics: confidence spread plus technique-set agreement
/// (Jaccard of the intersection against the union across models).
pub fn consensus_metrics(results: &[ModelResult]) -> ConsensusMetrics {
    let valid: Vec<&ModelResult> = results.iter().filter(|r| r.is_valid()).collect();
    if valid.is_empty() {
        return ConsensusMetrics::empty();
    }

    let confidences: Vec<f64> = valid.iter().map(|r| r.confidence).collect();
    let mean = confidences.iter().sum::<f64>() / confidences.len() as f64;
    let variance = variance_of(&confidences);
    let std_dev = variance.sqrt();

    let technique_agreement = if valid.iter().any(|r| !r.techniques.is_empty()) {
        let sets: Vec<BTreeSet<&str>> = valid
            .iter()
            .map(|r| r.techniques.iter().map(String::as_str).collect())
            .collect();
        let all: BTreeSet<&str> = sets.iter().flatten().copied().collect();
        let common: BTreeSet<&str> = sets
            .iter()
            .skip(1)
            .fold(sets[0].clone(), |acc, s| acc.intersection(s).copied().collect());
        if all.is_empty() {
            0.0
        } else {
            common.len() as f64 / all.len() as f64
        }
    } else {
        1.0
    };

    let agreement = if std_dev < 0.1 && technique_agreement > 0.7 {
        AgreementLevel::VeryHigh
    } else if std_dev < 0.2 && technique_agreement > 0.5 {
        AgreementLevel::High
    } else if std_dev < 0.3 && technique_agreement > 0.3 {
        AgreementLevel::Medium
    } else if std_dev < 0.4 && technique_agreement > 0.1 {
        AgreementLevel::Low
    } else {
        AgreementLevel::VeryLow
    };

    ConsensusMetrics {
        agreement,
        variance,
        std_dev,
        technique_agreement,
        models_count: valid.len(),
        mean_confidence: mean,
    }
}

/// Model selection by file characteristics (spec'd tiers):
/// - over 1 MiB gets the detailed model at high priority
/// - the fast model always runs at standard priority
/// - over 5 MiB or complexity above 0.7 adds the supplementary model
///
/// `drop_supplementary` implements backpressure degradation: the
/// supplementary tier is shed before anything else.
pub fn select_models(
    file_size: u64,
    complexity_score: f64,
    detailed_model: &str,
    fast_model: &str,
    supplementary_model: &str,
    drop_supplementary: bool,
) -> Vec<ModelPlan> {
    let mut models = Vec::new();

    if file_size > 1024 * 1024 {
        models.push(ModelPlan {
            model_id: detailed_model.to_string(),
            name: "detailed".to_string(),
            priority: ModelPriority::High,
            use_case: "detailed_analysis".to_string(),
            max_tokens: 4096,
        });
    }

    models.push(ModelPlan {
        model_id: fast_model.to_string(),
        name: "fast".to_string(),
        priority: ModelPriority::Standard,
        use_case: "fast_analysis".to_string(),
        max_tokens: 2048,
    });

    if !drop_supplementary && (file_size > 5 * 1024 * 1024 || complexity_score > 0.7) {
        models.push(ModelPlan {
            model_id: supplementary_model.to_string(),
            name: "supplementary".to_string(),
            priority: ModelPriority::Supplementary,
            use_case: "validation".to_string(),
            max_tokens: 1024,
        });
    }

    models
}

/// Selection fallback when planning itself fails: the fast model alone.
pub fn fallback_selection(fast_model: &str) -> Vec<ModelPlan> {
    vec![ModelPlan {
        model_id: fast_model.to_string(),
        name: "fast".to_string(),
        priority: ModelPriority::Fallback,
        use_case: "basic_analysis".to_string(),
        max_tokens: 2048,
    }]
}
