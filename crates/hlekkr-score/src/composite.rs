//! Composite fusion
//!
//! Dynamic weighting, non-linear emphasis of extreme component scores,
//! an uncertainty penalty for neutral sentinels, and variance smoothing
//! toward the median when components wildly disagree.

use crate::components::NEUTRAL_SCORE;
use crate::types::ScoreBreakdown;

const BASE_WEIGHTS: [(&str, f64); 5] = [
    ("deepfake", 0.35),
    ("sourceReliability", 0.25),
    ("metadataConsistency", 0.20),
    ("technicalIntegrity", 0.15),
    ("historicalPattern", 0.05),
];

/// Dynamic weights: extreme scores (decisive evidence) gain weight,
/// near-neutral scores (likely missing data) lose it; renormalized to 1.
pub fn dynamic_weights(breakdown: &ScoreBreakdown) -> Vec<(&'static str, f64)> {
    let scores = breakdown.components();
    let mut weights: Vec<(&'static str, f64)> = BASE_WEIGHTS.to_vec();

    for (name, weight) in weights.iter_mut() {
        let score = scores
            .iter()
            .find(|(component, _)| component == name)
            .map(|(_, s)| *s)
            .unwrap_or(NEUTRAL_SCORE);
        if score > 80.0 || score < 20.0 {
            *weight *= 1.2;
        } else if (45.0..=55.0).contains(&score) {
            *weight *= 0.8;
        }
    }

    let total: f64 = weights.iter().map(|(_, w)| w).sum();
    if total > 0.0 {
        for (_, weight) in weights.iter_mut() {
            *weight /= total;
        }
    }
    weights
}

/// Sigmoid-like emphasis around the midpoint: upper half uses exponent 0.8,
/// lower half 1.2, so decisive scores move further from 50.
pub fn non_linear_adjust(score: f64) -> f64 {
    if score < 0.0 {
        return score;
    }
    let normalized = score / 100.0;
    let adjusted = if normalized > 0.5 {
        0.5 + 0.5 * ((normalized - 0.5) * 2.0).powf(0.8)
    } else {
        0.5 * (normalized * 2.0).powf(1.2)
    };
    adjusted * 100.0
}

fn sample_variance(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let mean = values.iter().sum::<f64>() / values.len() as f64;
    values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (values.len() - 1) as f64
}

fn median(values: &mut [f64]) -> f64 {
    values.sort_by(f64::total_cmp);
    let mid = values.len() / 2;
    if values.len() % 2 == 0 {
        (values[mid - 1] + values[mid]) / 2.0
    } else {
        values[mid]
    }
}

/// Smooth an extreme composite toward the component median when the
/// components disagree strongly (variance above 1000), by up to 30%.
pub fn smooth(score: f64, breakdown: &ScoreBreakdown) -> f64 {
    let mut valid: Vec<f64> = breakdown
        .components()
        .iter()
        .map(|(_, s)| *s)
        .filter(|s| *s >= 0.0)
        .collect();
    if valid.len() < 2 {
        return score;
    }
    let variance = sample_variance(&valid);
    if variance <= 1000.0 {
        return score;
    }
    let smoothing = (variance / 5000.0).min(0.3);
    let median = median(&mut valid);
    let smoothed = score * (1.0 - smoothing) + median * smoothing;
    tracing::info!(score, smoothed, variance, "applied composite smoothing");
    smoothed
}

/// Full composite: dynamic weights over non-linearly adjusted components,
/// an uncertainty penalty per neutral component, then smoothing and a
/// final clamp to [0, 100].
pub fn composite_score(breakdown: &ScoreBreakdown) -> f64 {
    let weights = dynamic_weights(breakdown);
    let scores = breakdown.components();

    let mut weighted_sum = 0.0;
    let mut total_weight = 0.0;
    let mut uncertainty_penalty = 0.0;

    for (name, weight) in &weights {
        let Some((_, score)) = scores.iter().find(|(component, _)| component == name) else {
            continue;
        };
        if *score < 0.0 {
            continue;
        }
        weighted_sum += non_linear_adjust(*score) * weight;
        total_weight += weight;
        if *score == NEUTRAL_SCORE {
            uncertainty_penalty += weight * 0.1;
        }
    }

    if total_weight == 0.0 {
        return 0.0;
    }

    let composite = weighted_sum / total_weight * (1.0 - uncertainty_penalty);
    smooth(composite, breakdown).clamp(0.0, 100.0)
}

/// Variance over valid components, exposed for the discrepancy detector.
pub fn component_variance(breakdown: &ScoreBreakdown) -> f64 {
    let valid: Vec<f64> = breakdown
        .components()
        .iter()
        .map(|(_, s)| *s)
        .filter(|s| *s >= 0.0)
        .collect();
    sample_variance(&valid)
}
