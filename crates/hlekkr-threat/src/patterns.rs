//! Decision pattern analysis
//!
//! Deterministic clustering over recent decisions to surface coordinated
//! campaigns: temporal bursts, source concentration, and technique reuse.

use chrono::Timelike;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use hlekkr_review::{Decision, DecisionType};

/// Analysis over the recent decision window.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatternAnalysis {
    /// 0..1 overall coordination score
    pub pattern_score: f64,
    pub decisions_analyzed: usize,
    pub temporal_cluster_score: f64,
    pub source_cluster_score: f64,
    pub technique_cluster_score: f64,
    pub likely_campaign: bool,
    /// The dominant technique when one dominates
    pub dominant_technique: Option<String>,
}

impl PatternAnalysis {
    pub fn empty() -> Self {
        Self {
            pattern_score: 0.0,
            decisions_analyzed: 0,
            temporal_cluster_score: 0.0,
            source_cluster_score: 0.0,
            technique_cluster_score: 0.0,
            likely_campaign: false,
            dominant_technique: None,
        }
    }
}

/// Minimum confirmed decisions before clustering means anything.
const MIN_DECISIONS: usize = 3;

/// Analyze recent decisions for coordination. `techniques_of` maps a
/// decision to its manipulation techniques (drawn from decision tags by
/// default; the processor passes the richer analysis-backed mapping).
pub fn analyze_patterns(
    decisions: &[Decision],
    mut techniques_of: impl FnMut(&Decision) -> Vec<String>,
    mut domain_of: impl FnMut(&Decision) -> Option<String>,
) -> PatternAnalysis {
    let confirmed: Vec<&Decision> = decisions
        .iter()
        .filter(|d| d.decision_type == DecisionType::Confirm)
        .collect();

    if confirmed.len() < MIN_DECISIONS {
        return PatternAnalysis {
            decisions_analyzed: confirmed.len(),
            ..PatternAnalysis::empty()
        };
    }

    // Temporal clustering: fraction of decisions landing in the busiest
    // hour bucket
    let mut hour_buckets: HashMap<(i64, u32), usize> = HashMap::new();
    for decision in &confirmed {
        let key = (
            decision.completed_at.timestamp() / 86_400,
            decision.completed_at.hour(),
        );
        *hour_buckets.entry(key).or_insert(0) += 1;
    }
    let busiest = hour_buckets.values().copied().max().unwrap_or(0);
    let temporal_cluster_score = busiest as f64 / confirmed.len() as f64;

    // Source clustering: fraction sharing the most common domain
    let mut domains: HashMap<String, usize> = HashMap::new();
    for decision in &confirmed {
        if let Some(domain) = domain_of(decision) {
            *domains.entry(domain).or_insert(0) += 1;
        }
    }
    let source_cluster_score = domains
        .values()
        .copied()
        .max()
        .map(|n| n as f64 / confirmed.len() as f64)
        .unwrap_or(0.0);

    // Technique clustering: fraction sharing the most common technique
    let mut techniques: HashMap<String, usize> = HashMap::new();
    for decision in &confirmed {
        for technique in techniques_of(decision) {
            *techniques.entry(technique).or_insert(0) += 1;
        }
    }
    let (dominant_technique, technique_cluster_score) = techniques
        .iter()
        .max_by_key(|(_, count)| **count)
        .map(|(technique, count)| {
            (
                Some(technique.clone()),
                *count as f64 / confirmed.len() as f64,
            )
        })
        .unwrap_or((None, 0.0));
    let technique_cluster_score = technique_cluster_score.min(1.0);

    let pattern_score =
        (temporal_cluster_score + source_cluster_score + technique_cluster_score) / 3.0;

    PatternAnalysis {
        pattern_score,
        decisions_analyzed: confirmed.len(),
        temporal_cluster_score,
        source_cluster_score,
        technique_cluster_score,
        likely_campaign: pattern_score >= 0.7 && confirmed.len() >= MIN_DECISIONS,
        dominant_technique,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use hlekkr_review::ConfidenceLevel;
    use uuid::Uuid;

    fn decision_at(hour: u32, tag: &str) -> Decision {
        Decision {
            decision_id: Uuid::new_v4().to_string(),
            review_id: "r".to_string(),
            media_id: Uuid::new_v4().to_string(),
            moderator_id: "mod-1".to_string(),
            decision_type: DecisionType::Confirm,
            confidence_level: ConfidenceLevel::High,
            justification: "confirmed manipulation evidence".to_string(),
            trust_score_adjustment: None,
            threat_level: None,
            tags: vec![tag.to_string()],
            additional_evidence: Vec::new(),
            completed_at: Utc.with_ymd_and_hms(2026, 8, 1, hour, 15, 0).unwrap(),
        }
    }

    fn tags(decision: &Decision) -> Vec<String> {
        decision.tags.clone()
    }

    #[test]
    fn test_too_few_decisions_score_zero() {
        let decisions = vec![decision_at(10, "face_swap")];
        let analysis = analyze_patterns(&decisions, tags, |_| None);
        assert_eq!(analysis.pattern_score, 0.0);
        assert!(!analysis.likely_campaign);
    }

    #[test]
    fn test_coordinated_burst_detected() {
        // Same hour, same domain, same technique: maximal clustering
        let decisions: Vec<Decision> =
            (0..5).map(|_| decision_at(10, "face_swap")).collect();
        let analysis = analyze_patterns(&decisions, tags, |_| {
            Some("fakenews.com".to_string())
        });
        assert!(analysis.pattern_score > 0.9);
        assert!(analysis.likely_campaign);
        assert_eq!(analysis.dominant_technique.as_deref(), Some("face_swap"));
    }

    #[test]
    fn test_scattered_decisions_low_score() {
        let decisions = vec![
            decision_at(1, "face_swap"),
            decision_at(7, "speech_synthesis"),
            decision_at(13, "attribute_editing"),
            decision_at(19, "style_transfer"),
        ];
        let domains = ["a.com", "b.com", "c.com", "d.com"];
        let mut i = 0;
        let analysis = analyze_patterns(
            &decisions,
            tags,
            move |_| {
                let domain = domains[i % domains.len()].to_string();
                i += 1;
                Some(domain)
            },
        );
        assert!(analysis.pattern_score < 0.5);
        assert!(!analysis.likely_campaign);
    }

    #[test]
    fn test_determinism() {
        let decisions: Vec<Decision> = (0..4).map(|_| decision_at(9, "face_swap")).collect();
        let a = analyze_patterns(&decisions, tags, |_| Some("x.com".to_string()));
        let b = analyze_patterns(&decisions, tags, |_| Some("x.com".to_string()));
        assert_eq!(a.pattern_score, b.pattern_score);
        assert_eq!(a.likely_campaign, b.likely_campaign);
    }
}
