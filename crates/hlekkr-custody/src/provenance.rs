//! Provenance graph and chain metrics

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::types::{ChainVerdict, CustodyEvent};

/// One node per custody event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProvenanceNode {
    pub id: String,
    pub label: String,
    pub stage: String,
    pub timestamp: DateTime<Utc>,
    pub actor: String,
}

/// Sequence edge between consecutive events.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProvenanceEdge {
    pub from: String,
    pub to: String,
}

/// Metrics over a custody chain.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProvenanceMetrics {
    pub total_events: usize,
    pub unique_actors: usize,
    pub unique_stages: usize,
    pub processing_duration_seconds: f64,
    pub transformation_count: usize,
    pub integrity_verified_count: usize,
    pub integrity_percentage: f64,
}

/// Summary of one transformation step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransformationStep {
    pub stage: String,
    pub timestamp: DateTime<Utc>,
    pub actor: String,
    pub action: String,
    pub details: serde_json::Value,
    pub input_hash: Option<String>,
    pub output_hash: Option<String>,
    pub integrity_verified: bool,
}

/// Provenance view of a custody chain.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProvenanceGraph {
    pub nodes: Vec<ProvenanceNode>,
    pub edges: Vec<ProvenanceEdge>,
    pub metrics: ProvenanceMetrics,
    pub transformations: Vec<TransformationStep>,
    pub integrity_status: ChainVerdict,
}

/// Compact chain view consumed by the trust-score engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustodySummary {
    pub media_id: String,
    pub event_count: usize,
    pub first_event: Option<DateTime<Utc>>,
    pub last_event: Option<DateTime<Utc>>,
    pub integrity_status: ChainVerdict,
    pub stages: Vec<String>,
}

fn duration_seconds(events: &[CustodyEvent]) -> f64 {
    match (events.first(), events.last()) {
        (Some(first), Some(last)) if events.len() > 1 => {
            (last.timestamp - first.timestamp).num_milliseconds() as f64 / 1000.0
        }
        _ => 0.0,
    }
}

/// Build the provenance graph. `verified` carries the per-event signature
/// result in chain order.
pub fn build_graph(
    events: &[CustodyEvent],
    verdict: ChainVerdict,
    verified: &[bool],
) -> ProvenanceGraph {
    let nodes: Vec<ProvenanceNode> = events
        .iter()
        .map(|e| ProvenanceNode {
            id: e.event_id.clone(),
            label: format!("{} - {}", e.stage, e.action),
            stage: e.stage.to_string(),
            timestamp: e.timestamp,
            actor: e.actor.clone(),
        })
        .collect();

    let edges: Vec<ProvenanceEdge> = events
        .windows(2)
        .map(|pair| ProvenanceEdge {
            from: pair[0].event_id.clone(),
            to: pair[1].event_id.clone(),
        })
        .collect();

    let transformations: Vec<TransformationStep> = events
        .iter()
        .zip(verified.iter().copied())
        .filter(|(e, _)| !e.transformation_details.is_null() && e.transformation_details != serde_json::json!({}))
        .map(|(e, ok)| TransformationStep {
            stage: e.stage.to_string(),
            timestamp: e.timestamp,
            actor: e.actor.clone(),
            action: e.action.clone(),
            details: e.transformation_details.clone(),
            input_hash: e.input_hash.clone(),
            output_hash: e.output_hash.clone(),
            integrity_verified: ok,
        })
        .collect();

    let actors: BTreeSet<&str> = events.iter().map(|e| e.actor.as_str()).collect();
    let stages: BTreeSet<String> = events.iter().map(|e| e.stage.to_string()).collect();
    let verified_count = verified.iter().filter(|v| **v).count();

    let metrics = ProvenanceMetrics {
        total_events: events.len(),
        unique_actors: actors.len(),
        unique_stages: stages.len(),
        processing_duration_seconds: duration_seconds(events),
        transformation_count: transformations.len(),
        integrity_verified_count: verified_count,
        integrity_percentage: if events.is_empty() {
            0.0
        } else {
            verified_count as f64 / events.len() as f64 * 100.0
        },
    };

    ProvenanceGraph {
        nodes,
        edges,
        metrics,
        transformations,
        integrity_status: verdict,
    }
}

/// Build the compact summary view.
pub fn summarize(media_id: &str, events: &[CustodyEvent], verdict: ChainVerdict) -> CustodySummary {
    let mut stages: Vec<String> = Vec::new();
    for event in events {
        let stage = event.stage.to_string();
        if !stages.contains(&stage) {
            stages.push(stage);
        }
    }
    CustodySummary {
        media_id: media_id.to_string(),
        event_count: events.len(),
        first_event: events.first().map(|e| e.timestamp),
        last_event: events.last().map(|e| e.timestamp),
        integrity_status: verdict,
        stages,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hlekkr_core::ProcessingStage;
    use serde_json::json;

    fn event(stage: ProcessingStage, actor: &str, details: serde_json::Value) -> CustodyEvent {
        CustodyEvent {
            event_id: uuid::Uuid::new_v4().to_string(),
            media_id: "m1".to_string(),
            stage,
            timestamp: Utc::now(),
            actor: actor.to_string(),
            action: format!("{stage}_completed"),
            input_hash: None,
            output_hash: Some("h".to_string()),
            transformation_details: details,
            metadata: json!({}),
            previous_event_hash: None,
            integrity_proof: None,
            event_hash: "x".to_string(),
        }
    }

    #[test]
    fn test_graph_shape() {
        let events = vec![
            event(ProcessingStage::Upload, "ingest", json!({})),
            event(ProcessingStage::SecurityScan, "scanner", json!({"moved": true})),
            event(ProcessingStage::DeepfakeAnalysis, "analyzer", json!({})),
        ];
        let graph = build_graph(&events, ChainVerdict::Valid, &[true, true, true]);

        assert_eq!(graph.nodes.len(), 3);
        assert_eq!(graph.edges.len(), 2);
        assert_eq!(graph.edges[0].from, events[0].event_id);
        assert_eq!(graph.metrics.unique_actors, 3);
        assert_eq!(graph.metrics.unique_stages, 3);
        assert_eq!(graph.transformations.len(), 1);
        assert_eq!(graph.metrics.integrity_percentage, 100.0);
    }

    #[test]
    fn test_summary_dedupes_stages_in_order() {
        let events = vec![
            event(ProcessingStage::Upload, "a", json!({})),
            event(ProcessingStage::SecurityScan, "b", json!({})),
            event(ProcessingStage::SecurityScan, "b", json!({})),
        ];
        let summary = summarize("m1", &events, ChainVerdict::Valid);
        assert_eq!(summary.event_count, 3);
        assert_eq!(summary.stages, vec!["upload", "security_scan"]);
    }

    #[test]
    fn test_empty_chain_metrics() {
        let graph = build_graph(&[], ChainVerdict::Empty, &[]);
        assert_eq!(graph.metrics.total_events, 0);
        assert_eq!(graph.metrics.integrity_percentage, 0.0);
    }
}
