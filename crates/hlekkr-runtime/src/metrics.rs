//! Pipeline metrics
//!
//! Counters in the `Hlekkr/*` namespaces; the sink contract is a snapshot
//! any exporter can ship.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// Process-wide pipeline counters.
#[derive(Debug, Default)]
pub struct PipelineMetrics {
    pub media_processed: AtomicU64,
    pub scan_threats_detected: AtomicU64,
    pub quarantined: AtomicU64,
    pub analyses_completed: AtomicU64,
    pub model_failures: AtomicU64,
    pub scores_calculated: AtomicU64,
    pub reviews_opened: AtomicU64,
    pub reviews_completed: AtomicU64,
    pub discrepancies_found: AtomicU64,
    pub threat_indicators: AtomicU64,
    pub threat_reports: AtomicU64,
    pub alerts_published: AtomicU64,
    pub stage_failures: AtomicU64,
}

impl PipelineMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn incr(&self, counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add(&self, counter: &AtomicU64, n: u64) {
        counter.fetch_add(n, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            media_processed: self.media_processed.load(Ordering::Relaxed),
            scan_threats_detected: self.scan_threats_detected.load(Ordering::Relaxed),
            quarantined: self.quarantined.load(Ordering::Relaxed),
            analyses_completed: self.analyses_completed.load(Ordering::Relaxed),
            model_failures: self.model_failures.load(Ordering::Relaxed),
            scores_calculated: self.scores_calculated.load(Ordering::Relaxed),
            reviews_opened: self.reviews_opened.load(Ordering::Relaxed),
            reviews_completed: self.reviews_completed.load(Ordering::Relaxed),
            discrepancies_found: self.discrepancies_found.load(Ordering::Relaxed),
            threat_indicators: self.threat_indicators.load(Ordering::Relaxed),
            threat_reports: self.threat_reports.load(Ordering::Relaxed),
            alerts_published: self.alerts_published.load(Ordering::Relaxed),
            stage_failures: self.stage_failures.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time metric values.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub media_processed: u64,
    pub scan_threats_detected: u64,
    pub quarantined: u64,
    pub analyses_completed: u64,
    pub model_failures: u64,
    pub scores_calculated: u64,
    pub reviews_opened: u64,
    pub reviews_completed: u64,
    pub discrepancies_found: u64,
    pub threat_indicators: u64,
    pub threat_reports: u64,
    pub alerts_published: u64,
    pub stage_failures: u64,
}

impl MetricsSnapshot {
    /// Namespaced counter pairs for a generic metrics sink.
    pub fn counters(&self) -> Vec<(&'static str, u64)> {
        vec![
            ("Hlekkr/Pipeline/MediaProcessed", self.media_processed),
            ("Hlekkr/Security/ThreatsDetected", self.scan_threats_detected),
            ("Hlekkr/Security/Quarantined", self.quarantined),
            ("Hlekkr/Analysis/Completed", self.analyses_completed),
            ("Hlekkr/Analysis/ModelFailures", self.model_failures),
            ("Hlekkr/TrustScore/Calculated", self.scores_calculated),
            ("Hlekkr/Review/Opened", self.reviews_opened),
            ("Hlekkr/Review/Completed", self.reviews_completed),
            ("Hlekkr/Discrepancy/Found", self.discrepancies_found),
            ("Hlekkr/ThreatIntelligence/Indicators", self.threat_indicators),
            ("Hlekkr/ThreatIntelligence/Reports", self.threat_reports),
            ("Hlekkr/Alerts/Published", self.alerts_published),
            ("Hlekkr/Pipeline/StageFailures", self.stage_failures),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_namespaced() {
        let metrics = PipelineMetrics::new();
        metrics.incr(&metrics.media_processed);
        metrics.incr(&metrics.media_processed);
        metrics.add(&metrics.threat_indicators, 4);

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.media_processed, 2);
        assert_eq!(snapshot.threat_indicators, 4);

        let counters = snapshot.counters();
        assert!(counters
            .iter()
            .all(|(name, _)| name.starts_with("Hlekkr/")));
    }
}
