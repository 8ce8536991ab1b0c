//! # Hlekkr Threat
//!
//! Threat intelligence: human-confirmed adverse decisions are harvested
//! into reusable indicators (hashes, domains, techniques, metadata
//! patterns, file signatures), deduplicated by `(type, value)`, analyzed
//! for campaign patterns over recent decisions, and rolled into threat
//! reports with mitigation recommendations.

pub mod indicator;
pub mod patterns;
pub mod processor;
pub mod report;

pub use indicator::{IndicatorStore, IndicatorType, ThreatContext, ThreatIndicator};
pub use patterns::{analyze_patterns, PatternAnalysis};
pub use processor::{ProcessOutcome, ThreatIntelProcessor};
pub use report::{ReportStore, ThreatReport, ThreatStatus, ThreatType};
