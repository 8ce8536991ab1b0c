//! # Hlekkr Discrepancy
//!
//! Cross-stage consistency analysis. The detector reads everything the
//! pipeline recorded about a media item — source verification, extracted
//! metadata, the custody chain, the latest trust score, the audit trail —
//! and emits typed discrepancies with severities. Detection is
//! deterministic: the same evidence always yields the same findings.

pub mod detector;
pub mod types;

pub use detector::{DiscrepancyDetector, MediaEvidence};
pub use types::{Discrepancy, DiscrepancySummary, DiscrepancyType};
