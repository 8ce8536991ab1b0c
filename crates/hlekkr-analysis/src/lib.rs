//! # Hlekkr Analysis
//!
//! Deepfake analysis: the multi-model ensemble coordinator and the
//! manipulation-technique classifier.
//!
//! The coordinator selects models by media size and kind, invokes each
//! through the [`hlekkr_model`] contract, normalizes the payloads, and fuses
//! the results by weighted voting with a consensus adjustment. The
//! classifier is a pure function over detected indicators: it matches them
//! against built-in technique signatures and derives severity and evidence
//! grades.

pub mod classifier;
pub mod coordinator;
pub mod ensemble;
pub mod signatures;
pub mod video;

pub use classifier::{ClassificationOutcome, ClassifiedTechnique, EvidenceStrength, TechniqueClassifier};
pub use coordinator::{DeepfakeAnalyzer, DetectionResult, ModelRoster};
pub use ensemble::{
    AgreementLevel, AnalysisDepth, ConsensusMetrics, ModelPlan, ModelPriority, ModelResult,
};
pub use signatures::{ManipulationType, TechniqueSignature};
pub use video::{FrameAggregation, FrameAnalysis, FrameExtractor, SampledFrame};
