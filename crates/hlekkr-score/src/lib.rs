//! # Hlekkr Score
//!
//! The composite trust-scoring engine. Five component scores — deepfake,
//! source reliability, metadata consistency, technical integrity, and
//! historical pattern — fuse under dynamic weights with a non-linear
//! adjustment and variance smoothing into a single [0, 100] composite.
//! Every computation writes a new immutable [`TrustScoreVersion`]; exactly
//! one version per media item carries `is_latest`.

pub mod components;
pub mod composite;
pub mod engine;
pub mod storage;
pub mod types;

pub use components::AnalysisBundle;
pub use engine::{HumanDecisionInput, TrustScoreEngine};
pub use storage::{ScoreStatistics, ScoreStore};
pub use types::{ScoreBreakdown, ScoreConfidence, ScoreRange, TrustFactor, TrustScoreVersion};
