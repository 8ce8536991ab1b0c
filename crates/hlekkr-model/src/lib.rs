//! # Hlekkr Model
//!
//! Contract for the external model-inference service. The pipeline only
//! orchestrates inference: it sends a base64 payload plus an analysis
//! prompt, receives raw bytes, and normalizes the vendor envelope into the
//! fixed schema the ensemble coordinator consumes. Malformed JSON falls back
//! to regex extraction so a chatty model never breaks the ensemble.

pub mod invoker;
pub mod mock;
pub mod normalize;
pub mod resilient;

pub use invoker::{ModelError, ModelInvoker, ModelRequest, ModelResponse};
pub use mock::MockInvoker;
pub use normalize::{parse_model_response, Certainty, NormalizedAnalysis};
pub use resilient::TimedInvoker;
