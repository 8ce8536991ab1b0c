//! # Hlekkr Core
//!
//! Shared types for the Hlekkr media verification pipeline — the per-media
//! record, pipeline stages, audit events, content hashing, and the error
//! taxonomy every handler speaks.
//!
//! ## Key Types
//!
//! - [`Hash`] — SHA-256 digest with canonical-JSON hashing helpers
//! - [`MediaItem`] / [`MediaKind`] — the unit of work flowing through the pipeline
//! - [`ProcessingStage`] — the ordered stages of the verification state machine
//! - [`AuditEvent`] — append-only per-media processing record
//! - [`PipelineError`] — the shared error taxonomy
//!
//! ## Canonical hashing
//!
//! ```rust
//! use hlekkr_core::content_hash_value;
//! use serde_json::json;
//!
//! // Key order does not affect the digest
//! let a = content_hash_value(&json!({"a": 1, "b": 2})).unwrap();
//! let b = content_hash_value(&json!({"b": 2, "a": 1})).unwrap();
//! assert_eq!(a, b);
//! ```

pub mod audit;
pub mod envelope;
pub mod error;
pub mod hash;
pub mod media;
pub mod severity;
pub mod stage;

pub use audit::{AuditEvent, AuditEventType};
pub use envelope::HandlerResponse;
pub use error::{ErrorKind, PipelineError};
pub use hash::{content_hash_str, content_hash_value, Hash};
pub use media::{MediaItem, MediaKind, ObjectLocation};
pub use severity::{Severity, SeverityLevel};
pub use stage::ProcessingStage;
