//! Pipeline error taxonomy
//!
//! Handlers translate these to `{statusCode, body}` envelopes at the
//! boundary; internal code propagates them with `?`.

use serde::{Deserialize, Serialize};

/// Machine-readable error kind carried in handler envelopes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    InputInvalid,
    NotFound,
    Conflict,
    ExtractionFailed,
    ModelFailed,
    StoreError,
    SignatureError,
    Timeout,
}

/// Shared error type for all pipeline components.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("Invalid input: {0}")]
    InputInvalid(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    /// Non-fatal: recorded with `extractionFailed:true`, pipeline continues
    #[error("Extraction failed: {0}")]
    ExtractionFailed(String),

    /// Non-fatal: synthesized into a neutral ensemble member
    #[error("Model invocation failed: {0}")]
    ModelFailed(String),

    #[error("Store error: {0}")]
    StoreError(String),

    #[error("Signature error: {0}")]
    SignatureError(String),

    #[error("Deadline exceeded: {0}")]
    Timeout(String),
}

impl PipelineError {
    pub fn input_invalid(msg: impl Into<String>) -> Self {
        Self::InputInvalid(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn store(msg: impl Into<String>) -> Self {
        Self::StoreError(msg.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InputInvalid(_) => ErrorKind::InputInvalid,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::Conflict(_) => ErrorKind::Conflict,
            Self::ExtractionFailed(_) => ErrorKind::ExtractionFailed,
            Self::ModelFailed(_) => ErrorKind::ModelFailed,
            Self::StoreError(_) => ErrorKind::StoreError,
            Self::SignatureError(_) => ErrorKind::SignatureError,
            Self::Timeout(_) => ErrorKind::Timeout,
        }
    }

    /// HTTP-equivalent status code for the transport boundary.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::InputInvalid(_) => 400,
            Self::NotFound(_) => 404,
            Self::Conflict(_) => 409,
            Self::Timeout(_) => 408,
            Self::ExtractionFailed(_) | Self::ModelFailed(_) => 502,
            Self::StoreError(_) | Self::SignatureError(_) => 500,
        }
    }

    /// Whether the error may succeed on retry (CAS races, transient store
    /// failures). Input and lookup failures never do.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Conflict(_) | Self::StoreError(_))
    }

    /// Whether the pipeline should continue past this error by recording a
    /// synthetic failure event instead of aborting the stage.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::ExtractionFailed(_) | Self::ModelFailed(_) | Self::Timeout(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(PipelineError::input_invalid("x").status_code(), 400);
        assert_eq!(PipelineError::not_found("x").status_code(), 404);
        assert_eq!(PipelineError::conflict("x").status_code(), 409);
        assert_eq!(PipelineError::store("x").status_code(), 500);
    }

    #[test]
    fn test_retryable() {
        assert!(PipelineError::conflict("cas").is_retryable());
        assert!(PipelineError::store("io").is_retryable());
        assert!(!PipelineError::input_invalid("bad").is_retryable());
    }

    #[test]
    fn test_recoverable() {
        assert!(PipelineError::ModelFailed("down".into()).is_recoverable());
        assert!(PipelineError::Timeout("deadline".into()).is_recoverable());
        assert!(!PipelineError::store("io").is_recoverable());
    }
}
