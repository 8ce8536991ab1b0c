//! Model invoker trait and request/response types

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from model invocation
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),
    #[error("Request failed: {0}")]
    RequestFailed(String),
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
    #[error("Rate limited")]
    RateLimited,
    #[error("Model not available: {0}")]
    NotAvailable(String),
    #[error("Deadline exceeded after {0}s")]
    DeadlineExceeded(u64),
    #[error("Payload too large: {0} bytes exceeds maximum {1} bytes")]
    PayloadTooLarge(usize, usize),
}

impl From<ModelError> for hlekkr_core::PipelineError {
    fn from(e: ModelError) -> Self {
        match e {
            ModelError::DeadlineExceeded(s) => Self::Timeout(format!("model invocation after {s}s")),
            other => Self::ModelFailed(other.to_string()),
        }
    }
}

/// Maximum inline payload size (base64 bytes) accepted by the inference
/// service; larger media goes through frame/segment extraction first.
pub const MAX_PAYLOAD_SIZE: usize = 20 * 1024 * 1024;

/// Maximum prompt size in bytes
pub const MAX_PROMPT_SIZE: usize = 64 * 1024;

/// A request to the model-inference service
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelRequest {
    pub media_id: String,
    pub model_id: String,
    pub payload_base64: String,
    pub content_type: String,
    pub prompt: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub top_p: f32,
}

impl ModelRequest {
    pub fn new(
        media_id: impl Into<String>,
        model_id: impl Into<String>,
        payload_base64: impl Into<String>,
        content_type: impl Into<String>,
        prompt: impl Into<String>,
    ) -> Self {
        Self {
            media_id: media_id.into(),
            model_id: model_id.into(),
            payload_base64: payload_base64.into(),
            content_type: content_type.into(),
            prompt: prompt.into(),
            max_tokens: 2048,
            temperature: 0.1,
            top_p: 0.9,
        }
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Validate request sizes before hitting the service.
    pub fn validate(&self) -> Result<(), ModelError> {
        if self.payload_base64.len() > MAX_PAYLOAD_SIZE {
            return Err(ModelError::PayloadTooLarge(
                self.payload_base64.len(),
                MAX_PAYLOAD_SIZE,
            ));
        }
        if self.prompt.len() > MAX_PROMPT_SIZE {
            return Err(ModelError::PayloadTooLarge(
                self.prompt.len(),
                MAX_PROMPT_SIZE,
            ));
        }
        Ok(())
    }
}

/// Raw response from the inference service
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelResponse {
    /// Vendor envelope bytes, parsed by [`crate::parse_model_response`]
    pub body: Vec<u8>,
    pub model_id: String,
    pub latency_ms: u64,
}

impl ModelResponse {
    pub fn content(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Trait for model-inference backends
#[async_trait]
pub trait ModelInvoker: Send + Sync + std::fmt::Debug {
    /// Backend name (for logs and metrics)
    fn name(&self) -> &str;

    /// Check if the backend is reachable
    async fn is_available(&self) -> bool;

    /// Run one inference call
    async fn invoke(&self, request: ModelRequest) -> Result<ModelResponse, ModelError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_rejects_oversized_prompt() {
        let mut req = ModelRequest::new("m1", "fast-v1", "", "image/png", "p");
        req.prompt = "x".repeat(MAX_PROMPT_SIZE + 1);
        assert!(matches!(
            req.validate(),
            Err(ModelError::PayloadTooLarge(_, _))
        ));
    }

    #[test]
    fn test_defaults() {
        let req = ModelRequest::new("m1", "fast-v1", "AAAA", "image/png", "analyze");
        assert_eq!(req.max_tokens, 2048);
        assert!(req.validate().is_ok());
    }
}
