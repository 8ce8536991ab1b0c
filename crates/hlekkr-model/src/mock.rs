//! Mock model invoker for testing

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;

use crate::invoker::{ModelError, ModelInvoker, ModelRequest, ModelResponse};

/// A mock invoker that returns predefined response bodies, cycling through
/// them. Deterministic: no randomness, no network.
#[derive(Debug)]
pub struct MockInvoker {
    name: String,
    responses: Vec<String>,
    index: AtomicUsize,
    fail: bool,
}

impl MockInvoker {
    pub fn new(responses: Vec<String>) -> Self {
        Self {
            name: "mock".to_string(),
            responses,
            index: AtomicUsize::new(0),
            fail: false,
        }
    }

    /// Always return the same response body
    pub fn constant(response: &str) -> Self {
        Self::new(vec![response.to_string()])
    }

    /// A mock reporting the given confidence with the given techniques
    pub fn with_analysis(confidence: f64, techniques: &[&str]) -> Self {
        let techniques_json: Vec<String> = techniques.iter().map(|t| format!("\"{t}\"")).collect();
        Self::constant(&format!(
            r#"{{"confidence": {confidence}, "techniques": [{}], "certainty": "high", "details": "mock analysis"}}"#,
            techniques_json.join(", ")
        ))
    }

    /// A mock whose every invocation fails
    pub fn failing() -> Self {
        Self {
            name: "failing-mock".to_string(),
            responses: vec![],
            index: AtomicUsize::new(0),
            fail: true,
        }
    }
}

#[async_trait]
impl ModelInvoker for MockInvoker {
    fn name(&self) -> &str {
        &self.name
    }

    async fn is_available(&self) -> bool {
        !self.fail
    }

    async fn invoke(&self, request: ModelRequest) -> Result<ModelResponse, ModelError> {
        request.validate()?;
        if self.fail {
            return Err(ModelError::NotAvailable("mock configured to fail".into()));
        }
        let start = Instant::now();
        let idx = self.index.fetch_add(1, Ordering::Relaxed);
        let body = self
            .responses
            .get(idx % self.responses.len().max(1))
            .cloned()
            .unwrap_or_else(|| {
                r#"{"confidence": 0.5, "techniques": [], "certainty": "medium"}"#.to_string()
            });
        Ok(ModelResponse {
            body: body.into_bytes(),
            model_id: request.model_id,
            latency_ms: start.elapsed().as_millis() as u64,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::parse_model_response;

    #[tokio::test]
    async fn test_mock_round_trip() {
        let mock = MockInvoker::with_analysis(0.75, &["face_swap"]);
        let response = mock
            .invoke(ModelRequest::new("m1", "fast-v1", "AAAA", "image/png", "analyze"))
            .await
            .unwrap();
        let parsed = parse_model_response(&response.content());
        assert!((parsed.confidence - 0.75).abs() < 1e-9);
        assert_eq!(parsed.techniques, vec!["face_swap"]);
    }

    #[tokio::test]
    async fn test_failing_mock() {
        let mock = MockInvoker::failing();
        assert!(!mock.is_available().await);
        let result = mock
            .invoke(ModelRequest::new("m1", "fast-v1", "", "image/png", "p"))
            .await;
        assert!(matches!(result, Err(ModelError::NotAvailable(_))));
    }

    #[tokio::test]
    async fn test_cycling_responses() {
        let mock = MockInvoker::new(vec!["a".to_string(), "b".to_string()]);
        let req = ModelRequest::new("m1", "fast-v1", "", "image/png", "p");
        let first = mock.invoke(req.clone()).await.unwrap();
        let second = mock.invoke(req.clone()).await.unwrap();
        let third = mock.invoke(req).await.unwrap();
        assert_eq!(first.content(), "a");
        assert_eq!(second.content(), "b");
        assert_eq!(third.content(), "a");
    }
}
