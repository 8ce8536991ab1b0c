//! Handler response envelopes
//!
//! Every queue- or scheduler-triggered handler returns `{statusCode, body}`;
//! the transport in front of the worker decides how to surface it.

use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::error::PipelineError;

/// Structured handler result
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HandlerResponse {
    #[serde(rename = "statusCode")]
    pub status_code: u16,
    pub body: serde_json::Value,
}

impl HandlerResponse {
    /// 200 with a JSON body
    pub fn ok(body: serde_json::Value) -> Self {
        Self {
            status_code: 200,
            body,
        }
    }

    /// 201 for newly created records
    pub fn created(body: serde_json::Value) -> Self {
        Self {
            status_code: 201,
            body,
        }
    }

    /// Translate a pipeline error, preserving the kind for callers.
    pub fn from_error(err: &PipelineError) -> Self {
        Self {
            status_code: err.status_code(),
            body: json!({
                "error": err.to_string(),
                "errorKind": err.kind(),
            }),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status_code)
    }
}

impl From<Result<serde_json::Value, PipelineError>> for HandlerResponse {
    fn from(result: Result<serde_json::Value, PipelineError>) -> Self {
        match result {
            Ok(body) => Self::ok(body),
            Err(e) => Self::from_error(&e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ok_envelope() {
        let resp = HandlerResponse::ok(json!({"mediaId": "m1"}));
        assert!(resp.is_success());
        assert_eq!(resp.body["mediaId"], "m1");
    }

    #[test]
    fn test_error_envelope_carries_kind() {
        let resp = HandlerResponse::from_error(&PipelineError::not_found("media m1"));
        assert_eq!(resp.status_code, 404);
        assert_eq!(resp.body["errorKind"], "NOT_FOUND");
        assert!(!resp.is_success());
    }
}
