//! Content hashing with canonical JSON serialization
//!
//! Every hash in the custody chain is a SHA-256 digest over RFC 8785 (JCS)
//! bytes so that key order never changes a digest.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

use crate::error::PipelineError;

/// A SHA-256 hash (32 bytes)
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Hash(pub [u8; 32]);

impl Hash {
    /// Create a hash from raw bytes
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Hash arbitrary data
    pub fn digest(data: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(data);
        Self(hasher.finalize().into())
    }

    /// Parse a hash from its full hex representation
    pub fn from_hex(s: &str) -> Result<Self, PipelineError> {
        let bytes = hex::decode(s)
            .map_err(|e| PipelineError::input_invalid(format!("invalid hash hex: {e}")))?;
        let arr: [u8; 32] = bytes
            .try_into()
            .map_err(|_| PipelineError::input_invalid("hash must be 32 bytes"))?;
        Ok(Self(arr))
    }

    /// Get hex representation
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Debug for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Hash({})", &self.to_hex()[..16])
    }
}

impl fmt::Display for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

/// Hash a JSON value over its canonical (JCS) serialization.
///
/// Returns the lowercase hex digest used throughout the custody chain and
/// threat-indicator values.
pub fn content_hash_value(value: &serde_json::Value) -> Result<String, PipelineError> {
    let canonical = serde_jcs::to_vec(value)
        .map_err(|e| PipelineError::input_invalid(format!("canonical serialization: {e}")))?;
    Ok(Hash::digest(&canonical).to_hex())
}

/// Hash a string's UTF-8 bytes directly (no JSON quoting).
pub fn content_hash_str(content: &str) -> String {
    Hash::digest(content.as_bytes()).to_hex()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_hash_hex_round_trip() {
        let h = Hash::digest(b"hello");
        let parsed = Hash::from_hex(&h.to_hex()).unwrap();
        assert_eq!(h, parsed);
    }

    #[test]
    fn test_content_hash_key_order_independent() {
        let a = content_hash_value(&json!({"a": 1, "b": 2})).unwrap();
        let b = content_hash_value(&json!({"b": 2, "a": 1})).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_content_hash_nested_key_order() {
        let a = content_hash_value(&json!({"outer": {"x": [1, 2], "y": "z"}})).unwrap();
        let b = content_hash_value(&json!({"outer": {"y": "z", "x": [1, 2]}})).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_string_hash_differs_from_json_string_hash() {
        let raw = content_hash_str("hello");
        let quoted = content_hash_value(&json!("hello")).unwrap();
        assert_ne!(raw, quoted);
    }

    #[test]
    fn test_from_hex_rejects_bad_input() {
        assert!(Hash::from_hex("zz").is_err());
        assert!(Hash::from_hex("abcd").is_err());
    }
}
