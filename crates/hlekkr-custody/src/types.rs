//! Custody event types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use hlekkr_core::ProcessingStage;

/// Verification status carried inside an integrity proof.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntegrityStatus {
    Verified,
    Compromised,
    Unknown,
    Pending,
}

/// Cryptographic integrity proof for a custody event.
///
/// The signature is HMAC-SHA256 over the canonical (JCS) serialization of
/// the event with the `integrity_proof` field cleared.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntegrityProof {
    pub content_hash: String,
    pub signature: String,
    pub timestamp: DateTime<Utc>,
    pub key_id: String,
    pub algorithm: String,
    pub verification_status: IntegrityStatus,
}

impl IntegrityProof {
    /// Placeholder proof recorded when signing fails; chain verification
    /// treats it as an invalid signature, never a silent success.
    pub fn unknown() -> Self {
        Self {
            content_hash: String::new(),
            signature: String::new(),
            timestamp: Utc::now(),
            key_id: String::new(),
            algorithm: String::new(),
            verification_status: IntegrityStatus::Unknown,
        }
    }
}

/// One link in a per-media custody chain.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustodyEvent {
    pub event_id: String,
    pub media_id: String,
    pub stage: ProcessingStage,
    pub timestamp: DateTime<Utc>,
    /// System component or user that performed the action
    pub actor: String,
    pub action: String,
    pub input_hash: Option<String>,
    pub output_hash: Option<String>,
    pub transformation_details: serde_json::Value,
    pub metadata: serde_json::Value,
    pub previous_event_hash: Option<String>,
    /// Cleared before hashing/signing
    pub integrity_proof: Option<IntegrityProof>,
    /// SHA-256 over the canonical event with `integrity_proof` cleared
    pub event_hash: String,
}

impl CustodyEvent {
    /// Canonical form used for hashing and signing: the event with the
    /// proof and hash fields cleared.
    pub fn signable(&self) -> CustodyEvent {
        CustodyEvent {
            integrity_proof: None,
            event_hash: String::new(),
            ..self.clone()
        }
    }
}

/// Outcome of verifying a full custody chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChainVerdict {
    /// Every signature verifies and every link matches
    Valid,
    /// Links intact, at least 80% of signatures verify
    MostlyValid,
    /// Links intact, under 80% of signatures verify
    Compromised,
    /// At least one previous-hash link does not match
    BrokenChain,
    /// No events recorded
    Empty,
}

impl ChainVerdict {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Valid => "valid",
            Self::MostlyValid => "mostly_valid",
            Self::Compromised => "compromised",
            Self::BrokenChain => "broken_chain",
            Self::Empty => "empty",
        }
    }
}

impl fmt::Display for ChainVerdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
