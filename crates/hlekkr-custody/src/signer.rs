//! Integrity proof signing
//!
//! The signing key is derived once per process from an external key
//! management service; deployments without one fall back to a configured
//! static secret, which is refused in production mode.

use async_trait::async_trait;
use chrono::Utc;
use ring::hmac;
use zeroize::Zeroizing;

use hlekkr_core::PipelineError;

use crate::types::{CustodyEvent, IntegrityProof, IntegrityStatus};

/// Source of signing key material. Implementations wrap a KMS data-key
/// derivation or, for development, a configured secret.
#[async_trait]
pub trait KeySource: Send + Sync {
    /// Identifier recorded in proofs (key id or alias)
    fn key_id(&self) -> &str;

    /// Whether this source is acceptable in production
    fn production_grade(&self) -> bool;

    /// Derive the raw signing key bytes. Called once per process.
    async fn derive_key(&self) -> Result<Zeroizing<Vec<u8>>, PipelineError>;
}

/// Static secret key source for development and tests.
pub struct StaticKeySource {
    secret: Zeroizing<Vec<u8>>,
}

impl StaticKeySource {
    pub fn new(secret: &[u8]) -> Self {
        Self {
            secret: Zeroizing::new(secret.to_vec()),
        }
    }
}

#[async_trait]
impl KeySource for StaticKeySource {
    fn key_id(&self) -> &str {
        "static-dev-key"
    }

    fn production_grade(&self) -> bool {
        false
    }

    async fn derive_key(&self) -> Result<Zeroizing<Vec<u8>>, PipelineError> {
        if self.secret.is_empty() {
            return Err(PipelineError::SignatureError(
                "static signing secret is empty".to_string(),
            ));
        }
        Ok(self.secret.clone())
    }
}

/// Process-local signer holding the derived HMAC key.
///
/// Read-mostly after initialization; clone the struct freely, the key is
/// shared behind `ring`'s internal representation.
#[derive(Clone)]
pub struct CustodySigner {
    key: hmac::Key,
    key_id: String,
}

impl std::fmt::Debug for CustodySigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CustodySigner")
            .field("key_id", &self.key_id)
            .finish_non_exhaustive()
    }
}

impl CustodySigner {
    /// Derive the signing key once from the given source.
    pub async fn initialize(source: &dyn KeySource) -> Result<Self, PipelineError> {
        let material = source.derive_key().await?;
        Ok(Self {
            key: hmac::Key::new(hmac::HMAC_SHA256, &material),
            key_id: source.key_id().to_string(),
        })
    }

    /// Initialize for production: refuses non-production key sources.
    pub async fn initialize_production(source: &dyn KeySource) -> Result<Self, PipelineError> {
        if !source.production_grade() {
            return Err(PipelineError::SignatureError(format!(
                "key source {} is not production grade",
                source.key_id()
            )));
        }
        Self::initialize(source).await
    }

    fn canonical_bytes(event: &CustodyEvent) -> Result<Vec<u8>, PipelineError> {
        let signable = event.signable();
        serde_jcs::to_vec(&signable)
            .map_err(|e| PipelineError::SignatureError(format!("canonical serialization: {e}")))
    }

    /// Event hash: SHA-256 over the canonical signable form.
    pub fn event_hash(event: &CustodyEvent) -> Result<String, PipelineError> {
        let bytes = Self::canonical_bytes(event)?;
        Ok(hlekkr_core::Hash::digest(&bytes).to_hex())
    }

    /// Produce an integrity proof for the event. A signing failure yields an
    /// UNKNOWN-status proof rather than an error so the chain append still
    /// records what happened.
    pub fn prove(&self, event: &CustodyEvent) -> IntegrityProof {
        match Self::canonical_bytes(event) {
            Ok(bytes) => {
                let tag = hmac::sign(&self.key, &bytes);
                IntegrityProof {
                    content_hash: hlekkr_core::Hash::digest(&bytes).to_hex(),
                    signature: hex::encode(tag.as_ref()),
                    timestamp: Utc::now(),
                    key_id: self.key_id.clone(),
                    algorithm: "HMAC-SHA256".to_string(),
                    verification_status: IntegrityStatus::Verified,
                }
            }
            Err(e) => {
                tracing::error!(error = %e, event_id = %event.event_id, "integrity proof generation failed");
                IntegrityProof::unknown()
            }
        }
    }

    /// Verify an event's integrity proof in constant time.
    pub fn verify(&self, event: &CustodyEvent) -> bool {
        let Some(proof) = &event.integrity_proof else {
            return false;
        };
        if proof.verification_status == IntegrityStatus::Unknown || proof.signature.is_empty() {
            return false;
        }
        let Ok(bytes) = Self::canonical_bytes(event) else {
            return false;
        };
        let Ok(tag) = hex::decode(&proof.signature) else {
            return false;
        };
        hmac::verify(&self.key, &bytes, &tag).is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hlekkr_core::ProcessingStage;
    use serde_json::json;

    fn sample_event() -> CustodyEvent {
        CustodyEvent {
            event_id: "evt-1".to_string(),
            media_id: "media-1".to_string(),
            stage: ProcessingStage::SecurityScan,
            timestamp: Utc::now(),
            actor: "security_scanner".to_string(),
            action: "scan_completed".to_string(),
            input_hash: None,
            output_hash: Some("abc".to_string()),
            transformation_details: json!({}),
            metadata: json!({"threatDetected": false}),
            previous_event_hash: None,
            integrity_proof: None,
            event_hash: String::new(),
        }
    }

    #[tokio::test]
    async fn test_sign_then_verify() {
        let signer = CustodySigner::initialize(&StaticKeySource::new(b"secret"))
            .await
            .unwrap();
        let mut event = sample_event();
        event.integrity_proof = Some(signer.prove(&event));
        assert!(signer.verify(&event));
    }

    #[tokio::test]
    async fn test_resigning_is_bit_exact() {
        let signer = CustodySigner::initialize(&StaticKeySource::new(b"secret"))
            .await
            .unwrap();
        let mut event = sample_event();
        event.integrity_proof = Some(signer.prove(&event));
        let first = event.integrity_proof.clone().unwrap();
        let second = signer.prove(&event);
        assert_eq!(first.signature, second.signature);
    }

    #[tokio::test]
    async fn test_tampered_event_fails_verification() {
        let signer = CustodySigner::initialize(&StaticKeySource::new(b"secret"))
            .await
            .unwrap();
        let mut event = sample_event();
        event.integrity_proof = Some(signer.prove(&event));
        event.action = "scan_skipped".to_string();
        assert!(!signer.verify(&event));
    }

    #[tokio::test]
    async fn test_wrong_key_fails_verification() {
        let signer_a = CustodySigner::initialize(&StaticKeySource::new(b"key-a"))
            .await
            .unwrap();
        let signer_b = CustodySigner::initialize(&StaticKeySource::new(b"key-b"))
            .await
            .unwrap();
        let mut event = sample_event();
        event.integrity_proof = Some(signer_a.prove(&event));
        assert!(!signer_b.verify(&event));
    }

    #[tokio::test]
    async fn test_production_refuses_static_source() {
        let result = CustodySigner::initialize_production(&StaticKeySource::new(b"x")).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_empty_secret_rejected() {
        let result = CustodySigner::initialize(&StaticKeySource::new(b"")).await;
        assert!(result.is_err());
    }
}
