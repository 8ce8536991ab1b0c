//! Security scanning
//!
//! Structural checks over the stored object: executable and archive magic
//! bytes, declared-type/container mismatches, the EICAR test string, and
//! size anomalies. High or critical results quarantine the object (copy to
//! the quarantine prefix, delete the original) before anything downstream
//! touches it.

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use hlekkr_core::{MediaKind, ObjectLocation, PipelineError, Severity};
use hlekkr_extract::probe::parse_image_header;
use hlekkr_persist::ObjectStore;

const SCAN_WINDOW_BYTES: u64 = 64 * 1024;
const EICAR: &[u8] = b"X5O!P%@AP[4\\PZX54(P^)7CC)7}$EICAR-STANDARD-ANTIVIRUS-TEST-FILE!$H+H*";

/// One detected threat.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanFinding {
    #[serde(rename = "type")]
    pub finding_type: String,
    pub description: String,
    pub severity: Severity,
}

/// Scan outcome for one object.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanResult {
    pub media_id: String,
    pub threat_detected: bool,
    /// Highest finding severity, when any
    pub threat_level: Option<Severity>,
    pub threats: Vec<ScanFinding>,
    pub quarantined_to: Option<String>,
}

impl ScanResult {
    pub fn requires_quarantine(&self) -> bool {
        self.threat_level
            .is_some_and(|level| level >= Severity::High)
    }
}

/// The scanner.
#[derive(Debug)]
pub struct SecurityScanner {
    objects: Arc<dyn ObjectStore>,
}

impl SecurityScanner {
    pub fn new(objects: Arc<dyn ObjectStore>) -> Self {
        Self { objects }
    }

    /// Scan one object; quarantines on high/critical findings.
    pub async fn scan(
        &self,
        media_id: &str,
        location: &ObjectLocation,
    ) -> Result<ScanResult, PipelineError> {
        let head = self
            .objects
            .head(&location.bucket, &location.key)
            .await
            .map_err(PipelineError::from)?;
        let window = self
            .objects
            .get_range(&location.bucket, &location.key, 0..SCAN_WINDOW_BYTES)
            .await
            .map_err(PipelineError::from)?;

        let mut threats = Vec::new();

        if head.size == 0 {
            threats.push(ScanFinding {
                finding_type: "empty_object".to_string(),
                description: "Object has zero length".to_string(),
                severity: Severity::Medium,
            });
        }

        if let Some(kind) = executable_kind(&window) {
            threats.push(ScanFinding {
                finding_type: "executable_content".to_string(),
                description: format!("Object carries {kind} executable signature"),
                severity: Severity::Critical,
            });
        }

        if let Some(kind) = archive_kind(&window) {
            threats.push(ScanFinding {
                finding_type: "embedded_archive".to_string(),
                description: format!("Object carries {kind} archive signature"),
                severity: Severity::High,
            });
        }

        if window
            .windows(EICAR.len())
            .any(|candidate| candidate == EICAR)
        {
            threats.push(ScanFinding {
                finding_type: "test_signature".to_string(),
                description: "EICAR test signature present".to_string(),
                severity: Severity::Critical,
            });
        }

        // Declared image type must match the container header
        if MediaKind::from_key(&location.key) == MediaKind::Image && !window.is_empty() {
            match parse_image_header(&window) {
                Some((format, _)) => {
                    if let Some(declared) = &head.content_type {
                        if declared.starts_with("image/") && !declared.contains(format) {
                            threats.push(ScanFinding {
                                finding_type: "content_type_mismatch".to_string(),
                                description: format!(
                                    "Declared {declared} but container parses as {format}"
                                ),
                                severity: Severity::Medium,
                            });
                        }
                    }
                }
                None => {
                    threats.push(ScanFinding {
                        finding_type: "polyglot_suspect".to_string(),
                        description: "Image extension with unrecognizable container header"
                            .to_string(),
                        severity: Severity::Medium,
                    });
                }
            }
        }

        let threat_level = threats.iter().map(|t| t.severity).max();
        let mut result = ScanResult {
            media_id: media_id.to_string(),
            threat_detected: !threats.is_empty(),
            threat_level,
            threats,
            quarantined_to: None,
        };

        if result.requires_quarantine() {
            result.quarantined_to = Some(self.quarantine(media_id, location).await?);
        }

        tracing::info!(
            media_id,
            threats = result.threats.len(),
            level = result.threat_level.map(|l| l.as_str()).unwrap_or("none"),
            quarantined = result.quarantined_to.is_some(),
            "security scan completed"
        );
        Ok(result)
    }

    async fn quarantine(
        &self,
        media_id: &str,
        location: &ObjectLocation,
    ) -> Result<String, PipelineError> {
        let destination = format!("quarantine/{media_id}/{}", location.basename());
        self.objects
            .copy(&location.bucket, &location.key, &location.bucket, &destination)
            .await
            .map_err(PipelineError::from)?;
        self.objects
            .delete(&location.bucket, &location.key)
            .await
            .map_err(PipelineError::from)?;
        tracing::warn!(media_id, destination = %destination, "object quarantined");
        Ok(destination)
    }
}

fn executable_kind(window: &[u8]) -> Option<&'static str> {
    if window.starts_with(b"MZ") {
        return Some("PE");
    }
    if window.starts_with(b"\x7fELF") {
        return Some("ELF");
    }
    if window.starts_with(b"#!") {
        return Some("script");
    }
    if window.starts_with(&[0xCF, 0xFA, 0xED, 0xFE]) || window.starts_with(&[0xFE, 0xED, 0xFA, 0xCE])
    {
        return Some("Mach-O");
    }
    None
}

fn archive_kind(window: &[u8]) -> Option<&'static str> {
    if window.starts_with(b"PK\x03\x04") {
        return Some("zip");
    }
    if window.starts_with(b"Rar!") {
        return Some("rar");
    }
    if window.starts_with(b"7z\xBC\xAF\x27\x1C") {
        return Some("7z");
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use hlekkr_persist::MemoryObjectStore;

    fn png_bytes() -> Vec<u8> {
        let mut bytes = vec![0x89, b'P', b'N', b'G', b'\r', b'\n', 0x1a, b'\n'];
        bytes.extend_from_slice(&13u32.to_be_bytes());
        bytes.extend_from_slice(b"IHDR");
        bytes.extend_from_slice(&8u32.to_be_bytes());
        bytes.extend_from_slice(&8u32.to_be_bytes());
        bytes.extend_from_slice(&[8, 6, 0, 0, 0]);
        bytes
    }

    async fn scanner_with(key: &str, body: Vec<u8>, content_type: &str) -> (SecurityScanner, Arc<MemoryObjectStore>, ObjectLocation) {
        let store = Arc::new(MemoryObjectStore::new());
        store.put("media", key, body, Some(content_type)).await.unwrap();
        (
            SecurityScanner::new(store.clone()),
            store,
            ObjectLocation::new("media", key),
        )
    }

    #[tokio::test]
    async fn test_clean_image_passes() {
        let (scanner, _, location) = scanner_with("a.png", png_bytes(), "image/png").await;
        let result = scanner.scan("m1", &location).await.unwrap();
        assert!(!result.threat_detected);
        assert!(result.quarantined_to.is_none());
    }

    #[tokio::test]
    async fn test_executable_is_quarantined() {
        let mut body = b"MZ".to_vec();
        body.extend_from_slice(&[0u8; 128]);
        let (scanner, store, location) = scanner_with("a.png", body, "image/png").await;

        let result = scanner.scan("m1", &location).await.unwrap();
        assert!(result.threat_detected);
        assert_eq!(result.threat_level, Some(Severity::Critical));
        let quarantined_to = result.quarantined_to.unwrap();
        assert!(quarantined_to.starts_with("quarantine/m1/"));

        // Original gone, quarantine copy present
        assert!(store.head("media", "a.png").await.is_err());
        assert!(store.head("media", &quarantined_to).await.is_ok());
    }

    #[tokio::test]
    async fn test_eicar_detected() {
        let (scanner, _, location) =
            scanner_with("sample.mp4", EICAR.to_vec(), "video/mp4").await;
        let result = scanner.scan("m1", &location).await.unwrap();
        assert!(result
            .threats
            .iter()
            .any(|t| t.finding_type == "test_signature"));
    }

    #[tokio::test]
    async fn test_polyglot_image_flagged_without_quarantine() {
        let (scanner, store, location) =
            scanner_with("fake.png", vec![0u8; 64], "image/png").await;
        let result = scanner.scan("m1", &location).await.unwrap();
        assert!(result
            .threats
            .iter()
            .any(|t| t.finding_type == "polyglot_suspect"));
        assert!(!result.requires_quarantine());
        assert!(store.head("media", "fake.png").await.is_ok());
    }

    #[tokio::test]
    async fn test_zip_in_image_high() {
        let mut body = b"PK\x03\x04".to_vec();
        body.extend_from_slice(&[0u8; 64]);
        let (scanner, _, location) = scanner_with("a.jpg", body, "image/jpeg").await;
        let result = scanner.scan("m1", &location).await.unwrap();
        assert_eq!(result.threat_level, Some(Severity::High));
        assert!(result.quarantined_to.is_some());
    }
}
