//! The metadata extractor

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use hlekkr_core::{MediaKind, ObjectLocation, PipelineError};
use hlekkr_persist::{HeadMetadata, ObjectStore};

use crate::probe::{MediaProber, ProbeOutcome};

/// Kind-specific technical metadata, or the failure record when probing
/// could not complete.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TechnicalMetadata {
    pub extraction_method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub probe: Option<ProbeOutcome>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub extraction_failed: bool,
}

/// Full metadata record for one media item.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractedMetadata {
    pub media_id: String,
    pub location: ObjectLocation,
    pub filename: String,
    pub media_type: MediaKind,
    pub file_size: u64,
    pub content_type: Option<String>,
    pub etag: Option<String>,
    pub last_modified: Option<DateTime<Utc>>,
    pub storage_class: Option<String>,
    pub server_side_encryption: Option<String>,
    pub upload_timestamp: DateTime<Utc>,
    pub technical_metadata: TechnicalMetadata,
}

/// The extractor: head metadata plus kind-specific probing.
#[derive(Debug)]
pub struct MetadataExtractor {
    objects: Arc<dyn ObjectStore>,
    prober: Arc<dyn MediaProber>,
}

impl MetadataExtractor {
    pub fn new(objects: Arc<dyn ObjectStore>, prober: Arc<dyn MediaProber>) -> Self {
        Self { objects, prober }
    }

    /// Extract metadata for one media item. Head-metadata failures surface
    /// as store errors; probe failures are folded into the record with
    /// `extraction_failed: true` so downstream stages can proceed.
    pub async fn extract(
        &self,
        media_id: &str,
        location: &ObjectLocation,
        uploaded_at: DateTime<Utc>,
    ) -> Result<ExtractedMetadata, PipelineError> {
        let head = self
            .objects
            .head(&location.bucket, &location.key)
            .await
            .map_err(PipelineError::from)?;

        let media_type = MediaKind::from_key(&location.key);
        let technical_metadata = self.probe(location, media_type).await;

        Ok(Self::assemble(
            media_id,
            location,
            media_type,
            head,
            uploaded_at,
            technical_metadata,
        ))
    }

    async fn probe(&self, location: &ObjectLocation, kind: MediaKind) -> TechnicalMetadata {
        match self.prober.probe(location, kind).await {
            Ok(probe) => TechnicalMetadata {
                extraction_method: probe.extraction_method.clone(),
                probe: Some(probe),
                error: None,
                extraction_failed: false,
            },
            Err(e) => {
                tracing::warn!(location = %location, error = %e, "technical metadata extraction failed");
                TechnicalMetadata {
                    extraction_method: format!("{}_probe", kind.as_str()),
                    probe: None,
                    error: Some(e.to_string()),
                    extraction_failed: true,
                }
            }
        }
    }

    fn assemble(
        media_id: &str,
        location: &ObjectLocation,
        media_type: MediaKind,
        head: HeadMetadata,
        uploaded_at: DateTime<Utc>,
        technical_metadata: TechnicalMetadata,
    ) -> ExtractedMetadata {
        ExtractedMetadata {
            media_id: media_id.to_string(),
            location: location.clone(),
            filename: location.basename().to_string(),
            media_type,
            file_size: head.size,
            content_type: head.content_type,
            etag: head.etag,
            last_modified: head.last_modified,
            storage_class: head.storage_class,
            server_side_encryption: head.server_side_encryption,
            upload_timestamp: uploaded_at,
            technical_metadata,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::probe::HeaderProber;
    use hlekkr_persist::MemoryObjectStore;

    fn png_bytes() -> Vec<u8> {
        let mut bytes = vec![0x89, b'P', b'N', b'G', b'\r', b'\n', 0x1a, b'\n'];
        bytes.extend_from_slice(&13u32.to_be_bytes());
        bytes.extend_from_slice(b"IHDR");
        bytes.extend_from_slice(&64u32.to_be_bytes());
        bytes.extend_from_slice(&32u32.to_be_bytes());
        bytes.extend_from_slice(&[8, 6, 0, 0, 0]);
        bytes
    }

    async fn extractor_with(
        key: &str,
        body: Vec<u8>,
        content_type: &str,
    ) -> (MetadataExtractor, ObjectLocation) {
        let store = Arc::new(MemoryObjectStore::new());
        store
            .put("media", key, body, Some(content_type))
            .await
            .unwrap();
        let prober = Arc::new(HeaderProber::new(store.clone()));
        (
            MetadataExtractor::new(store, prober),
            ObjectLocation::new("media", key),
        )
    }

    #[tokio::test]
    async fn test_extract_image_with_dimensions() {
        let (extractor, location) = extractor_with("photo.png", png_bytes(), "image/png").await;
        let metadata = extractor
            .extract("m1", &location, Utc::now())
            .await
            .unwrap();

        assert_eq!(metadata.media_type, MediaKind::Image);
        assert_eq!(metadata.filename, "photo.png");
        assert!(!metadata.technical_metadata.extraction_failed);
        let probe = metadata.technical_metadata.probe.unwrap();
        assert_eq!(probe.dimensions.unwrap().width, 64);
    }

    #[tokio::test]
    async fn test_probe_failure_is_non_fatal() {
        let (extractor, location) =
            extractor_with("broken.png", vec![0u8; 16], "image/png").await;
        let metadata = extractor
            .extract("m1", &location, Utc::now())
            .await
            .unwrap();

        assert!(metadata.technical_metadata.extraction_failed);
        assert!(metadata.technical_metadata.error.is_some());
        // Head metadata still surfaced
        assert_eq!(metadata.file_size, 16);
    }

    #[tokio::test]
    async fn test_missing_object_surfaces_store_error() {
        let store = Arc::new(MemoryObjectStore::new());
        let prober = Arc::new(HeaderProber::new(store.clone()));
        let extractor = MetadataExtractor::new(store, prober);

        let result = extractor
            .extract(
                "m1",
                &ObjectLocation::new("media", "missing.png"),
                Utc::now(),
            )
            .await;
        assert!(matches!(result, Err(PipelineError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_video_head_only() {
        let (extractor, location) =
            extractor_with("clip.mp4", vec![1u8; 128], "video/mp4").await;
        let metadata = extractor
            .extract("m1", &location, Utc::now())
            .await
            .unwrap();
        assert_eq!(metadata.media_type, MediaKind::Video);
        assert_eq!(
            metadata.technical_metadata.extraction_method,
            "head_only_video"
        );
    }
}
