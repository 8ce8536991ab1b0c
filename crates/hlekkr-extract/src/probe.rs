//! Kind-specific media probing
//!
//! [`HeaderProber`] parses PNG/GIF/JPEG headers from the first bytes of the
//! object; it needs no decoder and is fully deterministic. Deployments with
//! a demuxer capability implement [`MediaProber`] over it for video streams
//! and audio tags.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use hlekkr_core::{MediaKind, ObjectLocation, PipelineError};
use hlekkr_persist::ObjectStore;

/// Pixel dimensions read from an image container header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageDimensions {
    pub width: u32,
    pub height: u32,
}

/// Result of one kind-specific probe.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProbeOutcome {
    /// Method identifier recorded in the audit trail
    pub extraction_method: String,
    /// Container format when recognized (`png`, `jpeg`, `gif`)
    pub format: Option<String>,
    pub dimensions: Option<ImageDimensions>,
    /// Free-form per-kind fields (stream counts, durations, tags)
    pub fields: serde_json::Value,
}

impl ProbeOutcome {
    pub fn unavailable(method: &str) -> Self {
        Self {
            extraction_method: method.to_string(),
            format: None,
            dimensions: None,
            fields: serde_json::json!({}),
        }
    }
}

/// Kind-specific probing seam.
#[async_trait]
pub trait MediaProber: Send + Sync + std::fmt::Debug {
    async fn probe(
        &self,
        location: &ObjectLocation,
        kind: MediaKind,
    ) -> Result<ProbeOutcome, PipelineError>;
}

/// Built-in prober: image header parsing over ranged reads; video and audio
/// report head-only extraction since no demuxer ships with the core.
#[derive(Debug)]
pub struct HeaderProber<S: ObjectStore + ?Sized> {
    store: Arc<S>,
}

impl<S: ObjectStore + ?Sized> HeaderProber<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl<S: ObjectStore + ?Sized> MediaProber for HeaderProber<S> {
    async fn probe(
        &self,
        location: &ObjectLocation,
        kind: MediaKind,
    ) -> Result<ProbeOutcome, PipelineError> {
        match kind {
            MediaKind::Image => {
                let head = self
                    .store
                    .get_range(&location.bucket, &location.key, 0..64 * 1024)
                    .await
                    .map_err(PipelineError::from)?;
                match parse_image_header(&head) {
                    Some((format, dimensions)) => Ok(ProbeOutcome {
                        extraction_method: "header_parse".to_string(),
                        format: Some(format.to_string()),
                        dimensions: Some(dimensions),
                        fields: serde_json::json!({}),
                    }),
                    None => Err(PipelineError::ExtractionFailed(format!(
                        "unrecognized image container for {location}"
                    ))),
                }
            }
            MediaKind::Video => Ok(ProbeOutcome::unavailable("head_only_video")),
            MediaKind::Audio => Ok(ProbeOutcome::unavailable("head_only_audio")),
            MediaKind::Unknown => Ok(ProbeOutcome::unavailable("unknown_kind")),
        }
    }
}

/// Parse PNG/GIF/JPEG dimensions from header bytes.
pub fn parse_image_header(bytes: &[u8]) -> Option<(&'static str, ImageDimensions)> {
    parse_png(bytes)
        .map(|d| ("png", d))
        .or_else(|| parse_gif(bytes).map(|d| ("gif", d)))
        .or_else(|| parse_jpeg(bytes).map(|d| ("jpeg", d)))
}

fn parse_png(bytes: &[u8]) -> Option<ImageDimensions> {
    const SIGNATURE: [u8; 8] = [0x89, b'P', b'N', b'G', b'\r', b'\n', 0x1a, b'\n'];
    if bytes.len() < 24 || bytes[..8] != SIGNATURE || &bytes[12..16] != b"IHDR" {
        return None;
    }
    Some(ImageDimensions {
        width: u32::from_be_bytes(bytes[16..20].try_into().ok()?),
        height: u32::from_be_bytes(bytes[20..24].try_into().ok()?),
    })
}

fn parse_gif(bytes: &[u8]) -> Option<ImageDimensions> {
    if bytes.len() < 10 || (&bytes[..6] != b"GIF87a" && &bytes[..6] != b"GIF89a") {
        return None;
    }
    Some(ImageDimensions {
        width: u16::from_le_bytes(bytes[6..8].try_into().ok()?) as u32,
        height: u16::from_le_bytes(bytes[8..10].try_into().ok()?) as u32,
    })
}

/// Walk JPEG segments to the first frame header (SOFn).
fn parse_jpeg(bytes: &[u8]) -> Option<ImageDimensions> {
    if bytes.len() < 4 || bytes[0] != 0xFF || bytes[1] != 0xD8 {
        return None;
    }
    let mut offset = 2usize;
    while offset + 9 <= bytes.len() {
        if bytes[offset] != 0xFF {
            return None;
        }
        let marker = bytes[offset + 1];
        // Standalone markers without a length field
        if (0xD0..=0xD9).contains(&marker) {
            offset += 2;
            continue;
        }
        let length = u16::from_be_bytes([bytes[offset + 2], bytes[offset + 3]]) as usize;
        if length < 2 {
            return None;
        }
        let is_sof = matches!(marker, 0xC0..=0xCF) && !matches!(marker, 0xC4 | 0xC8 | 0xCC);
        if is_sof {
            if offset + 9 > bytes.len() {
                return None;
            }
            let height = u16::from_be_bytes([bytes[offset + 5], bytes[offset + 6]]) as u32;
            let width = u16::from_be_bytes([bytes[offset + 7], bytes[offset + 8]]) as u32;
            return Some(ImageDimensions { width, height });
        }
        offset += 2 + length;
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use hlekkr_persist::MemoryObjectStore;

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let mut bytes = vec![0x89, b'P', b'N', b'G', b'\r', b'\n', 0x1a, b'\n'];
        bytes.extend_from_slice(&13u32.to_be_bytes());
        bytes.extend_from_slice(b"IHDR");
        bytes.extend_from_slice(&width.to_be_bytes());
        bytes.extend_from_slice(&height.to_be_bytes());
        bytes.extend_from_slice(&[8, 6, 0, 0, 0]);
        bytes
    }

    fn jpeg_bytes(width: u16, height: u16) -> Vec<u8> {
        let mut bytes = vec![0xFF, 0xD8];
        // APP0 segment
        bytes.extend_from_slice(&[0xFF, 0xE0, 0x00, 0x10]);
        bytes.extend_from_slice(&[0u8; 14]);
        // SOF0
        bytes.extend_from_slice(&[0xFF, 0xC0, 0x00, 0x11, 0x08]);
        bytes.extend_from_slice(&height.to_be_bytes());
        bytes.extend_from_slice(&width.to_be_bytes());
        bytes.extend_from_slice(&[0u8; 10]);
        bytes
    }

    #[test]
    fn test_png_dimensions() {
        let bytes = png_bytes(640, 480);
        let (format, dims) = parse_image_header(&bytes).unwrap();
        assert_eq!(format, "png");
        assert_eq!(dims, ImageDimensions { width: 640, height: 480 });
    }

    #[test]
    fn test_gif_dimensions() {
        let mut bytes = b"GIF89a".to_vec();
        bytes.extend_from_slice(&320u16.to_le_bytes());
        bytes.extend_from_slice(&240u16.to_le_bytes());
        let (format, dims) = parse_image_header(&bytes).unwrap();
        assert_eq!(format, "gif");
        assert_eq!(dims, ImageDimensions { width: 320, height: 240 });
    }

    #[test]
    fn test_jpeg_dimensions() {
        let bytes = jpeg_bytes(1920, 1080);
        let (format, dims) = parse_image_header(&bytes).unwrap();
        assert_eq!(format, "jpeg");
        assert_eq!(dims, ImageDimensions { width: 1920, height: 1080 });
    }

    #[test]
    fn test_garbage_rejected() {
        assert!(parse_image_header(b"not an image at all").is_none());
        assert!(parse_image_header(&[]).is_none());
    }

    #[tokio::test]
    async fn test_prober_image_path() {
        let store = Arc::new(MemoryObjectStore::new());
        store
            .put("media", "photo.png", png_bytes(100, 50), Some("image/png"))
            .await
            .unwrap();

        let prober = HeaderProber::new(store);
        let outcome = prober
            .probe(
                &ObjectLocation::new("media", "photo.png"),
                MediaKind::Image,
            )
            .await
            .unwrap();
        assert_eq!(outcome.format.as_deref(), Some("png"));
        assert_eq!(
            outcome.dimensions,
            Some(ImageDimensions { width: 100, height: 50 })
        );
    }

    #[tokio::test]
    async fn test_prober_unrecognized_image_fails_softly() {
        let store = Arc::new(MemoryObjectStore::new());
        store
            .put("media", "fake.png", vec![0u8; 32], Some("image/png"))
            .await
            .unwrap();

        let prober = HeaderProber::new(store);
        let result = prober
            .probe(&ObjectLocation::new("media", "fake.png"), MediaKind::Image)
            .await;
        assert!(matches!(result, Err(PipelineError::ExtractionFailed(_))));
    }

    #[tokio::test]
    async fn test_prober_video_head_only() {
        let store = Arc::new(MemoryObjectStore::new());
        let prober = HeaderProber::new(store);
        let outcome = prober
            .probe(&ObjectLocation::new("media", "clip.mp4"), MediaKind::Video)
            .await
            .unwrap();
        assert_eq!(outcome.extraction_method, "head_only_video");
    }
}
