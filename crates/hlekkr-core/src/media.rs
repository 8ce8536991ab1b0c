//! Media item types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Logical kind of a media item, inferred from its file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    Image,
    Video,
    Audio,
    Unknown,
}

impl MediaKind {
    /// Infer the kind from a file extension (without the dot, any case).
    pub fn from_extension(ext: &str) -> Self {
        match ext.to_ascii_lowercase().as_str() {
            "jpg" | "jpeg" | "png" | "gif" | "bmp" | "webp" | "tiff" => Self::Image,
            "mp4" | "mov" | "avi" | "mkv" | "webm" | "m4v" => Self::Video,
            "mp3" | "wav" | "flac" | "aac" | "ogg" | "m4a" => Self::Audio,
            _ => Self::Unknown,
        }
    }

    /// Infer the kind from an object key's extension.
    pub fn from_key(key: &str) -> Self {
        key.rsplit('.')
            .next()
            .filter(|ext| !ext.contains('/'))
            .map(Self::from_extension)
            .unwrap_or(Self::Unknown)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Image => "image",
            Self::Video => "video",
            Self::Audio => "audio",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A location in the object store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectLocation {
    pub bucket: String,
    pub key: String,
}

impl ObjectLocation {
    pub fn new(bucket: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            key: key.into(),
        }
    }

    /// Last path segment of the key
    pub fn basename(&self) -> &str {
        self.key.rsplit('/').next().unwrap_or(&self.key)
    }
}

impl fmt::Display for ObjectLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.bucket, self.key)
    }
}

/// The unit of work flowing through the pipeline.
///
/// Created once on upload and never mutated; subordinate records (audit
/// events, custody events, score versions) all key off `media_id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaItem {
    pub media_id: String,
    pub location: ObjectLocation,
    pub kind: MediaKind,
    pub uploaded_at: DateTime<Utc>,
}

impl MediaItem {
    pub fn new(media_id: impl Into<String>, location: ObjectLocation) -> Self {
        let kind = MediaKind::from_key(&location.key);
        Self {
            media_id: media_id.into(),
            location,
            kind,
            uploaded_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_from_extension() {
        assert_eq!(MediaKind::from_extension("JPG"), MediaKind::Image);
        assert_eq!(MediaKind::from_extension("mkv"), MediaKind::Video);
        assert_eq!(MediaKind::from_extension("flac"), MediaKind::Audio);
        assert_eq!(MediaKind::from_extension("exe"), MediaKind::Unknown);
    }

    #[test]
    fn test_kind_from_key() {
        assert_eq!(MediaKind::from_key("uploads/2025/clip.mp4"), MediaKind::Video);
        assert_eq!(MediaKind::from_key("no-extension"), MediaKind::Unknown);
        assert_eq!(MediaKind::from_key("dir.with.dots/file"), MediaKind::Unknown);
    }

    #[test]
    fn test_basename() {
        let loc = ObjectLocation::new("media", "uploads/a/b/photo.png");
        assert_eq!(loc.basename(), "photo.png");
    }
}
