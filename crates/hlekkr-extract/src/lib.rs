//! # Hlekkr Extract
//!
//! Metadata extraction: surfaces the object store's head metadata, infers
//! the media kind from the key, and dispatches to a kind-specific probe.
//! Image probing parses container headers deterministically from ranged
//! byte reads; video and audio probing sit behind the same [`MediaProber`]
//! seam so deployments can plug in a real demuxer. Extraction failures are
//! recorded with `extractionFailed: true` and never abort the stage.

pub mod extractor;
pub mod probe;

pub use extractor::{ExtractedMetadata, MetadataExtractor, TechnicalMetadata};
pub use probe::{HeaderProber, ImageDimensions, MediaProber, ProbeOutcome};
