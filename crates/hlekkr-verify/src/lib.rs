//! # Hlekkr Verify
//!
//! Source verification: a pipeline of weighted subchecks over the claimed
//! source of a media item — domain reputation, URL accessibility, content
//! consistency, external cross-reference, and metadata validation — fused
//! into a composite reputation score and verification status.

pub mod consistency;
pub mod fetch;
pub mod reputation;
pub mod types;
pub mod verifier;

pub use fetch::{FetchedContent, ReqwestFetcher, StaticFetcher, UrlFetcher, UrlProbe};
pub use reputation::{DomainIntel, ReputationList, StaticDomainIntel};
pub use types::{SourceInfo, SourceVerification, VerificationStatus};
pub use verifier::{CrossReferencer, NoCrossReferencer, SourceVerifier};
