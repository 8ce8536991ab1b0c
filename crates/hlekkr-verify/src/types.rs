//! Source verification types

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Claimed source details accompanying an upload.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SourceInfo {
    pub url: Option<String>,
    pub domain: Option<String>,
    pub title: Option<String>,
    pub author: Option<String>,
    pub publication_date: Option<String>,
}

impl SourceInfo {
    /// Extract the host from a URL, stripping any `www.` prefix.
    pub fn extract_domain(url: &str) -> Option<String> {
        let without_scheme = url
            .strip_prefix("https://")
            .or_else(|| url.strip_prefix("http://"))?;
        let host = without_scheme
            .split(['/', '?', '#'])
            .next()?
            .split('@')
            .next_back()?
            .split(':')
            .next()?;
        if host.is_empty() {
            return None;
        }
        Some(
            host.strip_prefix("www.")
                .unwrap_or(host)
                .to_ascii_lowercase(),
        )
    }

    /// Fill the domain from the URL when absent.
    pub fn normalized(mut self) -> Self {
        if self.domain.is_none() {
            if let Some(url) = &self.url {
                self.domain = Self::extract_domain(url);
            }
        }
        self
    }
}

/// Verification status bucketed from the composite score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationStatus {
    Verified,
    LikelyVerified,
    Unverified,
    Suspicious,
    LikelyFake,
    Error,
}

impl VerificationStatus {
    /// Bucket a composite score into a status.
    pub fn from_score(score: f64) -> Self {
        if score >= 80.0 {
            Self::Verified
        } else if score >= 60.0 {
            Self::LikelyVerified
        } else if score >= 40.0 {
            Self::Unverified
        } else if score >= 20.0 {
            Self::Suspicious
        } else {
            Self::LikelyFake
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Verified => "verified",
            Self::LikelyVerified => "likely_verified",
            Self::Unverified => "unverified",
            Self::Suspicious => "suspicious",
            Self::LikelyFake => "likely_fake",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for VerificationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Full verification result persisted for one media item.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceVerification {
    pub media_id: String,
    pub url: Option<String>,
    pub domain: Option<String>,
    pub status: VerificationStatus,
    /// 0..100
    pub reputation_score: f64,
    /// 0..1, grows with subcheck availability
    pub confidence: f64,
    pub methods: Vec<String>,
    pub external_sources: Vec<String>,
    pub discrepancies: Vec<String>,
    pub component_scores: HashMap<String, f64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_domain() {
        assert_eq!(
            SourceInfo::extract_domain("https://www.reuters.com/article/x?y=1"),
            Some("reuters.com".to_string())
        );
        assert_eq!(
            SourceInfo::extract_domain("http://Example.COM:8080/path"),
            Some("example.com".to_string())
        );
        assert_eq!(SourceInfo::extract_domain("ftp://reuters.com"), None);
        assert_eq!(SourceInfo::extract_domain("https://"), None);
    }

    #[test]
    fn test_status_buckets() {
        assert_eq!(VerificationStatus::from_score(85.0), VerificationStatus::Verified);
        assert_eq!(VerificationStatus::from_score(60.0), VerificationStatus::LikelyVerified);
        assert_eq!(VerificationStatus::from_score(45.0), VerificationStatus::Unverified);
        assert_eq!(VerificationStatus::from_score(25.0), VerificationStatus::Suspicious);
        assert_eq!(VerificationStatus::from_score(5.0), VerificationStatus::LikelyFake);
    }

    #[test]
    fn test_normalized_fills_domain() {
        let info = SourceInfo {
            url: Some("https://www.bbc.com/news/1".to_string()),
            ..Default::default()
        }
        .normalized();
        assert_eq!(info.domain.as_deref(), Some("bbc.com"));
    }
}
