//! The source verifier
//!
//! Runs every subcheck that has input available, fuses the scores with
//! fixed weights, and buckets the composite into a verification status.
//! Confidence grows with subcheck availability: `min(1, n/5)`.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

use hlekkr_core::PipelineError;

use crate::consistency::{self, ConsistencyOutcome};
use crate::fetch::UrlFetcher;
use crate::reputation::{DomainIntel, ReputationList};
use crate::types::{SourceInfo, SourceVerification, VerificationStatus};

const WEIGHT_DOMAIN: f64 = 0.30;
const WEIGHT_URL: f64 = 0.20;
const WEIGHT_CONTENT: f64 = 0.25;
const WEIGHT_EXTERNAL: f64 = 0.15;
const WEIGHT_METADATA: f64 = 0.10;

/// Cross-reference result from external databases.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExternalReference {
    pub sources: Vec<String>,
    /// 0..100
    pub verification_score: Option<f64>,
}

/// Seam for fact-check databases and news aggregators; the default
/// implementation reports no external coverage.
#[async_trait::async_trait]
pub trait CrossReferencer: Send + Sync + std::fmt::Debug {
    async fn cross_reference(&self, info: &SourceInfo) -> ExternalReference;
}

/// No-op cross-referencer.
#[derive(Debug, Default)]
pub struct NoCrossReferencer;

#[async_trait::async_trait]
impl CrossReferencer for NoCrossReferencer {
    async fn cross_reference(&self, _info: &SourceInfo) -> ExternalReference {
        ExternalReference::default()
    }
}

/// The verifier.
#[derive(Debug)]
pub struct SourceVerifier {
    reputation: Arc<ReputationList>,
    intel: Arc<dyn DomainIntel>,
    fetcher: Arc<dyn UrlFetcher>,
    cross_referencer: Arc<dyn CrossReferencer>,
}

impl SourceVerifier {
    pub fn new(
        reputation: Arc<ReputationList>,
        intel: Arc<dyn DomainIntel>,
        fetcher: Arc<dyn UrlFetcher>,
        cross_referencer: Arc<dyn CrossReferencer>,
    ) -> Self {
        Self {
            reputation,
            intel,
            fetcher,
            cross_referencer,
        }
    }

    /// Verify the claimed source of one media item.
    pub async fn verify(
        &self,
        media_id: &str,
        info: SourceInfo,
    ) -> Result<SourceVerification, PipelineError> {
        let info = info.normalized();
        if info.url.is_none() && info.domain.is_none() {
            return Err(PipelineError::input_invalid(
                "source verification requires a url or domain",
            ));
        }

        let mut methods = Vec::new();
        let mut discrepancies = Vec::new();
        let mut scores: Vec<(f64, f64)> = Vec::new();
        let mut component_scores = HashMap::new();
        let mut external_sources = Vec::new();

        // Domain reputation (30%)
        if let Some(domain) = &info.domain {
            let reputation = self.reputation.check(domain, self.intel.as_ref()).await;
            methods.push("domain_reputation".to_string());
            if reputation.status == "suspicious" || reputation.status == "untrusted" {
                discrepancies.push(format!("Domain reputation: {}", reputation.status));
            }
            scores.push((reputation.score, WEIGHT_DOMAIN));
            component_scores.insert("domainReputation".to_string(), reputation.score);
        }

        // URL accessibility (20%)
        if let Some(url) = &info.url {
            let probe = self.fetcher.probe(url).await;
            methods.push("url_accessibility".to_string());
            let score = if probe.accessible { 80.0 } else { 20.0 };
            if !probe.accessible {
                discrepancies.push("URL not accessible".to_string());
            }
            scores.push((score, WEIGHT_URL));
            component_scores.insert("urlAccessibility".to_string(), score);
        }

        // Content consistency (25%) — only when the page is reachable and a
        // claim exists to compare against
        if let (Some(url), true) = (
            &info.url,
            info.title.is_some() || info.author.is_some(),
        ) {
            if let Some(content) = self.fetcher.fetch(url).await {
                if content.status_code == 200 {
                    let outcome = consistency::check_consistency(
                        &content.body,
                        info.title.as_deref(),
                        info.author.as_deref(),
                    );
                    methods.push("content_consistency".to_string());
                    let score = outcome.consistency_score * 100.0;
                    if !outcome.consistent {
                        discrepancies.push("Content inconsistency detected".to_string());
                    }
                    scores.push((score, WEIGHT_CONTENT));
                    component_scores.insert("contentConsistency".to_string(), score);
                    self.log_checks(media_id, &outcome);
                }
            }
        }

        // External cross-reference (15%)
        let external = self.cross_referencer.cross_reference(&info).await;
        if let Some(score) = external.verification_score {
            methods.push("external_cross_reference".to_string());
            scores.push((score, WEIGHT_EXTERNAL));
            component_scores.insert("externalVerification".to_string(), score);
            external_sources = external.sources;
        }

        // Metadata validation (10%)
        let metadata_score = Self::validate_metadata(&info, &mut discrepancies);
        methods.push("metadata_validation".to_string());
        scores.push((metadata_score, WEIGHT_METADATA));
        component_scores.insert("metadataValidation".to_string(), metadata_score);

        let (composite, confidence) = Self::fuse(&scores);
        let status = VerificationStatus::from_score(composite);

        tracing::info!(
            media_id,
            domain = info.domain.as_deref().unwrap_or("-"),
            score = composite,
            status = status.as_str(),
            methods = methods.len(),
            "source verification completed"
        );

        Ok(SourceVerification {
            media_id: media_id.to_string(),
            url: info.url,
            domain: info.domain,
            status,
            reputation_score: composite,
            confidence,
            methods,
            external_sources,
            discrepancies,
            component_scores,
        })
    }

    fn log_checks(&self, media_id: &str, outcome: &ConsistencyOutcome) {
        for check in &outcome.checks {
            tracing::debug!(
                media_id,
                field = %check.field,
                similarity = check.similarity,
                consistent = check.consistent,
                "content consistency check"
            );
        }
    }

    /// Structural validation of the claimed source fields.
    fn validate_metadata(info: &SourceInfo, discrepancies: &mut Vec<String>) -> f64 {
        let mut score: f64 = 100.0;

        if info.url.is_none() {
            score -= 20.0;
            discrepancies.push("Missing url".to_string());
        }
        if info.domain.is_none() {
            score -= 20.0;
            discrepancies.push("Missing domain".to_string());
        }
        if let Some(url) = &info.url {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                score -= 10.0;
                discrepancies.push("Invalid URL format".to_string());
            }
            if let (Some(claimed), Some(extracted)) =
                (&info.domain, SourceInfo::extract_domain(url))
            {
                if claimed != &extracted {
                    score -= 15.0;
                    discrepancies.push("Domain mismatch between URL and domain field".to_string());
                }
            }
        }
        if let Some(date) = &info.publication_date {
            let parseable = chrono::DateTime::parse_from_rfc3339(&date.replace('Z', "+00:00"))
                .is_ok()
                || chrono::NaiveDate::parse_from_str(date, "%Y-%m-%d").is_ok();
            if !parseable {
                score -= 5.0;
                discrepancies.push("Invalid publication date format".to_string());
            }
        }

        score.max(0.0)
    }

    /// Weighted average over available subscores; confidence is the
    /// availability fraction.
    fn fuse(scores: &[(f64, f64)]) -> (f64, f64) {
        if scores.is_empty() {
            return (50.0, 0.1);
        }
        let total_weight: f64 = scores.iter().map(|(_, w)| w).sum();
        let composite: f64 = scores
            .iter()
            .map(|(score, weight)| score * weight / total_weight)
            .sum();
        let confidence = (scores.len() as f64 / 5.0).min(1.0);
        (composite.clamp(0.0, 100.0), confidence)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::{FetchedContent, StaticFetcher, UrlProbe};
    use crate::reputation::StaticDomainIntel;

    fn verifier(fetcher: StaticFetcher) -> SourceVerifier {
        SourceVerifier::new(
            Arc::new(ReputationList::with_seeds()),
            Arc::new(StaticDomainIntel::default()),
            Arc::new(fetcher),
            Arc::new(NoCrossReferencer),
        )
    }

    fn accessible_probe() -> UrlProbe {
        UrlProbe {
            accessible: true,
            status_code: Some(200),
            content_type: Some("text/html".to_string()),
            final_url: Some("https://www.reuters.com/article/1".to_string()),
            redirected: false,
            error: None,
        }
    }

    #[tokio::test]
    async fn test_trusted_accessible_consistent_source_verifies() {
        let fetcher = StaticFetcher {
            probe_result: Some(accessible_probe()),
            content: Some(FetchedContent {
                status_code: 200,
                body: "<title>Flood Waters Rise</title>".to_string(),
            }),
        };
        let verification = verifier(fetcher)
            .verify(
                "m1",
                SourceInfo {
                    url: Some("https://www.reuters.com/article/1".to_string()),
                    title: Some("Flood Waters Rise".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(verification.status, VerificationStatus::Verified);
        assert!(verification.reputation_score >= 80.0);
        // domain + url + content + metadata = 4 of 5 checks
        assert!((verification.confidence - 0.8).abs() < 1e-9);
        assert!(verification.discrepancies.is_empty());
    }

    #[tokio::test]
    async fn test_suspicious_domain_flags() {
        let fetcher = StaticFetcher {
            probe_result: Some(UrlProbe::inaccessible("connection refused")),
            content: None,
        };
        let verification = verifier(fetcher)
            .verify(
                "m1",
                SourceInfo {
                    url: Some("https://fakenews.com/story".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert!(matches!(
            verification.status,
            VerificationStatus::Suspicious | VerificationStatus::LikelyFake
        ));
        assert!(verification
            .discrepancies
            .iter()
            .any(|d| d.contains("Domain reputation")));
        assert!(verification
            .discrepancies
            .iter()
            .any(|d| d == "URL not accessible"));
    }

    #[tokio::test]
    async fn test_no_source_info_rejected() {
        let result = verifier(StaticFetcher::default())
            .verify("m1", SourceInfo::default())
            .await;
        assert!(matches!(result, Err(PipelineError::InputInvalid(_))));
    }

    #[tokio::test]
    async fn test_domain_mismatch_penalized() {
        let fetcher = StaticFetcher {
            probe_result: Some(accessible_probe()),
            content: None,
        };
        let verification = verifier(fetcher)
            .verify(
                "m1",
                SourceInfo {
                    url: Some("https://www.reuters.com/article/1".to_string()),
                    domain: Some("othersite.example".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert!(verification
            .discrepancies
            .iter()
            .any(|d| d.contains("Domain mismatch")));
    }

    #[tokio::test]
    async fn test_domain_only_source() {
        let verification = verifier(StaticFetcher::default())
            .verify(
                "m1",
                SourceInfo {
                    domain: Some("bbc.com".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        // domain (90) and metadata (80: missing url) available
        assert_eq!(verification.methods.len(), 2);
        assert!(verification.reputation_score > 80.0);
    }
}
