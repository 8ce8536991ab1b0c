//! Domain reputation
//!
//! Seed lists ship in-process and refresh from configuration; they are
//! read-mostly caches, never fetched on the hot path. Registration and TLS
//! intel comes through [`DomainIntel`] so deployments can wire WHOIS/CT
//! feeds without touching the scorer.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::RwLock;

/// Domain registration and TLS facts for reputation adjustment.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DomainFacts {
    pub age_days: Option<i64>,
    pub ssl_valid: Option<bool>,
}

/// Intel provider seam.
#[async_trait]
pub trait DomainIntel: Send + Sync + std::fmt::Debug {
    async fn lookup(&self, domain: &str) -> DomainFacts;
}

/// Static intel provider: returns the same facts for every domain. Used in
/// tests and in deployments without WHOIS/CT feeds.
#[derive(Debug, Clone, Default)]
pub struct StaticDomainIntel {
    pub facts: DomainFacts,
}

#[async_trait]
impl DomainIntel for StaticDomainIntel {
    async fn lookup(&self, _domain: &str) -> DomainFacts {
        self.facts.clone()
    }
}

/// Reputation assessment for one domain.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DomainReputation {
    pub domain: String,
    /// 0..100
    pub score: f64,
    pub status: String,
    pub sources: Vec<String>,
    pub categories: Vec<String>,
    pub risk_factors: Vec<String>,
}

/// Trusted/suspicious domain lists, refreshable without a restart.
#[derive(Debug)]
pub struct ReputationList {
    trusted: RwLock<HashSet<String>>,
    suspicious: RwLock<HashSet<String>>,
}

impl Default for ReputationList {
    fn default() -> Self {
        Self::with_seeds()
    }
}

impl ReputationList {
    /// The seed lists; production refreshes from configuration on a timer.
    pub fn with_seeds() -> Self {
        let trusted = [
            "reuters.com",
            "ap.org",
            "bbc.com",
            "cnn.com",
            "nytimes.com",
            "washingtonpost.com",
            "theguardian.com",
            "npr.org",
            "pbs.org",
            "abcnews.go.com",
            "cbsnews.com",
            "nbcnews.com",
            "usatoday.com",
            "wsj.com",
            "bloomberg.com",
            "economist.com",
            "time.com",
            "newsweek.com",
            "politico.com",
            "axios.com",
        ];
        let suspicious = [
            "fakenews.com",
            "clickbait.net",
            "conspiracy.org",
            "misinformation.info",
            "propaganda.news",
        ];
        Self {
            trusted: RwLock::new(trusted.iter().map(|s| s.to_string()).collect()),
            suspicious: RwLock::new(suspicious.iter().map(|s| s.to_string()).collect()),
        }
    }

    pub fn is_trusted(&self, domain: &str) -> bool {
        self.trusted
            .read()
            .map(|set| set.contains(domain))
            .unwrap_or(false)
    }

    pub fn is_suspicious(&self, domain: &str) -> bool {
        self.suspicious
            .read()
            .map(|set| set.contains(domain))
            .unwrap_or(false)
    }

    /// Replace both lists atomically (configuration refresh).
    pub fn refresh(&self, trusted: HashSet<String>, suspicious: HashSet<String>) {
        if let Ok(mut set) = self.trusted.write() {
            *set = trusted;
        }
        if let Ok(mut set) = self.suspicious.write() {
            *set = suspicious;
        }
    }

    /// Score a domain: list hits dominate; unknown domains start neutral and
    /// shift with registration age and TLS validity.
    pub async fn check(&self, domain: &str, intel: &dyn DomainIntel) -> DomainReputation {
        if self.is_trusted(domain) {
            return DomainReputation {
                domain: domain.to_string(),
                score: 90.0,
                status: "trusted".to_string(),
                sources: vec!["trusted_domain_list".to_string()],
                categories: vec!["news".to_string(), "verified_publisher".to_string()],
                risk_factors: Vec::new(),
            };
        }
        if self.is_suspicious(domain) {
            return DomainReputation {
                domain: domain.to_string(),
                score: 10.0,
                status: "suspicious".to_string(),
                sources: vec!["suspicious_domain_list".to_string()],
                categories: vec!["misinformation".to_string(), "unverified".to_string()],
                risk_factors: vec!["known_misinformation_source".to_string()],
            };
        }

        let mut score = 50.0;
        let mut sources = Vec::new();
        let mut risk_factors = Vec::new();
        let facts = intel.lookup(domain).await;

        if let Some(age_days) = facts.age_days {
            sources.push("domain_registration".to_string());
            if age_days < 30 {
                score -= 10.0;
                risk_factors.push("very_new_domain".to_string());
            } else if age_days < 365 {
                score -= 5.0;
                risk_factors.push("new_domain".to_string());
            }
        }
        if let Some(valid) = facts.ssl_valid {
            sources.push("ssl_certificate".to_string());
            if valid {
                score += 5.0;
            } else {
                score -= 10.0;
                risk_factors.push("invalid_ssl".to_string());
            }
        }

        let status = if score >= 80.0 {
            "trusted"
        } else if score >= 60.0 {
            "likely_trusted"
        } else if score >= 40.0 {
            "neutral"
        } else if score >= 20.0 {
            "suspicious"
        } else {
            "untrusted"
        };

        DomainReputation {
            domain: domain.to_string(),
            score,
            status: status.to_string(),
            sources,
            categories: Vec::new(),
            risk_factors,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_trusted_hit() {
        let list = ReputationList::with_seeds();
        let rep = list.check("reuters.com", &StaticDomainIntel::default()).await;
        assert_eq!(rep.score, 90.0);
        assert_eq!(rep.status, "trusted");
    }

    #[tokio::test]
    async fn test_suspicious_hit() {
        let list = ReputationList::with_seeds();
        let rep = list
            .check("fakenews.com", &StaticDomainIntel::default())
            .await;
        assert_eq!(rep.score, 10.0);
        assert!(rep.risk_factors.contains(&"known_misinformation_source".to_string()));
    }

    #[tokio::test]
    async fn test_unknown_domain_adjustments() {
        let list = ReputationList::with_seeds();
        let intel = StaticDomainIntel {
            facts: DomainFacts {
                age_days: Some(10),
                ssl_valid: Some(false),
            },
        };
        let rep = list.check("brand-new.example", &intel).await;
        // 50 - 10 (new) - 10 (ssl) = 30
        assert_eq!(rep.score, 30.0);
        assert_eq!(rep.status, "suspicious");
    }

    #[tokio::test]
    async fn test_refresh_replaces_lists() {
        let list = ReputationList::with_seeds();
        list.refresh(
            ["newsite.example".to_string()].into_iter().collect(),
            HashSet::new(),
        );
        assert!(list.is_trusted("newsite.example"));
        assert!(!list.is_trusted("reuters.com"));
    }

    #[tokio::test]
    async fn test_aged_domain_with_valid_ssl() {
        let list = ReputationList::with_seeds();
        let intel = StaticDomainIntel {
            facts: DomainFacts {
                age_days: Some(3000),
                ssl_valid: Some(true),
            },
        };
        let rep = list.check("old-blog.example", &intel).await;
        assert_eq!(rep.score, 55.0);
        assert_eq!(rep.status, "neutral");
    }
}
