//! URL probing and content fetching
//!
//! The verifier talks to the network through [`UrlFetcher`] so tests inject
//! canned responses. The reqwest implementation enforces the stage budgets:
//! HEAD probes 10s, content fetches 15s.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// HEAD probe deadline
pub const HEAD_TIMEOUT: Duration = Duration::from_secs(10);
/// Content fetch deadline
pub const FETCH_TIMEOUT: Duration = Duration::from_secs(15);

/// Result of a HEAD probe.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UrlProbe {
    pub accessible: bool,
    pub status_code: Option<u16>,
    pub content_type: Option<String>,
    pub final_url: Option<String>,
    pub redirected: bool,
    pub error: Option<String>,
}

impl UrlProbe {
    pub fn inaccessible(reason: &str) -> Self {
        Self {
            accessible: false,
            status_code: None,
            content_type: None,
            final_url: None,
            redirected: false,
            error: Some(reason.to_string()),
        }
    }
}

/// Result of a content fetch.
#[derive(Debug, Clone)]
pub struct FetchedContent {
    pub status_code: u16,
    pub body: String,
}

/// Network seam for the verifier.
#[async_trait]
pub trait UrlFetcher: Send + Sync + std::fmt::Debug {
    /// HEAD request following redirects.
    async fn probe(&self, url: &str) -> UrlProbe;

    /// GET the page body for consistency checks. `None` when unreachable.
    async fn fetch(&self, url: &str) -> Option<FetchedContent>;
}

/// reqwest-backed fetcher with the stage deadlines applied per call.
#[derive(Debug)]
pub struct ReqwestFetcher {
    client: reqwest::Client,
}

impl ReqwestFetcher {
    pub fn new() -> Result<Self, hlekkr_core::PipelineError> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("hlekkr/", env!("CARGO_PKG_VERSION")))
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()
            .map_err(|e| hlekkr_core::PipelineError::store(format!("http client: {e}")))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl UrlFetcher for ReqwestFetcher {
    async fn probe(&self, url: &str) -> UrlProbe {
        let response = self
            .client
            .head(url)
            .timeout(HEAD_TIMEOUT)
            .send()
            .await;
        match response {
            Ok(response) => {
                let final_url = response.url().to_string();
                UrlProbe {
                    accessible: response.status().is_success(),
                    status_code: Some(response.status().as_u16()),
                    content_type: response
                        .headers()
                        .get(reqwest::header::CONTENT_TYPE)
                        .and_then(|v| v.to_str().ok())
                        .map(str::to_string),
                    redirected: final_url != url,
                    final_url: Some(final_url),
                    error: None,
                }
            }
            Err(e) => {
                tracing::debug!(url, error = %e, "HEAD probe failed");
                UrlProbe::inaccessible(&e.to_string())
            }
        }
    }

    async fn fetch(&self, url: &str) -> Option<FetchedContent> {
        let response = self
            .client
            .get(url)
            .timeout(FETCH_TIMEOUT)
            .send()
            .await
            .ok()?;
        let status_code = response.status().as_u16();
        let body = response.text().await.ok()?;
        Some(FetchedContent { status_code, body })
    }
}

/// Canned fetcher for tests.
#[derive(Debug, Default)]
pub struct StaticFetcher {
    pub probe_result: Option<UrlProbe>,
    pub content: Option<FetchedContent>,
}

#[async_trait]
impl UrlFetcher for StaticFetcher {
    async fn probe(&self, _url: &str) -> UrlProbe {
        self.probe_result
            .clone()
            .unwrap_or_else(|| UrlProbe::inaccessible("no canned probe"))
    }

    async fn fetch(&self, _url: &str) -> Option<FetchedContent> {
        self.content.as_ref().map(|c| FetchedContent {
            status_code: c.status_code,
            body: c.body.clone(),
        })
    }
}
