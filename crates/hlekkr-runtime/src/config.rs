//! Runtime configuration
//!
//! Layered: built-in defaults, then an optional `hlekkr.toml`, then
//! `HLEKKR_*` environment variables.

use serde::{Deserialize, Serialize};

/// Full runtime configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HlekkrConfig {
    /// Bucket holding uploaded media
    pub media_bucket: String,
    /// Production mode refuses the static signing fallback
    pub production: bool,
    /// Static signing secret for non-production deployments
    pub signing_secret: Option<String>,
    /// Model ids by tier
    pub detailed_model: String,
    pub fast_model: String,
    pub supplementary_model: String,
    /// Composite score below which a human review is opened
    pub review_threshold: f64,
    /// Queue depth beyond which the coordinator degrades (sheds the
    /// supplementary model)
    pub backpressure_queue_depth: usize,
    /// Per-stage deadline in seconds
    pub stage_deadline_secs: u64,
}

impl Default for HlekkrConfig {
    fn default() -> Self {
        Self {
            media_bucket: "hlekkr-media".to_string(),
            production: false,
            signing_secret: None,
            detailed_model: "detail-v2".to_string(),
            fast_model: "fast-v1".to_string(),
            supplementary_model: "supp-v1".to_string(),
            review_threshold: 40.0,
            backpressure_queue_depth: 1000,
            stage_deadline_secs: 300,
        }
    }
}

impl HlekkrConfig {
    /// Load defaults <- hlekkr.toml (optional) <- HLEKKR_* env vars.
    pub fn load() -> Result<Self, hlekkr_core::PipelineError> {
        let settings = ::config::Config::builder()
            .add_source(::config::Config::try_from(&Self::default()).map_err(config_err)?)
            .add_source(::config::File::with_name("hlekkr").required(false))
            .add_source(::config::Environment::with_prefix("HLEKKR"))
            .build()
            .map_err(config_err)?;
        settings.try_deserialize().map_err(config_err)
    }
}

fn config_err(e: ::config::ConfigError) -> hlekkr_core::PipelineError {
    hlekkr_core::PipelineError::input_invalid(format!("configuration: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = HlekkrConfig::default();
        assert_eq!(config.fast_model, "fast-v1");
        assert!(!config.production);
        assert_eq!(config.review_threshold, 40.0);
    }

    #[test]
    fn test_load_without_file_uses_defaults() {
        let config = HlekkrConfig::load().unwrap();
        assert_eq!(config.media_bucket, "hlekkr-media");
    }
}
