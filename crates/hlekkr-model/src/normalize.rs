//! Model response normalization
//!
//! Vendor envelopes are expected to contain JSON in the fixed schema below.
//! Models sometimes wrap it in prose or emit malformed JSON; the fallback
//! parser recovers confidence and techniques by regex so the ensemble keeps
//! its structure.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::OnceLock;

/// Five-level certainty a model reports about its own confidence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Certainty {
    VeryLow,
    Low,
    #[default]
    Medium,
    High,
    VeryHigh,
}

impl Certainty {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::VeryLow => "very_low",
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::VeryHigh => "very_high",
        }
    }
}

impl FromStr for Certainty {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "very_low" => Ok(Self::VeryLow),
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            "very_high" => Ok(Self::VeryHigh),
            _ => Err(()),
        }
    }
}

/// Normalized analysis payload every model response reduces to.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct NormalizedAnalysis {
    pub confidence: f64,
    pub techniques: Vec<String>,
    pub certainty: Certainty,
    #[serde(default)]
    pub details: String,
    #[serde(default)]
    pub key_indicators: Vec<String>,
    #[serde(default)]
    pub indicator_confidences: HashMap<String, f64>,
    #[serde(default)]
    pub manipulation_type: Option<String>,
    #[serde(default)]
    pub severity_assessment: Option<String>,
    /// `json` | `fallback_regex` | `error_fallback`
    #[serde(default)]
    pub parsing_method: String,
}

fn confidence_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#""confidence"\s*:\s*([0-9.]+)"#).unwrap())
}

fn techniques_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"(?s)"techniques"\s*:\s*\[(.*?)\]"#).unwrap())
}

fn quoted_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#""([^"]+)""#).unwrap())
}

fn certainty_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#""certainty"\s*:\s*"([^"]+)""#).unwrap())
}

/// Parse a model's response content into the normalized schema.
///
/// Tries strict JSON first (the content may embed the JSON object in prose);
/// falls back to regex extraction tagged `fallback_regex`.
pub fn parse_model_response(content: &str) -> NormalizedAnalysis {
    if let Some(mut parsed) = try_parse_json(content) {
        parsed.confidence = parsed.confidence.clamp(0.0, 1.0);
        parsed.parsing_method = "json".to_string();
        return parsed;
    }
    parse_fallback(content)
}

fn try_parse_json(content: &str) -> Option<NormalizedAnalysis> {
    // Direct parse, then the first top-level JSON object embedded in prose
    if let Ok(parsed) = serde_json::from_str::<NormalizedAnalysis>(content) {
        return Some(parsed);
    }
    let start = content.find('{')?;
    let end = content.rfind('}')?;
    if end <= start {
        return None;
    }
    serde_json::from_str::<NormalizedAnalysis>(&content[start..=end]).ok()
}

fn parse_fallback(content: &str) -> NormalizedAnalysis {
    let confidence = confidence_re()
        .captures(content)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse::<f64>().ok());

    let techniques: Vec<String> = techniques_re()
        .captures(content)
        .and_then(|c| c.get(1))
        .map(|m| {
            quoted_re()
                .captures_iter(m.as_str())
                .map(|c| c[1].to_string())
                .collect()
        })
        .unwrap_or_default();

    let certainty = certainty_re()
        .captures(content)
        .and_then(|c| c.get(1))
        .and_then(|m| Certainty::from_str(m.as_str()).ok());

    match confidence {
        Some(confidence) => NormalizedAnalysis {
            confidence: confidence.clamp(0.0, 1.0),
            techniques,
            certainty: certainty.unwrap_or_default(),
            details: "Parsed from malformed JSON response".to_string(),
            parsing_method: "fallback_regex".to_string(),
            ..Default::default()
        },
        None => {
            tracing::warn!("model response unparseable, returning neutral analysis");
            NormalizedAnalysis {
                confidence: 0.5,
                techniques,
                certainty: Certainty::Low,
                details: "Failed to parse response".to_string(),
                parsing_method: "error_fallback".to_string(),
                ..Default::default()
            }
        }
    }
}
