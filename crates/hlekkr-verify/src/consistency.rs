//! Content consistency checks
//!
//! Compares claimed title/author against what the fetched page actually
//! carries, using token-set Jaccard similarity.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::OnceLock;

/// One field comparison.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsistencyCheck {
    pub field: String,
    pub provided: String,
    pub found: Option<String>,
    pub similarity: f64,
    pub consistent: bool,
}

/// Outcome over all comparable fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsistencyOutcome {
    pub checks: Vec<ConsistencyCheck>,
    /// Fraction of consistent checks
    pub consistency_score: f64,
    pub consistent: bool,
}

fn title_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)<title[^>]*>([^<]+)</title>").unwrap())
}

fn author_res() -> &'static [Regex; 3] {
    static RES: OnceLock<[Regex; 3]> = OnceLock::new();
    RES.get_or_init(|| {
        [
            Regex::new(r#"(?i)<meta[^>]*name=["']author["'][^>]*content=["']([^"']+)["']"#)
                .unwrap(),
            Regex::new(
                r#"(?i)<meta[^>]*property=["']article:author["'][^>]*content=["']([^"']+)["']"#,
            )
            .unwrap(),
            Regex::new(r#"(?i)<span[^>]*class=["'][^"']*author[^"']*["'][^>]*>([^<]+)</span>"#)
                .unwrap(),
        ]
    })
}

/// Extract the page title.
pub fn extract_title(html: &str) -> Option<String> {
    title_re()
        .captures(html)
        .map(|c| c[1].trim().to_string())
        .filter(|t| !t.is_empty())
}

/// Extract the author from common meta tags and bylines.
pub fn extract_author(html: &str) -> Option<String> {
    author_res()
        .iter()
        .find_map(|re| re.captures(html))
        .map(|c| c[1].trim().to_string())
        .filter(|a| !a.is_empty())
}

/// Token-set Jaccard similarity, case-insensitive.
pub fn text_similarity(a: &str, b: &str) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let tokens_a: HashSet<String> = a.to_lowercase().split_whitespace().map(String::from).collect();
    let tokens_b: HashSet<String> = b.to_lowercase().split_whitespace().map(String::from).collect();
    if tokens_a.is_empty() || tokens_b.is_empty() {
        return 0.0;
    }
    let intersection = tokens_a.intersection(&tokens_b).count();
    let union = tokens_a.union(&tokens_b).count();
    intersection as f64 / union as f64
}

/// Per-field similarity threshold
const FIELD_THRESHOLD: f64 = 0.8;
/// Overall fraction of consistent checks required
const OVERALL_THRESHOLD: f64 = 0.7;

/// Compare claimed fields against page content.
pub fn check_consistency(
    html: &str,
    claimed_title: Option<&str>,
    claimed_author: Option<&str>,
) -> ConsistencyOutcome {
    let mut checks = Vec::new();

    if let Some(title) = claimed_title {
        let found = extract_title(html);
        let similarity = found
            .as_deref()
            .map(|f| text_similarity(title, f))
            .unwrap_or(0.0);
        checks.push(ConsistencyCheck {
            field: "title".to_string(),
            provided: title.to_string(),
            found,
            similarity,
            consistent: similarity >= FIELD_THRESHOLD,
        });
    }

    if let Some(author) = claimed_author {
        let found = extract_author(html);
        let similarity = found
            .as_deref()
            .map(|f| text_similarity(author, f))
            .unwrap_or(0.0);
        checks.push(ConsistencyCheck {
            field: "author".to_string(),
            provided: author.to_string(),
            found,
            similarity,
            consistent: similarity >= FIELD_THRESHOLD,
        });
    }

    let consistency_score = if checks.is_empty() {
        0.5
    } else {
        checks.iter().filter(|c| c.consistent).count() as f64 / checks.len() as f64
    };

    ConsistencyOutcome {
        consistent: consistency_score >= OVERALL_THRESHOLD && !checks.is_empty(),
        consistency_score,
        checks,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"
        <html><head>
        <title>Flood Waters Rise In Coastal Towns</title>
        <meta name="author" content="Jane Smith">
        </head><body></body></html>
    "#;

    #[test]
    fn test_extract_title_and_author() {
        assert_eq!(
            extract_title(PAGE).as_deref(),
            Some("Flood Waters Rise In Coastal Towns")
        );
        assert_eq!(extract_author(PAGE).as_deref(), Some("Jane Smith"));
    }

    #[test]
    fn test_similarity_identical_and_disjoint() {
        assert_eq!(text_similarity("a b c", "A B C"), 1.0);
        assert_eq!(text_similarity("a b", "c d"), 0.0);
        assert_eq!(text_similarity("", "x"), 0.0);
    }

    #[test]
    fn test_consistent_claims() {
        let outcome = check_consistency(
            PAGE,
            Some("Flood Waters Rise in Coastal Towns"),
            Some("Jane Smith"),
        );
        assert!(outcome.consistent);
        assert_eq!(outcome.consistency_score, 1.0);
        assert!(outcome.checks.iter().all(|c| c.consistent));
    }

    #[test]
    fn test_mismatched_title_flags() {
        let outcome = check_consistency(PAGE, Some("Completely Different Headline"), None);
        assert!(!outcome.consistent);
        assert!(!outcome.checks[0].consistent);
    }

    #[test]
    fn test_no_claims_neutral() {
        let outcome = check_consistency(PAGE, None, None);
        assert!(!outcome.consistent);
        assert_eq!(outcome.consistency_score, 0.5);
    }

    #[test]
    fn test_article_author_meta() {
        let html = r#"<meta property="article:author" content="John Doe">"#;
        assert_eq!(extract_author(html).as_deref(), Some("John Doe"));
    }
}
