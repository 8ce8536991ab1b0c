//! Review completion validation
//!
//! Validates a moderator's decision, completes the review under CAS,
//! persists the decision record with its retention TTL, updates moderator
//! statistics, and classifies the outcome as AI feedback. Downstream
//! effects (trust-score recalculation, threat-intel dispatch) are signaled
//! through the returned outcome; the runtime drives them.

use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::Arc;
use uuid::Uuid;

use hlekkr_core::PipelineError;
use hlekkr_persist::{retention, sort_key_ts, DocumentBackend, DocumentExt};

use crate::moderator::ModeratorStore;
use crate::queue::{ReviewItem, ReviewStatus, ReviewStore};

/// The moderator's verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionType {
    Confirm,
    Override,
    Escalate,
    Inconclusive,
}

impl DecisionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Confirm => "confirm",
            Self::Override => "override",
            Self::Escalate => "escalate",
            Self::Inconclusive => "inconclusive",
        }
    }
}

impl FromStr for DecisionType {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "confirm" => Ok(Self::Confirm),
            "override" => Ok(Self::Override),
            "escalate" => Ok(Self::Escalate),
            "inconclusive" => Ok(Self::Inconclusive),
            other => Err(PipelineError::input_invalid(format!(
                "invalid decision type: {other}"
            ))),
        }
    }
}

/// Moderator-reported confidence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfidenceLevel {
    VeryLow,
    Low,
    Medium,
    High,
    VeryHigh,
}

impl ConfidenceLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::VeryLow => "very_low",
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::VeryHigh => "very_high",
        }
    }

    /// Numeric equivalent used by downstream gates (threat extraction,
    /// report generation).
    pub fn score(&self) -> f64 {
        match self {
            Self::VeryLow => 0.2,
            Self::Low => 0.4,
            Self::Medium => 0.6,
            Self::High => 0.8,
            Self::VeryHigh => 0.95,
        }
    }
}

impl FromStr for ConfidenceLevel {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "very_low" => Ok(Self::VeryLow),
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            "very_high" => Ok(Self::VeryHigh),
            other => Err(PipelineError::input_invalid(format!(
                "invalid confidence level: {other}"
            ))),
        }
    }
}

/// Threat level a moderator may attach to a decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThreatLevel {
    None,
    Low,
    Medium,
    High,
    Critical,
}

impl FromStr for ThreatLevel {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "none" => Ok(Self::None),
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            "critical" => Ok(Self::Critical),
            other => Err(PipelineError::input_invalid(format!(
                "invalid threat level: {other}"
            ))),
        }
    }
}

/// Feedback classification emitted to the AI improvement loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedbackType {
    PositiveConfirmation,
    Correction,
    Uncertainty,
    GeneralFeedback,
}

impl FeedbackType {
    fn from_decision(decision_type: DecisionType) -> Self {
        match decision_type {
            DecisionType::Confirm => Self::PositiveConfirmation,
            DecisionType::Override => Self::Correction,
            DecisionType::Escalate => Self::Uncertainty,
            DecisionType::Inconclusive => Self::GeneralFeedback,
        }
    }
}

/// Raw decision submission.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionInput {
    pub decision_type: DecisionType,
    pub confidence_level: ConfidenceLevel,
    pub justification: String,
    pub trust_score_adjustment: Option<f64>,
    pub threat_level: Option<ThreatLevel>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub additional_evidence: Vec<serde_json::Value>,
}

/// Persisted decision record (2-year retention).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Decision {
    pub decision_id: String,
    pub review_id: String,
    pub media_id: String,
    pub moderator_id: String,
    pub decision_type: DecisionType,
    pub confidence_level: ConfidenceLevel,
    pub justification: String,
    pub trust_score_adjustment: Option<f64>,
    pub threat_level: Option<ThreatLevel>,
    pub tags: Vec<String>,
    pub additional_evidence: Vec<serde_json::Value>,
    pub completed_at: chrono::DateTime<chrono::Utc>,
}

/// Outcome of a valid completion; the runtime drives the listed effects.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionOutcome {
    pub decision: Decision,
    pub review: ReviewItem,
    /// Non-blocking consistency warnings
    pub warnings: Vec<String>,
    pub feedback_type: FeedbackType,
    /// Whether threat-intel extraction should run for this decision
    pub threat_eligible: bool,
}

/// Decision record store with a completion-time index backing
/// `recent_decisions` queries.
#[derive(Debug)]
pub struct DecisionStore<B: DocumentBackend + ?Sized> {
    backend: Arc<B>,
}

impl<B: DocumentBackend + ?Sized> DecisionStore<B> {
    pub fn new(backend: Arc<B>) -> Self {
        Self { backend }
    }

    fn key(decision_id: &str) -> String {
        format!("decision:{decision_id}")
    }

    fn time_index_key(decision: &Decision) -> String {
        format!(
            "decision~ts:{}:{}",
            sort_key_ts(decision.completed_at),
            decision.decision_id
        )
    }

    pub async fn put(&self, decision: &Decision) -> Result<(), PipelineError> {
        let expires_at = decision.completed_at + Duration::days(retention::DECISION_DAYS);
        self.backend
            .put_with_ttl(&Self::key(&decision.decision_id), decision, expires_at)
            .await
            .map_err(PipelineError::from)?;
        self.backend
            .put_with_ttl(
                &Self::time_index_key(decision),
                &Self::key(&decision.decision_id),
                expires_at,
            )
            .await
            .map_err(PipelineError::from)
    }

    pub async fn get(&self, decision_id: &str) -> Result<Option<Decision>, PipelineError> {
        self.backend
            .get(&Self::key(decision_id))
            .await
            .map_err(PipelineError::from)
    }

    /// Decisions completed inside a window, ascending, capped at `limit`.
    pub async fn recent(
        &self,
        since: chrono::DateTime<chrono::Utc>,
        until: chrono::DateTime<chrono::Utc>,
        limit: usize,
    ) -> Result<Vec<Decision>, PipelineError> {
        let prefix = "decision~ts:";
        let lower = format!("{prefix}{}", sort_key_ts(since));
        let upper = format!("{prefix}{}", sort_key_ts(until));

        let keys = self
            .backend
            .list_keys(prefix)
            .await
            .map_err(PipelineError::from)?;
        let mut decisions = Vec::new();
        for index_key in keys {
            if decisions.len() >= limit {
                break;
            }
            if index_key.as_str() < lower.as_str() || index_key.as_str() > upper.as_str() {
                continue;
            }
            let primary: Option<String> = self
                .backend
                .get(&index_key)
                .await
                .map_err(PipelineError::from)?;
            if let Some(primary) = primary {
                if let Some(decision) = self
                    .backend
                    .get::<Decision>(&primary)
                    .await
                    .map_err(PipelineError::from)?
                {
                    decisions.push(decision);
                }
            }
        }
        Ok(decisions)
    }
}

/// The completion validator.
#[derive(Debug)]
pub struct CompletionValidator<B: DocumentBackend + ?Sized> {
    reviews: ReviewStore<B>,
    moderators: ModeratorStore<B>,
    decisions: DecisionStore<B>,
}

impl<B: DocumentBackend + ?Sized> CompletionValidator<B> {
    pub fn new(
        reviews: ReviewStore<B>,
        moderators: ModeratorStore<B>,
        decisions: DecisionStore<B>,
    ) -> Self {
        Self {
            reviews,
            moderators,
            decisions,
        }
    }

    pub fn decisions(&self) -> &DecisionStore<B> {
        &self.decisions
    }

    /// Validate structure and ranges; returns the list of blocking errors.
    pub fn validate(input: &DecisionInput) -> Vec<String> {
        let mut errors = Vec::new();

        let justification = input.justification.trim();
        if justification.len() < 10 {
            errors.push("Justification must be at least 10 characters".to_string());
        } else if input.justification.len() > 2000 {
            errors.push("Justification cannot exceed 2000 characters".to_string());
        }

        if let Some(adjustment) = input.trust_score_adjustment {
            if !(0.0..=100.0).contains(&adjustment) {
                errors.push("Trust score adjustment must be between 0 and 100".to_string());
            }
        }

        if input.tags.len() > 10 {
            errors.push("At most 10 tags are allowed".to_string());
        }

        errors
    }

    /// Non-blocking consistency warnings against the AI's view.
    pub fn consistency_warnings(review: &ReviewItem, input: &DecisionInput) -> Vec<String> {
        let mut warnings = Vec::new();

        let ai_trust_score = review
            .analysis_snapshot
            .get("trustScore")
            .and_then(|v| v.as_f64())
            .unwrap_or(50.0);
        let ai_confidence = review
            .analysis_snapshot
            .get("confidence")
            .and_then(|v| v.as_f64())
            .unwrap_or(0.5);
        let human_trust_score = input.trust_score_adjustment.unwrap_or(ai_trust_score);
        let delta = (human_trust_score - ai_trust_score).abs();

        if delta > 30.0 {
            warnings.push(format!(
                "Large trust score difference: AI={ai_trust_score}, Human={human_trust_score}"
            ));
        }
        if input.decision_type == DecisionType::Confirm && delta > 10.0 {
            warnings.push("Confirmed decision with significant score adjustment".to_string());
        }
        if input.decision_type == DecisionType::Override {
            if delta < 15.0 {
                warnings.push("Override decision with minimal score change".to_string());
            }
            if input.confidence_level <= ConfidenceLevel::Low {
                warnings.push("Override decision with low human confidence".to_string());
            }
            if ai_confidence > 0.8 {
                warnings.push("Override of high-confidence AI decision".to_string());
            }
        }

        warnings
    }

    /// Complete a review with a validated decision.
    pub async fn complete(
        &self,
        review_id: &str,
        moderator_id: &str,
        input: DecisionInput,
    ) -> Result<CompletionOutcome, PipelineError> {
        let errors = Self::validate(&input);
        if !errors.is_empty() {
            return Err(PipelineError::input_invalid(errors.join("; ")));
        }

        let Some(review) = self.reviews.get(review_id).await? else {
            return Err(PipelineError::not_found(format!("review {review_id}")));
        };
        if review.assigned_moderator.as_deref() != Some(moderator_id) {
            return Err(PipelineError::conflict(format!(
                "review {review_id} is not assigned to {moderator_id}"
            )));
        }

        let warnings = Self::consistency_warnings(&review, &input);
        let now = Utc::now();

        let completed = self
            .reviews
            .transition(
                review_id,
                ReviewStatus::InProgress,
                ReviewStatus::Completed,
                |r| {
                    r.completed_at = Some(now);
                },
            )
            .await?;

        let decision = Decision {
            decision_id: Uuid::new_v4().to_string(),
            review_id: review_id.to_string(),
            media_id: completed.media_id.clone(),
            moderator_id: moderator_id.to_string(),
            decision_type: input.decision_type,
            confidence_level: input.confidence_level,
            justification: input.justification.clone(),
            trust_score_adjustment: input.trust_score_adjustment,
            threat_level: input.threat_level,
            tags: input.tags.clone(),
            additional_evidence: input.additional_evidence.clone(),
            completed_at: now,
        };
        self.decisions.put(&decision).await?;

        let processing_time = completed
            .assigned_at
            .map(|assigned| (now - assigned).num_milliseconds() as f64 / 1000.0)
            .unwrap_or(0.0);
        // Accuracy needs ground truth or consensus; not derivable here
        self.moderators
            .record_completion(moderator_id, processing_time, None)
            .await?;

        let feedback_type = FeedbackType::from_decision(input.decision_type);
        // Threat intelligence runs only for confirmed manipulation
        let threat_eligible = matches!(input.decision_type, DecisionType::Confirm);

        tracing::info!(
            review_id,
            moderator_id,
            decision = input.decision_type.as_str(),
            warnings = warnings.len(),
            threat_eligible,
            "review completed"
        );

        Ok(CompletionOutcome {
            decision,
            review: completed,
            warnings,
            feedback_type,
            threat_eligible,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::ReviewLifecycle;
    use crate::moderator::{Moderator, ModeratorRole};
    use crate::queue::ReviewPriority;
    use hlekkr_persist::MemoryBackend;
    use serde_json::json;

    struct Fixture {
        lifecycle: ReviewLifecycle<MemoryBackend>,
        validator: CompletionValidator<MemoryBackend>,
        review_id: String,
    }

    async fn fixture() -> Fixture {
        let backend = Arc::new(MemoryBackend::new());
        let lifecycle = ReviewLifecycle::new(
            ReviewStore::new(backend.clone()),
            ModeratorStore::new(backend.clone()),
        );
        let validator = CompletionValidator::new(
            ReviewStore::new(backend.clone()),
            ModeratorStore::new(backend.clone()),
            DecisionStore::new(backend),
        );

        lifecycle
            .moderators()
            .create(&Moderator::new("mod-1", "a@example.com", ModeratorRole::Senior))
            .await
            .unwrap();
        let review = ReviewItem::new(
            "m1",
            ReviewPriority::Normal,
            json!({"trustScore": 35.0, "confidence": 0.9}),
        );
        lifecycle.reviews().create(&review).await.unwrap();
        lifecycle.assign(&review.review_id, "mod-1").await.unwrap();
        lifecycle.start(&review.review_id).await.unwrap();

        Fixture {
            lifecycle,
            validator,
            review_id: review.review_id,
        }
    }

    fn decision_input(decision_type: DecisionType) -> DecisionInput {
        DecisionInput {
            decision_type,
            confidence_level: ConfidenceLevel::High,
            justification: "Clear blending artifacts around the jawline".to_string(),
            trust_score_adjustment: Some(20.0),
            threat_level: Some(ThreatLevel::Medium),
            tags: vec!["deepfake".to_string()],
            additional_evidence: Vec::new(),
        }
    }

    #[tokio::test]
    async fn test_complete_confirm_flow() {
        let fixture = fixture().await;
        let outcome = fixture
            .validator
            .complete(&fixture.review_id, "mod-1", decision_input(DecisionType::Confirm))
            .await
            .unwrap();

        assert_eq!(outcome.review.status, ReviewStatus::Completed);
        assert_eq!(outcome.feedback_type, FeedbackType::PositiveConfirmation);
        assert!(outcome.threat_eligible);

        // Decision persisted
        let stored = fixture
            .validator
            .decisions()
            .get(&outcome.decision.decision_id)
            .await
            .unwrap();
        assert!(stored.is_some());

        // Moderator stats and workload updated
        let moderator = fixture
            .lifecycle
            .moderators()
            .get("mod-1")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(moderator.statistics.total_reviews, 1);
        assert_eq!(moderator.statistics.current_workload, 0);
    }

    #[tokio::test]
    async fn test_validation_rejects_short_justification() {
        let fixture = fixture().await;
        let mut input = decision_input(DecisionType::Confirm);
        input.justification = "too short".to_string();
        let result = fixture
            .validator
            .complete(&fixture.review_id, "mod-1", input)
            .await;
        assert!(matches!(result, Err(PipelineError::InputInvalid(_))));
    }

    #[tokio::test]
    async fn test_validation_rejects_out_of_range_adjustment() {
        let mut input = decision_input(DecisionType::Override);
        input.trust_score_adjustment = Some(120.0);
        assert!(!CompletionValidator::<MemoryBackend>::validate(&input).is_empty());
    }

    #[tokio::test]
    async fn test_wrong_moderator_rejected() {
        let fixture = fixture().await;
        let result = fixture
            .validator
            .complete(&fixture.review_id, "mod-2", decision_input(DecisionType::Confirm))
            .await;
        assert!(matches!(result, Err(PipelineError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_double_completion_rejected() {
        let fixture = fixture().await;
        let outcome = fixture
            .validator
            .complete(&fixture.review_id, "mod-1", decision_input(DecisionType::Override))
            .await
            .unwrap();
        // Overrides never dispatch to threat intelligence, even with a
        // threat level attached
        assert!(!outcome.threat_eligible);

        let second = fixture
            .validator
            .complete(&fixture.review_id, "mod-1", decision_input(DecisionType::Override))
            .await;
        assert!(matches!(second, Err(PipelineError::Conflict(_))));
    }

    #[test]
    fn test_consistency_warnings() {
        let review = ReviewItem::new(
            "m1",
            ReviewPriority::Normal,
            json!({"trustScore": 80.0, "confidence": 0.9}),
        );

        // Override with a huge delta against confident AI
        let mut input = decision_input(DecisionType::Override);
        input.trust_score_adjustment = Some(10.0);
        input.confidence_level = ConfidenceLevel::Low;
        let warnings = CompletionValidator::<MemoryBackend>::consistency_warnings(&review, &input);
        assert!(warnings.iter().any(|w| w.contains("Large trust score difference")));
        assert!(warnings.iter().any(|w| w.contains("low human confidence")));
        assert!(warnings.iter().any(|w| w.contains("high-confidence AI")));

        // Confirm with a moderate adjustment
        let mut confirm = decision_input(DecisionType::Confirm);
        confirm.trust_score_adjustment = Some(65.0);
        let warnings =
            CompletionValidator::<MemoryBackend>::consistency_warnings(&review, &confirm);
        assert!(warnings
            .iter()
            .any(|w| w.contains("significant score adjustment")));
    }

    #[tokio::test]
    async fn test_recent_decisions_window() {
        let fixture = fixture().await;
        fixture
            .validator
            .complete(&fixture.review_id, "mod-1", decision_input(DecisionType::Confirm))
            .await
            .unwrap();

        let now = Utc::now();
        let recent = fixture
            .validator
            .decisions()
            .recent(now - Duration::hours(24), now + Duration::hours(1), 500)
            .await
            .unwrap();
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].media_id, "m1");
    }
}
