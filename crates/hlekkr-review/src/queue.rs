//! The review queue
//!
//! Review items move through a fixed state machine; every transition is a
//! compare-and-set against the full current record, so a stale writer loses
//! and must re-read.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use hlekkr_core::PipelineError;
use hlekkr_persist::{DocumentBackend, DocumentExt};

/// Review priority; sets the assignment timeout and who may take it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewPriority {
    Low,
    Normal,
    High,
    Critical,
}

impl ReviewPriority {
    /// Assignment deadline by priority.
    pub fn timeout(&self) -> Duration {
        match self {
            Self::Critical => Duration::hours(2),
            Self::High => Duration::hours(4),
            Self::Normal => Duration::hours(8),
            Self::Low => Duration::hours(24),
        }
    }

    /// One bucket up, capped at critical.
    pub fn bumped(&self) -> Self {
        match self {
            Self::Low => Self::Normal,
            Self::Normal => Self::High,
            Self::High | Self::Critical => Self::Critical,
        }
    }

    pub fn is_critical(&self) -> bool {
        matches!(self, Self::Critical)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Normal => "normal",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }
}

/// Review lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewStatus {
    Pending,
    Assigned,
    InProgress,
    Completed,
    Escalated,
    Expired,
    Cancelled,
}

impl ReviewStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Assigned => "assigned",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Escalated => "escalated",
            Self::Expired => "expired",
            Self::Cancelled => "cancelled",
        }
    }

    /// Legal transitions of the state machine.
    pub fn can_transition_to(&self, next: ReviewStatus) -> bool {
        use ReviewStatus::*;
        matches!(
            (self, next),
            (Pending, Assigned)
                | (Pending, Cancelled)
                | (Pending, Escalated)
                | (Assigned, InProgress)
                | (Assigned, Expired)
                | (Assigned, Escalated)
                | (Assigned, Cancelled)
                | (InProgress, Completed)
                | (InProgress, Expired)
                | (InProgress, Escalated)
                | (InProgress, Cancelled)
                | (Expired, Assigned)
                | (Escalated, Assigned)
        )
    }
}

/// One queued review.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReviewItem {
    pub review_id: String,
    pub media_id: String,
    pub priority: ReviewPriority,
    pub status: ReviewStatus,
    /// Snapshot of the analysis that triggered the review
    pub analysis_snapshot: serde_json::Value,
    pub assigned_moderator: Option<String>,
    pub assigned_at: Option<DateTime<Utc>>,
    pub timeout_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Consecutive failed reassignment attempts
    pub reassignment_failures: u32,
}

impl ReviewItem {
    pub fn new(
        media_id: impl Into<String>,
        priority: ReviewPriority,
        analysis_snapshot: serde_json::Value,
    ) -> Self {
        let now = Utc::now();
        Self {
            review_id: Uuid::new_v4().to_string(),
            media_id: media_id.into(),
            priority,
            status: ReviewStatus::Pending,
            analysis_snapshot,
            assigned_moderator: None,
            assigned_at: None,
            timeout_at: None,
            completed_at: None,
            created_at: now,
            updated_at: now,
            reassignment_failures: 0,
        }
    }

    pub fn timed_out(&self, now: DateTime<Utc>) -> bool {
        matches!(
            self.status,
            ReviewStatus::Assigned | ReviewStatus::InProgress
        ) && self.timeout_at.is_some_and(|deadline| now > deadline)
    }
}

/// Review queue store with CAS transitions.
#[derive(Debug)]
pub struct ReviewStore<B: DocumentBackend + ?Sized> {
    backend: Arc<B>,
}

impl<B: DocumentBackend + ?Sized> ReviewStore<B> {
    pub fn new(backend: Arc<B>) -> Self {
        Self { backend }
    }

    fn key(review_id: &str) -> String {
        format!("review:{review_id}")
    }

    pub async fn create(&self, review: &ReviewItem) -> Result<(), PipelineError> {
        self.backend
            .cas(&Self::key(&review.review_id), None, review)
            .await
            .map_err(PipelineError::from)
    }

    pub async fn get(&self, review_id: &str) -> Result<Option<ReviewItem>, PipelineError> {
        self.backend
            .get(&Self::key(review_id))
            .await
            .map_err(PipelineError::from)
    }

    /// Transition a review from `expected_status`, applying `mutate` to
    /// produce the new record. Fails with `Conflict` when the stored status
    /// is stale or the transition is illegal.
    pub async fn transition<F>(
        &self,
        review_id: &str,
        expected_status: ReviewStatus,
        next_status: ReviewStatus,
        mutate: F,
    ) -> Result<ReviewItem, PipelineError>
    where
        F: FnOnce(&mut ReviewItem),
    {
        let Some(current) = self.get(review_id).await? else {
            return Err(PipelineError::not_found(format!("review {review_id}")));
        };
        if current.status != expected_status {
            return Err(PipelineError::conflict(format!(
                "review {review_id} is {}, expected {}",
                current.status.as_str(),
                expected_status.as_str()
            )));
        }
        if !current.status.can_transition_to(next_status) {
            return Err(PipelineError::input_invalid(format!(
                "illegal transition {} -> {}",
                current.status.as_str(),
                next_status.as_str()
            )));
        }

        let mut updated = current.clone();
        updated.status = next_status;
        updated.updated_at = Utc::now();
        mutate(&mut updated);

        self.backend
            .cas(&Self::key(review_id), Some(&current), &updated)
            .await
            .map_err(PipelineError::from)?;
        tracing::debug!(
            review_id,
            from = current.status.as_str(),
            to = next_status.as_str(),
            "review transitioned"
        );
        Ok(updated)
    }

    /// Replace a review record under CAS without a status change (used for
    /// bookkeeping fields like reassignment counters).
    pub async fn replace(
        &self,
        current: &ReviewItem,
        updated: &ReviewItem,
    ) -> Result<(), PipelineError> {
        self.backend
            .cas(&Self::key(&current.review_id), Some(current), updated)
            .await
            .map_err(PipelineError::from)
    }

    /// Remove a terminal review (cleanup sweep).
    pub async fn delete(&self, review_id: &str) -> Result<bool, PipelineError> {
        self.backend
            .delete(&Self::key(review_id))
            .await
            .map_err(PipelineError::from)
    }

    /// All reviews currently in a status.
    pub async fn by_status(&self, status: ReviewStatus) -> Result<Vec<ReviewItem>, PipelineError> {
        Ok(self
            .all()
            .await?
            .into_iter()
            .filter(|r| r.status == status)
            .collect())
    }

    /// Active reviews assigned to one moderator.
    pub async fn by_moderator(&self, moderator_id: &str) -> Result<Vec<ReviewItem>, PipelineError> {
        Ok(self
            .all()
            .await?
            .into_iter()
            .filter(|r| {
                r.assigned_moderator.as_deref() == Some(moderator_id)
                    && matches!(r.status, ReviewStatus::Assigned | ReviewStatus::InProgress)
            })
            .collect())
    }

    async fn all(&self) -> Result<Vec<ReviewItem>, PipelineError> {
        let keys = self
            .backend
            .list_keys("review:")
            .await
            .map_err(PipelineError::from)?;
        let mut reviews = Vec::with_capacity(keys.len());
        for key in keys {
            if let Some(review) = self
                .backend
                .get::<ReviewItem>(&key)
                .await
                .map_err(PipelineError::from)?
            {
                reviews.push(review);
            }
        }
        Ok(reviews)
    }
}
