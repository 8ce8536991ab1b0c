//! Lifecycle management: assignment and the scheduled sweeps
//!
//! The four sweeps are idempotent entrypoints for any cron-like driver:
//! `timeout_sweep`, `reassignment_sweep`, `escalation_sweep`,
//! `cleanup_sweep`. Each processes whatever matches at call time and
//! reports what it did.

use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};

use hlekkr_core::PipelineError;
use hlekkr_persist::DocumentBackend;

use crate::moderator::ModeratorStore;
use crate::queue::{ReviewItem, ReviewPriority, ReviewStatus, ReviewStore};

/// Completed/terminal reviews older than this are swept by cleanup.
const CLEANUP_AGE_DAYS: i64 = 30;

/// Reassignment gives up after this many consecutive failures and
/// escalates instead.
const MAX_REASSIGNMENT_FAILURES: u32 = 2;

/// What one sweep did.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SweepReport {
    pub examined: usize,
    pub expired: Vec<String>,
    pub reassigned: Vec<String>,
    pub escalated: Vec<String>,
    pub cleaned: Vec<String>,
}

/// Recent-activity view for one moderator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModeratorActivity {
    pub moderator_id: String,
    pub window_days: i64,
    pub completed_reviews: usize,
    pub active_reviews: usize,
    pub current_workload: u32,
    pub average_processing_time: f64,
    pub accuracy_score: Option<f64>,
}

/// Lifecycle manager over the review and moderator stores.
#[derive(Debug)]
pub struct ReviewLifecycle<B: DocumentBackend + ?Sized> {
    reviews: ReviewStore<B>,
    moderators: ModeratorStore<B>,
}

impl<B: DocumentBackend + ?Sized> ReviewLifecycle<B> {
    pub fn new(reviews: ReviewStore<B>, moderators: ModeratorStore<B>) -> Self {
        Self {
            reviews,
            moderators,
        }
    }

    pub fn reviews(&self) -> &ReviewStore<B> {
        &self.reviews
    }

    pub fn moderators(&self) -> &ModeratorStore<B> {
        &self.moderators
    }

    /// Assign a pending (or expired/escalated) review to a moderator,
    /// enforcing availability and priority capability.
    pub async fn assign(
        &self,
        review_id: &str,
        moderator_id: &str,
    ) -> Result<ReviewItem, PipelineError> {
        let Some(moderator) = self.moderators.get(moderator_id).await? else {
            return Err(PipelineError::not_found(format!(
                "moderator {moderator_id}"
            )));
        };
        let Some(review) = self.reviews.get(review_id).await? else {
            return Err(PipelineError::not_found(format!("review {review_id}")));
        };
        if !moderator.available_for(review.priority.is_critical()) {
            return Err(PipelineError::conflict(format!(
                "moderator {moderator_id} not available for {} review",
                review.priority.as_str()
            )));
        }

        let expected = review.status;
        let assigned = self
            .reviews
            .transition(review_id, expected, ReviewStatus::Assigned, |r| {
                let now = Utc::now();
                r.assigned_moderator = Some(moderator_id.to_string());
                r.assigned_at = Some(now);
                r.timeout_at = Some(now + r.priority.timeout());
            })
            .await?;
        self.moderators.adjust_workload(moderator_id, 1).await?;
        tracing::info!(review_id, moderator_id, "review assigned");
        Ok(assigned)
    }

    /// Moderator opens the review.
    pub async fn start(&self, review_id: &str) -> Result<ReviewItem, PipelineError> {
        self.reviews
            .transition(review_id, ReviewStatus::Assigned, ReviewStatus::InProgress, |_| {})
            .await
    }

    /// Expire overdue reviews; high and critical priorities get a
    /// reassignment attempt to the best available moderator.
    pub async fn timeout_sweep(&self) -> Result<SweepReport, PipelineError> {
        let now = Utc::now();
        let mut report = SweepReport::default();

        let mut overdue = Vec::new();
        for status in [ReviewStatus::Assigned, ReviewStatus::InProgress] {
            for review in self.reviews.by_status(status).await? {
                if review.timed_out(now) {
                    overdue.push(review);
                }
            }
        }
        report.examined = overdue.len();

        for review in overdue {
            let expired = self
                .reviews
                .transition(&review.review_id, review.status, ReviewStatus::Expired, |_| {})
                .await;
            let Ok(expired) = expired else {
                // Lost the race to another worker; that worker handles it
                continue;
            };
            if let Some(moderator_id) = &expired.assigned_moderator {
                self.moderators.adjust_workload(moderator_id, -1).await?;
            }
            report.expired.push(expired.review_id.clone());

            if matches!(
                expired.priority,
                ReviewPriority::Critical | ReviewPriority::High
            ) {
                match self.reassign(&expired).await? {
                    Some(moderator_id) => {
                        tracing::info!(
                            review_id = %expired.review_id,
                            moderator_id = %moderator_id,
                            "expired review reassigned"
                        );
                        report.reassigned.push(expired.review_id.clone());
                    }
                    None => {
                        self.record_reassignment_failure(&expired.review_id).await?;
                    }
                }
            }
        }

        Ok(report)
    }

    /// Retry reassignment for expired high/critical reviews that previous
    /// sweeps could not place.
    pub async fn reassignment_sweep(&self) -> Result<SweepReport, PipelineError> {
        let mut report = SweepReport::default();
        let expired = self.reviews.by_status(ReviewStatus::Expired).await?;
        report.examined = expired.len();

        for review in expired {
            if !matches!(
                review.priority,
                ReviewPriority::Critical | ReviewPriority::High
            ) {
                continue;
            }
            match self.reassign(&review).await? {
                Some(_) => report.reassigned.push(review.review_id.clone()),
                None => {
                    let updated = self.record_reassignment_failure(&review.review_id).await?;
                    if let Some(updated) = updated {
                        if updated.status == ReviewStatus::Escalated {
                            report.escalated.push(updated.review_id);
                        }
                    }
                }
            }
        }

        Ok(report)
    }

    /// Escalate reviews that accumulated enough reassignment failures.
    pub async fn escalation_sweep(&self) -> Result<SweepReport, PipelineError> {
        let mut report = SweepReport::default();
        let expired = self.reviews.by_status(ReviewStatus::Expired).await?;
        report.examined = expired.len();

        for review in expired {
            if review.reassignment_failures >= MAX_REASSIGNMENT_FAILURES {
                let escalated = self.escalate(&review.review_id).await?;
                report.escalated.push(escalated.review_id);
            }
        }
        Ok(report)
    }

    /// Escalate a review on request: priority bumps one bucket.
    pub async fn escalate(&self, review_id: &str) -> Result<ReviewItem, PipelineError> {
        let Some(review) = self.reviews.get(review_id).await? else {
            return Err(PipelineError::not_found(format!("review {review_id}")));
        };
        let escalated = self
            .reviews
            .transition(review_id, review.status, ReviewStatus::Escalated, |r| {
                r.priority = r.priority.bumped();
                r.assigned_moderator = None;
                r.assigned_at = None;
                r.timeout_at = None;
            })
            .await?;
        tracing::warn!(
            review_id,
            priority = escalated.priority.as_str(),
            "review escalated"
        );
        Ok(escalated)
    }

    /// Drop terminal reviews past the retention window.
    pub async fn cleanup_sweep(&self) -> Result<SweepReport, PipelineError> {
        let cutoff = Utc::now() - Duration::days(CLEANUP_AGE_DAYS);
        let mut report = SweepReport::default();

        for status in [
            ReviewStatus::Completed,
            ReviewStatus::Cancelled,
            ReviewStatus::Expired,
        ] {
            for review in self.reviews.by_status(status).await? {
                report.examined += 1;
                let terminal_at = review.completed_at.unwrap_or(review.updated_at);
                if terminal_at < cutoff {
                    self.reviews.delete(&review.review_id).await?;
                    report.cleaned.push(review.review_id);
                }
            }
        }
        Ok(report)
    }

    /// Recent-activity summary for one moderator (default window 7 days).
    pub async fn moderator_activity(
        &self,
        moderator_id: &str,
        window_days: i64,
    ) -> Result<ModeratorActivity, PipelineError> {
        let Some(moderator) = self.moderators.get(moderator_id).await? else {
            return Err(PipelineError::not_found(format!(
                "moderator {moderator_id}"
            )));
        };
        let cutoff = Utc::now() - Duration::days(window_days);

        let mut completed_reviews = 0;
        for review in self.reviews.by_status(ReviewStatus::Completed).await? {
            if review.assigned_moderator.as_deref() == Some(moderator_id)
                && review.completed_at.is_some_and(|at| at >= cutoff)
            {
                completed_reviews += 1;
            }
        }
        let active_reviews = self.reviews.by_moderator(moderator_id).await?.len();

        Ok(ModeratorActivity {
            moderator_id: moderator_id.to_string(),
            window_days,
            completed_reviews,
            active_reviews,
            current_workload: moderator.statistics.current_workload,
            average_processing_time: moderator.statistics.average_processing_time,
            accuracy_score: moderator.statistics.accuracy_score,
        })
    }

    /// Try every available moderator of sufficient capability, preferring
    /// the least loaded.
    async fn reassign(&self, review: &ReviewItem) -> Result<Option<String>, PipelineError> {
        let critical = review.priority.is_critical();
        let mut candidates: Vec<_> = self
            .moderators
            .list()
            .await?
            .into_iter()
            .filter(|m| {
                m.available_for(critical)
                    && Some(m.moderator_id.as_str()) != review.assigned_moderator.as_deref()
            })
            .collect();
        candidates.sort_by_key(|m| m.statistics.current_workload);

        let Some(candidate) = candidates.first() else {
            return Ok(None);
        };
        self.assign(&review.review_id, &candidate.moderator_id)
            .await?;
        Ok(Some(candidate.moderator_id.clone()))
    }

    async fn record_reassignment_failure(
        &self,
        review_id: &str,
    ) -> Result<Option<ReviewItem>, PipelineError> {
        let Some(review) = self.reviews.get(review_id).await? else {
            return Ok(None);
        };
        if review.status != ReviewStatus::Expired {
            return Ok(None);
        }
        let failures = review.reassignment_failures + 1;
        if failures >= MAX_REASSIGNMENT_FAILURES {
            let escalated = self.escalate(review_id).await?;
            return Ok(Some(escalated));
        }
        // Stays expired; remember the failed attempt for the next sweep
        let mut updated = review.clone();
        updated.reassignment_failures = failures;
        updated.updated_at = Utc::now();
        self.reviews.replace(&review, &updated).await?;
        Ok(Some(updated))
    }
}
