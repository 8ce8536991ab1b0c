//! Moderator accounts and statistics

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use hlekkr_core::PipelineError;
use hlekkr_persist::{DocumentBackend, DocumentExt};

/// Moderator role; caps concurrent review workload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModeratorRole {
    Junior,
    Senior,
    Lead,
}

impl ModeratorRole {
    /// Maximum concurrent reviews per role.
    pub fn max_workload(&self) -> u32 {
        match self {
            Self::Junior => 3,
            Self::Senior => 5,
            Self::Lead => 7,
        }
    }

    /// Whether this role may take critical-priority reviews.
    pub fn handles_critical(&self) -> bool {
        matches!(self, Self::Senior | Self::Lead)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModeratorStatus {
    Active,
    Inactive,
    Suspended,
}

/// Performance statistics updated on every completed review.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModeratorStatistics {
    pub total_reviews: u64,
    pub accurate_decisions: u64,
    /// 0..1, when ground truth exists
    pub accuracy_score: Option<f64>,
    /// Seconds
    pub total_processing_time: f64,
    /// Seconds
    pub average_processing_time: f64,
    pub current_workload: u32,
    pub last_review_at: Option<DateTime<Utc>>,
}

/// One moderator account.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Moderator {
    pub moderator_id: String,
    pub email: String,
    pub role: ModeratorRole,
    pub status: ModeratorStatus,
    pub statistics: ModeratorStatistics,
    /// UTC hours `[start, end)` the moderator accepts assignments in
    pub working_hours: Option<(u32, u32)>,
    pub created_at: DateTime<Utc>,
    pub last_active: Option<DateTime<Utc>>,
}

impl Moderator {
    pub fn new(
        moderator_id: impl Into<String>,
        email: impl Into<String>,
        role: ModeratorRole,
    ) -> Self {
        Self {
            moderator_id: moderator_id.into(),
            email: email.into(),
            role,
            status: ModeratorStatus::Active,
            statistics: ModeratorStatistics::default(),
            working_hours: None,
            created_at: Utc::now(),
            last_active: None,
        }
    }

    /// Available for one more review at the given priority.
    pub fn available_for(&self, critical: bool) -> bool {
        self.status == ModeratorStatus::Active
            && self.statistics.current_workload < self.role.max_workload()
            && (!critical || self.role.handles_critical())
    }
}

/// Moderator profile store.
#[derive(Debug)]
pub struct ModeratorStore<B: DocumentBackend + ?Sized> {
    backend: Arc<B>,
}

impl<B: DocumentBackend + ?Sized> ModeratorStore<B> {
    pub fn new(backend: Arc<B>) -> Self {
        Self { backend }
    }

    fn key(moderator_id: &str) -> String {
        format!("moderator:{moderator_id}")
    }

    pub async fn create(&self, moderator: &Moderator) -> Result<(), PipelineError> {
        self.backend
            .cas(&Self::key(&moderator.moderator_id), None, moderator)
            .await
            .map_err(|e| match e {
                hlekkr_persist::StorageError::ConditionFailed(_) => PipelineError::conflict(
                    format!("moderator {} already exists", moderator.moderator_id),
                ),
                other => other.into(),
            })
    }

    pub async fn get(&self, moderator_id: &str) -> Result<Option<Moderator>, PipelineError> {
        self.backend
            .get(&Self::key(moderator_id))
            .await
            .map_err(PipelineError::from)
    }

    pub async fn list(&self) -> Result<Vec<Moderator>, PipelineError> {
        let keys = self
            .backend
            .list_keys("moderator:")
            .await
            .map_err(PipelineError::from)?;
        let mut moderators = Vec::with_capacity(keys.len());
        for key in keys {
            if let Some(moderator) = self
                .backend
                .get::<Moderator>(&key)
                .await
                .map_err(PipelineError::from)?
            {
                moderators.push(moderator);
            }
        }
        Ok(moderators)
    }

    /// Apply a mutation under CAS; retried a bounded number of times.
    pub async fn update<F>(&self, moderator_id: &str, mutate: F) -> Result<Moderator, PipelineError>
    where
        F: Fn(&mut Moderator),
    {
        for _ in 0..3 {
            let Some(current) = self.get(moderator_id).await? else {
                return Err(PipelineError::not_found(format!(
                    "moderator {moderator_id}"
                )));
            };
            let mut updated = current.clone();
            mutate(&mut updated);
            updated.last_active = Some(Utc::now());
            match self
                .backend
                .cas(&Self::key(moderator_id), Some(&current), &updated)
                .await
            {
                Ok(()) => return Ok(updated),
                Err(hlekkr_persist::StorageError::ConditionFailed(_)) => continue,
                Err(e) => return Err(e.into()),
            }
        }
        Err(PipelineError::conflict(format!(
            "moderator {moderator_id} update contention"
        )))
    }

    /// Adjust the workload counter, clamping at zero. The role cap is
    /// enforced here so the invariant holds no matter the caller.
    pub async fn adjust_workload(
        &self,
        moderator_id: &str,
        delta: i32,
    ) -> Result<Moderator, PipelineError> {
        let result = self
            .update(moderator_id, |m| {
                let current = m.statistics.current_workload as i64;
                let next = (current + delta as i64).max(0) as u32;
                m.statistics.current_workload = next.min(m.role.max_workload());
            })
            .await?;
        Ok(result)
    }

    /// Deactivate an account; keeps history, blocks future assignment.
    pub async fn deactivate(&self, moderator_id: &str) -> Result<Moderator, PipelineError> {
        self.update(moderator_id, |m| {
            m.status = ModeratorStatus::Inactive;
        })
        .await
    }

    /// Record a completed review: counters, processing time, accuracy when
    /// ground truth exists.
    pub async fn record_completion(
        &self,
        moderator_id: &str,
        processing_time_secs: f64,
        accurate: Option<bool>,
    ) -> Result<Moderator, PipelineError> {
        self.update(moderator_id, |m| {
            let stats = &mut m.statistics;
            stats.total_reviews += 1;
            stats.total_processing_time += processing_time_secs;
            stats.average_processing_time =
                stats.total_processing_time / stats.total_reviews as f64;
            stats.last_review_at = Some(Utc::now());
            stats.current_workload = stats.current_workload.saturating_sub(1);
            if let Some(accurate) = accurate {
                if accurate {
                    stats.accurate_decisions += 1;
                }
                stats.accuracy_score =
                    Some(stats.accurate_decisions as f64 / stats.total_reviews as f64);
            }
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hlekkr_persist::MemoryBackend;

    fn store() -> ModeratorStore<MemoryBackend> {
        ModeratorStore::new(Arc::new(MemoryBackend::new()))
    }

    #[tokio::test]
    async fn test_create_and_get() {
        let store = store();
        let moderator = Moderator::new("mod-1", "a@example.com", ModeratorRole::Senior);
        store.create(&moderator).await.unwrap();

        let fetched = store.get("mod-1").await.unwrap().unwrap();
        assert_eq!(fetched.role, ModeratorRole::Senior);
        assert!(store.create(&moderator).await.is_err());
    }

    #[tokio::test]
    async fn test_workload_respects_role_cap() {
        let store = store();
        store
            .create(&Moderator::new("mod-1", "a@example.com", ModeratorRole::Junior))
            .await
            .unwrap();

        for _ in 0..10 {
            store.adjust_workload("mod-1", 1).await.unwrap();
        }
        let moderator = store.get("mod-1").await.unwrap().unwrap();
        assert_eq!(moderator.statistics.current_workload, 3);

        store.adjust_workload("mod-1", -5).await.unwrap();
        let moderator = store.get("mod-1").await.unwrap().unwrap();
        assert_eq!(moderator.statistics.current_workload, 0);
    }

    #[tokio::test]
    async fn test_availability_rules() {
        let mut junior = Moderator::new("j", "j@example.com", ModeratorRole::Junior);
        assert!(junior.available_for(false));
        assert!(!junior.available_for(true));

        junior.statistics.current_workload = 3;
        assert!(!junior.available_for(false));

        let lead = Moderator::new("l", "l@example.com", ModeratorRole::Lead);
        assert!(lead.available_for(true));

        let mut suspended = Moderator::new("s", "s@example.com", ModeratorRole::Lead);
        suspended.status = ModeratorStatus::Suspended;
        assert!(!suspended.available_for(false));
    }

    #[tokio::test]
    async fn test_record_completion_updates_statistics() {
        let store = store();
        store
            .create(&Moderator::new("mod-1", "a@example.com", ModeratorRole::Senior))
            .await
            .unwrap();
        store.adjust_workload("mod-1", 2).await.unwrap();

        store
            .record_completion("mod-1", 120.0, Some(true))
            .await
            .unwrap();
        store
            .record_completion("mod-1", 60.0, Some(false))
            .await
            .unwrap();

        let moderator = store.get("mod-1").await.unwrap().unwrap();
        let stats = &moderator.statistics;
        assert_eq!(stats.total_reviews, 2);
        assert_eq!(stats.current_workload, 0);
        assert!((stats.average_processing_time - 90.0).abs() < 1e-9);
        assert_eq!(stats.accuracy_score, Some(0.5));
    }

    #[tokio::test]
    async fn test_deactivate_blocks_assignment() {
        let store = store();
        store
            .create(&Moderator::new("mod-1", "a@example.com", ModeratorRole::Lead))
            .await
            .unwrap();
        let moderator = store.deactivate("mod-1").await.unwrap();
        assert!(!moderator.available_for(false));
    }

    #[tokio::test]
    async fn test_update_missing_moderator() {
        let result = store().adjust_workload("ghost", 1).await;
        assert!(matches!(result, Err(PipelineError::NotFound(_))));
    }
}
