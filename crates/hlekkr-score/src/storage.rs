//! Versioned trust score storage
//!
//! Rows are immutable; `is_latest` moves between versions under a CAS on a
//! per-media latest pointer, so concurrent recalculations serialize and the
//! latest-uniqueness invariant holds.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

use hlekkr_core::PipelineError;
use hlekkr_persist::{sort_key_ts, DocumentBackend, DocumentExt};

use crate::types::{ScoreRange, TrustScoreVersion};

/// Aggregate statistics over a score window.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoreStatistics {
    pub count: usize,
    pub mean: f64,
    pub median: f64,
    pub min: f64,
    pub max: f64,
    pub std_dev: f64,
    pub distribution: HashMap<String, usize>,
}

/// Versioned score store.
#[derive(Debug)]
pub struct ScoreStore<B: DocumentBackend + ?Sized> {
    backend: Arc<B>,
}

impl<B: DocumentBackend + ?Sized> ScoreStore<B> {
    pub fn new(backend: Arc<B>) -> Self {
        Self { backend }
    }

    fn row_key(media_id: &str, version: &Uuid) -> String {
        format!("score:{media_id}:{version}")
    }

    fn latest_key(media_id: &str) -> String {
        format!("score_latest:{media_id}")
    }

    fn range_index_key(version: &TrustScoreVersion) -> String {
        format!(
            "score~range:{}:{}:{}:{}",
            version.score_range.as_str(),
            sort_key_ts(version.calculation_timestamp),
            version.media_id,
            version.version
        )
    }

    fn date_index_key(version: &TrustScoreVersion) -> String {
        format!(
            "score~date:{}:{}:{}",
            sort_key_ts(version.calculation_timestamp),
            version.media_id,
            version.version
        )
    }

    /// Persist a new version and atomically move the `is_latest` flag.
    ///
    /// The caller's version must carry `is_latest = true`; the previous
    /// latest row is rewritten with the flag cleared after the pointer CAS
    /// succeeds, so a concurrent writer retries rather than fork the flag.
    pub async fn put_version(&self, version: &TrustScoreVersion) -> Result<(), PipelineError> {
        if !version.is_latest {
            return Err(PipelineError::input_invalid(
                "new score versions must be written as latest",
            ));
        }

        let previous: Option<String> = self
            .backend
            .get(&Self::latest_key(&version.media_id))
            .await
            .map_err(PipelineError::from)?;

        // Claim the pointer first; a conflict means another writer got in
        // between our read and write and the engine should recompute.
        self.backend
            .cas(
                &Self::latest_key(&version.media_id),
                previous.as_ref(),
                &version.version.to_string(),
            )
            .await
            .map_err(PipelineError::from)?;

        self.backend
            .put(&Self::row_key(&version.media_id, &version.version), version)
            .await
            .map_err(PipelineError::from)?;
        self.backend
            .put(
                &Self::range_index_key(version),
                &Self::row_key(&version.media_id, &version.version),
            )
            .await
            .map_err(PipelineError::from)?;
        self.backend
            .put(
                &Self::date_index_key(version),
                &Self::row_key(&version.media_id, &version.version),
            )
            .await
            .map_err(PipelineError::from)?;

        // Clear the flag on the dethroned version
        if let Some(previous) = previous {
            if let Ok(prev_uuid) = Uuid::parse_str(&previous) {
                let prev_key = Self::row_key(&version.media_id, &prev_uuid);
                if let Some(mut prev_row) = self
                    .backend
                    .get::<TrustScoreVersion>(&prev_key)
                    .await
                    .map_err(PipelineError::from)?
                {
                    prev_row.is_latest = false;
                    self.backend
                        .put(&prev_key, &prev_row)
                        .await
                        .map_err(PipelineError::from)?;
                }
            }
        }

        Ok(())
    }

    pub async fn get(
        &self,
        media_id: &str,
        version: &Uuid,
    ) -> Result<Option<TrustScoreVersion>, PipelineError> {
        self.backend
            .get(&Self::row_key(media_id, version))
            .await
            .map_err(PipelineError::from)
    }

    /// The current latest version for a media item.
    pub async fn latest(&self, media_id: &str) -> Result<Option<TrustScoreVersion>, PipelineError> {
        let pointer: Option<String> = self
            .backend
            .get(&Self::latest_key(media_id))
            .await
            .map_err(PipelineError::from)?;
        let Some(pointer) = pointer else {
            return Ok(None);
        };
        let version = Uuid::parse_str(&pointer)
            .map_err(|e| PipelineError::store(format!("corrupt latest pointer: {e}")))?;
        self.get(media_id, &version).await
    }

    /// All versions for a media item (unordered by time; use timestamps).
    pub async fn versions(&self, media_id: &str) -> Result<Vec<TrustScoreVersion>, PipelineError> {
        let keys = self
            .backend
            .list_keys(&format!("score:{media_id}:"))
            .await
            .map_err(PipelineError::from)?;
        let mut versions = Vec::with_capacity(keys.len());
        for key in keys {
            if let Some(version) = self
                .backend
                .get::<TrustScoreVersion>(&key)
                .await
                .map_err(PipelineError::from)?
            {
                versions.push(version);
            }
        }
        versions.sort_by_key(|v| v.calculation_timestamp);
        Ok(versions)
    }

    /// Query by score-range bucket, bounded by time.
    pub async fn by_score_range(
        &self,
        range: ScoreRange,
        since: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Result<Vec<TrustScoreVersion>, PipelineError> {
        let prefix = format!("score~range:{}:", range.as_str());
        let lower = format!("{prefix}{}", sort_key_ts(since));
        let upper = format!("{prefix}{}", sort_key_ts(until));
        self.collect_index(&prefix, &lower, &upper).await
    }

    /// Query by calculation time window.
    pub async fn by_date_range(
        &self,
        since: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Result<Vec<TrustScoreVersion>, PipelineError> {
        let prefix = "score~date:".to_string();
        let lower = format!("{prefix}{}", sort_key_ts(since));
        let upper = format!("{prefix}{}", sort_key_ts(until));
        self.collect_index(&prefix, &lower, &upper).await
    }

    /// Versions in a window whose composite falls within [min, max].
    pub async fn by_score_bounds(
        &self,
        min: f64,
        max: f64,
        since: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Result<Vec<TrustScoreVersion>, PipelineError> {
        let versions = self.by_date_range(since, until).await?;
        Ok(versions
            .into_iter()
            .filter(|v| v.composite_score >= min && v.composite_score <= max)
            .collect())
    }

    async fn collect_index(
        &self,
        prefix: &str,
        lower: &str,
        upper: &str,
    ) -> Result<Vec<TrustScoreVersion>, PipelineError> {
        let keys = self
            .backend
            .list_keys(prefix)
            .await
            .map_err(PipelineError::from)?;
        let mut versions = Vec::new();
        for index_key in keys {
            if index_key.as_str() < lower || index_key.as_str() > upper {
                continue;
            }
            let primary: Option<String> = self
                .backend
                .get(&index_key)
                .await
                .map_err(PipelineError::from)?;
            if let Some(primary) = primary {
                if let Some(version) = self
                    .backend
                    .get::<TrustScoreVersion>(&primary)
                    .await
                    .map_err(PipelineError::from)?
                {
                    versions.push(version);
                }
            }
        }
        Ok(versions)
    }

    /// Aggregate statistics over a time window.
    pub async fn statistics(
        &self,
        since: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Result<ScoreStatistics, PipelineError> {
        let versions = self.by_date_range(since, until).await?;
        let mut scores: Vec<f64> = versions.iter().map(|v| v.composite_score).collect();

        if scores.is_empty() {
            return Ok(ScoreStatistics {
                count: 0,
                mean: 0.0,
                median: 0.0,
                min: 0.0,
                max: 0.0,
                std_dev: 0.0,
                distribution: HashMap::new(),
            });
        }

        scores.sort_by(f64::total_cmp);
        let count = scores.len();
        let mean = scores.iter().sum::<f64>() / count as f64;
        let median = if count % 2 == 0 {
            (scores[count / 2 - 1] + scores[count / 2]) / 2.0
        } else {
            scores[count / 2]
        };
        let variance = scores.iter().map(|s| (s - mean).powi(2)).sum::<f64>() / count as f64;

        let mut distribution: HashMap<String, usize> = HashMap::new();
        for range in ScoreRange::ALL {
            distribution.insert(range.as_str().to_string(), 0);
        }
        for version in &versions {
            *distribution
                .entry(version.score_range.as_str().to_string())
                .or_insert(0) += 1;
        }

        Ok(ScoreStatistics {
            count,
            mean,
            median,
            min: scores[0],
            max: scores[count - 1],
            std_dev: variance.sqrt(),
            distribution,
        })
    }

    /// Delete all but the newest `keep` versions for a media item. The
    /// latest version is never deleted.
    pub async fn compact(&self, media_id: &str, keep: usize) -> Result<usize, PipelineError> {
        let versions = self.versions(media_id).await?;
        if versions.len() <= keep {
            return Ok(0);
        }
        let cutoff = versions.len() - keep.max(1);
        let mut deleted = 0;
        for version in &versions[..cutoff] {
            if version.is_latest {
                continue;
            }
            self.backend
                .delete(&Self::row_key(media_id, &version.version))
                .await
                .map_err(PipelineError::from)?;
            self.backend
                .delete(&Self::range_index_key(version))
                .await
                .map_err(PipelineError::from)?;
            self.backend
                .delete(&Self::date_index_key(version))
                .await
                .map_err(PipelineError::from)?;
            deleted += 1;
        }
        Ok(deleted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ScoreBreakdown, ScoreConfidence};
    use hlekkr_persist::MemoryBackend;

    fn version(media_id: &str, score: f64) -> TrustScoreVersion {
        let now = Utc::now();
        TrustScoreVersion {
            media_id: media_id.to_string(),
            version: Uuid::new_v4(),
            calculation_timestamp: now,
            calculation_date: now.format("%Y-%m-%d").to_string(),
            composite_score: score,
            confidence: ScoreConfidence::High,
            score_range: ScoreRange::from_score(score),
            breakdown: ScoreBreakdown {
                deepfake: score,
                source_reliability: score,
                metadata_consistency: score,
                technical_integrity: score,
                historical_pattern: score,
            },
            factors: Vec::new(),
            recommendations: Vec::new(),
            is_latest: true,
        }
    }

    #[tokio::test]
    async fn test_latest_uniqueness_across_writes() {
        let store = ScoreStore::new(Arc::new(MemoryBackend::new()));

        for score in [40.0, 60.0, 85.0] {
            store.put_version(&version("m1", score)).await.unwrap();
        }

        let versions = store.versions("m1").await.unwrap();
        assert_eq!(versions.len(), 3);
        let latest_count = versions.iter().filter(|v| v.is_latest).count();
        assert_eq!(latest_count, 1);

        let latest = store.latest("m1").await.unwrap().unwrap();
        assert_eq!(latest.composite_score, 85.0);
        assert!(latest.is_latest);
    }

    #[tokio::test]
    async fn test_range_query() {
        let store = ScoreStore::new(Arc::new(MemoryBackend::new()));
        store.put_version(&version("m1", 95.0)).await.unwrap();
        store.put_version(&version("m2", 15.0)).await.unwrap();

        let now = Utc::now();
        let excellent = store
            .by_score_range(
                ScoreRange::Excellent,
                now - chrono::Duration::hours(1),
                now + chrono::Duration::hours(1),
            )
            .await
            .unwrap();
        assert_eq!(excellent.len(), 1);
        assert_eq!(excellent[0].media_id, "m1");
    }

    #[tokio::test]
    async fn test_statistics() {
        let store = ScoreStore::new(Arc::new(MemoryBackend::new()));
        for (id, score) in [("m1", 20.0), ("m2", 50.0), ("m3", 80.0)] {
            store.put_version(&version(id, score)).await.unwrap();
        }

        let now = Utc::now();
        let stats = store
            .statistics(
                now - chrono::Duration::hours(1),
                now + chrono::Duration::hours(1),
            )
            .await
            .unwrap();
        assert_eq!(stats.count, 3);
        assert!((stats.mean - 50.0).abs() < 1e-9);
        assert!((stats.median - 50.0).abs() < 1e-9);
        assert_eq!(stats.min, 20.0);
        assert_eq!(stats.max, 80.0);
        assert_eq!(stats.distribution["moderate"], 1);
        assert_eq!(stats.distribution["high"], 1);
    }

    #[tokio::test]
    async fn test_compact_keeps_latest() {
        let store = ScoreStore::new(Arc::new(MemoryBackend::new()));
        for score in [10.0, 20.0, 30.0, 40.0, 50.0] {
            store.put_version(&version("m1", score)).await.unwrap();
        }

        let deleted = store.compact("m1", 2).await.unwrap();
        assert_eq!(deleted, 3);

        let remaining = store.versions("m1").await.unwrap();
        assert_eq!(remaining.len(), 2);
        assert!(remaining.iter().any(|v| v.is_latest));
        assert_eq!(store.latest("m1").await.unwrap().unwrap().composite_score, 50.0);
    }

    #[tokio::test]
    async fn test_rejects_non_latest_write() {
        let store = ScoreStore::new(Arc::new(MemoryBackend::new()));
        let mut v = version("m1", 50.0);
        v.is_latest = false;
        assert!(store.put_version(&v).await.is_err());
    }
}
