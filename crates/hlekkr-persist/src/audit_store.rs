//! Audit trail storage
//!
//! One row per stage event, keyed `(mediaId, timestamp)`, with a secondary
//! index row per `(eventType, timestamp)` mirroring the document store's GSI.

use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use uuid::Uuid;

use crate::backend::{DocumentBackend, DocumentExt, StorageError};
use crate::keys::sort_key_ts;
use hlekkr_core::{AuditEvent, AuditEventType};

/// Audit store for the per-media processing trail
#[derive(Debug)]
pub struct AuditStore<B: DocumentBackend + ?Sized> {
    backend: Arc<B>,
}

impl<B: DocumentBackend + ?Sized> AuditStore<B> {
    pub fn new(backend: Arc<B>) -> Self {
        Self { backend }
    }

    fn event_key(media_id: &str, ts: DateTime<Utc>, id: &Uuid) -> String {
        format!("audit:{media_id}:{}:{id}", sort_key_ts(ts))
    }

    fn type_index_key(event_type: AuditEventType, ts: DateTime<Utc>, id: &Uuid) -> String {
        format!("audit~type:{}:{}:{id}", event_type.as_str(), sort_key_ts(ts))
    }

    /// Append an audit event. Idempotent per `(mediaId, stage)` in the sense
    /// that re-writing an identical event produces an identical row.
    pub async fn append(&self, event: &AuditEvent) -> Result<Uuid, StorageError> {
        let id = Uuid::new_v4();
        let key = Self::event_key(&event.media_id, event.timestamp, &id);
        let ttl = if event.event_type == AuditEventType::AiFeedback {
            Some(event.timestamp + Duration::days(crate::retention::AI_FEEDBACK_DAYS))
        } else {
            None
        };
        match ttl {
            Some(expires_at) => self.backend.put_with_ttl(&key, event, expires_at).await?,
            None => self.backend.put(&key, event).await?,
        }
        // Index row points back at the primary key
        self.backend
            .put(
                &Self::type_index_key(event.event_type, event.timestamp, &id),
                &key,
            )
            .await?;
        Ok(id)
    }

    /// All events for a media item, oldest first.
    pub async fn events_for_media(&self, media_id: &str) -> Result<Vec<AuditEvent>, StorageError> {
        let prefix = format!("audit:{media_id}:");
        let keys = self.backend.list_keys(&prefix).await?;
        let mut events = Vec::with_capacity(keys.len());
        for key in keys {
            if let Some(event) = self.backend.get(&key).await? {
                events.push(event);
            }
        }
        Ok(events)
    }

    /// Events of one type across media, bounded by a time window.
    pub async fn events_by_type(
        &self,
        event_type: AuditEventType,
        since: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Result<Vec<AuditEvent>, StorageError> {
        let prefix = format!("audit~type:{}:", event_type.as_str());
        let lower = format!("{prefix}{}", sort_key_ts(since));
        let upper = format!("{prefix}{}", sort_key_ts(until));

        let keys = self.backend.list_keys(&prefix).await?;
        let mut events = Vec::new();
        for index_key in keys {
            if index_key.as_str() < lower.as_str() || index_key.as_str() > upper.as_str() {
                continue;
            }
            let primary: Option<String> = self.backend.get(&index_key).await?;
            if let Some(primary) = primary {
                if let Some(event) = self.backend.get(&primary).await? {
                    events.push(event);
                }
            }
        }
        Ok(events)
    }

    /// Latest event of a type for one media item, if any.
    pub async fn latest_of_type(
        &self,
        media_id: &str,
        event_type: AuditEventType,
    ) -> Result<Option<AuditEvent>, StorageError> {
        let events = self.events_for_media(media_id).await?;
        Ok(events
            .into_iter()
            .filter(|e| e.event_type == event_type)
            .next_back())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MemoryBackend;
    use serde_json::json;

    fn event(media_id: &str, event_type: AuditEventType) -> AuditEvent {
        AuditEvent::new(media_id, event_type, "test", json!({"ok": true}))
    }

    #[tokio::test]
    async fn test_append_and_fetch_in_order() {
        let store = AuditStore::new(Arc::new(MemoryBackend::new()));

        store
            .append(&event("m1", AuditEventType::MediaUpload))
            .await
            .unwrap();
        store
            .append(&event("m1", AuditEventType::SecurityScan))
            .await
            .unwrap();
        store
            .append(&event("m2", AuditEventType::MediaUpload))
            .await
            .unwrap();

        let events = store.events_for_media("m1").await.unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].event_type, AuditEventType::MediaUpload);
        assert_eq!(events[1].event_type, AuditEventType::SecurityScan);
    }

    #[tokio::test]
    async fn test_events_by_type_window() {
        let store = AuditStore::new(Arc::new(MemoryBackend::new()));
        store
            .append(&event("m1", AuditEventType::ReviewDecision))
            .await
            .unwrap();
        store
            .append(&event("m2", AuditEventType::ReviewDecision))
            .await
            .unwrap();

        let now = Utc::now();
        let events = store
            .events_by_type(
                AuditEventType::ReviewDecision,
                now - Duration::hours(1),
                now + Duration::hours(1),
            )
            .await
            .unwrap();
        assert_eq!(events.len(), 2);

        let none = store
            .events_by_type(
                AuditEventType::ReviewDecision,
                now - Duration::hours(3),
                now - Duration::hours(2),
            )
            .await
            .unwrap();
        assert!(none.is_empty());
    }

    #[tokio::test]
    async fn test_latest_of_type() {
        let store = AuditStore::new(Arc::new(MemoryBackend::new()));
        let mut first = event("m1", AuditEventType::TrustScoreCalculation);
        first.data = json!({"compositeScore": 40.0});
        store.append(&first).await.unwrap();

        let mut second = event("m1", AuditEventType::TrustScoreCalculation);
        second.timestamp = first.timestamp + Duration::seconds(5);
        second.data = json!({"compositeScore": 70.0});
        store.append(&second).await.unwrap();

        let latest = store
            .latest_of_type("m1", AuditEventType::TrustScoreCalculation)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(latest.data["compositeScore"], 70.0);
    }
}
