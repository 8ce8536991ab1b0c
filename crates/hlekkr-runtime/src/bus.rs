//! Notification bus contract

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use hlekkr_core::{PipelineError, Severity};

/// Notification topics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Topic {
    SecurityAlerts,
    DiscrepancyAlerts,
    ModeratorAlerts,
    ThreatAlerts,
    ExternalSharing,
}

impl Topic {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SecurityAlerts => "security_alerts",
            Self::DiscrepancyAlerts => "discrepancy_alerts",
            Self::ModeratorAlerts => "moderator_alerts",
            Self::ThreatAlerts => "threat_alerts",
            Self::ExternalSharing => "external_sharing",
        }
    }
}

/// One published message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub notification_type: String,
    pub severity: Severity,
    /// Media id or report id the message concerns
    pub subject_id: String,
    pub payload: serde_json::Value,
}

impl Notification {
    pub fn new(
        notification_type: impl Into<String>,
        severity: Severity,
        subject_id: impl Into<String>,
        payload: serde_json::Value,
    ) -> Self {
        Self {
            notification_type: notification_type.into(),
            severity,
            subject_id: subject_id.into(),
            payload,
        }
    }
}

/// Bus seam; production wires a real pub/sub topic per variant.
#[async_trait]
pub trait NotificationBus: Send + Sync + std::fmt::Debug {
    async fn publish(&self, topic: Topic, notification: Notification)
        -> Result<(), PipelineError>;
}

/// In-memory bus that records published messages (for tests).
#[derive(Debug, Default)]
pub struct MemoryBus {
    published: tokio::sync::Mutex<Vec<(Topic, Notification)>>,
}

impl MemoryBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn published(&self) -> Vec<(Topic, Notification)> {
        self.published.lock().await.clone()
    }

    pub async fn count_for(&self, topic: Topic) -> usize {
        self.published
            .lock()
            .await
            .iter()
            .filter(|(t, _)| *t == topic)
            .count()
    }
}

#[async_trait]
impl NotificationBus for MemoryBus {
    async fn publish(
        &self,
        topic: Topic,
        notification: Notification,
    ) -> Result<(), PipelineError> {
        tracing::debug!(
            topic = topic.as_str(),
            notification_type = %notification.notification_type,
            subject = %notification.subject_id,
            "notification published"
        );
        self.published.lock().await.push((topic, notification));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_memory_bus_records() {
        let bus = MemoryBus::new();
        bus.publish(
            Topic::ThreatAlerts,
            Notification::new("THREAT_REPORT", Severity::High, "report-1", json!({})),
        )
        .await
        .unwrap();

        assert_eq!(bus.count_for(Topic::ThreatAlerts).await, 1);
        assert_eq!(bus.count_for(Topic::SecurityAlerts).await, 0);
        let published = bus.published().await;
        assert_eq!(published[0].1.subject_id, "report-1");
    }
}
