//! Queue contract and the worker loop
//!
//! Handlers are triggered by queue messages of the form
//! `{mediaId, stage, ...}` or scheduler messages of the form
//! `{detail-type: "timeout-check" | "reassignment-check" |
//! "escalation-check" | "cleanup"}`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::time::Duration;

use hlekkr_core::PipelineError;

/// A message a worker consumes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum QueueMessage {
    /// Scheduler tick
    Scheduler {
        #[serde(rename = "detail-type")]
        detail_type: String,
    },
    /// Stage trigger for one media item
    Stage {
        #[serde(rename = "mediaId")]
        media_id: String,
        stage: String,
        #[serde(default)]
        payload: serde_json::Value,
    },
}

/// Queue seam; production wires a real message queue.
#[async_trait]
pub trait QueueBackend: Send + Sync + std::fmt::Debug {
    async fn enqueue(&self, message: QueueMessage) -> Result<(), PipelineError>;
    async fn dequeue(&self) -> Result<Option<QueueMessage>, PipelineError>;
    /// Approximate backlog, drives backpressure degradation
    async fn depth(&self) -> usize;
}

/// In-memory FIFO queue (for tests and single-node runs).
#[derive(Debug, Default)]
pub struct MemoryQueue {
    messages: tokio::sync::Mutex<VecDeque<QueueMessage>>,
}

impl MemoryQueue {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl QueueBackend for MemoryQueue {
    async fn enqueue(&self, message: QueueMessage) -> Result<(), PipelineError> {
        self.messages.lock().await.push_back(message);
        Ok(())
    }

    async fn dequeue(&self) -> Result<Option<QueueMessage>, PipelineError> {
        Ok(self.messages.lock().await.pop_front())
    }

    async fn depth(&self) -> usize {
        self.messages.lock().await.len()
    }
}

/// Message-loop driver over a pipeline.
#[derive(Debug, Clone, Copy)]
pub struct WorkerConfig {
    pub poll_interval: Duration,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(100),
        }
    }
}

/// A worker drains the queue into the pipeline dispatcher. Each worker
/// processes one message at a time; scale horizontally by running more
/// workers.
pub struct Worker<B: hlekkr_persist::DocumentBackend + ?Sized + 'static> {
    pipeline: std::sync::Arc<crate::pipeline::Pipeline<B>>,
    queue: std::sync::Arc<dyn QueueBackend>,
    config: WorkerConfig,
}

impl<B: hlekkr_persist::DocumentBackend + ?Sized + 'static> Worker<B> {
    pub fn new(
        pipeline: std::sync::Arc<crate::pipeline::Pipeline<B>>,
        queue: std::sync::Arc<dyn QueueBackend>,
        config: WorkerConfig,
    ) -> Self {
        Self {
            pipeline,
            queue,
            config,
        }
    }

    /// Drain everything currently queued; returns handled message count.
    pub async fn drain(&self) -> Result<usize, PipelineError> {
        let mut handled = 0;
        while let Some(message) = self.queue.dequeue().await? {
            let depth = self.queue.depth().await;
            self.pipeline.set_backpressure(depth);
            let response = self.pipeline.dispatch(message).await;
            if !response.is_success() {
                tracing::warn!(
                    status = response.status_code,
                    body = %response.body,
                    "message handling failed"
                );
            }
            handled += 1;
        }
        Ok(handled)
    }

    /// Run forever, polling the queue.
    pub async fn run(&self) -> Result<(), PipelineError> {
        tracing::info!("worker started");
        loop {
            let handled = self.drain().await?;
            if handled == 0 {
                tokio::time::sleep(self.config.poll_interval).await;
            }
        }
    }
}
