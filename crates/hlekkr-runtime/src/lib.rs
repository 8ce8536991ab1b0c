//! # Hlekkr Runtime
//!
//! Wires the pipeline together: queue-triggered stage handlers, the
//! security scanner, scheduler sweep entrypoints, the notification bus and
//! metrics contracts, configuration, and bounded retry for CAS races.
//! Workers share no in-process mutable state; all coordination happens
//! through the document store.

pub mod bus;
pub mod config;
pub mod metrics;
pub mod pipeline;
pub mod retry;
pub mod scanner;
pub mod worker;

pub use bus::{MemoryBus, Notification, NotificationBus, Topic};
pub use config::HlekkrConfig;
pub use metrics::PipelineMetrics;
pub use pipeline::{Pipeline, PipelineBuilder};
pub use retry::retry_with_backoff;
pub use scanner::{ScanFinding, ScanResult, SecurityScanner};
pub use worker::{MemoryQueue, QueueBackend, QueueMessage, Worker};
