//! # Hlekkr Custody
//!
//! The chain-of-custody ledger: every pipeline stage appends a signed,
//! hash-linked event per media item. Events carry an HMAC-SHA256 integrity
//! proof over their canonical serialization and link to their predecessor by
//! event hash, so any tampering surfaces as a broken signature or a broken
//! chain.
//!
//! ```rust,no_run
//! # use std::sync::Arc;
//! # use hlekkr_custody::{CustodyLedger, RecordRequest, signer::{CustodySigner, StaticKeySource}};
//! # use hlekkr_persist::MemoryBackend;
//! # use hlekkr_core::ProcessingStage;
//! # async fn example() -> Result<(), hlekkr_core::PipelineError> {
//! let signer = CustodySigner::initialize(&StaticKeySource::new(b"dev-secret")).await?;
//! let ledger = CustodyLedger::new(Arc::new(MemoryBackend::new()), signer);
//!
//! ledger.record(RecordRequest {
//!     media_id: "media-1".into(),
//!     stage: ProcessingStage::SecurityScan,
//!     actor: "security_scanner".into(),
//!     action: "scan_completed".into(),
//!     ..Default::default()
//! }).await?;
//!
//! let verdict = ledger.verify_chain("media-1").await?;
//! # Ok(())
//! # }
//! ```

pub mod ledger;
pub mod provenance;
pub mod signer;
pub mod types;

pub use ledger::{CustodyLedger, RecordRequest};
pub use provenance::{CustodySummary, ProvenanceGraph, ProvenanceMetrics};
pub use signer::{CustodySigner, KeySource, StaticKeySource};
pub use types::{ChainVerdict, CustodyEvent, IntegrityProof, IntegrityStatus};
