//! # Hlekkr Persist
//!
//! Storage contracts for the pipeline's external collaborators: the document
//! store backing audit/custody/score/review/threat tables and the object
//! store holding binary media. The crate ships in-memory backends for tests
//! plus the audit-trail store every stage writes through. No persistence
//! engine lives here — production deployments implement [`DocumentBackend`]
//! and [`ObjectStore`] against their store of choice.
//!
//! Domain-specific stores (custody chain, score versions, review queue,
//! threat indicators) live with their domain crates and compose these
//! contracts.

pub mod audit_store;
pub mod backend;
pub mod keys;
pub mod object_store;

pub use audit_store::AuditStore;
pub use backend::{DocumentBackend, DocumentExt, MemoryBackend, StorageError};
pub use keys::sort_key_ts;
pub use object_store::{HeadMetadata, MemoryObjectStore, ObjectStore};

/// Retention periods applied as per-item TTLs (per deployment table).
pub mod retention {
    /// Custody events: 7 years
    pub const CUSTODY_DAYS: i64 = 7 * 365;
    /// Review decisions: 2 years
    pub const DECISION_DAYS: i64 = 2 * 365;
    /// AI feedback events: 1 year
    pub const AI_FEEDBACK_DAYS: i64 = 365;
    /// Threat reports: 2 years
    pub const THREAT_REPORT_DAYS: i64 = 2 * 365;
}
