//! # Hlekkr Review
//!
//! The human-review lifecycle: moderator accounts with role-capped
//! workloads, a review queue driven by compare-and-set status transitions,
//! scheduled sweeps for timeouts/reassignment/escalation/cleanup, and the
//! completion validator that turns a moderator's decision into downstream
//! effects (score recalculation, AI feedback, threat-intel dispatch).

pub mod completion;
pub mod lifecycle;
pub mod moderator;
pub mod queue;

pub use completion::{
    CompletionOutcome, CompletionValidator, ConfidenceLevel, Decision, DecisionInput,
    DecisionStore, DecisionType, FeedbackType, ThreatLevel,
};
pub use lifecycle::{ModeratorActivity, ReviewLifecycle, SweepReport};
pub use moderator::{
    Moderator, ModeratorRole, ModeratorStatistics, ModeratorStatus, ModeratorStore,
};
pub use queue::{ReviewItem, ReviewPriority, ReviewStatus, ReviewStore};
