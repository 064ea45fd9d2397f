//! Stable error taxonomy shared across the domain layer.
//!
//! Every variant maps to a stable sentinel kind string surfaced to adapters
//! and tests. Adapters wrap these with context ("op: description: cause");
//! the domain layer itself returns them untouched.

use thiserror::Error;

/// Domain-level errors with stable sentinel kinds.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DomainError {
    /// The requested aggregate transition is not allowed from the current state.
    #[error("invalid state transition: cannot {event} while {from}; expected state {expected}")]
    InvalidStateTransition {
        /// State the aggregate was in when the transition was attempted.
        from: String,
        /// The transition label that was attempted.
        event: String,
        /// Human-readable description of the states the transition accepts.
        expected: String,
    },

    /// A release plan is required but missing.
    #[error("release plan is missing")]
    NilPlan,

    /// Release notes are required but missing.
    #[error("release notes are missing")]
    NilNotes,

    /// Publish was attempted before approval.
    #[error("release is not approved")]
    NotApproved,

    /// The release already reached the terminal Published state.
    #[error("release is already published")]
    AlreadyPublished,

    /// The plan changed since the approval snapshot was taken.
    #[error("approval is bound to plan hash {approved}, current plan hash is {current}; re-approval required")]
    ApprovalBoundToHash {
        /// Plan hash captured at approval time.
        approved: String,
        /// Plan hash computed from the current plan.
        current: String,
    },

    /// The repository head moved since planning.
    #[error("repository head moved from {planned} to {current}; re-plan required")]
    HeadShaChanged {
        /// Head SHA pinned at plan time.
        planned: String,
        /// Head SHA observed now.
        current: String,
    },

    /// A publishing step with the given name does not exist on the plan.
    #[error("step not found: {0}")]
    StepNotFound(String),

    /// The named publishing step already completed.
    #[error("step already done: {0}")]
    StepAlreadyDone(String),

    /// An aggregate, record, or template could not be located.
    #[error("not found: {0}")]
    NotFound(String),

    /// A required service or setting is absent.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A deadline elapsed before the operation finished.
    #[error("timeout: {0}")]
    Timeout(String),

    /// The operation was canceled cooperatively.
    #[error("operation canceled")]
    Canceled,

    /// A value failed its construction invariant.
    #[error("invalid {field}: {reason}")]
    Validation {
        /// The offending field.
        field: String,
        /// Why it was rejected.
        reason: String,
    },
}

impl DomainError {
    /// Stable sentinel kind for this error, suitable for wire surfaces and
    /// exit-code mapping.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidStateTransition { .. } => "invalid_state_transition",
            Self::NilPlan => "nil_plan",
            Self::NilNotes => "nil_notes",
            Self::NotApproved => "not_approved",
            Self::AlreadyPublished => "already_published",
            Self::ApprovalBoundToHash { .. } => "approval_bound_to_hash",
            Self::HeadShaChanged { .. } => "head_sha_changed",
            Self::StepNotFound(_) => "step_not_found",
            Self::StepAlreadyDone(_) => "step_already_done",
            Self::NotFound(_) => "not_found",
            Self::Configuration(_) => "configuration_error",
            Self::Timeout(_) => "timeout",
            Self::Canceled => "canceled",
            Self::Validation { .. } => "validation_error",
        }
    }
}
