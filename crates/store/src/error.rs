//! Storage-layer errors.

use thiserror::Error;

use relicta_core::DomainError;

/// Errors from persistence and the unit of work.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Filesystem failure.
    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    /// Document (de)serialization failure.
    #[error("serialize: {0}")]
    Serde(#[from] serde_json::Error),

    /// A domain sentinel passed through unchanged.
    #[error(transparent)]
    Domain(#[from] DomainError),

    /// `begin` on a UoW that already has a scope open.
    #[error("unit of work already active")]
    AlreadyActive,

    /// Any staged operation on a UoW without an open scope.
    #[error("unit of work is not active")]
    NotActive,

    /// A document exceeded the read size cap.
    #[error("document too large: {size} bytes exceeds cap of {max}")]
    TooLarge {
        /// Observed size.
        size: u64,
        /// Configured cap.
        max: u64,
    },
}

impl StoreError {
    /// Stable sentinel kind, delegating to the domain taxonomy where one
    /// passes through.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Io(_) => "io_error",
            Self::Serde(_) => "serialize_error",
            Self::Domain(d) => d.kind(),
            Self::AlreadyActive => "unit_of_work_already_active",
            Self::NotActive => "unit_of_work_not_active",
            Self::TooLarge { .. } => "document_too_large",
        }
    }
}
