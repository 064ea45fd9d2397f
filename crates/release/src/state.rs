//! Release-run lifecycle states.

use serde::{Deserialize, Serialize};

/// The lifecycle state of a release run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    /// Created, nothing pinned yet.
    Draft,
    /// Planning facts pinned.
    Planned,
    /// Next version chosen.
    Versioned,
    /// Release notes attached.
    NotesReady,
    /// Approval recorded against the plan hash.
    Approved,
    /// Execution steps running.
    Publishing,
    /// Terminal: release is out.
    Published,
    /// Something went wrong; retryable.
    Failed,
    /// Terminal: abandoned (still retryable by explicit request).
    Canceled,
}

impl RunState {
    /// Stable snake-case name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Planned => "planned",
            Self::Versioned => "versioned",
            Self::NotesReady => "notes_ready",
            Self::Approved => "approved",
            Self::Publishing => "publishing",
            Self::Published => "published",
            Self::Failed => "failed",
            Self::Canceled => "canceled",
        }
    }

    /// Parse a stable state name.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "draft" => Some(Self::Draft),
            "planned" => Some(Self::Planned),
            "versioned" => Some(Self::Versioned),
            "notes_ready" => Some(Self::NotesReady),
            "approved" => Some(Self::Approved),
            "publishing" => Some(Self::Publishing),
            "published" => Some(Self::Published),
            "failed" => Some(Self::Failed),
            "canceled" => Some(Self::Canceled),
            _ => None,
        }
    }

    /// Terminal states admit no further transitions (except `retry` from
    /// `Canceled`).
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Published | Self::Canceled)
    }

    /// Position on the happy path, `None` for `Failed`/`Canceled`.
    #[must_use]
    pub const fn pipeline_order(self) -> Option<u8> {
        match self {
            Self::Draft => Some(0),
            Self::Planned => Some(1),
            Self::Versioned => Some(2),
            Self::NotesReady => Some(3),
            Self::Approved => Some(4),
            Self::Publishing => Some(5),
            Self::Published => Some(6),
            Self::Failed | Self::Canceled => None,
        }
    }

    /// Whether this state sits strictly beyond `other` on the happy path.
    /// Off-path states are never "beyond" anything.
    #[must_use]
    pub fn is_beyond(self, other: Self) -> bool {
        match (self.pipeline_order(), other.pipeline_order()) {
            (Some(a), Some(b)) => a > b,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_round_trip() {
        for state in [
            RunState::Draft,
            RunState::Planned,
            RunState::Versioned,
            RunState::NotesReady,
            RunState::Approved,
            RunState::Publishing,
            RunState::Published,
            RunState::Failed,
            RunState::Canceled,
        ] {
            assert_eq!(RunState::parse(state.as_str()), Some(state));
        }
    }

    #[test]
    fn terminality() {
        assert!(RunState::Published.is_terminal());
        assert!(RunState::Canceled.is_terminal());
        assert!(!RunState::Failed.is_terminal());
        assert!(!RunState::Publishing.is_terminal());
    }

    #[test]
    fn beyond_is_pipeline_only() {
        assert!(RunState::Versioned.is_beyond(RunState::Planned));
        assert!(!RunState::Planned.is_beyond(RunState::Planned));
        assert!(!RunState::Failed.is_beyond(RunState::Draft));
        assert!(!RunState::Published.is_beyond(RunState::Failed));
    }
}
