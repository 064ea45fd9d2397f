//! Release proposals — the immutable input to governance.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::actor::Actor;
use crate::error::DomainError;

/// Declared version-bump intent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum BumpKind {
    /// Breaking release.
    Major,
    /// Feature release.
    Minor,
    /// Fix release.
    Patch,
    /// Pre-release tag.
    Prerelease,
    /// No version change.
    #[default]
    None,
}

impl BumpKind {
    /// Stable lowercase name used in rule contexts and persisted documents.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Major => "major",
            Self::Minor => "minor",
            Self::Patch => "patch",
            Self::Prerelease => "prerelease",
            Self::None => "none",
        }
    }

    /// Parse a lowercase bump name.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "major" => Some(Self::Major),
            "minor" => Some(Self::Minor),
            "patch" => Some(Self::Patch),
            "prerelease" => Some(Self::Prerelease),
            "none" => Some(Self::None),
            _ => None,
        }
    }
}

/// What the proposal covers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scope {
    /// Repository identifier (slug or path).
    pub repository: String,
    /// Commit range under consideration, e.g. `v1.2.0..HEAD`.
    pub commit_range: String,
}

/// The proposer's declared intent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Intent {
    /// One-line summary of the release.
    pub summary: String,
    /// Suggested version bump.
    pub suggested_bump: BumpKind,
    /// Proposer confidence in the suggestion, within `[0, 1]`.
    pub confidence: f64,
}

/// An immutable release proposal.
///
/// Validated once at construction; downstream code may assume the
/// invariants hold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Proposal {
    /// Stable proposal identifier.
    pub id: String,
    /// Who proposes the release.
    pub actor: Actor,
    /// Repository and commit range.
    pub scope: Scope,
    /// Declared intent.
    pub intent: Intent,
    /// When the proposal was created.
    pub created_at: DateTime<Utc>,
}

impl Proposal {
    /// Build a proposal, enforcing the construction invariants: non-empty
    /// repository and commit range, confidence within `[0, 1]`.
    pub fn new(
        id: impl Into<String>,
        actor: Actor,
        scope: Scope,
        intent: Intent,
        created_at: DateTime<Utc>,
    ) -> Result<Self, DomainError> {
        if scope.repository.trim().is_empty() {
            return Err(DomainError::Validation {
                field: "scope.repository".into(),
                reason: "must be non-empty".into(),
            });
        }
        if scope.commit_range.trim().is_empty() {
            return Err(DomainError::Validation {
                field: "scope.commit_range".into(),
                reason: "must be non-empty".into(),
            });
        }
        if !(0.0..=1.0).contains(&intent.confidence) {
            return Err(DomainError::Validation {
                field: "intent.confidence".into(),
                reason: format!("{} is outside [0, 1]", intent.confidence),
            });
        }
        Ok(Self { id: id.into(), actor, scope, intent, created_at })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actor::TrustLevel;

    fn scope() -> Scope {
        Scope { repository: "acme/widgets".into(), commit_range: "v1.0.0..HEAD".into() }
    }

    fn intent(confidence: f64) -> Intent {
        Intent { summary: "routine fixes".into(), suggested_bump: BumpKind::Patch, confidence }
    }

    #[test]
    fn accepts_valid_proposal() {
        let p = Proposal::new(
            "prop-1",
            Actor::human("alice", "Alice", TrustLevel::Full),
            scope(),
            intent(0.9),
            Utc::now(),
        )
        .unwrap();
        assert_eq!(p.intent.suggested_bump, BumpKind::Patch);
    }

    #[test]
    fn rejects_empty_repository() {
        let err = Proposal::new(
            "prop-2",
            Actor::human("alice", "Alice", TrustLevel::Full),
            Scope { repository: " ".into(), commit_range: "a..b".into() },
            intent(0.5),
            Utc::now(),
        )
        .unwrap_err();
        assert_eq!(err.kind(), "validation_error");
    }

    #[test]
    fn rejects_out_of_range_confidence() {
        let err = Proposal::new(
            "prop-3",
            Actor::human("alice", "Alice", TrustLevel::Full),
            scope(),
            intent(1.2),
            Utc::now(),
        )
        .unwrap_err();
        assert_eq!(err.kind(), "validation_error");
    }

    #[test]
    fn bump_kind_round_trips_names() {
        for kind in [BumpKind::Major, BumpKind::Minor, BumpKind::Patch, BumpKind::Prerelease, BumpKind::None] {
            assert_eq!(BumpKind::parse(kind.as_str()), Some(kind));
        }
        assert_eq!(BumpKind::parse("huge"), None);
    }
}
