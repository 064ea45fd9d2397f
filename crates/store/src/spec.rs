//! Composable query specifications over release runs.
//!
//! A specification is a small predicate; `and`/`or`/`not` close them under
//! boolean composition so call sites can build queries without touching
//! the store's scan code.

use release::{ReleaseRun, RunState};

/// A predicate over one run.
pub trait Specification: Send + Sync {
    /// Whether the run satisfies this specification.
    fn is_satisfied_by(&self, run: &ReleaseRun) -> bool;
}

/// Boolean composition helpers for specifications.
pub trait SpecificationExt: Specification + Sized {
    /// Both must hold.
    fn and<O: Specification>(self, other: O) -> And<Self, O> {
        And(self, other)
    }

    /// Either must hold.
    fn or<O: Specification>(self, other: O) -> Or<Self, O> {
        Or(self, other)
    }

    /// Must not hold.
    fn not(self) -> Not<Self> {
        Not(self)
    }
}

impl<S: Specification + Sized> SpecificationExt for S {}

/// Conjunction of two specifications.
pub struct And<A, B>(pub A, pub B);

impl<A: Specification, B: Specification> Specification for And<A, B> {
    fn is_satisfied_by(&self, run: &ReleaseRun) -> bool {
        self.0.is_satisfied_by(run) && self.1.is_satisfied_by(run)
    }
}

/// Disjunction of two specifications.
pub struct Or<A, B>(pub A, pub B);

impl<A: Specification, B: Specification> Specification for Or<A, B> {
    fn is_satisfied_by(&self, run: &ReleaseRun) -> bool {
        self.0.is_satisfied_by(run) || self.1.is_satisfied_by(run)
    }
}

/// Negation of a specification.
pub struct Not<S>(pub S);

impl<S: Specification> Specification for Not<S> {
    fn is_satisfied_by(&self, run: &ReleaseRun) -> bool {
        !self.0.is_satisfied_by(run)
    }
}

/// Runs in a specific state.
pub struct ByState(pub RunState);

impl Specification for ByState {
    fn is_satisfied_by(&self, run: &ReleaseRun) -> bool {
        run.state == self.0
    }
}

/// Runs planned from a specific base ref.
pub struct ByBranch(pub String);

impl Specification for ByBranch {
    fn is_satisfied_by(&self, run: &ReleaseRun) -> bool {
        run.plan.base_ref == self.0
    }
}

/// Runs rooted at a specific working tree.
pub struct ByRepositoryPath(pub String);

impl Specification for ByRepositoryPath {
    fn is_satisfied_by(&self, run: &ReleaseRun) -> bool {
        run.plan.repo_root == self.0
    }
}

/// Runs that have not reached a terminal state.
pub struct Active;

impl Specification for Active {
    fn is_satisfied_by(&self, run: &ReleaseRun) -> bool {
        !run.state.is_terminal()
    }
}

/// Runs in a terminal state.
pub struct Final;

impl Specification for Final {
    fn is_satisfied_by(&self, run: &ReleaseRun) -> bool {
        run.state.is_terminal()
    }
}

/// Runs that may start publishing right now.
pub struct ReadyForPublish;

impl Specification for ReadyForPublish {
    fn is_satisfied_by(&self, run: &ReleaseRun) -> bool {
        run.can_proceed_to_publish().is_ok()
    }
}

/// Runs with notes attached.
pub struct HasNotes;

impl Specification for HasNotes {
    fn is_satisfied_by(&self, run: &ReleaseRun) -> bool {
        run.notes.is_some()
    }
}

/// Runs with a recorded approval.
pub struct IsApproved;

impl Specification for IsApproved {
    fn is_satisfied_by(&self, run: &ReleaseRun) -> bool {
        run.approval.is_some()
    }
}

/// Runs pinned to a specific head SHA.
pub struct HeadShaMatches(pub String);

impl Specification for HeadShaMatches {
    fn is_satisfied_by(&self, run: &ReleaseRun) -> bool {
        run.plan.head_sha == self.0
    }
}

/// Runs whose recorded risk score is below a threshold.
pub struct RiskBelowThreshold(pub f64);

impl Specification for RiskBelowThreshold {
    fn is_satisfied_by(&self, run: &ReleaseRun) -> bool {
        run.risk_score < self.0
    }
}

/// Runs eligible for automatic approval: still active, not yet approved,
/// and under the risk threshold.
pub struct CanAutoApprove(pub f64);

impl Specification for CanAutoApprove {
    fn is_satisfied_by(&self, run: &ReleaseRun) -> bool {
        !run.state.is_terminal() && run.approval.is_none() && run.risk_score < self.0
    }
}
