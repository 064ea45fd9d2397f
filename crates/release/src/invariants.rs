//! Aggregate invariant validation.
//!
//! Checked by tests after every transition and by the unit of work before
//! writing. Each named invariant reports validity and a message; the
//! aggregate is valid when all of them hold.

use crate::run::ReleaseRun;
use crate::state::RunState;
use crate::steps::StepState;

/// One named invariant check result.
#[derive(Debug, Clone)]
pub struct InvariantCheck {
    /// Stable invariant name.
    pub name: &'static str,
    /// Whether it holds.
    pub valid: bool,
    /// Explanation when it does not.
    pub message: String,
}

impl InvariantCheck {
    fn ok(name: &'static str) -> Self {
        Self { name, valid: true, message: String::new() }
    }

    fn fail(name: &'static str, message: impl Into<String>) -> Self {
        Self { name, valid: false, message: message.into() }
    }
}

/// Run every invariant against the aggregate.
#[must_use]
pub fn validate_invariants(run: &ReleaseRun) -> Vec<InvariantCheck> {
    let mut checks = Vec::with_capacity(11);

    checks.push(if run.id.is_empty() {
        InvariantCheck::fail("id_present", "run id is empty")
    } else {
        InvariantCheck::ok("id_present")
    });

    checks.push(if run.plan.repo_root.is_empty() {
        InvariantCheck::fail("repo_root_present", "repo root is empty")
    } else {
        InvariantCheck::ok("repo_root_present")
    });

    checks.push(if run.plan.head_sha.is_empty() {
        InvariantCheck::fail("head_sha_present", "head SHA is not pinned")
    } else {
        InvariantCheck::ok("head_sha_present")
    });

    checks.push(if run.state.is_beyond(RunState::Planned) && run.version_next.is_none() {
        InvariantCheck::fail(
            "version_set_beyond_planned",
            format!("state {} but no next version", run.state.as_str()),
        )
    } else {
        InvariantCheck::ok("version_set_beyond_planned")
    });

    checks.push(if run.state.is_beyond(RunState::Versioned)
        && run.state != RunState::NotesReady
        && run.notes.is_none()
    {
        InvariantCheck::fail(
            "notes_set_beyond_notes_ready",
            format!("state {} but no notes", run.state.as_str()),
        )
    } else if run.state == RunState::NotesReady && run.notes.is_none() {
        InvariantCheck::fail("notes_set_beyond_notes_ready", "notes_ready without notes")
    } else {
        InvariantCheck::ok("notes_set_beyond_notes_ready")
    });

    let approval_states =
        [RunState::Approved, RunState::Publishing, RunState::Published];
    checks.push(if approval_states.contains(&run.state) && run.approval.is_none() {
        InvariantCheck::fail(
            "approval_set_when_approved",
            format!("state {} but no approval", run.state.as_str()),
        )
    } else {
        InvariantCheck::ok("approval_set_when_approved")
    });

    let published = run.state == RunState::Published;
    checks.push(match (published, run.published_at.is_some()) {
        (true, false) => InvariantCheck::fail("published_at_iff_published", "published without timestamp"),
        (false, true) => InvariantCheck::fail(
            "published_at_iff_published",
            format!("published_at set while {}", run.state.as_str()),
        ),
        _ => InvariantCheck::ok("published_at_iff_published"),
    });

    checks.push(if run.created_at > run.updated_at {
        InvariantCheck::fail("timestamps_ordered", "created_at is after updated_at")
    } else {
        InvariantCheck::ok("timestamps_ordered")
    });

    checks.push(if run.state != RunState::Draft && !run.plan.is_pinned() {
        InvariantCheck::fail(
            "plan_pinned_beyond_draft",
            format!("state {} without pinned plan facts", run.state.as_str()),
        )
    } else {
        InvariantCheck::ok("plan_pinned_beyond_draft")
    });

    checks.push(if run.state == RunState::Publishing && run.steps.is_empty() {
        InvariantCheck::fail("steps_set_when_publishing", "publishing without execution steps")
    } else {
        InvariantCheck::ok("steps_set_when_publishing")
    });

    let history_consistent = run.history.last().map_or(true, |r| r.to == run.state);
    let steps_settled_when_published = run.state != RunState::Published
        || run.step_status.iter().all(|s| matches!(s.state, StepState::Done | StepState::Skipped));
    checks.push(if !history_consistent {
        InvariantCheck::fail("history_consistent", "last transition does not land in current state")
    } else if !steps_settled_when_published {
        InvariantCheck::fail("history_consistent", "published with unsettled steps")
    } else {
        InvariantCheck::ok("history_consistent")
    });

    checks
}

/// Conjunction of all invariants.
#[must_use]
pub fn is_valid(run: &ReleaseRun) -> bool {
    validate_invariants(run).iter().all(|c| c.valid)
}
