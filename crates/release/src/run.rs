//! The `ReleaseRun` aggregate root.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use relicta_core::ids::run_id_from_plan_hash;
use relicta_core::version::tag_name;
use relicta_core::{Actor, BumpKind, DomainError, Version};

use crate::approval::{Approval, ApprovalLevel, ApprovalPolicy, MultiLevelApproval};
use crate::events::DomainEvent;
use crate::notes::ReleaseNotes;
use crate::plan::ReleasePlan;
use crate::state::RunState;
use crate::steps::{StepPlan, StepState, StepStatus};

/// One recorded state transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionRecord {
    /// State before.
    pub from: RunState,
    /// State after.
    pub to: RunState,
    /// Transition label, e.g. `approve`.
    pub event: String,
    /// Kind-prefixed actor id that drove the transition.
    pub actor: String,
    /// Free-form reason.
    #[serde(default)]
    pub reason: String,
    /// Extra transition context.
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
    /// When the transition happened.
    pub at: DateTime<Utc>,
}

/// The release-run aggregate root.
///
/// Identity is `run-` plus the first 16 hex chars of the plan hash computed
/// at creation; the id never changes afterwards, while the live plan hash
/// is always recomputed from current fields so post-approval edits are
/// observable.
#[derive(Debug, Clone, PartialEq)]
pub struct ReleaseRun {
    /// Run identity, stable once assigned.
    pub id: String,
    /// Pinned planning facts.
    pub plan: ReleasePlan,
    /// Version released previously.
    pub version_current: Option<Version>,
    /// Version this run will release.
    pub version_next: Option<Version>,
    /// The bump that produced `version_next`.
    pub bump: Option<BumpKind>,
    /// Risk score recorded at evaluation time.
    pub risk_score: f64,
    /// Decision rationale carried onto the run.
    pub reasons: Vec<String>,
    /// Tag to cut, set at bump time.
    pub tag_name: Option<String>,
    /// Attached release notes.
    pub notes: Option<ReleaseNotes>,
    /// Single-approval record.
    pub approval: Option<Approval>,
    /// Multi-level approval state, when a policy is declared.
    pub multi_approval: Option<MultiLevelApproval>,
    /// Planned publishing steps.
    pub steps: Vec<StepPlan>,
    /// Execution status per step, parallel to `steps`.
    pub step_status: Vec<StepStatus>,
    /// Current lifecycle state.
    pub state: RunState,
    /// Every transition taken, in order.
    pub history: Vec<TransitionRecord>,
    /// Error from the most recent failure.
    pub last_error: Option<String>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last mutation time.
    pub updated_at: DateTime<Utc>,
    /// Set exactly when `Published`.
    pub published_at: Option<DateTime<Utc>>,
    events: Vec<DomainEvent>,
}

impl ReleaseRun {
    /// Create a draft run over pinned planning facts.
    pub fn new(plan: ReleasePlan) -> Result<Self, DomainError> {
        if plan.repo_id.trim().is_empty() {
            return Err(DomainError::Validation {
                field: "plan.repo_id".into(),
                reason: "must be non-empty".into(),
            });
        }
        if plan.repo_root.trim().is_empty() {
            return Err(DomainError::Validation {
                field: "plan.repo_root".into(),
                reason: "must be non-empty".into(),
            });
        }
        let now = Utc::now();
        let id = run_id_from_plan_hash(&plan.hash_with_version(""));
        Ok(Self {
            id,
            plan,
            version_current: None,
            version_next: None,
            bump: None,
            risk_score: 0.0,
            reasons: Vec::new(),
            tag_name: None,
            notes: None,
            approval: None,
            multi_approval: None,
            steps: Vec::new(),
            step_status: Vec::new(),
            state: RunState::Draft,
            history: Vec::new(),
            last_error: None,
            created_at: now,
            updated_at: now,
            published_at: None,
            events: Vec::new(),
        })
    }

    /// The live plan hash over current fields. Compare against an
    /// approval's snapshot to detect post-approval edits.
    #[must_use]
    pub fn plan_hash(&self) -> String {
        let next = self.version_next.as_ref().map(ToString::to_string).unwrap_or_default();
        self.plan.hash_with_version(&next)
    }

    /// Events recorded since the last harvest.
    #[must_use]
    pub fn pending_events(&self) -> &[DomainEvent] {
        &self.events
    }

    /// Drain the event queue; called by the unit of work when staging.
    pub fn take_events(&mut self) -> Vec<DomainEvent> {
        std::mem::take(&mut self.events)
    }

    // ── Transitions ──────────────────────────────────────────────────

    /// Draft → Planned. Requires a pinned head SHA and commits.
    pub fn plan_release(&mut self, actor: &Actor) -> Result<(), DomainError> {
        self.guard("plan", &[RunState::Draft])?;
        if self.plan.head_sha.is_empty() {
            return Err(DomainError::Validation {
                field: "plan.head_sha".into(),
                reason: "cannot plan without a pinned head".into(),
            });
        }
        if self.plan.commits.is_empty() {
            return Err(DomainError::Validation {
                field: "plan.commits".into(),
                reason: "cannot plan an empty commit range".into(),
            });
        }
        self.transition("plan", RunState::Planned, actor, "");
        self.record(DomainEvent::ReleasePlanned {
            run_id: self.id.clone(),
            head_sha: self.plan.head_sha.clone(),
            commit_count: self.plan.commits.len(),
            at: self.updated_at,
        });
        Ok(())
    }

    /// Planned → Versioned. Requires a non-zero next version; sets the tag.
    pub fn bump_version(
        &mut self,
        next: Version,
        bump: BumpKind,
        actor: &Actor,
    ) -> Result<(), DomainError> {
        self.guard("bump", &[RunState::Planned])?;
        if next == Version::new(0, 0, 0) {
            return Err(DomainError::Validation {
                field: "version_next".into(),
                reason: "next version must be non-zero".into(),
            });
        }
        self.tag_name = Some(tag_name(&next));
        self.version_next = Some(next.clone());
        self.bump = Some(bump);
        self.transition("bump", RunState::Versioned, actor, "");
        self.record(DomainEvent::ReleaseVersioned {
            run_id: self.id.clone(),
            version: next.to_string(),
            tag: self.tag_name.clone().unwrap_or_default(),
            at: self.updated_at,
        });
        Ok(())
    }

    /// Versioned → NotesReady.
    pub fn attach_notes(&mut self, notes: ReleaseNotes, actor: &Actor) -> Result<(), DomainError> {
        self.guard("generate_notes", &[RunState::Versioned])?;
        let provider = notes.provider.clone();
        self.notes = Some(notes);
        self.transition("generate_notes", RunState::NotesReady, actor, "");
        self.record(DomainEvent::ReleaseNotesGenerated {
            run_id: self.id.clone(),
            provider,
            at: self.updated_at,
        });
        Ok(())
    }

    /// Edit notes in place. Only allowed while NotesReady; preserves the
    /// original generation time and marks the text human-edited.
    pub fn update_notes(&mut self, text: impl Into<String>, actor: &Actor) -> Result<(), DomainError> {
        self.guard("update_notes", &[RunState::NotesReady])?;
        let notes = self.notes.as_mut().ok_or(DomainError::NilNotes)?;
        notes.text = text.into();
        notes.ai_generated = false;
        self.transition("update_notes", RunState::NotesReady, actor, "");
        self.record(DomainEvent::ReleaseNotesUpdated { run_id: self.id.clone(), at: self.updated_at });
        Ok(())
    }

    /// NotesReady → Approved. Binds the approval to the current plan hash.
    pub fn approve(
        &mut self,
        actor: &Actor,
        justification: impl Into<String>,
        auto_approved: bool,
    ) -> Result<(), DomainError> {
        self.guard("approve", &[RunState::NotesReady])?;
        let approval = Approval {
            approved_by: actor.external_id(),
            approved_at: Utc::now(),
            auto_approved,
            plan_hash: self.plan_hash(),
            risk_score: self.risk_score,
            approver_type: actor.kind.as_str().into(),
            justification: justification.into(),
            level: if auto_approved { ApprovalLevel::Auto } else { ApprovalLevel::Release },
        };
        self.approval = Some(approval);
        self.transition("approve", RunState::Approved, actor, "");
        self.record(DomainEvent::ReleaseApproved {
            run_id: self.id.clone(),
            approved_by: actor.external_id(),
            auto_approved,
            at: self.updated_at,
        });
        Ok(())
    }

    /// Declare a multi-level approval policy. Allowed until approval.
    pub fn set_approval_policy(&mut self, policy: ApprovalPolicy) -> Result<(), DomainError> {
        if self.state.is_beyond(RunState::NotesReady) || self.state.is_terminal() {
            return self.invalid("set_approval_policy", "draft through notes_ready");
        }
        self.multi_approval = Some(MultiLevelApproval::new(policy));
        self.touch();
        Ok(())
    }

    /// Record one level approval against the declared policy.
    pub fn add_level_approval(&mut self, approval: Approval) -> Result<(), DomainError> {
        self.guard("add_level_approval", &[RunState::NotesReady])?;
        let mla = self.multi_approval.as_mut().ok_or_else(|| DomainError::Configuration(
            "no approval policy declared".into(),
        ))?;
        mla.add(approval)?;
        self.touch();
        Ok(())
    }

    /// NotesReady → Approved once every required level is satisfied.
    pub fn complete_multi_level_approval(&mut self, actor: &Actor) -> Result<(), DomainError> {
        self.guard("approve", &[RunState::NotesReady])?;
        let mla = self.multi_approval.as_ref().ok_or_else(|| DomainError::Configuration(
            "no approval policy declared".into(),
        ))?;
        if !mla.is_complete() {
            let next = mla.next_required_level().map_or("?", ApprovalLevel::as_str);
            return Err(DomainError::Validation {
                field: "multi_approval".into(),
                reason: format!("approval level {next} still required"),
            });
        }
        // The completing approval binds the plan hash like a single one.
        let approval = Approval {
            approved_by: actor.external_id(),
            approved_at: Utc::now(),
            auto_approved: false,
            plan_hash: self.plan_hash(),
            risk_score: self.risk_score,
            approver_type: actor.kind.as_str().into(),
            justification: "all required approval levels satisfied".into(),
            level: ApprovalLevel::Release,
        };
        self.approval = Some(approval);
        self.transition("approve", RunState::Approved, actor, "multi-level approval complete");
        self.record(DomainEvent::ReleaseApproved {
            run_id: self.id.clone(),
            approved_by: actor.external_id(),
            auto_approved: false,
            at: self.updated_at,
        });
        Ok(())
    }

    /// Install the execution plan. Allowed any time before publishing.
    pub fn set_execution_plan(&mut self, steps: Vec<StepPlan>) -> Result<(), DomainError> {
        if matches!(self.state, RunState::Publishing | RunState::Published) {
            return self.invalid("set_execution_plan", "before publishing");
        }
        self.step_status = steps.iter().map(|s| StepStatus::pending(&s.name)).collect();
        self.steps = steps;
        self.touch();
        Ok(())
    }

    /// Verify the recorded approval still matches the current plan hash.
    pub fn validate_approval_plan_hash(&self) -> Result<(), DomainError> {
        let approval = self.approval.as_ref().ok_or(DomainError::NotApproved)?;
        let current = self.plan_hash();
        if approval.plan_hash != current {
            return Err(DomainError::ApprovalBoundToHash {
                approved: approval.plan_hash.clone(),
                current,
            });
        }
        Ok(())
    }

    /// Verify the repository head has not moved since planning.
    pub fn ensure_head_unchanged(&self, current_head: &str) -> Result<(), DomainError> {
        if self.plan.head_sha != current_head {
            return Err(DomainError::HeadShaChanged {
                planned: self.plan.head_sha.clone(),
                current: current_head.to_string(),
            });
        }
        Ok(())
    }

    /// Whether publishing may start: approved, approval still bound to the
    /// current plan, and a non-empty execution plan.
    pub fn can_proceed_to_publish(&self) -> Result<(), DomainError> {
        if self.state == RunState::Published {
            return Err(DomainError::AlreadyPublished);
        }
        if self.state != RunState::Approved {
            if self.approval.is_none() {
                return Err(DomainError::NotApproved);
            }
            return Err(self.invalid_ref("start_publishing", "approved"));
        }
        self.validate_approval_plan_hash()?;
        if self.steps.is_empty() {
            return Err(DomainError::Validation {
                field: "steps".into(),
                reason: "execution plan is empty".into(),
            });
        }
        Ok(())
    }

    /// Approved → Publishing.
    pub fn start_publishing(&mut self, actor: &Actor) -> Result<(), DomainError> {
        self.can_proceed_to_publish()?;
        self.transition("start_publishing", RunState::Publishing, actor, "");
        self.record(DomainEvent::ReleasePublishingStarted {
            run_id: self.id.clone(),
            step_count: self.steps.len(),
            at: self.updated_at,
        });
        Ok(())
    }

    /// Move a step Pending → Running, bumping its attempt counter.
    pub fn start_step(&mut self, name: &str) -> Result<(), DomainError> {
        self.guard("start_step", &[RunState::Publishing])?;
        let status = self.step_status_mut(name)?;
        match status.state {
            StepState::Done => return Err(DomainError::StepAlreadyDone(name.to_string())),
            StepState::Pending | StepState::Failed => {}
            StepState::Running | StepState::Skipped => {
                return Err(DomainError::Validation {
                    field: "step".into(),
                    reason: format!("step {name:?} is {}", status.state.as_str()),
                })
            }
        }
        status.state = StepState::Running;
        status.attempts += 1;
        status.started_at = Some(Utc::now());
        self.touch();
        Ok(())
    }

    /// Settle a step as Done; clears its error and emits `PluginExecuted`.
    pub fn mark_step_done(&mut self, name: &str) -> Result<(), DomainError> {
        self.guard("mark_step_done", &[RunState::Publishing])?;
        let plugin = self
            .steps
            .iter()
            .find(|s| s.name == name)
            .map(|s| s.plugin_name.clone())
            .unwrap_or_default();
        let status = self.step_status_mut(name)?;
        if status.state == StepState::Done {
            return Err(DomainError::StepAlreadyDone(name.to_string()));
        }
        status.state = StepState::Done;
        status.finished_at = Some(Utc::now());
        status.last_error = None;
        let run_id = self.id.clone();
        self.record(DomainEvent::PluginExecuted {
            run_id,
            step: name.to_string(),
            plugin,
            at: Utc::now(),
        });
        self.touch();
        Ok(())
    }

    /// Settle a step as Failed with its error.
    pub fn mark_step_failed(&mut self, name: &str, error: impl Into<String>) -> Result<(), DomainError> {
        self.guard("mark_step_failed", &[RunState::Publishing])?;
        let status = self.step_status_mut(name)?;
        if status.state == StepState::Done {
            return Err(DomainError::StepAlreadyDone(name.to_string()));
        }
        status.state = StepState::Failed;
        status.finished_at = Some(Utc::now());
        status.last_error = Some(error.into());
        self.touch();
        Ok(())
    }

    /// Settle a step as Skipped.
    pub fn skip_step(&mut self, name: &str) -> Result<(), DomainError> {
        self.guard("skip_step", &[RunState::Publishing])?;
        let status = self.step_status_mut(name)?;
        if status.state == StepState::Done {
            return Err(DomainError::StepAlreadyDone(name.to_string()));
        }
        status.state = StepState::Skipped;
        status.finished_at = Some(Utc::now());
        self.touch();
        Ok(())
    }

    /// Publishing → Published. Requires every step settled.
    pub fn mark_published(&mut self, actor: &Actor) -> Result<(), DomainError> {
        if self.state == RunState::Published {
            return Err(DomainError::AlreadyPublished);
        }
        self.guard("mark_published", &[RunState::Publishing])?;
        if let Some(unsettled) = self.step_status.iter().find(|s| !s.state.is_settled()) {
            return Err(DomainError::Validation {
                field: "steps".into(),
                reason: format!(
                    "step {:?} is {} — all steps must be done or skipped",
                    unsettled.name,
                    unsettled.state.as_str()
                ),
            });
        }
        self.published_at = Some(Utc::now());
        self.transition("mark_published", RunState::Published, actor, "");
        self.record(DomainEvent::ReleasePublished {
            run_id: self.id.clone(),
            version: self.version_next.as_ref().map(ToString::to_string).unwrap_or_default(),
            at: self.updated_at,
        });
        Ok(())
    }

    /// Any non-terminal state → Failed.
    pub fn mark_failed(&mut self, error: impl Into<String>, actor: &Actor) -> Result<(), DomainError> {
        if self.state.is_terminal() {
            return self.invalid("mark_failed", "any non-terminal state");
        }
        let error = error.into();
        let previous = self.state;
        self.last_error = Some(error.clone());
        self.transition("mark_failed", RunState::Failed, actor, &error);
        if let Some(record) = self.history.last_mut() {
            record.metadata.insert("previous_state".into(), previous.as_str().into());
        }
        self.record(DomainEvent::ReleaseFailed { run_id: self.id.clone(), error, at: self.updated_at });
        Ok(())
    }

    /// Failed or Canceled → Planned (when the plan is pinned) or Draft.
    /// Clears the recorded error.
    pub fn retry(&mut self, actor: &Actor) -> Result<(), DomainError> {
        self.guard("retry", &[RunState::Failed, RunState::Canceled])?;
        let target = if self.plan.is_pinned() { RunState::Planned } else { RunState::Draft };
        self.last_error = None;
        self.transition("retry", target, actor, "");
        self.record(DomainEvent::ReleaseRetried {
            run_id: self.id.clone(),
            resumed_in: target.as_str().into(),
            at: self.updated_at,
        });
        Ok(())
    }

    /// Any non-terminal, non-publishing state → Canceled. Publishing
    /// forbids cancel: steps may have external side effects in flight.
    pub fn cancel(&mut self, reason: impl Into<String>, actor: &Actor) -> Result<(), DomainError> {
        if self.state == RunState::Publishing || self.state.is_terminal() {
            return self.invalid("cancel", "any non-terminal state except publishing");
        }
        let reason = reason.into();
        self.transition("cancel", RunState::Canceled, actor, &reason);
        self.record(DomainEvent::ReleaseCanceled { run_id: self.id.clone(), reason, at: self.updated_at });
        Ok(())
    }

    // ── Internals ────────────────────────────────────────────────────

    fn step_status_mut(&mut self, name: &str) -> Result<&mut StepStatus, DomainError> {
        self.step_status
            .iter_mut()
            .find(|s| s.name == name)
            .ok_or_else(|| DomainError::StepNotFound(name.to_string()))
    }

    fn guard(&self, event: &str, allowed: &[RunState]) -> Result<(), DomainError> {
        if allowed.contains(&self.state) {
            return Ok(());
        }
        let expected: Vec<&str> = allowed.iter().map(|s| s.as_str()).collect();
        Err(DomainError::InvalidStateTransition {
            from: self.state.as_str().into(),
            event: event.into(),
            expected: expected.join(" or "),
        })
    }

    fn invalid(&self, event: &str, expected: &str) -> Result<(), DomainError> {
        Err(DomainError::InvalidStateTransition {
            from: self.state.as_str().into(),
            event: event.into(),
            expected: expected.into(),
        })
    }

    fn invalid_ref(&self, event: &str, expected: &str) -> DomainError {
        DomainError::InvalidStateTransition {
            from: self.state.as_str().into(),
            event: event.into(),
            expected: expected.into(),
        }
    }

    fn transition(&mut self, event: &str, to: RunState, actor: &Actor, reason: &str) {
        let from = self.state;
        self.state = to;
        let at = Utc::now();
        self.history.push(TransitionRecord {
            from,
            to,
            event: event.to_string(),
            actor: actor.external_id(),
            reason: reason.to_string(),
            metadata: BTreeMap::new(),
            at,
        });
        self.updated_at = at;
        debug!(run = %self.id, event, from = from.as_str(), to = to.as_str(), "transition");
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    fn record(&mut self, event: DomainEvent) {
        self.events.push(event);
    }

    /// Restore an aggregate from persisted fields without emitting events.
    #[allow(clippy::too_many_arguments)]
    #[must_use]
    pub fn reconstruct(
        id: String,
        plan: ReleasePlan,
        version_current: Option<Version>,
        version_next: Option<Version>,
        bump: Option<BumpKind>,
        risk_score: f64,
        reasons: Vec<String>,
        tag_name: Option<String>,
        notes: Option<ReleaseNotes>,
        approval: Option<Approval>,
        multi_approval: Option<MultiLevelApproval>,
        steps: Vec<StepPlan>,
        step_status: Vec<StepStatus>,
        state: RunState,
        history: Vec<TransitionRecord>,
        last_error: Option<String>,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
        published_at: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            id,
            plan,
            version_current,
            version_next,
            bump,
            risk_score,
            reasons,
            tag_name,
            notes,
            approval,
            multi_approval,
            steps,
            step_status,
            state,
            history,
            last_error,
            created_at,
            updated_at,
            published_at,
            events: Vec::new(),
        }
    }
}
