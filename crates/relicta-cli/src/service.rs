//! Use-case orchestration: drive the aggregate with governance decisions.
//!
//! Each operation loads the run, applies one lifecycle step, and commits
//! the mutation together with its events through a unit of work.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;
use tracing::info;

use governance::{Evaluation, Evaluator, GovernanceConfig};
use policy::Ambient;
use policy_dsl::{loader, DslError, LoaderOptions};
use relicta_core::ids::repo_slug;
use relicta_core::version::{bump_version, tag_name};
use relicta_core::{
    Actor, BumpKind, CancelToken, ChangeAnalysis, DecisionKind, DomainError, Intent, Proposal,
    Scope, Version,
};
use release::{
    NoteGenerator, ReleasePlan, ReleaseRun, RepoInspector, RunState, StepExecutor, StepPlan,
};
use store::{
    EventPublisher, FileStore, InProcessPublisher, MemoryStore, ReleaseOutcome, ReleaseRecord,
    StoreError, UnitOfWork,
};

/// Where run documents live under the repository root.
pub const RUNS_DIR: &str = ".relicta/releases";
/// Where memory records live under the repository root.
pub const MEMORY_DIR: &str = ".relicta/memory/releases";

/// Errors surfaced by the service layer.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// A domain sentinel.
    #[error(transparent)]
    Domain(#[from] DomainError),
    /// A persistence failure.
    #[error(transparent)]
    Store(#[from] StoreError),
    /// A policy file failed to load.
    #[error("policy load: {0}")]
    Policy(#[from] DslError),
    /// Governance rejected the release.
    #[error("release rejected: {0}")]
    Rejected(String),
}

impl ServiceError {
    /// Process exit code for this failure: 130 on cancellation, 1 for
    /// every domain or persistence error.
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        let canceled = matches!(self, Self::Domain(DomainError::Canceled))
            || matches!(self, Self::Store(StoreError::Domain(DomainError::Canceled)));
        if canceled {
            130
        } else {
            1
        }
    }
}

/// The service wiring: stores, governance, and collaborators.
pub struct ReleaseService {
    repo_root: PathBuf,
    repo_id: String,
    store: Arc<FileStore>,
    memory: MemoryStore,
    publisher: Arc<dyn EventPublisher>,
    evaluator: Evaluator,
    inspector: Box<dyn RepoInspector>,
    notes_gen: Box<dyn NoteGenerator>,
    executor: Box<dyn StepExecutor>,
}

impl ReleaseService {
    /// Open the service over a repository root, loading policies from the
    /// default search paths.
    pub fn open(
        repo_root: &Path,
        inspector: Box<dyn RepoInspector>,
        notes_gen: Box<dyn NoteGenerator>,
        executor: Box<dyn StepExecutor>,
    ) -> Result<Self, ServiceError> {
        let loaded = loader::load_default(repo_root, &LoaderOptions::default())?;
        let repo_id = repo_root
            .file_name()
            .map_or_else(|| "repository".to_string(), |n| repo_slug(&n.to_string_lossy()));
        Ok(Self {
            repo_root: repo_root.to_path_buf(),
            repo_id,
            store: Arc::new(FileStore::open(repo_root.join(RUNS_DIR))?),
            memory: MemoryStore::open(repo_root.join(MEMORY_DIR))?,
            publisher: Arc::new(InProcessPublisher::new()),
            evaluator: Evaluator::new(GovernanceConfig::default(), loaded.policies),
            inspector,
            notes_gen,
            executor,
        })
    }

    /// The derived repository identifier.
    #[must_use]
    pub fn repo_id(&self) -> &str {
        &self.repo_id
    }

    /// The backing run store.
    #[must_use]
    pub fn store(&self) -> &Arc<FileStore> {
        &self.store
    }

    fn uow(&self) -> UnitOfWork {
        UnitOfWork::new(self.store.clone(), self.publisher.clone())
    }

    fn commit(&self, run: &mut ReleaseRun, cancel: &CancelToken) -> Result<(), ServiceError> {
        let uow = self.uow();
        uow.begin()?;
        uow.save(run)?;
        uow.commit(cancel)?;
        Ok(())
    }

    fn latest(&self, cancel: &CancelToken) -> Result<ReleaseRun, ServiceError> {
        self.store
            .find_latest(&self.repo_id, cancel)?
            .ok_or_else(|| DomainError::NotFound(format!("no release run for {}", self.repo_id)).into())
    }

    /// Load a run by id, or the repository's latest run.
    pub fn status(&self, run_id: Option<&str>, cancel: &CancelToken) -> Result<ReleaseRun, ServiceError> {
        match run_id {
            Some(id) => Ok(self.store.find_by_id(id)?),
            None => self.latest(cancel),
        }
    }

    /// Pin planning facts and move a fresh run to Planned.
    pub fn plan(
        &self,
        actor: &Actor,
        base_ref: Option<&str>,
        cancel: &CancelToken,
    ) -> Result<ReleaseRun, ServiceError> {
        cancel.check()?;
        let head = self.inspector.head_sha(&self.repo_root)?;
        let current = self.inspector.current_version(&self.repo_root)?;
        let base = base_ref
            .map(ToString::to_string)
            .or_else(|| current.as_ref().map(tag_name))
            .unwrap_or_else(|| "ROOT".into());
        let commits = self.inspector.commits_between(&self.repo_root, &base, &head)?;

        let plan = ReleasePlan {
            repo_id: self.repo_id.clone(),
            repo_root: self.repo_root.to_string_lossy().into_owned(),
            base_ref: base,
            head_sha: head,
            commits,
            config_hash: "default".into(),
            plugin_plan_hash: "builtin".into(),
            changeset_id: None,
            changeset_body: None,
        };
        let mut run = ReleaseRun::new(plan)?;
        run.version_current = current;
        run.plan_release(actor)?;
        self.commit(&mut run, cancel)?;
        info!(run = %run.id, "release planned");
        Ok(run)
    }

    /// Choose the next version for the latest planned run.
    pub fn bump(
        &self,
        actor: &Actor,
        requested: Option<BumpKind>,
        cancel: &CancelToken,
    ) -> Result<ReleaseRun, ServiceError> {
        let mut run = self.latest(cancel)?;
        let analysis =
            self.inspector.analyze_changes(&self.repo_root, &run.plan.base_ref, &run.plan.head_sha)?;
        let kind = requested.unwrap_or_else(|| suggest_bump(&analysis));
        let base = run.version_current.clone().unwrap_or_else(|| Version::new(0, 1, 0));
        let next = if run.version_current.is_some() {
            bump_version(&base, kind)
        } else {
            // First release: the base version ships as-is.
            base
        };
        run.bump_version(next, kind, actor)?;
        self.commit(&mut run, cancel)?;
        Ok(run)
    }

    /// Generate and attach notes to the latest versioned run.
    pub fn notes(&self, actor: &Actor, cancel: &CancelToken) -> Result<ReleaseRun, ServiceError> {
        let mut run = self.latest(cancel)?;
        let notes = self.notes_gen.generate(&run)?;
        run.attach_notes(notes, actor)?;
        self.commit(&mut run, cancel)?;
        Ok(run)
    }

    /// Run governance over the latest notes-ready run and approve it.
    ///
    /// An `approved` decision auto-approves on behalf of the platform; an
    /// `approval_required` decision records the invoking actor as the
    /// approver; a rejection surfaces as an error.
    pub fn approve(
        &self,
        actor: &Actor,
        justification: &str,
        cancel: &CancelToken,
    ) -> Result<(ReleaseRun, Evaluation), ServiceError> {
        let mut run = self.latest(cancel)?;
        let analysis =
            self.inspector.analyze_changes(&self.repo_root, &run.plan.base_ref, &run.plan.head_sha)?;
        let proposal = self.proposal_for(&run, actor)?;
        let evaluation = self.evaluator.evaluate(&proposal, Some(&analysis), &Ambient::default())?;

        run.risk_score = evaluation.risk.score;
        run.reasons = evaluation.decision.rationale.clone();

        match evaluation.decision.kind {
            DecisionKind::Rejected => {
                let reason = evaluation
                    .decision
                    .block_reason
                    .clone()
                    .unwrap_or_else(|| "blocked by policy".into());
                // Persist the evaluation outcome before surfacing the block.
                self.commit(&mut run, cancel)?;
                return Err(ServiceError::Rejected(reason));
            }
            DecisionKind::Approved => {
                let governor = Actor::system("relicta-governor");
                run.approve(&governor, "auto-approved within risk threshold", true)?;
            }
            DecisionKind::ApprovalRequired => {
                run.approve(actor, justification, false)?;
            }
        }
        self.commit(&mut run, cancel)?;
        Ok((run, evaluation))
    }

    /// Execute the publish plan for the latest approved run.
    pub fn publish(&self, actor: &Actor, cancel: &CancelToken) -> Result<ReleaseRun, ServiceError> {
        let mut run = self.latest(cancel)?;
        let head_now = self.inspector.head_sha(&self.repo_root)?;
        run.ensure_head_unchanged(&head_now)?;

        if run.steps.is_empty() {
            run.set_execution_plan(default_steps(&run.id))?;
        }
        run.start_publishing(actor)?;
        self.commit(&mut run, cancel)?;

        let steps: Vec<StepPlan> = run.steps.clone();
        for step in &steps {
            if let Err(e) = cancel.check() {
                run.mark_failed(e.to_string(), actor)?;
                self.commit(&mut run, &CancelToken::new())?;
                return Err(DomainError::Canceled.into());
            }
            run.start_step(&step.name)?;
            match self.executor.execute(&run, step, cancel) {
                Ok(()) => run.mark_step_done(&step.name)?,
                Err(e) => {
                    run.mark_step_failed(&step.name, e.to_string())?;
                    run.mark_failed(format!("step {}: {e}", step.name), actor)?;
                    self.commit(&mut run, &CancelToken::new())?;
                    return Err(e.into());
                }
            }
        }
        run.mark_published(actor)?;
        self.commit(&mut run, cancel)?;
        self.record_outcome(&run, actor, ReleaseOutcome::Success)?;
        info!(run = %run.id, version = ?run.version_next, "release published");
        Ok(run)
    }

    /// Retry the latest failed or canceled run.
    pub fn retry(&self, actor: &Actor, cancel: &CancelToken) -> Result<ReleaseRun, ServiceError> {
        let mut run = self.latest(cancel)?;
        run.retry(actor)?;
        self.commit(&mut run, cancel)?;
        Ok(run)
    }

    /// Cancel the latest run.
    pub fn cancel_run(
        &self,
        actor: &Actor,
        reason: &str,
        cancel: &CancelToken,
    ) -> Result<ReleaseRun, ServiceError> {
        let mut run = self.latest(cancel)?;
        run.cancel(reason, actor)?;
        self.commit(&mut run, cancel)?;
        Ok(run)
    }

    /// Release history for this repository, newest first.
    pub fn history(&self, limit: usize) -> Result<Vec<ReleaseRecord>, ServiceError> {
        Ok(self.memory.history(&self.repo_id, limit)?)
    }

    fn record_outcome(
        &self,
        run: &ReleaseRun,
        actor: &Actor,
        outcome: ReleaseOutcome,
    ) -> Result<(), ServiceError> {
        let version = run.version_next.as_ref().map(ToString::to_string).unwrap_or_default();
        let mut record = ReleaseRecord::new(
            self.repo_id.clone(),
            version,
            actor.external_id(),
            "approved",
            outcome,
        );
        record.risk_score = run.risk_score;
        self.memory.append(&record)?;
        Ok(())
    }

    fn proposal_for(&self, run: &ReleaseRun, actor: &Actor) -> Result<Proposal, ServiceError> {
        let summary = run
            .notes
            .as_ref()
            .map_or_else(|| format!("release of {}", run.plan.repo_id), |n| n.text.clone());
        let proposal = Proposal::new(
            format!("{}-proposal", run.id),
            actor.clone(),
            Scope {
                repository: run.plan.repo_id.clone(),
                commit_range: format!("{}..{}", run.plan.base_ref, run.plan.head_sha),
            },
            Intent {
                summary,
                suggested_bump: run.bump.unwrap_or(BumpKind::None),
                confidence: if actor.kind == relicta_core::ActorKind::Human { 0.9 } else { 0.7 },
            },
            run.created_at,
        )?;
        Ok(proposal)
    }
}

/// Bump suggestion from the change analysis: breaking → major,
/// features → minor, otherwise patch.
#[must_use]
pub fn suggest_bump(analysis: &ChangeAnalysis) -> BumpKind {
    if analysis.breaking_total() > 0 {
        BumpKind::Major
    } else if analysis.features > 0 {
        BumpKind::Minor
    } else {
        BumpKind::Patch
    }
}

/// The builtin execution plan: cut the tag, then publish artifacts.
fn default_steps(run_id: &str) -> Vec<StepPlan> {
    vec![
        StepPlan::new(run_id, "tag", "tag", "default", "git", "publish"),
        StepPlan::new(run_id, "artifacts", "upload", "default", "forge", "publish"),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::noop::{LoggingStepExecutor, StaticInspector, TemplateNoteGenerator};
    use relicta_core::TrustLevel;
    use tempfile::tempdir;

    fn service(root: &Path) -> ReleaseService {
        ReleaseService::open(
            root,
            Box::new(StaticInspector::default()),
            Box::new(TemplateNoteGenerator),
            Box::new(LoggingStepExecutor),
        )
        .unwrap()
    }

    fn alice() -> Actor {
        Actor::human("alice", "Alice", TrustLevel::Full)
    }

    #[test]
    fn full_pipeline_reaches_published() {
        let dir = tempdir().unwrap();
        let svc = service(dir.path());
        let actor = alice();
        let cancel = CancelToken::new();

        let run = svc.plan(&actor, None, &cancel).unwrap();
        assert_eq!(run.state, RunState::Planned);

        let run = svc.bump(&actor, Some(BumpKind::Minor), &cancel).unwrap();
        assert_eq!(run.state, RunState::Versioned);
        assert!(run.version_next.is_some());

        let run = svc.notes(&actor, &cancel).unwrap();
        assert_eq!(run.state, RunState::NotesReady);

        let (run, evaluation) = svc.approve(&actor, "looks good", &cancel).unwrap();
        assert_eq!(run.state, RunState::Approved);
        assert!(evaluation.risk.score >= 0.0);

        let run = svc.publish(&actor, &cancel).unwrap();
        assert_eq!(run.state, RunState::Published);
        assert!(run.published_at.is_some());

        // The outcome landed in the history.
        let history = svc.history(10).unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].outcome, ReleaseOutcome::Success);
    }

    #[test]
    fn status_reads_latest_run() {
        let dir = tempdir().unwrap();
        let svc = service(dir.path());
        let cancel = CancelToken::new();
        assert!(svc.status(None, &cancel).is_err());

        svc.plan(&alice(), None, &cancel).unwrap();
        let run = svc.status(None, &cancel).unwrap();
        assert_eq!(run.state, RunState::Planned);
        let by_id = svc.status(Some(&run.id), &cancel).unwrap();
        assert_eq!(by_id.id, run.id);
    }

    #[test]
    fn publish_refuses_after_head_moves() {
        let dir = tempdir().unwrap();
        let actor = alice();
        let cancel = CancelToken::new();
        {
            let svc = service(dir.path());
            svc.plan(&actor, None, &cancel).unwrap();
            svc.bump(&actor, Some(BumpKind::Minor), &cancel).unwrap();
            svc.notes(&actor, &cancel).unwrap();
            svc.approve(&actor, "ok", &cancel).unwrap();
        }
        // Same store, different head: a moved working tree.
        let moved = ReleaseService::open(
            dir.path(),
            Box::new(StaticInspector { head_sha: Some("f00d".into()), ..StaticInspector::default() }),
            Box::new(TemplateNoteGenerator),
            Box::new(LoggingStepExecutor),
        )
        .unwrap();
        let err = moved.publish(&actor, &cancel).unwrap_err();
        match err {
            ServiceError::Domain(DomainError::HeadShaChanged { .. }) => {}
            other => panic!("expected head_sha_changed, got {other:?}"),
        }
    }

    #[test]
    fn retry_after_cancel() {
        let dir = tempdir().unwrap();
        let svc = service(dir.path());
        let actor = alice();
        let cancel = CancelToken::new();
        svc.plan(&actor, None, &cancel).unwrap();
        svc.cancel_run(&actor, "rescheduling", &cancel).unwrap();
        assert_eq!(svc.status(None, &cancel).unwrap().state, RunState::Canceled);
        let run = svc.retry(&actor, &cancel).unwrap();
        assert_eq!(run.state, RunState::Planned);
    }

    #[test]
    fn bump_suggestion_follows_analysis() {
        let breaking = ChangeAnalysis { breaking: 1, ..ChangeAnalysis::default() };
        assert_eq!(suggest_bump(&breaking), BumpKind::Major);
        let feature = ChangeAnalysis { features: 2, ..ChangeAnalysis::default() };
        assert_eq!(suggest_bump(&feature), BumpKind::Minor);
        assert_eq!(suggest_bump(&ChangeAnalysis::default()), BumpKind::Patch);
    }
}
