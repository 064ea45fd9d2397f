//! Narrow interfaces to external collaborators.
//!
//! The core never talks to a VCS, an AI provider, or a publishing target
//! directly; adapters implement these traits and the CLI wires them in.

use std::path::Path;

use relicta_core::{CancelToken, ChangeAnalysis, DomainError, Version};

use crate::notes::ReleaseNotes;
use crate::run::ReleaseRun;
use crate::steps::StepPlan;

/// Reads planning facts out of a repository.
pub trait RepoInspector: Send + Sync {
    /// Current head SHA of the working tree.
    fn head_sha(&self, repo_root: &Path) -> Result<String, DomainError>;

    /// Commit SHAs in `base_ref..head`, oldest first.
    fn commits_between(
        &self,
        repo_root: &Path,
        base_ref: &str,
        head: &str,
    ) -> Result<Vec<String>, DomainError>;

    /// The most recently released version, when one exists.
    fn current_version(&self, repo_root: &Path) -> Result<Option<Version>, DomainError>;

    /// Summarise what the range changes.
    fn analyze_changes(
        &self,
        repo_root: &Path,
        base_ref: &str,
        head: &str,
    ) -> Result<ChangeAnalysis, DomainError>;
}

/// Produces release-note text for a run.
pub trait NoteGenerator: Send + Sync {
    /// Generate notes for the run's range and version.
    fn generate(&self, run: &ReleaseRun) -> Result<ReleaseNotes, DomainError>;
}

/// Executes one publishing step with side effects.
pub trait StepExecutor: Send + Sync {
    /// Run the step; implementations must honour the cancel token.
    fn execute(
        &self,
        run: &ReleaseRun,
        step: &StepPlan,
        cancel: &CancelToken,
    ) -> Result<(), DomainError>;
}
