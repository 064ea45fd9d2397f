//! Deterministic in-process collaborators.
//!
//! These stand in for the real VCS inspector, note generator, and step
//! executors so the whole pipeline can be driven end-to-end without
//! external side effects. Facts derive deterministically from the inputs:
//! the same repository and overrides always produce the same plan.

use std::path::Path;

use sha2::{Digest, Sha256};

use relicta_core::{CancelToken, ChangeAnalysis, DomainError, Version};
use release::{NoteGenerator, ReleaseNotes, ReleaseRun, RepoInspector, StepExecutor, StepPlan};

/// Inspector that fabricates stable planning facts, with optional
/// overrides from the command line.
#[derive(Debug, Clone, Default)]
pub struct StaticInspector {
    /// Overrides the derived head SHA.
    pub head_sha: Option<String>,
    /// Overrides the derived commit list.
    pub commits: Option<Vec<String>>,
    /// Overrides the detected current version.
    pub current_version: Option<Version>,
    /// Overrides the derived change analysis.
    pub analysis: Option<ChangeAnalysis>,
}

impl StaticInspector {
    fn derived_head(repo_root: &Path) -> String {
        let mut hasher = Sha256::new();
        hasher.update(repo_root.to_string_lossy().as_bytes());
        hex::encode(hasher.finalize()).chars().take(40).collect()
    }
}

impl RepoInspector for StaticInspector {
    fn head_sha(&self, repo_root: &Path) -> Result<String, DomainError> {
        Ok(self.head_sha.clone().unwrap_or_else(|| Self::derived_head(repo_root)))
    }

    fn commits_between(
        &self,
        repo_root: &Path,
        _base_ref: &str,
        head: &str,
    ) -> Result<Vec<String>, DomainError> {
        if let Some(commits) = &self.commits {
            return Ok(commits.clone());
        }
        let _ = repo_root;
        let short: String = head.chars().take(8).collect();
        Ok(vec![format!("local-{short}")])
    }

    fn current_version(&self, _repo_root: &Path) -> Result<Option<Version>, DomainError> {
        Ok(self.current_version.clone())
    }

    fn analyze_changes(
        &self,
        _repo_root: &Path,
        _base_ref: &str,
        _head: &str,
    ) -> Result<ChangeAnalysis, DomainError> {
        if let Some(analysis) = &self.analysis {
            return Ok(analysis.clone());
        }
        // Without a VCS there is nothing to count; one generic fix keeps
        // the pipeline honest about a non-empty range.
        Ok(ChangeAnalysis { fixes: 1, ..ChangeAnalysis::default() })
    }
}

/// Generates notes from a fixed changelog-style template.
#[derive(Debug, Clone, Copy, Default)]
pub struct TemplateNoteGenerator;

impl NoteGenerator for TemplateNoteGenerator {
    fn generate(&self, run: &ReleaseRun) -> Result<ReleaseNotes, DomainError> {
        let version =
            run.version_next.as_ref().map(ToString::to_string).unwrap_or_else(|| "unreleased".into());
        let mut text = format!("## {version}\n\n");
        text.push_str(&format!(
            "{} commit(s) since {} on {}.\n",
            run.plan.commits.len(),
            run.plan.base_ref,
            run.plan.repo_id,
        ));
        Ok(ReleaseNotes::from_template(text, "changelog-template"))
    }
}

/// Executor that performs no side effects, only honouring cancellation.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingStepExecutor;

impl StepExecutor for LoggingStepExecutor {
    fn execute(
        &self,
        run: &ReleaseRun,
        step: &StepPlan,
        cancel: &CancelToken,
    ) -> Result<(), DomainError> {
        cancel.check()?;
        tracing::info!(run = %run.id, step = %step.name, plugin = %step.plugin_name, "step executed (noop)");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derived_facts_are_deterministic() {
        let inspector = StaticInspector::default();
        let root = Path::new("/work/acme");
        let head1 = inspector.head_sha(root).unwrap();
        let head2 = inspector.head_sha(root).unwrap();
        assert_eq!(head1, head2);
        assert_eq!(head1.len(), 40);
        let commits = inspector.commits_between(root, "v1.0.0", &head1).unwrap();
        assert_eq!(commits, inspector.commits_between(root, "v1.0.0", &head1).unwrap());
    }

    #[test]
    fn overrides_win() {
        let inspector = StaticInspector {
            head_sha: Some("cafe".into()),
            commits: Some(vec!["c1".into(), "c2".into()]),
            ..StaticInspector::default()
        };
        let root = Path::new("/work/acme");
        assert_eq!(inspector.head_sha(root).unwrap(), "cafe");
        assert_eq!(inspector.commits_between(root, "a", "b").unwrap().len(), 2);
    }
}
