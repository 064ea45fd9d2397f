//! Flat persistence DTO for the aggregate.
//!
//! One JSON document per run. Timestamps serialize as RFC 3339 UTC via
//! chrono; unknown fields are ignored on load and missing optional fields
//! default, so documents written by newer builds still load.

use chrono::{DateTime, Utc};
use semver::{BuildMetadata, Prerelease};
use serde::{Deserialize, Serialize};

use relicta_core::{BumpKind, DomainError, Version};

use crate::approval::{Approval, MultiLevelApproval};
use crate::notes::ReleaseNotes;
use crate::plan::ReleasePlan;
use crate::run::{ReleaseRun, TransitionRecord};
use crate::state::RunState;
use crate::steps::{StepPlan, StepStatus};

/// Structured version shape persisted instead of the semver string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionDto {
    /// Major component.
    pub major: u64,
    /// Minor component.
    pub minor: u64,
    /// Patch component.
    pub patch: u64,
    /// Prerelease tag, empty when none.
    #[serde(default)]
    pub prerelease: String,
    /// Build metadata, empty when none.
    #[serde(default)]
    pub metadata: String,
}

impl From<&Version> for VersionDto {
    fn from(v: &Version) -> Self {
        Self {
            major: v.major,
            minor: v.minor,
            patch: v.patch,
            prerelease: v.pre.as_str().to_string(),
            metadata: v.build.as_str().to_string(),
        }
    }
}

impl VersionDto {
    fn into_version(self) -> Result<Version, DomainError> {
        let mut v = Version::new(self.major, self.minor, self.patch);
        v.pre = Prerelease::new(&self.prerelease).map_err(|e| DomainError::Validation {
            field: "version.prerelease".into(),
            reason: e.to_string(),
        })?;
        v.build = BuildMetadata::new(&self.metadata).map_err(|e| DomainError::Validation {
            field: "version.metadata".into(),
            reason: e.to_string(),
        })?;
        Ok(v)
    }
}

/// Embedded plan document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanDto {
    /// Repository identifier.
    pub repo_id: String,
    /// Working tree root.
    pub repo_root: String,
    /// Range base ref.
    pub base_ref: String,
    /// Range head SHA.
    pub head_sha: String,
    /// Commits in the range.
    #[serde(default)]
    pub commits: Vec<String>,
    /// Denormalised commit count, kept for quick listings.
    #[serde(default)]
    pub commit_count: usize,
    /// Effective configuration hash.
    #[serde(default)]
    pub config_hash: String,
    /// Plugin plan hash.
    #[serde(default)]
    pub plugin_plan_hash: String,
    /// Release type (bump kind) once chosen.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub release_type: Option<BumpKind>,
    /// Current version string once known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_version: Option<VersionDto>,
    /// Next version once chosen.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_version: Option<VersionDto>,
    /// Referenced changeset id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub changeset_id: Option<String>,
    /// Optional denormalised changeset body.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub changeset_body: Option<String>,
}

/// The persisted run document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunDto {
    /// Run identity.
    pub id: String,
    /// Lifecycle state name.
    pub state: String,
    /// Embedded plan.
    pub plan: PlanDto,
    /// Live plan hash at save time.
    #[serde(default)]
    pub plan_hash: String,
    /// Risk score recorded on the run.
    #[serde(default)]
    pub risk_score: f64,
    /// Decision rationale.
    #[serde(default)]
    pub reasons: Vec<String>,
    /// Tag to cut.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag_name: Option<String>,
    /// Release notes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<ReleaseNotes>,
    /// Approval record.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub approval: Option<Approval>,
    /// Multi-level approval state.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub multi_approval: Option<MultiLevelApproval>,
    /// Planned steps.
    #[serde(default)]
    pub steps: Vec<StepPlan>,
    /// Step execution status.
    #[serde(default)]
    pub step_status: Vec<StepStatus>,
    /// Transition history.
    #[serde(default)]
    pub history: Vec<TransitionRecord>,
    /// Most recent failure.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    /// Creation time (RFC 3339 UTC).
    pub created_at: DateTime<Utc>,
    /// Last mutation time (RFC 3339 UTC).
    pub updated_at: DateTime<Utc>,
    /// Publication time, set exactly when published.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published_at: Option<DateTime<Utc>>,
}

/// Serialize an aggregate into its persisted document.
#[must_use]
pub fn encode(run: &ReleaseRun) -> RunDto {
    RunDto {
        id: run.id.clone(),
        state: run.state.as_str().to_string(),
        plan: PlanDto {
            repo_id: run.plan.repo_id.clone(),
            repo_root: run.plan.repo_root.clone(),
            base_ref: run.plan.base_ref.clone(),
            head_sha: run.plan.head_sha.clone(),
            commits: run.plan.commits.clone(),
            commit_count: run.plan.commits.len(),
            config_hash: run.plan.config_hash.clone(),
            plugin_plan_hash: run.plan.plugin_plan_hash.clone(),
            release_type: run.bump,
            current_version: run.version_current.as_ref().map(VersionDto::from),
            next_version: run.version_next.as_ref().map(VersionDto::from),
            changeset_id: run.plan.changeset_id.clone(),
            changeset_body: run.plan.changeset_body.clone(),
        },
        plan_hash: run.plan_hash(),
        risk_score: run.risk_score,
        reasons: run.reasons.clone(),
        tag_name: run.tag_name.clone(),
        notes: run.notes.clone(),
        approval: run.approval.clone(),
        multi_approval: run.multi_approval.clone(),
        steps: run.steps.clone(),
        step_status: run.step_status.clone(),
        history: run.history.clone(),
        last_error: run.last_error.clone(),
        created_at: run.created_at,
        updated_at: run.updated_at,
        published_at: run.published_at,
    }
}

/// Reconstruct an aggregate from its persisted document. The event queue
/// starts empty; reconstruction never emits.
pub fn decode(dto: RunDto) -> Result<ReleaseRun, DomainError> {
    let state = RunState::parse(&dto.state).ok_or_else(|| DomainError::Validation {
        field: "state".into(),
        reason: format!("unknown state {:?}", dto.state),
    })?;
    let plan = ReleasePlan {
        repo_id: dto.plan.repo_id,
        repo_root: dto.plan.repo_root,
        base_ref: dto.plan.base_ref,
        head_sha: dto.plan.head_sha,
        commits: dto.plan.commits,
        config_hash: dto.plan.config_hash,
        plugin_plan_hash: dto.plan.plugin_plan_hash,
        changeset_id: dto.plan.changeset_id,
        changeset_body: dto.plan.changeset_body,
    };
    let version_current = dto.plan.current_version.map(VersionDto::into_version).transpose()?;
    let version_next = dto.plan.next_version.map(VersionDto::into_version).transpose()?;

    Ok(ReleaseRun::reconstruct(
        dto.id,
        plan,
        version_current,
        version_next,
        dto.plan.release_type,
        dto.risk_score,
        dto.reasons,
        dto.tag_name,
        dto.notes,
        dto.approval,
        dto.multi_approval,
        dto.steps,
        dto.step_status,
        state,
        dto.history,
        dto.last_error,
        dto.created_at,
        dto.updated_at,
        dto.published_at,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notes::ReleaseNotes;
    use crate::steps::StepPlan;
    use relicta_core::{Actor, TrustLevel};

    fn built_run() -> ReleaseRun {
        let actor = Actor::human("alice", "Alice", TrustLevel::Full);
        let plan = ReleasePlan {
            repo_id: "acme-widgets".into(),
            repo_root: "/work/widgets".into(),
            base_ref: "v1.0.0".into(),
            head_sha: "abcdef1234567890".into(),
            commits: vec!["c1".into(), "c2".into()],
            config_hash: "cfg".into(),
            plugin_plan_hash: "plug".into(),
            changeset_id: Some("cs-9".into()),
            changeset_body: None,
        };
        let mut run = ReleaseRun::new(plan).unwrap();
        run.plan_release(&actor).unwrap();
        run.bump_version(
            relicta_core::version::parse_version("1.1.0-rc.1").unwrap(),
            relicta_core::BumpKind::Minor,
            &actor,
        )
        .unwrap();
        run.attach_notes(ReleaseNotes::from_template("## notes", "template"), &actor).unwrap();
        run.approve(&actor, "lgtm", false).unwrap();
        run.set_execution_plan(vec![StepPlan::new(&run.id.clone(), "tag", "tag", "cfg", "git", "publish")])
            .unwrap();
        run
    }

    #[test]
    fn round_trip_preserves_observable_fields() {
        let mut run = built_run();
        let _ = run.take_events();
        let dto = encode(&run);
        let json = serde_json::to_string_pretty(&dto).unwrap();
        let parsed: RunDto = serde_json::from_str(&json).unwrap();
        let back = decode(parsed).unwrap();
        // Equal on all observable fields; the event queue is cleared on
        // reconstruction and `run`'s queue was drained above.
        assert_eq!(back, run);
    }

    #[test]
    fn timestamps_are_rfc3339_utc() {
        let run = built_run();
        let json = serde_json::to_value(encode(&run)).unwrap();
        let created = json["created_at"].as_str().unwrap();
        assert!(created.ends_with('Z') || created.contains("+00:00"), "{created}");
    }

    #[test]
    fn unknown_fields_are_ignored() {
        let run = built_run();
        let mut json = serde_json::to_value(encode(&run)).unwrap();
        json["future_field"] = serde_json::json!({"anything": true});
        json["plan"]["novel"] = serde_json::json!(42);
        let parsed: RunDto = serde_json::from_value(json).unwrap();
        assert_eq!(parsed.id, run.id);
    }

    #[test]
    fn missing_optional_fields_default() {
        let json = serde_json::json!({
            "id": "run-abc",
            "state": "draft",
            "plan": {
                "repo_id": "acme",
                "repo_root": "/work",
                "base_ref": "v1.0.0",
                "head_sha": "abc",
            },
            "created_at": "2026-03-04T10:00:00Z",
            "updated_at": "2026-03-04T10:00:00Z",
        });
        let parsed: RunDto = serde_json::from_value(json).unwrap();
        let run = decode(parsed).unwrap();
        assert!(run.reasons.is_empty());
        assert!(run.steps.is_empty());
        assert!(run.notes.is_none());
    }

    #[test]
    fn unknown_state_is_rejected() {
        let mut dto = encode(&built_run());
        dto.state = "transcended".into();
        assert!(decode(dto).is_err());
    }

    #[test]
    fn version_dto_keeps_prerelease_and_metadata() {
        let v = relicta_core::version::parse_version("2.0.0-rc.1+build.5").unwrap();
        let dto = VersionDto::from(&v);
        assert_eq!(dto.prerelease, "rc.1");
        assert_eq!(dto.metadata, "build.5");
        assert_eq!(dto.into_version().unwrap(), v);
    }
}
