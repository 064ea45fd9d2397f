//! The pinned planning facts a release run is built on.

use serde::{Deserialize, Serialize};

use relicta_core::ids::{plan_hash, PlanHashInputs};

/// Facts pinned at plan time. Immutable after creation by convention; the
/// plan hash is recomputed from these fields whenever it is needed, so any
/// mutation is observable as an identity change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleasePlan {
    /// Repository identifier (slug).
    pub repo_id: String,
    /// Absolute path to the working tree.
    pub repo_root: String,
    /// Base ref the release range starts from.
    pub base_ref: String,
    /// Head SHA the release range ends at.
    pub head_sha: String,
    /// Commit SHAs in the range.
    pub commits: Vec<String>,
    /// Hash of the effective configuration.
    pub config_hash: String,
    /// Hash of the plugin execution plan.
    pub plugin_plan_hash: String,
    /// Changeset reference, when one backs this plan.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub changeset_id: Option<String>,
    /// Optional denormalised changeset body; never authoritative.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub changeset_body: Option<String>,
}

impl ReleasePlan {
    /// Compute the plan hash for these facts and a next-version string
    /// (empty until the bump is chosen).
    #[must_use]
    pub fn hash_with_version(&self, next_version: &str) -> String {
        plan_hash(&PlanHashInputs {
            repo_id: &self.repo_id,
            base_ref: &self.base_ref,
            head_sha: &self.head_sha,
            commits: &self.commits,
            next_version,
            config_hash: &self.config_hash,
            plugin_plan_hash: &self.plugin_plan_hash,
        })
    }

    /// Whether the plan has enough pinned to leave Draft: a head SHA and at
    /// least one commit.
    #[must_use]
    pub fn is_pinned(&self) -> bool {
        !self.head_sha.is_empty() && !self.commits.is_empty()
    }
}
