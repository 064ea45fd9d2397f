//! Identity helpers: plan hashes, run ids, idempotency keys, slugs.
//!
//! The plan hash is both the run's identity and the authorisation artifact
//! an approval binds to, so the input ordering here is load-bearing and must
//! not change.

use sha2::{Digest, Sha256};

/// Inputs pinned into a plan hash.
#[derive(Debug, Clone, Copy)]
pub struct PlanHashInputs<'a> {
    /// Repository identifier.
    pub repo_id: &'a str,
    /// Base ref the range starts from.
    pub base_ref: &'a str,
    /// Head SHA the range ends at.
    pub head_sha: &'a str,
    /// Commit SHAs in the range (sorted internally).
    pub commits: &'a [String],
    /// Proposed next version, empty until bump.
    pub next_version: &'a str,
    /// Hash of the effective configuration.
    pub config_hash: &'a str,
    /// Hash of the plugin execution plan.
    pub plugin_plan_hash: &'a str,
}

/// Compute the deterministic plan hash (64 hex chars).
///
/// Commits are sorted before hashing so commit discovery order cannot
/// change the identity.
#[must_use]
pub fn plan_hash(inputs: &PlanHashInputs<'_>) -> String {
    let mut commits: Vec<&str> = inputs.commits.iter().map(String::as_str).collect();
    commits.sort_unstable();

    let mut hasher = Sha256::new();
    hasher.update(inputs.repo_id.as_bytes());
    hasher.update(inputs.base_ref.as_bytes());
    hasher.update(inputs.head_sha.as_bytes());
    for c in commits {
        hasher.update(c.as_bytes());
    }
    hasher.update(inputs.next_version.as_bytes());
    hasher.update(inputs.config_hash.as_bytes());
    hasher.update(inputs.plugin_plan_hash.as_bytes());
    hex::encode(hasher.finalize())
}

/// Derive the run id from a plan hash: `run-` plus the first 16 hex chars.
#[must_use]
pub fn run_id_from_plan_hash(hash: &str) -> String {
    let prefix: String = hash.chars().take(16).collect();
    format!("run-{prefix}")
}

/// Idempotency key for a publishing step: first 16 hex chars of
/// `sha256(run_id || step_name || config_hash)`.
#[must_use]
pub fn step_idempotency_key(run_id: &str, step_name: &str, config_hash: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(run_id.as_bytes());
    hasher.update(step_name.as_bytes());
    hasher.update(config_hash.as_bytes());
    hex::encode(hasher.finalize()).chars().take(16).collect()
}

/// Filesystem-safe slug for a repository name: lowercase, runs of
/// non-alphanumeric characters collapsed to a single `-`.
#[must_use]
pub fn repo_slug(repository: &str) -> String {
    let mut out = String::with_capacity(repository.len());
    let mut last_dash = true;
    for ch in repository.chars() {
        if ch.is_ascii_alphanumeric() {
            out.push(ch.to_ascii_lowercase());
            last_dash = false;
        } else if !last_dash {
            out.push('-');
            last_dash = true;
        }
    }
    while out.ends_with('-') {
        out.pop();
    }
    out
}
