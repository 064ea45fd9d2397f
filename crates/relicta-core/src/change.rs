//! Change analysis — a transient description of what the commit range does.
//!
//! Produced by repository inspection outside the core; consumed by the risk
//! calculator and the policy engine. Never persisted by the core.

use serde::{Deserialize, Serialize};

/// A single API surface change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiChange {
    /// Kind of change, e.g. `added`, `removed`, `signature`.
    pub change_type: String,
    /// Fully-qualified symbol affected.
    pub symbol: String,
    /// Whether the change breaks consumers.
    pub breaking: bool,
}

/// Scope of the change in files and lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct BlastRadius {
    /// Files touched by the range.
    pub files_changed: u64,
    /// Lines added plus removed.
    pub lines_changed: u64,
}

/// Aggregated analysis of a commit range.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ChangeAnalysis {
    /// Count of feature commits.
    pub features: u32,
    /// Count of fix commits.
    pub fixes: u32,
    /// Count of commits declared breaking.
    pub breaking: u32,
    /// Count of security-relevant commits.
    pub security: u32,
    /// Individual API changes detected.
    #[serde(default)]
    pub api_changes: Vec<ApiChange>,
    /// Change scope, when computable.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blast_radius: Option<BlastRadius>,
}

impl ChangeAnalysis {
    /// Total breaking signal: declared breaking commits plus breaking API
    /// changes.
    #[must_use]
    pub fn breaking_total(&self) -> u32 {
        let api = self.api_changes.iter().filter(|c| c.breaking).count();
        self.breaking + u32::try_from(api).unwrap_or(u32::MAX)
    }

    /// Files changed, zero when no blast radius was computed.
    #[must_use]
    pub fn files_changed(&self) -> u64 {
        self.blast_radius.map_or(0, |b| b.files_changed)
    }

    /// Lines changed, zero when no blast radius was computed.
    #[must_use]
    pub fn lines_changed(&self) -> u64 {
        self.blast_radius.map_or(0, |b| b.lines_changed)
    }
}
