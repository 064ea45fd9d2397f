//! Publishing step plans and their execution status.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use relicta_core::ids::step_idempotency_key;

/// A planned publishing step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepPlan {
    /// Step name, unique within the run.
    pub name: String,
    /// Step type, e.g. `tag`, `upload`, `announce`.
    #[serde(rename = "type")]
    pub step_type: String,
    /// Hash of the step's effective configuration.
    pub config_hash: String,
    /// First 16 hex of `sha256(run_id || name || config_hash)`.
    pub idempotency_key: String,
    /// Plugin that executes the step.
    pub plugin_name: String,
    /// Hook phase the step runs in.
    pub hook: String,
    /// Steps marked unsafe are skipped in dry runs.
    #[serde(rename = "unsafe", default)]
    pub is_unsafe: bool,
}

impl StepPlan {
    /// Build a plan, deriving the idempotency key from the run identity.
    pub fn new(
        run_id: &str,
        name: impl Into<String>,
        step_type: impl Into<String>,
        config_hash: impl Into<String>,
        plugin_name: impl Into<String>,
        hook: impl Into<String>,
    ) -> Self {
        let name = name.into();
        let config_hash = config_hash.into();
        let idempotency_key = step_idempotency_key(run_id, &name, &config_hash);
        Self {
            name,
            step_type: step_type.into(),
            config_hash,
            idempotency_key,
            plugin_name: plugin_name.into(),
            hook: hook.into(),
            is_unsafe: false,
        }
    }
}

/// Lifecycle of a step execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum StepState {
    /// Not started.
    #[default]
    Pending,
    /// Currently executing.
    Running,
    /// Completed successfully.
    Done,
    /// Failed; may be retried.
    Failed,
    /// Deliberately not executed.
    Skipped,
}

impl StepState {
    /// Stable lowercase name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Done => "done",
            Self::Failed => "failed",
            Self::Skipped => "skipped",
        }
    }

    /// Done or skipped both count as settled for publish completion.
    #[must_use]
    pub const fn is_settled(self) -> bool {
        matches!(self, Self::Done | Self::Skipped)
    }
}

/// Execution status of one step. `attempts` is strictly monotonic;
/// `last_error` is cleared on success.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepStatus {
    /// Step name this status belongs to.
    pub name: String,
    /// Current lifecycle state.
    pub state: StepState,
    /// How many times execution has started.
    pub attempts: u32,
    /// When the latest attempt started.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    /// When the step settled.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
    /// Error from the latest failed attempt.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

impl StepStatus {
    /// Fresh pending status for a planned step.
    #[must_use]
    pub fn pending(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: StepState::Pending,
            attempts: 0,
            started_at: None,
            finished_at: None,
            last_error: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn idempotency_key_is_stable_for_same_inputs() {
        let a = StepPlan::new("run-1", "tag", "tag", "cfg", "git", "publish");
        let b = StepPlan::new("run-1", "tag", "tag", "cfg", "git", "publish");
        assert_eq!(a.idempotency_key, b.idempotency_key);
        let c = StepPlan::new("run-2", "tag", "tag", "cfg", "git", "publish");
        assert_ne!(a.idempotency_key, c.idempotency_key);
    }

    #[test]
    fn settled_states() {
        assert!(StepState::Done.is_settled());
        assert!(StepState::Skipped.is_settled());
        assert!(!StepState::Running.is_settled());
        assert!(!StepState::Failed.is_settled());
    }

    #[test]
    fn unsafe_flag_serializes_under_reserved_name() {
        let mut plan = StepPlan::new("run-1", "upload", "upload", "cfg", "forge", "publish");
        plan.is_unsafe = true;
        let json = serde_json::to_value(&plan).unwrap();
        assert_eq!(json["unsafe"], true);
        assert_eq!(json["type"], "upload");
    }
}
