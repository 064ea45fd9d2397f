//! Typed domain events appended by aggregate transitions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One domain event. Every aggregate transition appends exactly one; step
/// completions during publishing additionally append `PluginExecuted`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum DomainEvent {
    /// Planning facts pinned.
    ReleasePlanned {
        /// Run identity.
        run_id: String,
        /// Pinned head SHA.
        head_sha: String,
        /// Number of commits in the range.
        commit_count: usize,
        /// When the transition happened.
        at: DateTime<Utc>,
    },
    /// Next version chosen.
    ReleaseVersioned {
        /// Run identity.
        run_id: String,
        /// The chosen next version.
        version: String,
        /// The tag that will be cut.
        tag: String,
        /// When the transition happened.
        at: DateTime<Utc>,
    },
    /// Notes attached.
    ReleaseNotesGenerated {
        /// Run identity.
        run_id: String,
        /// Who produced the text (template, provider name, …).
        provider: String,
        /// When the transition happened.
        at: DateTime<Utc>,
    },
    /// Notes edited in place while notes-ready.
    ReleaseNotesUpdated {
        /// Run identity.
        run_id: String,
        /// When the edit happened.
        at: DateTime<Utc>,
    },
    /// Approval recorded.
    ReleaseApproved {
        /// Run identity.
        run_id: String,
        /// Kind-prefixed approver id.
        approved_by: String,
        /// Whether the approval was automatic.
        auto_approved: bool,
        /// When the transition happened.
        at: DateTime<Utc>,
    },
    /// Publishing began.
    ReleasePublishingStarted {
        /// Run identity.
        run_id: String,
        /// Number of planned steps.
        step_count: usize,
        /// When the transition happened.
        at: DateTime<Utc>,
    },
    /// One publishing step finished.
    PluginExecuted {
        /// Run identity.
        run_id: String,
        /// Step name.
        step: String,
        /// Plugin that ran it.
        plugin: String,
        /// When the step finished.
        at: DateTime<Utc>,
    },
    /// Terminal success.
    ReleasePublished {
        /// Run identity.
        run_id: String,
        /// Released version.
        version: String,
        /// When the transition happened.
        at: DateTime<Utc>,
    },
    /// The run failed.
    ReleaseFailed {
        /// Run identity.
        run_id: String,
        /// What went wrong.
        error: String,
        /// When the transition happened.
        at: DateTime<Utc>,
    },
    /// The run was canceled.
    ReleaseCanceled {
        /// Run identity.
        run_id: String,
        /// Why.
        reason: String,
        /// When the transition happened.
        at: DateTime<Utc>,
    },
    /// A failed or canceled run returned to the pipeline.
    ReleaseRetried {
        /// Run identity.
        run_id: String,
        /// The state it returned to.
        resumed_in: String,
        /// When the transition happened.
        at: DateTime<Utc>,
    },
}

impl DomainEvent {
    /// Stable event name matching the transition that produced it.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::ReleasePlanned { .. } => "release_planned",
            Self::ReleaseVersioned { .. } => "release_versioned",
            Self::ReleaseNotesGenerated { .. } => "release_notes_generated",
            Self::ReleaseNotesUpdated { .. } => "release_notes_updated",
            Self::ReleaseApproved { .. } => "release_approved",
            Self::ReleasePublishingStarted { .. } => "release_publishing_started",
            Self::PluginExecuted { .. } => "plugin_executed",
            Self::ReleasePublished { .. } => "release_published",
            Self::ReleaseFailed { .. } => "release_failed",
            Self::ReleaseCanceled { .. } => "release_canceled",
            Self::ReleaseRetried { .. } => "release_retried",
        }
    }

    /// The run this event belongs to.
    #[must_use]
    pub fn run_id(&self) -> &str {
        match self {
            Self::ReleasePlanned { run_id, .. }
            | Self::ReleaseVersioned { run_id, .. }
            | Self::ReleaseNotesGenerated { run_id, .. }
            | Self::ReleaseNotesUpdated { run_id, .. }
            | Self::ReleaseApproved { run_id, .. }
            | Self::ReleasePublishingStarted { run_id, .. }
            | Self::PluginExecuted { run_id, .. }
            | Self::ReleasePublished { run_id, .. }
            | Self::ReleaseFailed { run_id, .. }
            | Self::ReleaseCanceled { run_id, .. }
            | Self::ReleaseRetried { run_id, .. } => run_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_are_snake_case_and_stable() {
        let at = Utc::now();
        let event = DomainEvent::ReleasePlanned {
            run_id: "run-1".into(),
            head_sha: "abc".into(),
            commit_count: 2,
            at,
        };
        assert_eq!(event.name(), "release_planned");
        assert_eq!(event.run_id(), "run-1");
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "release_planned");
    }
}
