//! Governance decisions.
//!
//! A `Decision` is what the policy engine and the governance evaluator hand
//! back: the verdict, who must look at it, and why. Decision kinds are
//! ordered by strictness and may only be strengthened, never weakened, as
//! rules accumulate.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The governance verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DecisionKind {
    /// Release may proceed without further approval.
    #[default]
    Approved,
    /// Release needs one or more approvals before publishing.
    ApprovalRequired,
    /// Release is blocked.
    Rejected,
}

impl DecisionKind {
    /// Stable lowercase name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Approved => "approved",
            Self::ApprovalRequired => "approval_required",
            Self::Rejected => "rejected",
        }
    }

    /// Strictness ladder: `rejected > approval_required > approved`.
    #[must_use]
    pub const fn strictness(self) -> u8 {
        match self {
            Self::Approved => 0,
            Self::ApprovalRequired => 1,
            Self::Rejected => 2,
        }
    }

    /// Combine two kinds, keeping the stricter one.
    #[must_use]
    pub fn strengthen(self, other: Self) -> Self {
        if other.strictness() > self.strictness() {
            other
        } else {
            self
        }
    }
}

/// An action a matched rule demands before the release proceeds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequiredAction {
    /// Action type name, e.g. `run_security_scan`.
    #[serde(rename = "type")]
    pub action_type: String,
    /// Free-form parameters.
    #[serde(default)]
    pub params: serde_json::Map<String, Value>,
}

/// A condition attached to the decision, e.g. a deadline or environment gate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionCondition {
    /// Condition type name.
    #[serde(rename = "type")]
    pub condition_type: String,
    /// Condition value.
    pub value: Value,
}

/// The full governance decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Decision {
    /// The verdict.
    pub kind: DecisionKind,
    /// How many approvals are required (zero when approved outright).
    pub required_approvers: u32,
    /// Actor ids that must review; a set, deterministically ordered.
    pub reviewers: BTreeSet<String>,
    /// Actions demanded by matched rules.
    pub required_actions: Vec<RequiredAction>,
    /// Conditions attached by matched rules.
    pub conditions: Vec<DecisionCondition>,
    /// Ordered, deduplicated human-readable reasons.
    pub rationale: Vec<String>,
    /// True when a rule blocked the release outright.
    pub blocked: bool,
    /// Reason given by the blocking rule.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block_reason: Option<String>,
    /// Ids of matched rules, ordered by priority descending.
    pub matched_rule_ids: Vec<String>,
}

impl Decision {
    /// An outright approval with no obligations.
    #[must_use]
    pub fn approved() -> Self {
        Self::default()
    }

    /// Strengthen the verdict; never weakens.
    pub fn strengthen(&mut self, kind: DecisionKind) {
        self.kind = self.kind.strengthen(kind);
        if self.kind == DecisionKind::Rejected {
            self.blocked = true;
        }
    }

    /// Append a rationale line unless an identical line is already present.
    pub fn push_rationale(&mut self, message: impl Into<String>) {
        let message = message.into();
        if !self.rationale.iter().any(|m| *m == message) {
            self.rationale.push(message);
        }
    }
}
