//! Compiled policy form consumed by the engine.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Lowered comparison operators with stable short names.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CmpOp {
    /// Equal.
    Eq,
    /// Not equal.
    Ne,
    /// Greater than (numeric only).
    Gt,
    /// Less than (numeric only).
    Lt,
    /// Greater or equal (numeric only).
    Gte,
    /// Less or equal (numeric only).
    Lte,
    /// Membership in a list.
    In,
    /// Substring containment.
    Contains,
    /// Regular-expression match.
    Matches,
}

impl CmpOp {
    /// Stable short name (`eq`, `ne`, `gt`, `lt`, `gte`, `lte`, `in`,
    /// `contains`, `matches`).
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Eq => "eq",
            Self::Ne => "ne",
            Self::Gt => "gt",
            Self::Lt => "lt",
            Self::Gte => "gte",
            Self::Lte => "lte",
            Self::In => "in",
            Self::Contains => "contains",
            Self::Matches => "matches",
        }
    }

    /// Parse a stable short name.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "eq" => Some(Self::Eq),
            "ne" => Some(Self::Ne),
            "gt" => Some(Self::Gt),
            "lt" => Some(Self::Lt),
            "gte" => Some(Self::Gte),
            "lte" => Some(Self::Lte),
            "in" => Some(Self::In),
            "contains" => Some(Self::Contains),
            "matches" => Some(Self::Matches),
            _ => None,
        }
    }
}

/// A compiled rule condition.
///
/// A rule's top-level condition list is an implicit conjunction; nested
/// logical structure uses the `All`/`Any`/`Not` constructors. The legacy
/// flat sentinel encoding lives in [`crate::flat`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "node", rename_all = "snake_case")]
pub enum Condition {
    /// Always true.
    Always,
    /// A single field comparison.
    Leaf {
        /// Dotted context path, e.g. `risk.score`.
        field: String,
        /// Comparison operator.
        op: CmpOp,
        /// Right-hand value.
        value: Value,
    },
    /// All nested conditions must hold.
    All(Vec<Condition>),
    /// At least one nested condition must hold.
    Any(Vec<Condition>),
    /// The nested condition must not hold.
    Not(Box<Condition>),
}

/// Kinds of rule actions.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    /// Set (strengthen) the pending decision.
    SetDecision,
    /// Require N approvals.
    RequireApproval,
    /// Add one or more reviewers.
    AddReviewer,
    /// Block the release outright.
    Block,
    /// Append a rationale line.
    AddRationale,
    /// Attach a condition to the decision.
    AddCondition,
    /// Require review from a team's members.
    RequireTeamReview,
    /// Require review from a role's members.
    RequireRoleReview,
    /// Require review from a team's leads.
    RequireTeamLead,
}

impl ActionKind {
    /// Map a surface action name to its kind.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "set_decision" => Some(Self::SetDecision),
            "require_approval" => Some(Self::RequireApproval),
            "add_reviewer" => Some(Self::AddReviewer),
            "block" => Some(Self::Block),
            "add_rationale" => Some(Self::AddRationale),
            "add_condition" => Some(Self::AddCondition),
            "require_team_review" => Some(Self::RequireTeamReview),
            "require_role_review" => Some(Self::RequireRoleReview),
            "require_team_lead" => Some(Self::RequireTeamLead),
            _ => None,
        }
    }
}

/// A compiled action with its parameters.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Action {
    /// What the action does.
    pub kind: ActionKind,
    /// Named parameters in declaration order.
    pub params: serde_json::Map<String, Value>,
}

impl Action {
    /// String parameter by name.
    #[must_use]
    pub fn str_param(&self, name: &str) -> Option<&str> {
        self.params.get(name).and_then(Value::as_str)
    }

    /// Numeric parameter by name, truncated to u32.
    #[must_use]
    pub fn count_param(&self, name: &str) -> Option<u32> {
        let n = self.params.get(name).and_then(Value::as_f64)?;
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let count = n.max(0.0) as u32;
        Some(count)
    }
}

/// Decision a policy falls back to when no rule matches.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DefaultDecision {
    /// Approve outright.
    Approve,
    /// Require review.
    #[default]
    RequireReview,
    /// Reject.
    Reject,
}

impl DefaultDecision {
    /// Parse the surface spelling used in `defaults { decision = "…" }`.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "approve" => Some(Self::Approve),
            "require_review" => Some(Self::RequireReview),
            "reject" => Some(Self::Reject),
            _ => None,
        }
    }
}

/// File-level defaults.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Defaults {
    /// Fallback decision when no rule matches.
    pub decision: DefaultDecision,
    /// Approver count used when the fallback requires review.
    pub required_approvers: u32,
}

impl Default for Defaults {
    fn default() -> Self {
        Self { decision: DefaultDecision::RequireReview, required_approvers: 1 }
    }
}

/// A compiled rule.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CompiledRule {
    /// Normalised id derived from the name.
    pub id: String,
    /// Original quoted name.
    pub name: String,
    /// Evaluation priority; higher runs first.
    pub priority: i64,
    /// Author description.
    pub description: String,
    /// Disabled rules never match.
    pub enabled: bool,
    /// Top-level conditions, implicitly conjoined.
    pub conditions: Vec<Condition>,
    /// Actions executed when the rule matches, in declaration order.
    pub actions: Vec<Action>,
}

/// A named, compiled policy: rules plus defaults.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Policy {
    /// Policy name (file basename).
    pub name: String,
    /// Rules in declaration order.
    pub rules: Vec<CompiledRule>,
    /// Fallback behaviour.
    pub defaults: Defaults,
}
