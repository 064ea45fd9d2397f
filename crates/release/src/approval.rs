//! Approvals: the authorisation artifacts bound to a plan hash.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use relicta_core::DomainError;

/// The level an approval is granted at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalLevel {
    /// Engineering sign-off.
    Technical,
    /// Security review.
    Security,
    /// Management sign-off.
    Manager,
    /// Release-manager sign-off.
    Release,
    /// Automatic approval within risk bounds.
    Auto,
}

impl ApprovalLevel {
    /// Stable lowercase name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Technical => "technical",
            Self::Security => "security",
            Self::Manager => "manager",
            Self::Release => "release",
            Self::Auto => "auto",
        }
    }
}

/// One recorded approval.
///
/// `plan_hash` is the authorisation artifact, not a cache: validation always
/// compares against this snapshot, never a recomputation at approval time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Approval {
    /// Kind-prefixed approver id, e.g. `human:alice`.
    pub approved_by: String,
    /// When the approval was granted.
    pub approved_at: DateTime<Utc>,
    /// Whether this was an automatic approval.
    pub auto_approved: bool,
    /// Plan hash the approval binds to.
    pub plan_hash: String,
    /// Risk score snapshot at approval time.
    pub risk_score: f64,
    /// Approver actor kind.
    pub approver_type: String,
    /// Free-form justification.
    #[serde(default)]
    pub justification: String,
    /// The level this approval satisfies.
    pub level: ApprovalLevel,
}

/// One level's requirement inside an approval policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalRequirement {
    /// The level.
    pub level: ApprovalLevel,
    /// Whether the level must be satisfied for completion.
    pub required: bool,
    /// How many approvals satisfy the level.
    pub min_approvals: u32,
}

/// A declared multi-level approval policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ApprovalPolicy {
    /// Level requirements in declared order.
    pub requirements: Vec<ApprovalRequirement>,
    /// When true, levels must be satisfied in declared order.
    pub sequential: bool,
}

/// Approvals accumulated per level against a policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct MultiLevelApproval {
    /// The governing policy.
    pub policy: ApprovalPolicy,
    /// Approvals collected per level.
    #[serde(default)]
    pub approvals: BTreeMap<ApprovalLevel, Vec<Approval>>,
}

impl MultiLevelApproval {
    /// Start collecting against a policy.
    #[must_use]
    pub fn new(policy: ApprovalPolicy) -> Self {
        Self { policy, approvals: BTreeMap::new() }
    }

    /// Whether a level has met its minimum approvals.
    #[must_use]
    pub fn level_satisfied(&self, level: ApprovalLevel) -> bool {
        let needed = self
            .policy
            .requirements
            .iter()
            .find(|r| r.level == level)
            .map_or(0, |r| r.min_approvals as usize);
        self.approvals.get(&level).map_or(0, Vec::len) >= needed.max(1)
    }

    /// The next required level still unsatisfied, in declared order.
    #[must_use]
    pub fn next_required_level(&self) -> Option<ApprovalLevel> {
        self.policy
            .requirements
            .iter()
            .filter(|r| r.required)
            .find(|r| !self.level_satisfied(r.level))
            .map(|r| r.level)
    }

    /// Record an approval at its declared level.
    ///
    /// With a sequential policy, only the next unsatisfied required level
    /// may be approved; out-of-order approvals are rejected.
    pub fn add(&mut self, approval: Approval) -> Result<(), DomainError> {
        let level = approval.level;
        if !self.policy.requirements.iter().any(|r| r.level == level) {
            return Err(DomainError::Validation {
                field: "approval.level".into(),
                reason: format!("level {:?} is not part of the approval policy", level.as_str()),
            });
        }
        if self.policy.sequential {
            if let Some(next) = self.next_required_level() {
                let level_required =
                    self.policy.requirements.iter().any(|r| r.level == level && r.required);
                if level_required && level != next {
                    return Err(DomainError::Validation {
                        field: "approval.level".into(),
                        reason: format!(
                            "sequential policy requires {} next, got {}",
                            next.as_str(),
                            level.as_str()
                        ),
                    });
                }
            }
        }
        self.approvals.entry(level).or_default().push(approval);
        Ok(())
    }

    /// Whether every required level is satisfied.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.policy
            .requirements
            .iter()
            .filter(|r| r.required)
            .all(|r| self.level_satisfied(r.level))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approval(by: &str, level: ApprovalLevel) -> Approval {
        Approval {
            approved_by: by.into(),
            approved_at: Utc::now(),
            auto_approved: false,
            plan_hash: "hash".into(),
            risk_score: 0.2,
            approver_type: "human".into(),
            justification: String::new(),
            level,
        }
    }

    fn policy(sequential: bool) -> ApprovalPolicy {
        ApprovalPolicy {
            requirements: vec![
                ApprovalRequirement { level: ApprovalLevel::Technical, required: true, min_approvals: 1 },
                ApprovalRequirement { level: ApprovalLevel::Security, required: true, min_approvals: 1 },
                ApprovalRequirement { level: ApprovalLevel::Manager, required: false, min_approvals: 1 },
            ],
            sequential,
        }
    }

    #[test]
    fn completes_when_required_levels_satisfied() {
        let mut mla = MultiLevelApproval::new(policy(false));
        assert!(!mla.is_complete());
        mla.add(approval("human:alice", ApprovalLevel::Technical)).unwrap();
        assert!(!mla.is_complete());
        mla.add(approval("human:sec", ApprovalLevel::Security)).unwrap();
        // The optional manager level is not needed.
        assert!(mla.is_complete());
    }

    #[test]
    fn sequential_rejects_out_of_order() {
        let mut mla = MultiLevelApproval::new(policy(true));
        assert_eq!(mla.next_required_level(), Some(ApprovalLevel::Technical));
        let err = mla.add(approval("human:sec", ApprovalLevel::Security)).unwrap_err();
        assert_eq!(err.kind(), "validation_error");

        mla.add(approval("human:alice", ApprovalLevel::Technical)).unwrap();
        assert_eq!(mla.next_required_level(), Some(ApprovalLevel::Security));
        mla.add(approval("human:sec", ApprovalLevel::Security)).unwrap();
        assert!(mla.is_complete());
    }

    #[test]
    fn optional_levels_may_arrive_any_time_in_sequence() {
        let mut mla = MultiLevelApproval::new(policy(true));
        // Manager is optional, so it does not violate the sequence.
        mla.add(approval("human:boss", ApprovalLevel::Manager)).unwrap();
        assert_eq!(mla.next_required_level(), Some(ApprovalLevel::Technical));
    }

    #[test]
    fn unknown_level_is_rejected() {
        let mut mla = MultiLevelApproval::new(policy(false));
        let err = mla.add(approval("ci:auto", ApprovalLevel::Auto)).unwrap_err();
        assert_eq!(err.kind(), "validation_error");
    }

    #[test]
    fn min_approvals_counts() {
        let mut mla = MultiLevelApproval::new(ApprovalPolicy {
            requirements: vec![ApprovalRequirement {
                level: ApprovalLevel::Technical,
                required: true,
                min_approvals: 2,
            }],
            sequential: false,
        });
        mla.add(approval("human:alice", ApprovalLevel::Technical)).unwrap();
        assert!(!mla.is_complete());
        mla.add(approval("human:bob", ApprovalLevel::Technical)).unwrap();
        assert!(mla.is_complete());
    }
}
