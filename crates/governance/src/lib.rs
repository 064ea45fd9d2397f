//! Governance evaluator.
//!
//! Orchestrates the risk calculator and the policy engine into one
//! decision: score the proposal, run the rules with the score in context,
//! then apply the evaluator's own guardrails — breaking changes from
//! non-humans always require approval, and a policy-level "approved" is
//! upgraded to "approval required" when the risk score exceeds the
//! auto-approve threshold (global or per-actor-kind). Guardrail reasons
//! append after the policy's own rationale.

#![deny(unsafe_code)]

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use policy::{Ambient, Engine, PolicyResult};
use policy_dsl::Policy;
use relicta_core::{ActorKind, ChangeAnalysis, Decision, DecisionKind, DomainError, Proposal};
use risk::{Calculator, RiskAssessment, RiskWeights};

/// Evaluator configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GovernanceConfig {
    /// Risk above this never auto-approves.
    pub auto_approve_threshold: f64,
    /// Stricter per-actor-kind caps; missing kinds use the global threshold.
    #[serde(default)]
    pub max_auto_approve_risk: BTreeMap<ActorKind, f64>,
    /// Force approval when a non-human ships breaking changes.
    pub require_human_for_breaking: bool,
}

impl Default for GovernanceConfig {
    fn default() -> Self {
        Self {
            auto_approve_threshold: 0.3,
            max_auto_approve_risk: BTreeMap::new(),
            require_human_for_breaking: true,
        }
    }
}

/// The evaluator's combined output.
#[derive(Debug, Clone)]
pub struct Evaluation {
    /// The final decision after guardrails.
    pub decision: Decision,
    /// The risk assessment fed into rule evaluation.
    pub risk: RiskAssessment,
    /// The raw engine result, including the rule trace.
    pub policy: PolicyResult,
}

/// Governance evaluator over a fixed policy set.
#[derive(Debug, Clone)]
pub struct Evaluator {
    config: GovernanceConfig,
    calculator: Calculator,
    engine: Engine,
}

impl Evaluator {
    /// Evaluator with default risk weights.
    #[must_use]
    pub fn new(config: GovernanceConfig, policies: Vec<Policy>) -> Self {
        Self { config, calculator: Calculator::new(), engine: Engine::new(policies) }
    }

    /// Evaluator with custom risk weights.
    #[must_use]
    pub fn with_weights(
        config: GovernanceConfig,
        policies: Vec<Policy>,
        weights: RiskWeights,
    ) -> Self {
        Self { config, calculator: Calculator::with_weights(weights), engine: Engine::new(policies) }
    }

    /// The configured policy engine.
    #[must_use]
    pub const fn engine(&self) -> &Engine {
        &self.engine
    }

    /// Score and decide one proposal.
    pub fn evaluate(
        &self,
        proposal: &Proposal,
        analysis: Option<&ChangeAnalysis>,
        ambient: &Ambient,
    ) -> Result<Evaluation, DomainError> {
        let risk = self.calculator.assess(proposal, analysis);
        let policy_result = self.engine.evaluate(proposal, analysis, risk.score, ambient)?;
        let mut decision = policy_result.decision.clone();

        let breaking = analysis.map_or(0, |a| a.breaking);
        if self.config.require_human_for_breaking
            && breaking > 0
            && proposal.actor.kind != ActorKind::Human
        {
            decision.strengthen(DecisionKind::ApprovalRequired);
            decision.required_approvers = decision.required_approvers.max(1);
            decision.push_rationale("breaking changes require human approval");
        }

        if decision.kind == DecisionKind::Approved {
            let cap = self
                .config
                .max_auto_approve_risk
                .get(&proposal.actor.kind)
                .copied()
                .unwrap_or(self.config.auto_approve_threshold);
            if risk.score > cap {
                decision.strengthen(DecisionKind::ApprovalRequired);
                decision.required_approvers = decision.required_approvers.max(1);
                decision.push_rationale(format!(
                    "risk score {:.2} exceeds auto-approve threshold {:.2}",
                    risk.score, cap
                ));
            }
        }

        debug!(
            proposal = %proposal.id,
            kind = decision.kind.as_str(),
            score = risk.score,
            matched = decision.matched_rule_ids.len(),
            "governance evaluation complete"
        );
        Ok(Evaluation { decision, risk, policy: policy_result })
    }
}
