//! The rule evaluation engine.
//!
//! Evaluation order and precedence:
//! 1) Collect enabled rules across all policies; order by priority
//!    descending, ties broken by declaration order (policy order, then
//!    rule order within the file).
//! 2) A rule matches when every top-level condition holds; evaluation
//!    short-circuits on the first false condition.
//! 3) Matched rules apply their actions in author order. The pending
//!    decision only ever strengthens: `rejected > approval_required >
//!    approved`.
//! 4) When nothing matched, the first policy's defaults decide.
//!
//! Condition failures (missing paths, type mismatches, bad regexes) count
//! as "not satisfied" and never abort the run. The whole evaluation runs
//! under a hard time budget; on expiry the caller gets a `timeout` error
//! and no partial state.

use std::time::{Duration, Instant};

use regex::Regex;
use serde_json::Value;
use tracing::{debug, warn};

use policy_dsl::{Action, ActionKind, CmpOp, CompiledRule, Condition, DefaultDecision, Policy};
use relicta_core::{ChangeAnalysis, Decision, DecisionCondition, DecisionKind, DomainError, Proposal, RequiredAction};

use crate::ambient::{Ambient, TeamContext};
use crate::context::EvalContext;

/// Default hard cap on one evaluation.
pub const DEFAULT_TIME_BUDGET: Duration = Duration::from_secs(5);

/// Per-rule account of what the engine did, for explain output.
#[derive(Debug, Clone)]
pub struct RuleTrace {
    /// Policy the rule came from.
    pub policy: String,
    /// Normalised rule id.
    pub rule_id: String,
    /// Rule priority.
    pub priority: i64,
    /// Whether every condition held.
    pub matched: bool,
    /// Number of actions applied (zero unless matched).
    pub actions_applied: usize,
}

/// The engine's output: the decision plus the evaluation trace.
#[derive(Debug, Clone)]
pub struct PolicyResult {
    /// Accumulated decision.
    pub decision: Decision,
    /// Per-rule trace in evaluation order.
    pub trace: Vec<RuleTrace>,
}

/// Deterministic policy engine over a fixed set of compiled policies.
#[derive(Debug, Clone)]
pub struct Engine {
    policies: Vec<Policy>,
    time_budget: Duration,
}

impl Engine {
    /// Engine over the given policies with the default time budget.
    #[must_use]
    pub fn new(policies: Vec<Policy>) -> Self {
        Self { policies, time_budget: DEFAULT_TIME_BUDGET }
    }

    /// Override the evaluation time budget.
    #[must_use]
    pub const fn with_time_budget(mut self, budget: Duration) -> Self {
        self.time_budget = budget;
        self
    }

    /// The loaded policies.
    #[must_use]
    pub fn policies(&self) -> &[Policy] {
        &self.policies
    }

    /// Evaluate the rules against one proposal.
    ///
    /// Pure and deterministic for identical inputs: the clock and all team
    /// data come in through `ambient`.
    pub fn evaluate(
        &self,
        proposal: &Proposal,
        analysis: Option<&ChangeAnalysis>,
        risk_score: f64,
        ambient: &Ambient,
    ) -> Result<PolicyResult, DomainError> {
        let deadline = Instant::now() + self.time_budget;
        let ctx = EvalContext::build(proposal, analysis, risk_score, ambient);

        let mut ordered: Vec<(usize, &Policy, &CompiledRule)> = Vec::new();
        for (policy_idx, policy) in self.policies.iter().enumerate() {
            for rule in policy.rules.iter().filter(|r| r.enabled) {
                ordered.push((policy_idx, policy, rule));
            }
        }
        // Stable sort: ties keep declaration order.
        ordered.sort_by(|a, b| b.2.priority.cmp(&a.2.priority));

        let mut decision = Decision::approved();
        let mut trace = Vec::with_capacity(ordered.len());

        for (_, policy, rule) in ordered {
            if Instant::now() >= deadline {
                return Err(DomainError::Timeout(format!(
                    "policy evaluation exceeded {:.1}s",
                    self.time_budget.as_secs_f64()
                )));
            }

            let matched = eval_conditions(&rule.conditions, &ctx);
            let mut applied = 0;
            if matched {
                decision.matched_rule_ids.push(rule.id.clone());
                for action in &rule.actions {
                    apply_action(&mut decision, action, &ambient.team);
                    applied += 1;
                }
                debug!(policy = %policy.name, rule = %rule.id, actions = applied, "rule matched");
            }
            trace.push(RuleTrace {
                policy: policy.name.clone(),
                rule_id: rule.id.clone(),
                priority: rule.priority,
                matched,
                actions_applied: applied,
            });
        }

        if decision.matched_rule_ids.is_empty() {
            apply_defaults(&mut decision, self.policies.first());
        }
        if decision.kind == DecisionKind::Rejected {
            decision.blocked = true;
        }

        Ok(PolicyResult { decision, trace })
    }
}

fn apply_defaults(decision: &mut Decision, first_policy: Option<&Policy>) {
    let defaults = first_policy.map(|p| p.defaults).unwrap_or_default();
    match defaults.decision {
        DefaultDecision::Approve => {}
        DefaultDecision::RequireReview => {
            decision.strengthen(DecisionKind::ApprovalRequired);
            decision.required_approvers = decision.required_approvers.max(defaults.required_approvers.max(1));
        }
        DefaultDecision::Reject => {
            decision.strengthen(DecisionKind::Rejected);
        }
    }
}

// ── Condition evaluation ─────────────────────────────────────────────

fn eval_conditions(conditions: &[Condition], ctx: &EvalContext) -> bool {
    conditions.iter().all(|c| eval_condition(c, ctx))
}

fn eval_condition(condition: &Condition, ctx: &EvalContext) -> bool {
    match condition {
        Condition::Always => true,
        Condition::All(list) => list.iter().all(|c| eval_condition(c, ctx)),
        Condition::Any(list) => list.iter().any(|c| eval_condition(c, ctx)),
        Condition::Not(inner) => !eval_condition(inner, ctx),
        Condition::Leaf { field, op, value } => eval_leaf(field, *op, value, ctx),
    }
}

fn eval_leaf(field: &str, op: CmpOp, expected: &Value, ctx: &EvalContext) -> bool {
    let actual = ctx.lookup(field);
    match op {
        // Undefined compares unequal to everything.
        CmpOp::Eq => actual.is_some_and(|a| values_equal(a, expected)),
        CmpOp::Ne => actual.map_or(true, |a| !values_equal(a, expected)),
        CmpOp::Gt => numeric_cmp(actual, expected).is_some_and(|o| o == std::cmp::Ordering::Greater),
        CmpOp::Lt => numeric_cmp(actual, expected).is_some_and(|o| o == std::cmp::Ordering::Less),
        CmpOp::Gte => numeric_cmp(actual, expected)
            .is_some_and(|o| o != std::cmp::Ordering::Less),
        CmpOp::Lte => numeric_cmp(actual, expected)
            .is_some_and(|o| o != std::cmp::Ordering::Greater),
        CmpOp::In => match (actual, expected.as_array()) {
            (Some(a), Some(list)) => list.iter().any(|item| values_equal(a, item)),
            _ => false,
        },
        CmpOp::Contains => match (actual.and_then(Value::as_str), expected.as_str()) {
            (Some(haystack), Some(needle)) => haystack.contains(needle),
            _ => false,
        },
        CmpOp::Matches => match (actual.and_then(Value::as_str), expected.as_str()) {
            (Some(subject), Some(pattern)) => match Regex::new(pattern) {
                Ok(re) => re.is_match(subject),
                Err(e) => {
                    warn!(field, pattern, error = %e, "regex failed to compile; condition skipped");
                    false
                }
            },
            _ => false,
        },
    }
}

/// Value equality: numbers compare as f64, strings and bools structurally;
/// mixed types are unequal.
fn values_equal(a: &Value, b: &Value) -> bool {
    if let (Some(x), Some(y)) = (a.as_f64(), b.as_f64()) {
        return x == y;
    }
    match (a, b) {
        (Value::String(x), Value::String(y)) => x == y,
        (Value::Bool(x), Value::Bool(y)) => x == y,
        _ => a == b,
    }
}

fn numeric_cmp(actual: Option<&Value>, expected: &Value) -> Option<std::cmp::Ordering> {
    let a = actual?.as_f64()?;
    let b = expected.as_f64()?;
    a.partial_cmp(&b)
}

// ── Action application ───────────────────────────────────────────────

fn apply_action(decision: &mut Decision, action: &Action, team: &TeamContext) {
    match action.kind {
        ActionKind::SetDecision => {
            let kind = match action.str_param("decision") {
                Some("approve") => DecisionKind::Approved,
                Some("require_review") => DecisionKind::ApprovalRequired,
                Some("reject") => DecisionKind::Rejected,
                other => {
                    warn!(?other, "set_decision with unknown decision value; ignored");
                    return;
                }
            };
            decision.strengthen(kind);
        }
        ActionKind::RequireApproval => {
            let count = action.count_param("count").unwrap_or(1);
            decision.strengthen(DecisionKind::ApprovalRequired);
            decision.required_approvers = decision.required_approvers.max(count);
            if let Some(desc) = action.str_param("description") {
                decision.push_rationale(desc);
            }
        }
        ActionKind::AddReviewer => {
            if let Some(one) = action.str_param("reviewer") {
                decision.reviewers.insert(one.to_string());
            }
            if let Some(many) = action.params.get("reviewers").and_then(Value::as_array) {
                for reviewer in many.iter().filter_map(Value::as_str) {
                    decision.reviewers.insert(reviewer.to_string());
                }
            }
        }
        ActionKind::RequireTeamReview => {
            decision.strengthen(DecisionKind::ApprovalRequired);
            let count = action.count_param("count").unwrap_or(1);
            decision.required_approvers = decision.required_approvers.max(count);
            match action.str_param("team").and_then(|name| team.teams.get(name)) {
                Some(t) => {
                    for member in &t.members {
                        decision.reviewers.insert(member.clone());
                    }
                }
                None => warn!(team = ?action.str_param("team"), "require_team_review on unknown team"),
            }
        }
        ActionKind::RequireTeamLead => {
            decision.strengthen(DecisionKind::ApprovalRequired);
            decision.required_approvers = decision.required_approvers.max(1);
            match action.str_param("team").and_then(|name| team.teams.get(name)) {
                Some(t) => {
                    for lead in &t.leads {
                        decision.reviewers.insert(lead.clone());
                    }
                }
                None => warn!(team = ?action.str_param("team"), "require_team_lead on unknown team"),
            }
        }
        ActionKind::RequireRoleReview => {
            decision.strengthen(DecisionKind::ApprovalRequired);
            decision.required_approvers = decision.required_approvers.max(1);
            match action.str_param("role").and_then(|name| team.roles.get(name)) {
                Some(r) => {
                    for member in &r.members {
                        decision.reviewers.insert(member.clone());
                    }
                }
                None => warn!(role = ?action.str_param("role"), "require_role_review on unknown role"),
            }
        }
        ActionKind::Block => {
            decision.strengthen(DecisionKind::Rejected);
            decision.blocked = true;
            if decision.block_reason.is_none() {
                let reason =
                    action.str_param("reason").unwrap_or("blocked by policy").to_string();
                decision.block_reason = Some(reason);
            }
        }
        ActionKind::AddRationale => {
            if let Some(message) = action.str_param("message") {
                decision.push_rationale(message);
            }
        }
        ActionKind::AddCondition => {
            let condition_type =
                action.str_param("type").unwrap_or("unspecified").to_string();
            let value = action.params.get("value").cloned().unwrap_or(Value::Null);
            decision.conditions.push(DecisionCondition { condition_type, value });
        }
    }

    // Approval and block demands also surface as required actions so
    // downstream automation sees them without re-reading the rule set.
    if let ActionKind::RequireApproval | ActionKind::Block = action.kind {
        decision.required_actions.push(RequiredAction {
            action_type: match action.kind {
                ActionKind::RequireApproval => "require_approval".into(),
                _ => "block".into(),
            },
            params: action.params.clone(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use relicta_core::{Actor, BlastRadius, BumpKind, Intent, Scope, TrustLevel};

    use crate::ambient::{FreezePeriod, FreezeSeverity, Team};

    fn proposal(actor: Actor, bump: BumpKind, confidence: f64) -> Proposal {
        Proposal::new(
            "prop-1",
            actor,
            Scope { repository: "acme/widgets".into(), commit_range: "v1.0.0..HEAD".into() },
            Intent { summary: "release".into(), suggested_bump: bump, confidence },
            Utc::now(),
        )
        .unwrap()
    }

    fn human() -> Proposal {
        proposal(Actor::human("alice", "Alice", TrustLevel::Full), BumpKind::Minor, 0.9)
    }

    fn ambient() -> Ambient {
        Ambient::at(Utc.with_ymd_and_hms(2026, 3, 4, 10, 0, 0).unwrap())
    }

    fn engine(sources: &[(&str, &str)]) -> Engine {
        let policies = sources
            .iter()
            .map(|(name, src)| policy_dsl::compile_source(name, src).unwrap())
            .collect();
        Engine::new(policies)
    }

    #[test]
    fn matched_ids_order_by_priority_then_declaration() {
        let eng = engine(&[(
            "base",
            r#"
            rule "low" { priority = 1 when { true } then { add_rationale(message: "low") } }
            rule "tie-a" { priority = 5 when { true } then { add_rationale(message: "a") } }
            rule "tie-b" { priority = 5 when { true } then { add_rationale(message: "b") } }
            rule "high" { priority = 10 when { true } then { add_rationale(message: "high") } }
            "#,
        )]);
        let result = eng.evaluate(&human(), None, 0.1, &ambient()).unwrap();
        assert_eq!(result.decision.matched_rule_ids, vec!["high", "tie_a", "tie_b", "low"]);
    }

    #[test]
    fn disabled_rules_never_match() {
        let eng = engine(&[(
            "base",
            r#"
            rule "off" { enabled = false when { true } then { block(reason: "nope") } }
            rule "on" { when { true } then { add_rationale(message: "ok") } }
            "#,
        )]);
        let result = eng.evaluate(&human(), None, 0.1, &ambient()).unwrap();
        assert_eq!(result.decision.matched_rule_ids, vec!["on"]);
        assert_eq!(result.decision.kind, DecisionKind::Approved);
    }

    #[test]
    fn decision_only_strengthens() {
        let eng = engine(&[(
            "base",
            r#"
            rule "first" { priority = 10 when { true } then { require_approval(count: 2) } }
            rule "second" { priority = 5 when { true } then { set_decision(decision: "approve") } }
            "#,
        )]);
        let result = eng.evaluate(&human(), None, 0.1, &ambient()).unwrap();
        assert_eq!(result.decision.kind, DecisionKind::ApprovalRequired);
        assert_eq!(result.decision.required_approvers, 2);
    }

    #[test]
    fn require_approval_takes_max_count() {
        let eng = engine(&[(
            "base",
            r#"
            rule "one" { priority = 10 when { true } then { require_approval(count: 3) } }
            rule "two" { priority = 5 when { true } then { require_approval(count: 1) } }
            "#,
        )]);
        let result = eng.evaluate(&human(), None, 0.1, &ambient()).unwrap();
        assert_eq!(result.decision.required_approvers, 3);
    }

    #[test]
    fn block_sets_reason_and_rejects() {
        let mut amb = ambient();
        amb.time.freezes.push(FreezePeriod {
            name: "year-end".into(),
            start: Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).unwrap(),
            end: Utc.with_ymd_and_hms(2026, 3, 10, 0, 0, 0).unwrap(),
            reason: "stability".into(),
            severity: FreezeSeverity::Hard,
        });
        let eng = engine(&[(
            "freeze",
            r#"
            rule "hard-freeze" {
              priority = 1000
              when { time.freeze.isHard == true }
              then { block(reason: "Hard freeze in effect") }
            }
            "#,
        )]);
        let result = eng.evaluate(&human(), None, 0.1, &amb).unwrap();
        assert_eq!(result.decision.kind, DecisionKind::Rejected);
        assert!(result.decision.blocked);
        assert_eq!(result.decision.block_reason.as_deref(), Some("Hard freeze in effect"));
    }

    #[test]
    fn reviewers_union_without_duplicates() {
        let mut amb = ambient();
        amb.team.teams.insert(
            "platform".into(),
            Team {
                members: vec!["human:alice".into(), "human:bob".into()],
                leads: vec!["human:alice".into()],
                ..Team::default()
            },
        );
        let eng = engine(&[(
            "review",
            r#"
            rule "team" { when { true } then { require_team_review(team: "platform", count: 2) } }
            rule "lead" { when { true } then { require_team_lead(team: "platform") } }
            rule "extra" { when { true } then { add_reviewer(reviewer: "human:bob") } }
            "#,
        )]);
        let result = eng.evaluate(&human(), None, 0.1, &amb).unwrap();
        let reviewers: Vec<&str> =
            result.decision.reviewers.iter().map(String::as_str).collect();
        assert_eq!(reviewers, vec!["human:alice", "human:bob"]);
        assert_eq!(result.decision.kind, DecisionKind::ApprovalRequired);
        assert_eq!(result.decision.required_approvers, 2);
    }

    #[test]
    fn condition_operators() {
        let analysis = ChangeAnalysis {
            features: 2,
            breaking: 1,
            blast_radius: Some(BlastRadius { files_changed: 5, lines_changed: 800 }),
            ..ChangeAnalysis::default()
        };
        let eng = engine(&[(
            "ops",
            r#"
            rule "gt" { when { change.breaking > 0 } then { add_rationale(message: "gt") } }
            rule "in" { when { actor.kind in ("human", "system") } then { add_rationale(message: "in") } }
            rule "contains" { when { intent.summary contains "rele" } then { add_rationale(message: "contains") } }
            rule "matches" { when { actor.id matches "^ali" } then { add_rationale(message: "matches") } }
            rule "bad-regex" { when { actor.id matches "([" } then { block(reason: "never") } }
            rule "undefined" { when { change.velocity == 1 } then { block(reason: "never") } }
            rule "type-mismatch" { when { actor.kind > 3 } then { block(reason: "never") } }
            "#,
        )]);
        let result = eng.evaluate(&human(), Some(&analysis), 0.4, &ambient()).unwrap();
        assert_eq!(result.decision.matched_rule_ids, vec!["gt", "in", "contains", "matches"]);
        assert_eq!(result.decision.kind, DecisionKind::Approved);
    }

    #[test]
    fn undefined_is_unequal_to_everything() {
        let eng = engine(&[(
            "ops",
            r#"
            rule "ne-undefined" { when { change.velocity != 1 } then { add_rationale(message: "ne") } }
            "#,
        )]);
        let result = eng.evaluate(&human(), None, 0.0, &ambient()).unwrap();
        assert_eq!(result.decision.matched_rule_ids, vec!["ne_undefined"]);
    }

    #[test]
    fn or_and_not_structure() {
        let eng = engine(&[(
            "logic",
            r#"
            rule "either" {
              when { actor.kind == "ci" or (actor.kind == "human" and risk.score < 0.5) }
              then { add_rationale(message: "either") }
            }
            rule "negated" {
              when { not time.freeze.active == true }
              then { add_rationale(message: "no freeze") }
            }
            "#,
        )]);
        let result = eng.evaluate(&human(), None, 0.2, &ambient()).unwrap();
        assert_eq!(result.decision.matched_rule_ids, vec!["either", "negated"]);
    }

    #[test]
    fn fallback_to_first_policy_defaults() {
        let eng = engine(&[
            ("first", r#"defaults { decision = "reject" }"#),
            ("second", r#"defaults { decision = "approve" }"#),
        ]);
        let result = eng.evaluate(&human(), None, 0.0, &ambient()).unwrap();
        assert_eq!(result.decision.kind, DecisionKind::Rejected);
        assert!(result.decision.blocked);
    }

    #[test]
    fn no_policies_require_review() {
        let eng = Engine::new(Vec::new());
        let result = eng.evaluate(&human(), None, 0.0, &ambient()).unwrap();
        assert_eq!(result.decision.kind, DecisionKind::ApprovalRequired);
        assert!(result.decision.required_approvers >= 1);
    }

    #[test]
    fn rationale_is_deduplicated() {
        let eng = engine(&[(
            "dup",
            r#"
            rule "a" { priority = 2 when { true } then { add_rationale(message: "same line") } }
            rule "b" { priority = 1 when { true } then { add_rationale(message: "same line") } }
            "#,
        )]);
        let result = eng.evaluate(&human(), None, 0.0, &ambient()).unwrap();
        assert_eq!(result.decision.rationale, vec!["same line"]);
    }

    #[test]
    fn evaluation_is_deterministic() {
        let eng = engine(&[(
            "det",
            r#"
            rule "risk" { when { risk.score >= 0.3 } then { require_approval(count: 1) } }
            rule "bump" { when { intent.suggestedBump == "minor" } then { add_rationale(message: "minor") } }
            "#,
        )]);
        let amb = ambient();
        let a = eng.evaluate(&human(), None, 0.35, &amb).unwrap();
        let b = eng.evaluate(&human(), None, 0.35, &amb).unwrap();
        assert_eq!(a.decision, b.decision);
    }

    #[test]
    fn zero_budget_times_out() {
        let eng = engine(&[(
            "slow",
            r#"rule "r" { when { true } then { add_rationale(message: "hi") } }"#,
        )])
        .with_time_budget(Duration::ZERO);
        let err = eng.evaluate(&human(), None, 0.0, &ambient()).unwrap_err();
        assert_eq!(err.kind(), "timeout");
    }

    #[test]
    fn trace_reports_unmatched_rules() {
        let eng = engine(&[(
            "trace",
            r#"
            rule "hit" { when { true } then { add_rationale(message: "hi") } }
            rule "miss" { when { risk.score > 2 } then { block(reason: "no") } }
            "#,
        )]);
        let result = eng.evaluate(&human(), None, 0.0, &ambient()).unwrap();
        assert_eq!(result.trace.len(), 2);
        let miss = result.trace.iter().find(|t| t.rule_id == "miss").unwrap();
        assert!(!miss.matched);
        assert_eq!(miss.actions_applied, 0);
    }
}
