//! Cross-policy rule ordering and precedence.

use chrono::{TimeZone, Utc};
use policy::{Ambient, Engine};
use policy_dsl::compile_source;
use relicta_core::{Actor, BumpKind, DecisionKind, Intent, Proposal, Scope, TrustLevel};

fn proposal() -> Proposal {
    Proposal::new(
        "prop-1",
        Actor::human("alice", "Alice", TrustLevel::Full),
        Scope { repository: "acme/widgets".into(), commit_range: "v1.0.0..HEAD".into() },
        Intent { summary: "release".into(), suggested_bump: BumpKind::Minor, confidence: 0.9 },
        Utc::now(),
    )
    .unwrap()
}

fn ambient() -> Ambient {
    Ambient::at(Utc.with_ymd_and_hms(2026, 3, 4, 10, 0, 0).unwrap())
}

#[test]
fn priority_orders_across_policy_files() {
    // Two files; the second file's rule outranks both of the first's.
    let alpha = compile_source(
        "alpha",
        r#"
        rule "alpha-low" { priority = 1 when { true } then { add_rationale(message: "alpha low") } }
        rule "alpha-mid" { priority = 10 when { true } then { add_rationale(message: "alpha mid") } }
        "#,
    )
    .unwrap();
    let beta = compile_source(
        "beta",
        r#"
        rule "beta-high" { priority = 100 when { true } then { add_rationale(message: "beta high") } }
        rule "beta-mid" { priority = 10 when { true } then { add_rationale(message: "beta mid") } }
        "#,
    )
    .unwrap();

    let engine = Engine::new(vec![alpha, beta]);
    let result = engine.evaluate(&proposal(), None, 0.1, &ambient()).unwrap();
    // Priority descending; the 10-10 tie keeps file order (alpha before beta).
    assert_eq!(
        result.decision.matched_rule_ids,
        vec!["beta_high", "alpha_mid", "beta_mid", "alpha_low"]
    );
}

#[test]
fn most_restrictive_outcome_survives_regardless_of_order() {
    // A low-priority block still rejects even when a high-priority rule
    // approved first: decisions strengthen, never weaken.
    let policy = compile_source(
        "gate",
        r#"
        rule "approve-first" { priority = 100 when { true } then { set_decision(decision: "approve") } }
        rule "deny-late" { priority = 1 when { true } then { block(reason: "nope") } }
        "#,
    )
    .unwrap();
    let engine = Engine::new(vec![policy]);
    let result = engine.evaluate(&proposal(), None, 0.1, &ambient()).unwrap();
    assert_eq!(result.decision.kind, DecisionKind::Rejected);
    assert!(result.decision.blocked);
    assert_eq!(result.decision.block_reason.as_deref(), Some("nope"));
}

#[test]
fn repeated_evaluation_is_byte_for_byte_deterministic() {
    let policy = compile_source(
        "det",
        r#"
        rule "risk-band" { priority = 5 when { risk.score >= 0.25 } then { require_approval(count: 2) } }
        rule "human-note" { priority = 5 when { actor.kind == "human" } then { add_rationale(message: "human driver") } }
        defaults { decision = "approve" }
        "#,
    )
    .unwrap();
    let engine = Engine::new(vec![policy]);
    let amb = ambient();
    let p = proposal();

    let first = serde_json::to_string(&engine.evaluate(&p, None, 0.3, &amb).unwrap().decision).unwrap();
    for _ in 0..5 {
        let again =
            serde_json::to_string(&engine.evaluate(&p, None, 0.3, &amb).unwrap().decision).unwrap();
        assert_eq!(first, again);
    }
}
