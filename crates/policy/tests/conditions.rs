//! Condition semantics through the full engine, including policies
//! rebuilt from the flat on-disk condition encoding.

use chrono::{TimeZone, Utc};
use policy::{Ambient, BusinessHours, Engine, FreezePeriod, FreezeSeverity};
use policy_dsl::{compile_source, flat, Policy};
use relicta_core::{
    Actor, BlastRadius, BumpKind, ChangeAnalysis, DecisionKind, Intent, Proposal, Scope,
    TrustLevel,
};

fn proposal(actor: Actor, bump: BumpKind) -> Proposal {
    Proposal::new(
        "prop-1",
        actor,
        Scope { repository: "acme/widgets".into(), commit_range: "v1.0.0..HEAD".into() },
        Intent { summary: "quarterly release".into(), suggested_bump: bump, confidence: 0.8 },
        Utc::now(),
    )
    .unwrap()
}

fn human() -> Proposal {
    proposal(Actor::human("alice", "Alice", TrustLevel::Full), BumpKind::Minor)
}

fn tuesday_morning() -> Ambient {
    // 2026-03-03 is a Tuesday.
    Ambient::at(Utc.with_ymd_and_hms(2026, 3, 3, 10, 0, 0).unwrap())
}

#[test]
fn nested_logic_evaluates_through_the_engine() {
    let policy = compile_source(
        "logic",
        r#"
        rule "complex" {
          when {
            (actor.kind == "human" or actor.kind == "system")
            and not (risk.score >= 0.8)
            and intent.suggestedBump in ("minor", "patch")
          }
          then { set_decision(decision: "approve") add_rationale(message: "low-risk routine release") }
        }
        defaults { decision = "require_review" }
        "#,
    )
    .unwrap();
    let engine = Engine::new(vec![policy]);

    let hit = engine.evaluate(&human(), None, 0.2, &tuesday_morning()).unwrap();
    assert_eq!(hit.decision.matched_rule_ids, vec!["complex"]);
    assert_eq!(hit.decision.kind, DecisionKind::Approved);

    // Same rule, risk pushed over the negated bound: falls to defaults.
    let miss = engine.evaluate(&human(), None, 0.9, &tuesday_morning()).unwrap();
    assert!(miss.decision.matched_rule_ids.is_empty());
    assert_eq!(miss.decision.kind, DecisionKind::ApprovalRequired);
}

#[test]
fn flat_encoded_policies_evaluate_identically() {
    let original = compile_source(
        "roundtrip",
        r#"
        rule "gate" {
          priority = 10
          when { (change.breaking > 0 or change.security > 0) and not actor.trustLevel == "full" }
          then { require_approval(count: 2) }
        }
        defaults { decision = "approve" }
        "#,
    )
    .unwrap();

    // Rebuild the policy through the legacy flat condition shape.
    let mut rebuilt = original.clone();
    for rule in &mut rebuilt.rules {
        let flat_form = flat::to_flat(&rule.conditions);
        rule.conditions = flat::from_flat(&flat_form).unwrap();
    }
    let policies: Vec<Policy> = vec![rebuilt];

    let analysis = ChangeAnalysis {
        security: 1,
        blast_radius: Some(BlastRadius { files_changed: 2, lines_changed: 40 }),
        ..ChangeAnalysis::default()
    };
    let risky_actor = proposal(Actor::human("bob", "Bob", TrustLevel::Basic), BumpKind::Patch);

    let from_original = Engine::new(vec![original])
        .evaluate(&risky_actor, Some(&analysis), 0.3, &tuesday_morning())
        .unwrap();
    let from_rebuilt = Engine::new(policies)
        .evaluate(&risky_actor, Some(&analysis), 0.3, &tuesday_morning())
        .unwrap();

    assert_eq!(from_original.decision, from_rebuilt.decision);
    assert_eq!(from_original.decision.kind, DecisionKind::ApprovalRequired);
    assert_eq!(from_original.decision.required_approvers, 2);
}

#[test]
fn calendar_conditions_follow_the_injected_clock() {
    let policy = compile_source(
        "calendar",
        r#"
        rule "after-hours" {
          priority = 20
          when { time.isBusinessHours == false }
          then { require_approval(count: 1) add_rationale(message: "outside business hours") }
        }
        rule "friday" {
          priority = 10
          when { time.isEndOfWeek == true }
          then { add_rationale(message: "end of week") }
        }
        defaults { decision = "approve" }
        "#,
    )
    .unwrap();
    let engine = Engine::new(vec![policy]);

    let morning = engine.evaluate(&human(), None, 0.1, &tuesday_morning()).unwrap();
    assert_eq!(morning.decision.kind, DecisionKind::Approved);

    // 2026-03-06 23:00 is a Friday night.
    let mut night = Ambient::at(Utc.with_ymd_and_hms(2026, 3, 6, 23, 0, 0).unwrap());
    night.time.business_hours = BusinessHours::default();
    let late = engine.evaluate(&human(), None, 0.1, &night).unwrap();
    assert_eq!(late.decision.kind, DecisionKind::ApprovalRequired);
    assert_eq!(
        late.decision.rationale,
        vec!["outside business hours".to_string(), "end of week".to_string()]
    );
}

#[test]
fn soft_freeze_flags_while_hard_freeze_blocks() {
    let policy = compile_source(
        "freeze",
        r#"
        rule "hard" {
          priority = 100
          when { time.freeze.isHard == true }
          then { block(reason: "Hard freeze in effect") }
        }
        rule "soft" {
          priority = 90
          when { time.freeze.isSoft == true }
          then { require_approval(count: 1) add_rationale(message: "soft freeze: releases need sign-off") }
        }
        defaults { decision = "approve" }
        "#,
    )
    .unwrap();
    let engine = Engine::new(vec![policy]);

    let freeze = |severity| FreezePeriod {
        name: "q1".into(),
        start: Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).unwrap(),
        end: Utc.with_ymd_and_hms(2026, 3, 10, 0, 0, 0).unwrap(),
        reason: "stabilisation".into(),
        severity,
    };

    let mut soft = tuesday_morning();
    soft.time.freezes = vec![freeze(FreezeSeverity::Soft)];
    let advisory = engine.evaluate(&human(), None, 0.1, &soft).unwrap();
    assert_eq!(advisory.decision.kind, DecisionKind::ApprovalRequired);
    assert!(!advisory.decision.blocked);

    let mut hard = tuesday_morning();
    hard.time.freezes = vec![freeze(FreezeSeverity::Hard)];
    let blocked = engine.evaluate(&human(), None, 0.1, &hard).unwrap();
    assert_eq!(blocked.decision.kind, DecisionKind::Rejected);
    assert!(blocked.decision.blocked);
    assert_eq!(blocked.decision.block_reason.as_deref(), Some("Hard freeze in effect"));
}
