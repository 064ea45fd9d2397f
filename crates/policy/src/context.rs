//! Evaluation context: the dotted-path namespace rules read from.

use serde_json::{json, Map, Value};

use relicta_core::{ChangeAnalysis, Proposal};

use crate::ambient::Ambient;

/// Immutable nested mapping resolved by dotted paths such as `risk.score`
/// or `time.freeze.isHard`.
#[derive(Debug, Clone)]
pub struct EvalContext {
    root: Value,
}

impl EvalContext {
    /// Build the full context for one evaluation.
    #[must_use]
    pub fn build(
        proposal: &Proposal,
        analysis: Option<&ChangeAnalysis>,
        risk_score: f64,
        ambient: &Ambient,
    ) -> Self {
        let empty = ChangeAnalysis::default();
        let analysis = analysis.unwrap_or(&empty);
        let actor_id = proposal.actor.external_id();
        let time = &ambient.time;
        let team = &ambient.team;

        let freeze = time.active_freeze().map_or_else(
            || {
                json!({
                    "active": false,
                    "isSoft": false,
                    "isHard": false,
                    "name": "",
                    "severity": "",
                    "reason": "",
                })
            },
            |f| {
                json!({
                    "active": true,
                    "isSoft": f.severity == crate::ambient::FreezeSeverity::Soft,
                    "isHard": f.severity == crate::ambient::FreezeSeverity::Hard,
                    "name": f.name,
                    "severity": f.severity.as_str(),
                    "reason": f.reason,
                })
            },
        );

        let teams: Map<String, Value> = team
            .teams
            .iter()
            .map(|(name, t)| {
                (
                    name.clone(),
                    json!({
                        "members": t.members,
                        "leads": t.leads,
                        "permissions": t.permissions,
                    }),
                )
            })
            .collect();
        let roles: Map<String, Value> = team
            .roles
            .iter()
            .map(|(name, r)| {
                (
                    name.clone(),
                    json!({
                        "members": r.members,
                        "permissions": r.permissions,
                        "canApprove": r.can_approve,
                        "canPublish": r.can_publish,
                    }),
                )
            })
            .collect();

        let root = json!({
            "actor": {
                "kind": proposal.actor.kind.as_str(),
                "id": proposal.actor.id,
                "name": proposal.actor.name,
                "trustLevel": proposal.actor.trust.as_str(),
                "canApprove": team.can_approve(&actor_id),
                "teams": team.teams_of(&actor_id),
                "roles": team.roles_of(&actor_id),
            },
            "risk": { "score": risk_score },
            "intent": {
                "summary": proposal.intent.summary,
                "suggestedBump": proposal.intent.suggested_bump.as_str(),
                "confidence": proposal.intent.confidence,
            },
            "change": {
                "features": analysis.features,
                "fixes": analysis.fixes,
                "breaking": analysis.breaking,
                "security": analysis.security,
                "files": analysis.files_changed(),
                "filesChanged": analysis.files_changed(),
                "linesChanged": analysis.lines_changed(),
            },
            "time": {
                "hour": time.hour(),
                "weekday": time.weekday_name(),
                "weekdayNum": time.weekday_num(),
                "dayOfMonth": time.day_of_month(),
                "month": time.month(),
                "isBusinessHours": time.is_business_hours(),
                "isWeekend": time.is_weekend(),
                "isEndOfWeek": time.is_end_of_week(),
                "isEndOfMonth": time.is_end_of_month(),
                "isEndOfQuarter": time.is_end_of_quarter(),
                "freeze": freeze,
            },
            "teams": Value::Object(teams),
            "roles": Value::Object(roles),
        });
        Self { root }
    }

    /// Resolve a dotted path; `None` means undefined.
    #[must_use]
    pub fn lookup(&self, path: &str) -> Option<&Value> {
        let mut current = &self.root;
        for part in path.split('.') {
            current = current.as_object()?.get(part)?;
        }
        Some(current)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use relicta_core::{Actor, BlastRadius, BumpKind, Intent, Scope, TrustLevel};

    use crate::ambient::{FreezePeriod, FreezeSeverity, Team};

    fn proposal() -> Proposal {
        Proposal::new(
            "prop-1",
            Actor::human("alice", "Alice", TrustLevel::Full),
            Scope { repository: "acme/widgets".into(), commit_range: "v1.0.0..HEAD".into() },
            Intent { summary: "fixes".into(), suggested_bump: BumpKind::Patch, confidence: 0.9 },
            Utc::now(),
        )
        .unwrap()
    }

    #[test]
    fn paths_resolve() {
        let analysis = ChangeAnalysis {
            fixes: 1,
            blast_radius: Some(BlastRadius { files_changed: 2, lines_changed: 10 }),
            ..ChangeAnalysis::default()
        };
        let ambient = Ambient::at(Utc.with_ymd_and_hms(2026, 3, 4, 10, 0, 0).unwrap());
        let ctx = EvalContext::build(&proposal(), Some(&analysis), 0.12, &ambient);

        assert_eq!(ctx.lookup("actor.kind").unwrap(), "human");
        assert_eq!(ctx.lookup("actor.trustLevel").unwrap(), "full");
        assert!((ctx.lookup("risk.score").unwrap().as_f64().unwrap() - 0.12).abs() < 1e-9);
        assert_eq!(ctx.lookup("intent.suggestedBump").unwrap(), "patch");
        assert_eq!(ctx.lookup("change.fixes").unwrap(), 1);
        assert_eq!(ctx.lookup("change.linesChanged").unwrap(), 10);
        assert_eq!(ctx.lookup("time.freeze.active").unwrap(), false);
    }

    #[test]
    fn missing_paths_are_undefined() {
        let ambient = Ambient::at(Utc.with_ymd_and_hms(2026, 3, 4, 10, 0, 0).unwrap());
        let ctx = EvalContext::build(&proposal(), None, 0.0, &ambient);
        assert!(ctx.lookup("change.velocity").is_none());
        assert!(ctx.lookup("nonsense").is_none());
        assert!(ctx.lookup("actor.kind.extra").is_none());
    }

    #[test]
    fn nil_analysis_reads_as_zero() {
        let ambient = Ambient::at(Utc.with_ymd_and_hms(2026, 3, 4, 10, 0, 0).unwrap());
        let ctx = EvalContext::build(&proposal(), None, 0.0, &ambient);
        assert_eq!(ctx.lookup("change.breaking").unwrap(), 0);
        assert_eq!(ctx.lookup("change.files").unwrap(), 0);
    }

    #[test]
    fn freeze_and_team_data_surface() {
        let mut ambient = Ambient::at(Utc.with_ymd_and_hms(2026, 12, 24, 10, 0, 0).unwrap());
        ambient.time.freezes.push(FreezePeriod {
            name: "year-end".into(),
            start: Utc.with_ymd_and_hms(2026, 12, 20, 0, 0, 0).unwrap(),
            end: Utc.with_ymd_and_hms(2027, 1, 2, 0, 0, 0).unwrap(),
            reason: "holiday coverage".into(),
            severity: FreezeSeverity::Hard,
        });
        ambient.team.teams.insert(
            "platform".into(),
            Team { members: vec!["human:alice".into()], ..Team::default() },
        );

        let ctx = EvalContext::build(&proposal(), None, 0.0, &ambient);
        assert_eq!(ctx.lookup("time.freeze.isHard").unwrap(), true);
        assert_eq!(ctx.lookup("time.freeze.name").unwrap(), "year-end");
        assert_eq!(ctx.lookup("actor.teams").unwrap(), &serde_json::json!(["platform"]));
        assert_eq!(
            ctx.lookup("teams.platform.members").unwrap(),
            &serde_json::json!(["human:alice"])
        );
    }
}
