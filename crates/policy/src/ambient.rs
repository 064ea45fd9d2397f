//! Ambient data injected into rule evaluation: clock, business hours,
//! freeze periods, teams, and roles.
//!
//! The clock is a plain field rather than a call to the system time, so
//! evaluation stays pure and tests can pin any instant they like.

use std::collections::BTreeMap;

use chrono::{DateTime, Datelike, FixedOffset, NaiveDate, Timelike, Utc, Weekday};
use serde::{Deserialize, Serialize};

/// Severity of a freeze period.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FreezeSeverity {
    /// Advisory: rules may flag but usually do not block.
    Soft,
    /// Blocking: block-severity rules fire.
    Hard,
}

impl FreezeSeverity {
    /// Stable lowercase name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Soft => "soft",
            Self::Hard => "hard",
        }
    }
}

/// A release freeze window. Active while `start <= now < end`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FreezePeriod {
    /// Display name, e.g. "Year-end freeze".
    pub name: String,
    /// Inclusive start.
    pub start: DateTime<Utc>,
    /// Exclusive end.
    pub end: DateTime<Utc>,
    /// Why the freeze exists.
    pub reason: String,
    /// Soft or hard.
    pub severity: FreezeSeverity,
}

impl FreezePeriod {
    /// Whether `now` falls inside the half-open window.
    #[must_use]
    pub fn contains(&self, now: DateTime<Utc>) -> bool {
        self.start <= now && now < self.end
    }
}

/// Business-hours configuration with a fixed UTC offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BusinessHours {
    /// First business hour (inclusive), local time.
    pub start_hour: u32,
    /// End of business (exclusive), local time.
    pub end_hour: u32,
    /// Local timezone as minutes east of UTC.
    pub utc_offset_minutes: i32,
    /// Whether weekends count as business time.
    pub allow_weekends: bool,
}

impl Default for BusinessHours {
    fn default() -> Self {
        Self { start_hour: 9, end_hour: 17, utc_offset_minutes: 0, allow_weekends: false }
    }
}

/// The evaluation clock plus calendar configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeContext {
    /// The instant rules evaluate against.
    pub now: DateTime<Utc>,
    /// Business-hours configuration.
    pub business_hours: BusinessHours,
    /// Declared freeze windows.
    pub freezes: Vec<FreezePeriod>,
}

impl TimeContext {
    /// Context pinned to a specific instant with default business hours and
    /// no freezes.
    #[must_use]
    pub fn at(now: DateTime<Utc>) -> Self {
        Self { now, business_hours: BusinessHours::default(), freezes: Vec::new() }
    }

    fn local(&self) -> DateTime<FixedOffset> {
        let offset = FixedOffset::east_opt(self.business_hours.utc_offset_minutes * 60)
            .unwrap_or_else(|| FixedOffset::east_opt(0).expect("zero offset"));
        self.now.with_timezone(&offset)
    }

    /// Local hour of day, 0–23.
    #[must_use]
    pub fn hour(&self) -> u32 {
        self.local().hour()
    }

    /// Lowercase local weekday name.
    #[must_use]
    pub fn weekday_name(&self) -> &'static str {
        match self.local().weekday() {
            Weekday::Mon => "monday",
            Weekday::Tue => "tuesday",
            Weekday::Wed => "wednesday",
            Weekday::Thu => "thursday",
            Weekday::Fri => "friday",
            Weekday::Sat => "saturday",
            Weekday::Sun => "sunday",
        }
    }

    /// Local weekday number, Sunday = 0.
    #[must_use]
    pub fn weekday_num(&self) -> u32 {
        self.local().weekday().num_days_from_sunday()
    }

    /// Local day of month, 1-based.
    #[must_use]
    pub fn day_of_month(&self) -> u32 {
        self.local().day()
    }

    /// Local month, 1-based.
    #[must_use]
    pub fn month(&self) -> u32 {
        self.local().month()
    }

    /// Whether the local instant is a Saturday or Sunday.
    #[must_use]
    pub fn is_weekend(&self) -> bool {
        matches!(self.local().weekday(), Weekday::Sat | Weekday::Sun)
    }

    /// Whether the local instant falls inside configured business hours.
    #[must_use]
    pub fn is_business_hours(&self) -> bool {
        if self.is_weekend() && !self.business_hours.allow_weekends {
            return false;
        }
        let hour = self.hour();
        self.business_hours.start_hour <= hour && hour < self.business_hours.end_hour
    }

    /// Friday, locally.
    #[must_use]
    pub fn is_end_of_week(&self) -> bool {
        self.local().weekday() == Weekday::Fri
    }

    /// Within the final three calendar days of the local month.
    #[must_use]
    pub fn is_end_of_month(&self) -> bool {
        let local = self.local();
        let last = days_in_month(local.year(), local.month());
        local.day() + 2 >= last
    }

    /// End of month in the final month of a quarter.
    #[must_use]
    pub fn is_end_of_quarter(&self) -> bool {
        self.is_end_of_month() && self.month() % 3 == 0
    }

    /// The governing freeze at `now`: a hard freeze wins over a soft one
    /// when windows overlap; otherwise the first declared active window.
    #[must_use]
    pub fn active_freeze(&self) -> Option<&FreezePeriod> {
        let active: Vec<&FreezePeriod> =
            self.freezes.iter().filter(|f| f.contains(self.now)).collect();
        active
            .iter()
            .find(|f| f.severity == FreezeSeverity::Hard)
            .or_else(|| active.first())
            .copied()
    }
}

fn days_in_month(year: i32, month: u32) -> u32 {
    let (next_year, next_month) = if month == 12 { (year + 1, 1) } else { (year, month + 1) };
    NaiveDate::from_ymd_opt(next_year, next_month, 1)
        .and_then(|d| d.pred_opt())
        .map_or(31, |d| d.day())
}

/// A team whose members and leads can be pulled in as reviewers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Team {
    /// Kind-prefixed actor ids, e.g. `human:alice`.
    #[serde(default)]
    pub members: Vec<String>,
    /// Kind-prefixed actor ids of the team leads.
    #[serde(default)]
    pub leads: Vec<String>,
    /// Permissions granted to members; supports `*` and `prefix.*`.
    #[serde(default)]
    pub permissions: Vec<String>,
    /// Parent team name, when nested.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_team: Option<String>,
}

/// A role with governance capabilities.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Role {
    /// Kind-prefixed actor ids holding the role.
    #[serde(default)]
    pub members: Vec<String>,
    /// Permissions granted by the role; supports `*` and `prefix.*`.
    #[serde(default)]
    pub permissions: Vec<String>,
    /// Holders may approve releases.
    #[serde(default)]
    pub can_approve: bool,
    /// Holders may publish releases.
    #[serde(default)]
    pub can_publish: bool,
    /// The role must sign off on breaking changes.
    #[serde(default)]
    pub required_for_breaking: bool,
    /// The role must sign off on security-relevant changes.
    #[serde(default)]
    pub required_for_security: bool,
}

/// Teams and roles visible to rule evaluation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct TeamContext {
    /// Teams by name.
    #[serde(default)]
    pub teams: BTreeMap<String, Team>,
    /// Roles by name.
    #[serde(default)]
    pub roles: BTreeMap<String, Role>,
}

impl TeamContext {
    /// Names of teams the actor belongs to, in name order.
    #[must_use]
    pub fn teams_of(&self, actor_id: &str) -> Vec<String> {
        self.teams
            .iter()
            .filter(|(_, t)| t.members.iter().any(|m| m == actor_id))
            .map(|(name, _)| name.clone())
            .collect()
    }

    /// Names of roles the actor holds, in name order.
    #[must_use]
    pub fn roles_of(&self, actor_id: &str) -> Vec<String> {
        self.roles
            .iter()
            .filter(|(_, r)| r.members.iter().any(|m| m == actor_id))
            .map(|(name, _)| name.clone())
            .collect()
    }

    /// Whether any of the actor's roles can approve.
    #[must_use]
    pub fn can_approve(&self, actor_id: &str) -> bool {
        self.roles.values().any(|r| r.can_approve && r.members.iter().any(|m| m == actor_id))
    }

    /// Whether the actor holds `wanted` through any team or role grant.
    #[must_use]
    pub fn has_permission(&self, actor_id: &str, wanted: &str) -> bool {
        let team_grant = self
            .teams
            .values()
            .filter(|t| t.members.iter().any(|m| m == actor_id))
            .flat_map(|t| t.permissions.iter())
            .any(|granted| permission_matches(granted, wanted));
        let role_grant = self
            .roles
            .values()
            .filter(|r| r.members.iter().any(|m| m == actor_id))
            .flat_map(|r| r.permissions.iter())
            .any(|granted| permission_matches(granted, wanted));
        team_grant || role_grant
    }
}

/// Permission matching: `*` grants anything, `prefix.*` grants the
/// namespace, otherwise exact match.
#[must_use]
pub fn permission_matches(granted: &str, wanted: &str) -> bool {
    if granted == "*" {
        return true;
    }
    if let Some(prefix) = granted.strip_suffix(".*") {
        return wanted.strip_prefix(prefix).is_some_and(|rest| rest.starts_with('.'));
    }
    granted == wanted
}

/// The complete ambient bundle handed to the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ambient {
    /// Clock and calendar.
    pub time: TimeContext,
    /// Teams and roles.
    pub team: TeamContext,
}

impl Default for Ambient {
    fn default() -> Self {
        Self { time: TimeContext::at(Utc::now()), team: TeamContext::default() }
    }
}

impl Ambient {
    /// Ambient pinned to an instant, with no teams or freezes.
    #[must_use]
    pub fn at(now: DateTime<Utc>) -> Self {
        Self { time: TimeContext::at(now), team: TeamContext::default() }
    }
}
