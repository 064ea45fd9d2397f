//! Deterministic policy engine for release governance.
//!
//! The engine evaluates compiled rules against a structured context built
//! from a proposal, its change analysis, the computed risk score, and the
//! ambient time/team/freeze data. Evaluation is pure for a given input set:
//! rule ordering is priority-descending with stable declaration-order ties,
//! condition failures never abort the run, and decisions can only be
//! strengthened (`rejected > approval_required > approved`) as matched
//! rules apply their actions.

#![deny(unsafe_code)]

pub mod ambient;
pub mod context;
pub mod engine;

pub use ambient::{
    Ambient, BusinessHours, FreezePeriod, FreezeSeverity, Role, Team, TeamContext, TimeContext,
};
pub use context::EvalContext;
pub use engine::{Engine, PolicyResult, RuleTrace};
