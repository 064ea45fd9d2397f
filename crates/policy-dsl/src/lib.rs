//! The release-governance rule language.
//!
//! Policy files (`.policy` / `.cgp`) declare prioritised rules with a
//! boolean `when` expression over a dotted-path context and a `then` block
//! of actions, plus optional file-level defaults:
//!
//! ```text
//! rule "breaking-changes" {
//!   priority = 100
//!   description = "breaking changes always need a human"
//!   when { change.breaking > 0 AND actor.kind != "human" }
//!   then {
//!     require_approval(count: 1)
//!     add_rationale(message: "breaking changes require human approval")
//!   }
//! }
//!
//! defaults { decision = "approve" required_approvers = 1 }
//! ```
//!
//! The pipeline is lexer → parser → compiler → [`Policy`]. Conditions
//! compile to a sum type ([`Condition`]); the legacy flat sentinel encoding
//! (`_always` / `_or` / `_not`) survives only in the [`flat`] module as an
//! on-disk compatibility shape.

#![deny(unsafe_code)]

pub mod ast;
pub mod compiler;
pub mod error;
pub mod flat;
pub mod lexer;
pub mod loader;
pub mod parser;
pub mod policy;

pub use compiler::compile;
pub use error::DslError;
pub use loader::{LoadError, LoadResult, LoaderOptions, DEFAULT_SEARCH_PATHS};
pub use policy::{Action, ActionKind, CmpOp, CompiledRule, Condition, DefaultDecision, Defaults, Policy};

/// Parse and compile one policy source text into a named [`Policy`].
pub fn compile_source(name: &str, source: &str) -> Result<Policy, DslError> {
    let file = parser::Parser::parse(source)?;
    compiler::compile(name, &file)
}
