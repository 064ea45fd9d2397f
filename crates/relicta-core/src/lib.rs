//! Relicta core primitives and shared domain types.
//!
//! Everything downstream crates agree on lives here: the proposal and actor
//! value types fed into governance, the decision shape produced by it, the
//! stable error taxonomy, plan-hash identity helpers, and the cooperative
//! cancellation token passed to every long-running operation.

#![deny(unsafe_code)]

pub mod actor;
pub mod cancel;
pub mod change;
pub mod decision;
pub mod error;
pub mod ids;
pub mod proposal;
pub mod version;

pub use actor::{Actor, ActorKind, TrustLevel};
pub use cancel::CancelToken;
pub use change::{ApiChange, BlastRadius, ChangeAnalysis};
pub use decision::{Decision, DecisionCondition, DecisionKind, RequiredAction};
pub use error::DomainError;
pub use proposal::{BumpKind, Intent, Proposal, Scope};
pub use version::Version;

/// Version of the relicta core library.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
