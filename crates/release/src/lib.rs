//! The release-run aggregate.
//!
//! A [`ReleaseRun`] drives one release through
//! Draft → Planned → Versioned → NotesReady → Approved → Publishing →
//! Published, enforcing invariants on every mutation and appending a typed
//! domain event per transition. Mutating methods never publish events
//! themselves; the unit of work harvests the queue so publication stays
//! atomic with persistence.

#![deny(unsafe_code)]

pub mod approval;
pub mod collab;
pub mod dto;
pub mod events;
pub mod invariants;
pub mod notes;
pub mod plan;
pub mod run;
pub mod state;
pub mod steps;

pub use approval::{Approval, ApprovalLevel, ApprovalPolicy, ApprovalRequirement, MultiLevelApproval};
pub use collab::{NoteGenerator, RepoInspector, StepExecutor};
pub use dto::{decode, encode, RunDto};
pub use events::DomainEvent;
pub use invariants::{validate_invariants, InvariantCheck};
pub use notes::ReleaseNotes;
pub use plan::ReleasePlan;
pub use run::{ReleaseRun, TransitionRecord};
pub use state::RunState;
pub use steps::{StepPlan, StepState, StepStatus};
