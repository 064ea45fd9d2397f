//! Crash-safe persistence for release runs.
//!
//! One JSON document per run under the base directory, written atomically
//! (temp sibling, fsync, rename). Queries compose through small
//! [`Specification`] predicates; large scans fan out to a bounded worker
//! pool. The [`UnitOfWork`] stages writes, deletes, and harvested domain
//! events, committing them together — events publish only after every
//! write lands, because persistence is the source of truth.

#![deny(unsafe_code)]

pub mod error;
pub mod file_store;
pub mod memory;
pub mod publisher;
pub mod spec;
pub mod uow;

pub use error::StoreError;
pub use file_store::FileStore;
pub use memory::{ActorMetrics, MemoryStore, ReleaseOutcome, ReleaseRecord};
pub use publisher::{EventHandler, EventPublisher, InProcessPublisher, NoopPublisher};
pub use spec::{Specification, SpecificationExt};
pub use uow::UnitOfWork;
