//! Unit of work: stage mutations, commit them atomically with their events.
//!
//! All saves and deletes inside a scope land in per-run staging maps;
//! reads consult staged state first and fall through to the base store.
//! Domain events are harvested from saved aggregates at staging time (the
//! aggregate's queue is cleared) and published only after every delete and
//! write has succeeded — persistence is the source of truth, so a
//! publisher failure is logged, never fatal.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex};

use tracing::{debug, warn};

use relicta_core::{CancelToken, DomainError};
use release::{invariants, DomainEvent, ReleaseRun};

use crate::error::StoreError;
use crate::file_store::FileStore;
use crate::publisher::EventPublisher;

#[derive(Default)]
struct UowState {
    active: bool,
    pending_writes: BTreeMap<String, ReleaseRun>,
    pending_deletes: BTreeSet<String>,
    pending_events: Vec<DomainEvent>,
}

/// A scoped, single-threaded unit of work over the file store.
///
/// Not internally concurrent: callers must not share one scope across
/// threads (the mutex only protects against misuse, not for parallelism).
pub struct UnitOfWork {
    store: Arc<FileStore>,
    publisher: Arc<dyn EventPublisher>,
    state: Mutex<UowState>,
}

impl UnitOfWork {
    /// Build a unit of work over a store and an event publisher.
    pub fn new(store: Arc<FileStore>, publisher: Arc<dyn EventPublisher>) -> Self {
        Self { store, publisher, state: Mutex::new(UowState::default()) }
    }

    /// Open a scope. Fails when one is already open.
    pub fn begin(&self) -> Result<(), StoreError> {
        let mut state = self.state.lock().expect("uow lock poisoned");
        if state.active {
            return Err(StoreError::AlreadyActive);
        }
        state.active = true;
        Ok(())
    }

    /// Whether a scope is open.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.state.lock().expect("uow lock poisoned").active
    }

    /// Stage a save. Validates invariants, harvests the aggregate's event
    /// queue, and supersedes any staged delete for the same run.
    pub fn save(&self, run: &mut ReleaseRun) -> Result<(), StoreError> {
        let mut state = self.state.lock().expect("uow lock poisoned");
        if !state.active {
            return Err(StoreError::NotActive);
        }
        if let Some(violation) = invariants::validate_invariants(run).iter().find(|c| !c.valid) {
            return Err(DomainError::Validation {
                field: violation.name.into(),
                reason: violation.message.clone(),
            }
            .into());
        }
        state.pending_events.extend(run.take_events());
        state.pending_deletes.remove(&run.id);
        state.pending_writes.insert(run.id.clone(), run.clone());
        Ok(())
    }

    /// Stage a delete, superseding any staged write for the same run.
    pub fn delete(&self, id: &str) -> Result<(), StoreError> {
        let mut state = self.state.lock().expect("uow lock poisoned");
        if !state.active {
            return Err(StoreError::NotActive);
        }
        state.pending_writes.remove(id);
        state.pending_deletes.insert(id.to_string());
        Ok(())
    }

    /// Read through the staged state, falling back to the base store.
    pub fn find_by_id(&self, id: &str) -> Result<ReleaseRun, StoreError> {
        {
            let state = self.state.lock().expect("uow lock poisoned");
            if !state.active {
                return Err(StoreError::NotActive);
            }
            if state.pending_deletes.contains(id) {
                return Err(DomainError::NotFound(format!("release run {id}")).into());
            }
            if let Some(run) = state.pending_writes.get(id) {
                return Ok(run.clone());
            }
        }
        self.store.find_by_id(id)
    }

    /// Commit the scope: deletes, then writes, then event publication.
    ///
    /// Cancellation is checked up front and between every disk operation;
    /// a cancelled commit may leave completed writes visible, but events
    /// publish only after the full write phase succeeds, so they are
    /// delivered at most once and only for a fully-applied scope.
    pub fn commit(&self, cancel: &CancelToken) -> Result<(), StoreError> {
        let mut state = self.state.lock().expect("uow lock poisoned");
        if !state.active {
            return Err(StoreError::NotActive);
        }
        cancel.check()?;

        for id in &state.pending_deletes {
            cancel.check()?;
            self.store.delete(id)?;
        }
        for run in state.pending_writes.values() {
            cancel.check()?;
            self.store.save(run)?;
        }

        if !state.pending_events.is_empty() {
            if let Err(e) = self.publisher.publish(&state.pending_events) {
                warn!(error = %e, "event publication failed after commit; persistence already durable");
            }
        }

        debug!(
            writes = state.pending_writes.len(),
            deletes = state.pending_deletes.len(),
            events = state.pending_events.len(),
            "unit of work committed"
        );
        state.active = false;
        state.pending_writes.clear();
        state.pending_deletes.clear();
        state.pending_events.clear();
        Ok(())
    }

    /// Discard the scope without touching disk.
    pub fn rollback(&self) -> Result<(), StoreError> {
        let mut state = self.state.lock().expect("uow lock poisoned");
        if !state.active {
            return Err(StoreError::NotActive);
        }
        state.active = false;
        state.pending_writes.clear();
        state.pending_deletes.clear();
        state.pending_events.clear();
        Ok(())
    }
}
