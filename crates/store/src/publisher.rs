//! In-process domain-event publication.
//!
//! `publish` appends under the lock, then invokes a copied handler list
//! outside it — handlers may call back into the publisher without
//! deadlocking, and a slow handler never blocks readers.

use std::sync::{Arc, Mutex};

use tracing::debug;

use release::DomainEvent;

/// Receives published events on the publisher's calling thread.
pub trait EventHandler: Send + Sync {
    /// Handle one event. Must not panic; keep it cheap.
    fn handle(&self, event: &DomainEvent);
}

/// Something that accepts batches of domain events after a commit.
pub trait EventPublisher: Send + Sync {
    /// Publish a batch. Failure is reported but commits never depend on it.
    fn publish(&self, events: &[DomainEvent]) -> Result<(), String>;
}

#[derive(Default)]
struct PublisherState {
    events: Vec<DomainEvent>,
    handlers: Vec<Arc<dyn EventHandler>>,
}

/// Publisher that retains events in memory and fans out to handlers.
#[derive(Default)]
pub struct InProcessPublisher {
    state: Mutex<PublisherState>,
}

impl InProcessPublisher {
    /// A publisher with no handlers.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler for future publications.
    pub fn subscribe(&self, handler: Arc<dyn EventHandler>) {
        self.state.lock().expect("publisher lock poisoned").handlers.push(handler);
    }

    /// Snapshot of everything published so far.
    #[must_use]
    pub fn published(&self) -> Vec<DomainEvent> {
        self.state.lock().expect("publisher lock poisoned").events.clone()
    }
}

impl EventPublisher for InProcessPublisher {
    fn publish(&self, events: &[DomainEvent]) -> Result<(), String> {
        let handlers = {
            let mut state = self.state.lock().expect("publisher lock poisoned");
            state.events.extend_from_slice(events);
            state.handlers.clone()
        };
        // Handlers run outside the lock, sequentially, on this thread.
        for event in events {
            for handler in &handlers {
                handler.handle(event);
            }
        }
        debug!(count = events.len(), "events published");
        Ok(())
    }
}

/// Publisher that drops everything; for tests and dry runs.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopPublisher;

impl EventPublisher for NoopPublisher {
    fn publish(&self, _events: &[DomainEvent]) -> Result<(), String> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn event(run_id: &str) -> DomainEvent {
        DomainEvent::ReleasePlanned {
            run_id: run_id.into(),
            head_sha: "abc".into(),
            commit_count: 1,
            at: Utc::now(),
        }
    }

    struct Counter(AtomicUsize);

    impl EventHandler for Counter {
        fn handle(&self, _event: &DomainEvent) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn appends_and_invokes_handlers() {
        let publisher = InProcessPublisher::new();
        let counter = Arc::new(Counter(AtomicUsize::new(0)));
        publisher.subscribe(counter.clone());

        publisher.publish(&[event("run-1"), event("run-2")]).unwrap();
        assert_eq!(publisher.published().len(), 2);
        assert_eq!(counter.0.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn handlers_may_reenter_the_publisher() {
        struct Reentrant(Arc<InProcessPublisher>);

        impl EventHandler for Reentrant {
            fn handle(&self, _event: &DomainEvent) {
                // Reading back while handling must not deadlock.
                let _ = self.0.published();
            }
        }

        let publisher = Arc::new(InProcessPublisher::new());
        publisher.subscribe(Arc::new(Reentrant(publisher.clone())));
        publisher.publish(&[event("run-1")]).unwrap();
        assert_eq!(publisher.published().len(), 1);
    }

    #[test]
    fn noop_always_succeeds() {
        NoopPublisher.publish(&[event("run-1")]).unwrap();
    }
}
