//! Cooperative cancellation token.
//!
//! Every exported long-running operation takes a `CancelToken` and checks it
//! before starting, between iterative sub-steps, and during blocking
//! dispatch. Cancellation is a flag, not a preemption: completed sub-steps
//! stay completed.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::error::DomainError;

/// Cheaply clonable cancellation flag shared across threads.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    /// A fresh, uncancelled token.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Idempotent.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    /// Whether cancellation has been requested.
    #[must_use]
    pub fn is_canceled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// Err with the `canceled` sentinel when cancellation was requested.
    pub fn check(&self) -> Result<(), DomainError> {
        if self.is_canceled() {
            Err(DomainError::Canceled)
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_uncancelled() {
        let token = CancelToken::new();
        assert!(!token.is_canceled());
        assert!(token.check().is_ok());
    }

    #[test]
    fn clones_share_state() {
        let token = CancelToken::new();
        let clone = token.clone();
        token.cancel();
        assert!(clone.is_canceled());
        assert_eq!(clone.check().unwrap_err().kind(), "canceled");
    }
}
