//! Operation context
//!
//! The engine does not own timeouts. Callers hand in an [`OperationContext`]
//! and the engine passes the same context to every remote call it makes.

use crate::remote::RemoteError;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

/// Shared cancellation flag
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation; every clone observes it
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Deadline and cancellation carried through one reconciliation
#[derive(Debug, Clone, Default)]
pub struct OperationContext {
    token: CancellationToken,
    deadline: Option<Instant>,
}

impl OperationContext {
    /// Context without deadline
    pub fn new() -> Self {
        Self::default()
    }

    /// Context observing an existing cancellation token
    pub fn with_token(token: CancellationToken) -> Self {
        Self {
            token,
            deadline: None,
        }
    }

    /// Set an absolute deadline
    pub fn deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Set a deadline relative to now
    pub fn timeout(self, timeout: Duration) -> Self {
        self.deadline(Instant::now() + timeout)
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Time left before the deadline, if one is set
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|d| d.saturating_duration_since(Instant::now()))
    }

    /// Fail if the context was cancelled or its deadline has passed
    pub fn checkpoint(&self) -> Result<(), RemoteError> {
        if self.token.is_cancelled() {
            return Err(RemoteError::Cancelled);
        }
        if self.remaining().is_some_and(|r| r.is_zero()) {
            return Err(RemoteError::DeadlineExceeded);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_context_passes() {
        let ctx = OperationContext::new();
        assert!(ctx.checkpoint().is_ok());
        assert!(ctx.remaining().is_none());
    }

    #[test]
    fn test_cancel_is_shared() {
        let token = CancellationToken::new();
        let ctx = OperationContext::with_token(token.clone());
        let copy = ctx.clone();

        token.cancel();
        assert_eq!(ctx.checkpoint(), Err(RemoteError::Cancelled));
        assert!(copy.is_cancelled());
    }

    #[test]
    fn test_expired_deadline() {
        let ctx = OperationContext::new().deadline(Instant::now());
        assert_eq!(ctx.checkpoint(), Err(RemoteError::DeadlineExceeded));
    }

    #[test]
    fn test_timeout_leaves_budget() {
        let ctx = OperationContext::new().timeout(Duration::from_secs(60));
        assert!(ctx.checkpoint().is_ok());
        assert!(ctx.remaining().unwrap() > Duration::from_secs(50));
    }
}
