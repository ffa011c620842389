//! Cooperative cancellation for planner requests.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use crate::error::EngineError;

/// Shared cancel flag with an optional deadline.
///
/// Clones observe the same flag. Work checks [`CancelToken::check`] between
/// units (one LP solve, one scoring call) and stops without side effects.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
    deadline: Option<Instant>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// A token that expires `timeout` from now.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            cancelled: Arc::new(AtomicBool::new(false)),
            deadline: Instant::now().checked_add(timeout),
        }
    }

    /// Same flag, with the earlier of the existing and the new deadline.
    pub fn tightened(&self, timeout: Duration) -> Self {
        let candidate = Instant::now().checked_add(timeout);
        let deadline = match (self.deadline, candidate) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        };
        Self {
            cancelled: Arc::clone(&self.cancelled),
            deadline,
        }
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// `Err` once cancelled or past the deadline.
    pub fn check(&self) -> Result<(), EngineError> {
        if self.is_cancelled() {
            return Err(EngineError::Cancelled);
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Err(EngineError::TimedOut),
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_token_passes() {
        assert!(CancelToken::new().check().is_ok());
    }

    #[test]
    fn cancel_is_shared_between_clones() {
        let token = CancelToken::new();
        let clone = token.clone();
        clone.cancel();
        assert!(matches!(token.check(), Err(EngineError::Cancelled)));
    }

    #[test]
    fn expired_deadline_times_out() {
        let token = CancelToken::with_timeout(Duration::ZERO);
        assert!(matches!(token.check(), Err(EngineError::TimedOut)));
    }

    #[test]
    fn tightened_keeps_earlier_deadline() {
        let token = CancelToken::with_timeout(Duration::ZERO);
        let tightened = token.tightened(Duration::from_secs(3600));
        assert_eq!(tightened.deadline(), token.deadline());
        tightened.cancel();
        assert!(token.is_cancelled());
    }
}
