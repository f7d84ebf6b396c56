//! Cooperative cancellation for tool executions.
//!
//! Any [`Stop`] implementation can guard a run. [`CancelToken`] is a clonable
//! flag for the common case of cancelling from another thread; [`Unstoppable`]
//! never fires.

use alloc::sync::Arc;
use core::sync::atomic::{AtomicBool, Ordering};

pub use enough::{Stop, StopReason, Unstoppable};

/// Clonable cancellation flag.
///
/// All clones share one flag; calling [`cancel`](CancelToken::cancel) on any
/// of them stops every execution guarded by the token.
///
/// # Example
///
/// ```rust
/// use webpbin::{CancelToken, Stop};
///
/// let token = CancelToken::new();
/// let guard = token.clone();
/// assert!(guard.check().is_ok());
/// token.cancel();
/// assert!(guard.check().is_err());
/// ```
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    /// Create a token that has not been cancelled.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    /// Whether cancellation has been requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

impl Stop for CancelToken {
    fn check(&self) -> core::result::Result<(), StopReason> {
        if self.is_cancelled() {
            Err(StopReason::Cancelled)
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clones_share_flag() {
        let token = CancelToken::new();
        let other = token.clone();
        assert!(!other.is_cancelled());
        token.cancel();
        assert!(other.is_cancelled());
        assert!(matches!(other.check(), Err(StopReason::Cancelled)));
    }

    #[test]
    fn test_cancel_from_thread() {
        let token = CancelToken::new();
        let remote = token.clone();
        std::thread::spawn(move || remote.cancel())
            .join()
            .expect("thread panicked");
        assert!(token.check().is_err());
    }

    #[test]
    fn test_unstoppable_never_fires() {
        assert!(Unstoppable.check().is_ok());
    }
}
