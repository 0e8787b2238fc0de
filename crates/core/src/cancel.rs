//! Cooperative cancellation for long-running jobs
//!
//! Opening, saving and page export run on a worker thread and check a shared
//! token between pages. A cancelled job stops early with
//! [`EditorError::Cancelled`] and leaves the session untouched.

use crate::error::{EditorError, EditorResult};
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

/// Cancellation token shared between the UI thread and a worker
///
/// # Example
///
/// ```
/// use pdf_editor_core::CancellationToken;
///
/// let token = CancellationToken::new();
/// let worker_token = token.clone();
///
/// token.cancel();
/// assert!(worker_token.check().is_err());
/// ```
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    /// Create a new token in the non-cancelled state
    pub fn new() -> Self {
        Self::default()
    }

    /// Cancel this token and every clone of it
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    /// Returns `Err(EditorError::Cancelled)` once the token was cancelled
    ///
    /// Workers call this between units of work and propagate with `?`.
    pub fn check(&self) -> EditorResult<()> {
        if self.is_cancelled() {
            Err(EditorError::Cancelled)
        } else {
            Ok(())
        }
    }

    /// Reset to non-cancelled so the token can be reused for the next job
    pub fn reset(&self) {
        self.cancelled.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_starts_uncancelled() {
        let token = CancellationToken::new();
        assert!(!token.is_cancelled());
        assert!(token.check().is_ok());
    }

    #[test]
    fn test_cancel_is_shared_by_clones() {
        let token = CancellationToken::new();
        let worker = token.clone();

        token.cancel();

        assert!(worker.is_cancelled());
        assert!(matches!(worker.check(), Err(EditorError::Cancelled)));
    }

    #[test]
    fn test_reset() {
        let token = CancellationToken::new();
        token.cancel();
        token.reset();
        assert!(!token.is_cancelled());
    }

    #[test]
    fn test_cancel_across_threads() {
        let token = CancellationToken::new();
        let worker = token.clone();

        let handle = std::thread::spawn(move || {
            let mut pages = 0u64;
            while worker.check().is_ok() {
                pages += 1;
                std::thread::yield_now();
            }
            pages
        });

        token.cancel();
        // The worker only returns once it observed the cancellation.
        let _pages = handle.join().unwrap();
        assert!(token.is_cancelled());
    }
}
