use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Cooperative cancellation signal shared by a request and its evaluations.
///
/// Cloning yields another view of the same flag. Once raised it stays raised.
#[derive(Debug, Clone, Default)]
pub struct CancellationFlag {
    raised: Arc<AtomicBool>,
}

impl CancellationFlag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raise the flag. Returns `true` only for the call that raised it.
    pub fn cancel(&self) -> bool {
        !self.raised.swap(true, Ordering::SeqCst)
    }

    pub fn is_cancelled(&self) -> bool {
        self.raised.load(Ordering::SeqCst)
    }
}
