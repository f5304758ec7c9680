use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Shared cancellation flag for the detection loop.
///
/// Clones observe the same flag. It stays cancelled until the loop starts a new
/// session, which re-arms it for every clone.
#[derive(Clone, Debug, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Clear the flag. Returns whether it was set.
    pub(crate) fn rearm(&self) -> bool {
        self.cancelled.swap(false, Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_cancellation() {
        let token = CancelToken::new();
        let handle = token.clone();
        assert!(!token.is_cancelled());
        handle.cancel();
        assert!(token.is_cancelled());
    }

    #[test]
    fn rearm_clears_every_clone() {
        let token = CancelToken::new();
        let handle = token.clone();
        assert!(!token.rearm());
        handle.cancel();
        assert!(token.rearm());
        assert!(!handle.is_cancelled());
    }
}
