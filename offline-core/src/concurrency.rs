//! The ambient cancellation signal `SyncProtocol` honors (§5).
//!
//! `CancelToken` is a single-observation, multi-consumer signal: every
//! clone gets one chance to observe a cancellation even if it was sent
//! before that clone subscribed. This is the same shape as a graceful
//! shutdown handle, built on a zero-permit [`tokio::sync::Semaphore`]:
//! closing the semaphore is the signal, and a closed-semaphore acquire
//! error is the notification.

use std::sync::Arc;

use tokio::sync::Semaphore;

#[derive(Debug, Clone)]
pub struct CancelToken {
    inner: Arc<Semaphore>,
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

impl CancelToken {
    pub fn new() -> Self {
        Self { inner: Arc::new(Semaphore::new(0)) }
    }

    /// Requests cancellation. Safe to call more than once.
    pub fn cancel(&self) {
        self.inner.close();
    }

    /// Immediately reports whether cancellation has been requested, without
    /// consuming the notification for a later [`Self::cancelled`] call.
    pub fn is_cancelled(&self) -> bool {
        self.inner.is_closed()
    }

    /// Resolves once cancellation has been requested. If it already has,
    /// resolves immediately.
    pub async fn cancelled(&self) {
        let _ = self.inner.acquire().await;
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[tokio::test]
    async fn cancelled_resolves_after_cancel() {
        let token = CancelToken::new();
        assert!(!token.is_cancelled());
        token.cancel();
        assert!(token.is_cancelled());
        token.cancelled().await;
    }

    #[tokio::test]
    async fn clone_observes_cancellation_sent_before_subscribe() {
        let token = CancelToken::new();
        token.cancel();
        let clone = token.clone();
        assert!(clone.is_cancelled());
        clone.cancelled().await;
    }

    #[test]
    fn multiple_cancels_do_not_panic() {
        let token = CancelToken::new();
        token.cancel();
        token.cancel();
    }
}
