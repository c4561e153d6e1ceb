//! Request cancellation.

use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::watch;

/// Cancellation signal shared between a view context and its requests.
///
/// Clones observe the same signal. Cancelling is idempotent.
#[derive(Debug, Clone)]
pub struct CancelToken {
    state: Arc<watch::Sender<bool>>,
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

impl CancelToken {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self {
            state: Arc::new(tx),
        }
    }

    pub fn cancel(&self) {
        self.state.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.state.borrow()
    }

    /// Resolves once the token is cancelled
    pub async fn cancelled(&self) {
        let mut rx = self.state.subscribe();
        loop {
            if *rx.borrow_and_update() {
                return;
            }
            // The sender lives as long as `self`, so this never errors here
            if rx.changed().await.is_err() {
                return;
            }
        }
    }
}

/// One token per active view context.
///
/// Entering a context (a tab, a detail section, a list) cancels whatever the
/// previous context still had in flight.
#[derive(Debug, Default)]
pub struct ContextScope {
    current: Mutex<Option<CancelToken>>,
}

impl ContextScope {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cancel the previous context and hand out a token for the new one
    pub fn enter(&self) -> CancelToken {
        let token = CancelToken::new();
        let previous = self
            .current
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(token.clone());
        if let Some(previous) = previous {
            previous.cancel();
        }
        token
    }

    /// Cancel the active context without starting a new one
    pub fn leave(&self) {
        let previous = self
            .current
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(previous) = previous {
            previous.cancel();
        }
    }
}

impl Drop for ContextScope {
    fn drop(&mut self) {
        self.leave();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_cancel_wakes_waiter() {
        let token = CancelToken::new();
        let waiter = token.clone();

        let handle = tokio::spawn(async move { waiter.cancelled().await });
        assert!(!token.is_cancelled());

        token.cancel();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("waiter should wake")
            .unwrap();
        assert!(token.is_cancelled());
    }

    #[tokio::test]
    async fn test_cancelled_returns_immediately_when_already_cancelled() {
        let token = CancelToken::new();
        token.cancel();
        token.cancel();
        tokio::time::timeout(Duration::from_millis(100), token.cancelled())
            .await
            .expect("already cancelled");
    }

    #[test]
    fn test_scope_cancels_previous_context() {
        let scope = ContextScope::new();
        let first = scope.enter();
        let second = scope.enter();

        assert!(first.is_cancelled());
        assert!(!second.is_cancelled());

        scope.leave();
        assert!(second.is_cancelled());
    }
}
