//! Two-phase cancellation for long-lived loops
//!
//! The owner of a loop calls [`CancellationToken::signal_stop`] and then
//! [`CancellationToken::stopped`]; the loop polls
//! [`CancellationToken::stopping`] at each blocking point and calls
//! [`CancellationToken::confirm_stopped`] once it has unwound.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::watch;

struct Inner {
    stop: watch::Sender<bool>,
    stopped: watch::Sender<bool>,
    confirmed: AtomicBool,
}

/// Cloneable handle; all clones share the same state.
#[derive(Clone)]
pub struct CancellationToken {
    inner: Arc<Inner>,
}

impl CancellationToken {
    pub fn new() -> Self {
        let (stop, _) = watch::channel(false);
        let (stopped, _) = watch::channel(false);
        Self {
            inner: Arc::new(Inner {
                stop,
                stopped,
                confirmed: AtomicBool::new(false),
            }),
        }
    }

    /// Request termination. Idempotent and never blocks.
    pub fn signal_stop(&self) {
        self.inner.stop.send_if_modified(|stop| !std::mem::replace(stop, true));
    }

    pub fn is_stopping(&self) -> bool {
        *self.inner.stop.borrow()
    }

    /// Resolves once a stop has been requested.
    pub async fn stopping(&self) {
        let mut rx = self.inner.stop.subscribe();
        let _ = rx.wait_for(|stop| *stop).await;
    }

    /// Confirm the loop has terminated, releasing every current and future
    /// waiter on [`stopped`](Self::stopped). Implies [`signal_stop`](Self::signal_stop).
    /// Only the first call has an effect.
    pub fn confirm_stopped(&self) {
        self.signal_stop();
        if self.inner.confirmed.swap(true, Ordering::AcqRel) {
            tracing::debug!("confirm_stopped called more than once");
            return;
        }
        self.inner.stopped.send_replace(true);
    }

    pub fn is_stopped(&self) -> bool {
        *self.inner.stopped.borrow()
    }

    /// Resolves once the loop has confirmed termination.
    pub async fn stopped(&self) {
        let mut rx = self.inner.stopped.subscribe();
        let _ = rx.wait_for(|stopped| *stopped).await;
    }

    /// Signal, then wait for confirmation.
    pub async fn stop(&self) {
        self.signal_stop();
        self.stopped().await;
    }
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for CancellationToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CancellationToken")
            .field("stopping", &self.is_stopping())
            .field("stopped", &self.is_stopped())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::time::timeout;

    #[test]
    fn test_signal_stop_is_idempotent() {
        let token = CancellationToken::new();
        assert!(!token.is_stopping());
        token.signal_stop();
        token.signal_stop();
        assert!(token.is_stopping());
        assert!(!token.is_stopped());
    }

    #[tokio::test]
    async fn test_confirm_releases_all_waiters() {
        let token = CancellationToken::new();
        let mut waiters = Vec::new();
        for _ in 0..4 {
            let t = token.clone();
            waiters.push(tokio::spawn(async move { t.stopped().await }));
        }

        let worker = token.clone();
        tokio::spawn(async move {
            worker.stopping().await;
            worker.confirm_stopped();
        });

        token.signal_stop();
        for w in waiters {
            timeout(Duration::from_secs(1), w)
                .await
                .expect("waiter not released")
                .unwrap();
        }

        // Waiting after the fact returns immediately.
        timeout(Duration::from_millis(100), token.stopped())
            .await
            .expect("late waiter blocked");
    }

    #[tokio::test]
    async fn test_double_confirm_does_not_panic() {
        let token = CancellationToken::new();
        token.confirm_stopped();
        token.confirm_stopped();
        assert!(token.is_stopping());
        assert!(token.is_stopped());
        timeout(Duration::from_millis(100), token.stop())
            .await
            .expect("stop blocked after confirm");
    }
}
