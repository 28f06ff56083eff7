//! Hierarchical cancellation.
//!
//! A [`Canceller`] owns a cancellation signal; every [`CancelToken`] derived
//! from it observes that signal and the signals of all its ancestors.
//! Cancelling (or dropping) a canceller wakes every task waiting on a token
//! below it.
//!
//! Signals are `flume` channels on which nothing is ever sent: the sender
//! being dropped disconnects the channel, which is what waiters observe.

use futures::future::{self, Either};
use futures::stream::{FuturesUnordered, StreamExt};
use parking_lot::Mutex;
use std::future::Future;
use std::sync::Arc;

/// Observing side of a cancellation scope. Cheap to clone.
#[derive(Clone, Debug)]
pub struct CancelToken {
    signals: Arc<[flume::Receiver<()>]>,
}

/// Owning side of a cancellation scope.
#[derive(Debug)]
pub struct Canceller {
    signal: Mutex<Option<flume::Sender<()>>>,
    token: CancelToken,
}

impl Canceller {
    /// Create a root scope.
    #[must_use]
    pub fn new() -> Self {
        Self::with_parents(&[])
    }

    fn with_parents(parents: &[flume::Receiver<()>]) -> Self {
        let (tx, rx) = flume::bounded(0);
        let signals: Vec<_> = parents.iter().cloned().chain(std::iter::once(rx)).collect();
        Self {
            signal: Mutex::new(Some(tx)),
            token: CancelToken {
                signals: signals.into(),
            },
        }
    }

    /// Token observing this scope and its ancestors.
    #[must_use]
    pub fn token(&self) -> CancelToken {
        self.token.clone()
    }

    /// Cancel this scope and every scope derived from it. Idempotent.
    pub fn cancel(&self) {
        self.signal.lock().take();
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}

impl Default for Canceller {
    fn default() -> Self {
        Self::new()
    }
}

impl CancelToken {
    /// Create a child scope that is cancelled with this one.
    #[must_use]
    pub fn child(&self) -> Canceller {
        Canceller::with_parents(&self.signals)
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.signals.iter().any(flume::Receiver::is_disconnected)
    }

    /// Resolve once this scope or any ancestor is cancelled.
    pub async fn cancelled(&self) {
        let mut waiters: FuturesUnordered<_> =
            self.signals.iter().map(flume::Receiver::recv_async).collect();
        // Nothing is ever sent, so the first completion is a disconnect.
        let _ = waiters.next().await;
    }

    /// Run `fut` until it completes or the scope is cancelled.
    ///
    /// Returns `None` on cancellation, dropping `fut` at its current
    /// suspension point.
    pub async fn run<F: Future>(&self, fut: F) -> Option<F::Output> {
        if self.is_cancelled() {
            return None;
        }
        let cancelled = self.cancelled();
        futures::pin_mut!(fut, cancelled);
        match future::select(fut, cancelled).await {
            Either::Left((output, _)) => Some(output),
            Either::Right(((), _)) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_cancel_propagates_to_children() {
        let root = Canceller::new();
        let child = root.token().child();
        let grandchild = child.token().child();

        assert!(!grandchild.is_cancelled());
        root.cancel();
        assert!(child.is_cancelled());
        assert!(grandchild.token().is_cancelled());
    }

    #[test]
    fn test_child_cancel_does_not_affect_parent() {
        let root = Canceller::new();
        let child = root.token().child();
        child.cancel();

        assert!(child.is_cancelled());
        assert!(!root.is_cancelled());
    }

    #[test]
    fn test_drop_cancels() {
        let root = Canceller::new();
        let token = root.token();
        drop(root);
        assert!(token.is_cancelled());
    }

    #[compio::test]
    async fn test_run_interrupted_by_cancel() {
        let root = Canceller::new();
        let token = root.token();

        compio::runtime::spawn(async move {
            compio::time::sleep(Duration::from_millis(20)).await;
            root.cancel();
        })
        .detach();

        let pending = futures::future::pending::<()>();
        assert_eq!(token.run(pending).await, None);
    }

    #[compio::test]
    async fn test_run_completes() {
        let root = Canceller::new();
        assert_eq!(root.token().run(async { 7 }).await, Some(7));
    }
}
