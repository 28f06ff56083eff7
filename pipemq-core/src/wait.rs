//! Wait groups and cancellable workers.
//!
//! [`WaitGroup`] counts live tasks through RAII guards. [`WaitCloser`] pairs a
//! cancellation scope with a one-shot completion slot so that closing a
//! worker blocks until it has exited and yields its final result exactly
//! once.

use crate::cancel::{CancelToken, Canceller};

/// Tracks a set of tasks; [`wait`](Self::wait) resolves when all have finished.
pub struct WaitGroup {
    tx: flume::Sender<()>,
    rx: flume::Receiver<()>,
}

/// Held by a tracked task; dropping it marks the task finished.
#[derive(Debug)]
pub struct WaitGuard {
    _tx: flume::Sender<()>,
}

impl WaitGroup {
    #[must_use]
    pub fn new() -> Self {
        let (tx, rx) = flume::bounded(0);
        Self { tx, rx }
    }

    /// Register one task.
    #[must_use]
    pub fn add(&self) -> WaitGuard {
        WaitGuard {
            _tx: self.tx.clone(),
        }
    }

    /// Number of guards currently alive.
    #[must_use]
    pub fn active(&self) -> usize {
        self.tx.sender_count().saturating_sub(1)
    }

    /// Wait until every guard handed out so far has been dropped.
    pub async fn wait(self) {
        let Self { tx, rx } = self;
        drop(tx);
        // Resolves with a disconnect once the last guard is gone.
        let _ = rx.recv_async().await;
    }
}

impl Default for WaitGroup {
    fn default() -> Self {
        Self::new()
    }
}

/// Handle to a cancellable worker that reports a final result.
pub struct WaitCloser<T> {
    canceller: Canceller,
    done: flume::Receiver<T>,
}

/// Worker side of a [`WaitCloser`].
pub struct Finisher<T> {
    done: flume::Sender<T>,
}

impl<T> WaitCloser<T> {
    /// Create a worker scope nested under `parent`.
    #[must_use]
    pub fn new(parent: &CancelToken) -> (Self, Finisher<T>) {
        let (tx, rx) = flume::bounded(1);
        let closer = Self {
            canceller: parent.child(),
            done: rx,
        };
        (closer, Finisher { done: tx })
    }

    /// Token the worker must observe.
    #[must_use]
    pub fn token(&self) -> CancelToken {
        self.canceller.token()
    }

    /// True once the worker has reported its result.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        !self.done.is_empty() || self.done.is_disconnected()
    }

    /// Cancel the worker and wait for its result.
    ///
    /// Returns `None` if the worker went away without finishing.
    pub async fn close(self) -> Option<T> {
        self.canceller.cancel();
        self.done.recv_async().await.ok()
    }
}

impl<T> Finisher<T> {
    /// Report the worker's final result.
    pub fn finish(self, result: T) {
        // The closer may already be gone when nobody waits for the result.
        let _ = self.done.send(result);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[compio::test]
    async fn test_wait_group_waits_for_all_guards() {
        let group = WaitGroup::new();
        let (tx, rx) = flume::unbounded();

        for i in 0..3u64 {
            let guard = group.add();
            let tx = tx.clone();
            compio::runtime::spawn(async move {
                compio::time::sleep(Duration::from_millis(10 * (i + 1))).await;
                tx.send(i).unwrap();
                drop(guard);
            })
            .detach();
        }
        assert_eq!(group.active(), 3);

        group.wait().await;
        assert_eq!(rx.len(), 3);
    }

    #[compio::test]
    async fn test_empty_wait_group_returns_immediately() {
        WaitGroup::new().wait().await;
    }

    #[compio::test]
    async fn test_close_cancels_and_collects_result() {
        let root = Canceller::new();
        let (closer, finisher) = WaitCloser::<&'static str>::new(&root.token());
        let token = closer.token();

        compio::runtime::spawn(async move {
            token.cancelled().await;
            finisher.finish("stopped");
        })
        .detach();

        assert_eq!(closer.close().await, Some("stopped"));
    }

    #[compio::test]
    async fn test_close_after_worker_finished() {
        let root = Canceller::new();
        let (closer, finisher) = WaitCloser::new(&root.token());
        finisher.finish(42);

        assert!(closer.is_finished());
        assert_eq!(closer.close().await, Some(42));
    }

    #[compio::test]
    async fn test_parent_cancel_reaches_worker() {
        let root = Canceller::new();
        let (closer, _finisher) = WaitCloser::<()>::new(&root.token());
        let token = closer.token();

        root.cancel();
        assert!(token.is_cancelled());
    }
}
