//! Timeout utilities for async operations
//!
//! Wraps `compio::time::timeout` so that an elapsed deadline surfaces as an
//! ordinary `io::ErrorKind::TimedOut` error.

use compio::time::timeout;
use std::future::Future;
use std::io;
use std::time::Duration;

/// Run `fut` with a deadline.
///
/// * `Duration::ZERO` - no deadline
/// * otherwise - `Err(io::ErrorKind::TimedOut)` once `limit` elapses
pub async fn with_timeout<F: Future>(limit: Duration, what: &str, fut: F) -> io::Result<F::Output> {
    if limit.is_zero() {
        return Ok(fut.await);
    }
    timeout(limit, fut).await.map_err(|_elapsed| {
        io::Error::new(
            io::ErrorKind::TimedOut,
            format!("{what} timed out after {limit:?}"),
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[compio::test]
    async fn test_timeout_elapses() {
        let err = with_timeout(
            Duration::from_millis(10),
            "sleep",
            compio::time::sleep(Duration::from_secs(5)),
        )
        .await
        .unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::TimedOut);
    }

    #[compio::test]
    async fn test_zero_means_unbounded() {
        let value = with_timeout(Duration::ZERO, "ready", async { 3 }).await.unwrap();
        assert_eq!(value, 3);
    }
}
