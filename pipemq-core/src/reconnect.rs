//! Reconnection utilities with exponential backoff support.
//!
//! This module tracks the delay between outbound connection attempts,
//! following libzmq's `ZMQ_RECONNECT_IVL` / `ZMQ_RECONNECT_IVL_MAX` rules.

use crate::options::SocketOptions;
use std::time::Duration;

/// Reconnection state tracker for managing connection attempts and backoff.
///
/// With `reconnect_ivl_max` unset every attempt waits `reconnect_ivl`.
/// Otherwise the delay doubles per attempt up to the maximum. Delays never
/// shrink until [`reset`](Self::reset) is called.
///
/// # Example
///
/// ```rust
/// use pipemq_core::reconnect::ReconnectState;
/// use pipemq_core::options::SocketOptions;
/// use std::time::Duration;
///
/// let options = SocketOptions::default()
///     .with_reconnect_ivl(Duration::from_millis(100))
///     .with_reconnect_ivl_max(Duration::from_secs(10));
///
/// let mut reconnect = ReconnectState::new(&options);
///
/// assert_eq!(reconnect.next_delay(), Duration::from_millis(100));
/// assert_eq!(reconnect.next_delay(), Duration::from_millis(200));
///
/// // An attempt that already took 150ms only waits for the remainder.
/// assert_eq!(reconnect.remaining_after(Duration::from_millis(150)), Duration::from_millis(250));
///
/// reconnect.reset();
/// assert_eq!(reconnect.next_delay(), Duration::from_millis(100));
/// ```
#[derive(Debug, Clone)]
pub struct ReconnectState {
    /// Base reconnection interval
    base_interval: Duration,
    /// Maximum reconnection interval, zero for a fixed interval
    max_interval: Duration,
    /// Current reconnection attempt (0 = first attempt)
    attempt: u32,
    /// Current backoff interval
    current_interval: Duration,
}

impl ReconnectState {
    /// Create a new reconnection state tracker from socket options.
    pub const fn new(options: &SocketOptions) -> Self {
        Self {
            base_interval: options.reconnect_ivl,
            max_interval: options.reconnect_ivl_max,
            attempt: 0,
            current_interval: options.reconnect_ivl,
        }
    }

    /// Get the delay for the next reconnection attempt.
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.current_interval;
        self.attempt = self.attempt.saturating_add(1);

        if self.max_interval > self.base_interval {
            let grown = self.base_interval * (1_u32 << self.attempt.min(10));
            self.current_interval = grown.min(self.max_interval);
        }

        delay
    }

    /// Delay still owed after an attempt that took `elapsed`, clamped at zero.
    pub fn remaining_after(&mut self, elapsed: Duration) -> Duration {
        self.next_delay().saturating_sub(elapsed)
    }

    /// Reset the reconnection state after a successful handshake.
    pub fn reset(&mut self) {
        self.attempt = 0;
        self.current_interval = self.base_interval;
    }

    #[inline]
    #[must_use]
    pub const fn attempt(&self) -> u32 {
        self.attempt
    }

    #[inline]
    #[must_use]
    pub const fn current_interval(&self) -> Duration {
        self.current_interval
    }
}
