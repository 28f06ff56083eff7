//! Socket configuration options
//!
//! This module provides configuration options for pattern sockets, modelled
//! on libzmq's socket options (zmq_setsockopt/zmq_getsockopt).

use std::time::Duration;

/// Socket configuration options.
///
/// These options control reconnection, timeouts, per-peer queue lengths and
/// buffer sizes.
///
/// # Examples
///
/// ```
/// use pipemq_core::options::SocketOptions;
/// use std::time::Duration;
///
/// let opts = SocketOptions::default()
///     .with_recv_timeout(Duration::from_secs(5))
///     .with_reconnect_ivl(Duration::from_millis(250));
/// ```
#[derive(Debug, Clone)]
pub struct SocketOptions {
    /// Receive timeout (ZMQ_RCVTIMEO)
    ///
    /// Maximum time to wait for a receive operation.
    /// - `None`: Block until a message arrives or the socket closes (default)
    /// - `Some(duration)`: Fail with a timed-out error after duration
    pub recv_timeout: Option<Duration>,

    /// Handshake timeout (ZMQ_HANDSHAKE_IVL)
    ///
    /// Maximum time for each handshake stage (greeting, mechanism).
    /// - Default: 30 seconds
    /// - Set to `Duration::ZERO` to disable timeout
    pub handshake_timeout: Duration,

    /// Reconnect interval (ZMQ_RECONNECT_IVL)
    ///
    /// Delay between outbound connection attempts.
    /// - Default: 100ms
    /// - Use with `reconnect_ivl_max` for exponential backoff
    pub reconnect_ivl: Duration,

    /// Maximum reconnect interval (ZMQ_RECONNECT_IVL_MAX)
    ///
    /// - Default: 0 (no backoff, use `reconnect_ivl` always)
    /// - When > 0: Doubles `reconnect_ivl` up to this value
    pub reconnect_ivl_max: Duration,

    /// Connection timeout (ZMQ_CONNECT_TIMEOUT)
    ///
    /// Maximum time to wait for an outbound dial to complete.
    /// - Default: 3 seconds
    /// - Set to `Duration::ZERO` to wait for the OS
    pub connect_timeout: Duration,

    /// High water mark for receiving (ZMQ_RCVHWM)
    ///
    /// Number of complete messages each inbound peer may queue before its
    /// read loop stalls.
    /// - Default: 1000 messages
    pub recv_hwm: usize,

    /// High water mark for sending (ZMQ_SNDHWM)
    ///
    /// Number of complete messages each outbound peer may queue before it is
    /// considered busy.
    /// - Default: 1000 messages
    pub send_hwm: usize,

    /// Maximum frame size (ZMQ_MAXMSGSIZE)
    ///
    /// - `None`: No limit (default)
    /// - `Some(n)`: Larger frames are protocol errors
    pub max_msg_size: Option<usize>,

    /// Size of each read issued against the transport.
    /// - Default: 8KB
    pub read_buffer_size: usize,
}

impl Default for SocketOptions {
    fn default() -> Self {
        Self {
            recv_timeout: None,
            handshake_timeout: Duration::from_secs(30),
            reconnect_ivl: Duration::from_millis(100),
            reconnect_ivl_max: Duration::ZERO,
            connect_timeout: Duration::from_secs(3),
            recv_hwm: 1000,
            send_hwm: 1000,
            max_msg_size: None,
            read_buffer_size: 8192,
        }
    }
}

impl SocketOptions {
    /// Create new socket options with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set receive timeout.
    pub fn with_recv_timeout(mut self, timeout: Duration) -> Self {
        self.recv_timeout = Some(timeout);
        self
    }

    pub fn with_handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout = timeout;
        self
    }

    pub fn with_reconnect_ivl(mut self, ivl: Duration) -> Self {
        self.reconnect_ivl = ivl;
        self
    }

    pub fn with_reconnect_ivl_max(mut self, max: Duration) -> Self {
        self.reconnect_ivl_max = max;
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set the per-peer inbound queue length. Clamped to at least 1.
    pub fn with_recv_hwm(mut self, hwm: usize) -> Self {
        self.recv_hwm = hwm.max(1);
        self
    }

    /// Set the per-peer outbound queue length. Clamped to at least 1.
    pub fn with_send_hwm(mut self, hwm: usize) -> Self {
        self.send_hwm = hwm.max(1);
        self
    }

    pub fn with_max_msg_size(mut self, size: usize) -> Self {
        self.max_msg_size = Some(size);
        self
    }

    pub fn with_read_buffer_size(mut self, size: usize) -> Self {
        self.read_buffer_size = size.max(64);
        self
    }
}
