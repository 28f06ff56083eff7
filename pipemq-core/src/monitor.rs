//! Socket event monitoring.
//!
//! Drivers report every lifecycle milestone and failure as a [`SocketEvent`]
//! posted to an [`EventBus`]. A monitor channel created with
//! [`create_monitor`] is itself a bus, so tests and applications can observe
//! a socket by handing its sender to the socket.

use std::fmt;
use tracing::{debug, warn};

/// Kind of lifecycle event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// Outbound dial succeeded.
    Connected,
    /// A peer session ended.
    Disconnected,
    /// Outbound dial failed.
    ConnectFailed,
    /// Listener accepted an inbound stream.
    Accepted,
    /// Listener failed to accept.
    AcceptFailed,
    /// Greeting exchange or validation failed.
    FailedGreeting,
    /// Mechanism handshake or metadata validation failed.
    FailedHandshake,
    /// Peer finished the handshake and is live.
    Ready,
}

impl EventKind {
    /// Returns true for events that report a failure.
    #[must_use]
    pub const fn is_failure(self) -> bool {
        matches!(
            self,
            Self::ConnectFailed | Self::AcceptFailed | Self::FailedGreeting | Self::FailedHandshake
        )
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Connected => "Connected",
            Self::Disconnected => "Disconnected",
            Self::ConnectFailed => "ConnectFailed",
            Self::Accepted => "Accepted",
            Self::AcceptFailed => "AcceptFailed",
            Self::FailedGreeting => "FailedGreeting",
            Self::FailedHandshake => "FailedHandshake",
            Self::Ready => "Ready",
        };
        f.write_str(name)
    }
}

/// Socket lifecycle event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SocketEvent {
    pub kind: EventKind,
    /// Local address of the stream or listener, empty when unknown.
    pub local: String,
    /// Remote address of the peer, empty when unknown.
    pub remote: String,
    /// Free-text detail, usually an error message.
    pub note: String,
}

impl SocketEvent {
    pub fn new(
        kind: EventKind,
        local: impl Into<String>,
        remote: impl Into<String>,
        note: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            local: local.into(),
            remote: remote.into(),
            note: note.into(),
        }
    }
}

impl fmt::Display for SocketEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} -> {}", self.kind, self.local, self.remote)?;
        if !self.note.is_empty() {
            write!(f, ": {}", self.note)?;
        }
        Ok(())
    }
}

/// Receiver of lifecycle notifications.
pub trait EventBus {
    fn post(&self, event: SocketEvent);
}

/// Event bus that only logs, failures at `warn` and milestones at `debug`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingBus;

impl EventBus for TracingBus {
    fn post(&self, event: SocketEvent) {
        if event.kind.is_failure() {
            warn!(
                kind = %event.kind,
                local = %event.local,
                remote = %event.remote,
                "[EVENT] {}",
                event.note
            );
        } else {
            debug!(
                kind = %event.kind,
                local = %event.local,
                remote = %event.remote,
                "[EVENT] {}",
                event.note
            );
        }
    }
}

impl EventBus for flume::Sender<SocketEvent> {
    fn post(&self, event: SocketEvent) {
        // A dropped monitor only means nobody is watching.
        let _ = self.send(event);
    }
}

/// Handle for receiving socket events.
pub type SocketMonitor = flume::Receiver<SocketEvent>;

/// Sending half of a monitor, usable as an [`EventBus`].
pub type SocketEventSender = flume::Sender<SocketEvent>;

/// Creates a new monitoring channel pair.
#[must_use]
pub fn create_monitor() -> (SocketEventSender, SocketMonitor) {
    flume::unbounded()
}
