/// Pipemq Error Types
///
/// Every fallible operation in the workspace reports one of these variants.
/// [`Error::class`] groups them into the handling classes used by drivers
/// and pattern engines.

use std::io;
use thiserror::Error;

/// Main error type for Pipemq operations
#[derive(Error, Debug)]
pub enum Error {
    /// IO error during dial, accept, read or write
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// Malformed frame, header or greeting
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Mechanism rejection or metadata mismatch
    #[error("Handshake failed: {0}")]
    Handshake(String),

    /// Unresolvable or invalid address; never retried
    #[error("Invalid address {address}: {reason}")]
    FatalAddress { address: String, reason: String },

    #[error("Already connected to {0}")]
    AlreadyConnected(String),

    #[error("Never connected to {0}")]
    NeverConnected(String),

    #[error("Already bound to {0}")]
    AlreadyBound(String),

    #[error("Never bound to {0}")]
    NeverBound(String),

    /// Send on a receive-only socket or receive on a send-only socket
    #[error("Operation not permitted")]
    OperationNotPermitted,

    #[error("Empty message")]
    EmptyMessage,

    #[error("Invalid option: {0}")]
    InvalidOption(String),

    #[error("Transport not found: {0}")]
    TransportNotFound(String),

    #[error("Mechanism not found: {0}")]
    MechanismNotFound(String),

    #[error("Socket type not found: {0}")]
    SocketTypeNotFound(String),

    #[error("Already registered: {0}")]
    AlreadyRegistered(String),

    /// No live peer to route a message to
    #[error("No peers")]
    NoPeers,

    /// Every live peer's queue is full
    #[error("All peers busy")]
    AllPeersBusy,

    /// The operation was interrupted by (or attempted after) close
    #[error("Operation cancelled")]
    Cancelled,
}

/// Result type alias for Pipemq operations
pub type Result<T> = std::result::Result<T, Error>;

/// Coarse handling class of an [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Fatal to one connection only.
    Protocol,
    /// Fatal to one connection, retried by outbound drivers.
    Handshake,
    /// Triggers reconnect, or is logged and ignored by accept loops.
    TransientIo,
    /// Returned synchronously to the caller and never retried.
    Configuration,
    /// Aborts an outbound connect loop.
    FatalAddress,
    Cancelled,
}

impl Error {
    /// Create a protocol error with a message
    pub fn protocol(msg: impl Into<String>) -> Self {
        Self::Protocol(msg.into())
    }

    /// Create a handshake error with a message
    pub fn handshake(msg: impl Into<String>) -> Self {
        Self::Handshake(msg.into())
    }

    /// Create a fatal address error
    pub fn fatal_address(address: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::FatalAddress {
            address: address.into(),
            reason: reason.into(),
        }
    }

    #[must_use]
    pub const fn class(&self) -> ErrorClass {
        match self {
            Self::Io(_) => ErrorClass::TransientIo,
            Self::Protocol(_) => ErrorClass::Protocol,
            Self::Handshake(_) => ErrorClass::Handshake,
            Self::FatalAddress { .. } => ErrorClass::FatalAddress,
            Self::Cancelled => ErrorClass::Cancelled,
            Self::NoPeers | Self::AllPeersBusy => ErrorClass::TransientIo,
            Self::AlreadyConnected(_)
            | Self::NeverConnected(_)
            | Self::AlreadyBound(_)
            | Self::NeverBound(_)
            | Self::OperationNotPermitted
            | Self::EmptyMessage
            | Self::InvalidOption(_)
            | Self::TransportNotFound(_)
            | Self::MechanismNotFound(_)
            | Self::SocketTypeNotFound(_)
            | Self::AlreadyRegistered(_) => ErrorClass::Configuration,
        }
    }

    /// Check if this error must stop an outbound reconnect loop
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(self, Self::FatalAddress { .. })
    }

    /// Check if this error was caused by cancellation
    #[must_use]
    pub const fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// Check if this error is a timed-out I/O operation
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Io(e) if e.kind() == io::ErrorKind::TimedOut)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classes() {
        assert_eq!(Error::protocol("bad tag").class(), ErrorClass::Protocol);
        assert_eq!(Error::handshake("nope").class(), ErrorClass::Handshake);
        assert_eq!(
            Error::AlreadyConnected("tcp://127.0.0.1:1".into()).class(),
            ErrorClass::Configuration
        );
        assert_eq!(
            Error::from(io::Error::from(io::ErrorKind::ConnectionRefused)).class(),
            ErrorClass::TransientIo
        );
    }

    #[test]
    fn test_only_fatal_address_is_fatal() {
        assert!(Error::fatal_address("tcp://nowhere", "unresolvable").is_fatal());
        assert!(!Error::handshake("rejected").is_fatal());
        assert!(!Error::Cancelled.is_fatal());
    }

    #[test]
    fn test_timeout_detection() {
        let err = Error::from(io::Error::new(io::ErrorKind::TimedOut, "recv"));
        assert!(err.is_timeout());
        assert!(!Error::NoPeers.is_timeout());
    }
}
