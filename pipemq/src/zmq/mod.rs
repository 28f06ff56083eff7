//! ZeroMQ protocol implementation.
//!
//! This module provides ZeroMQ-compatible pipeline sockets built on `io_uring`.
//!
//! # Socket Types
//!
//! - `PUSH` - distributes each message to one connected PULL peer
//! - `PULL` - fair-queues messages from every connected PUSH peer
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use pipemq::zmq::prelude::*;
//!
//! # async fn example() -> pipemq::Result<()> {
//! let ctx = Context::new();
//!
//! let pull = ctx.new_socket(SocketType::Pull, "NULL", &[])?;
//! let address = pull.bind("tcp://127.0.0.1:0").await?;
//!
//! let push = ctx.new_socket(SocketType::Push, "NULL", &[])?;
//! push.connect(&address).await?;
//!
//! push.send(vec![Bytes::from("task"), Bytes::from("42")]).await?;
//! let msg = pull.recv().await?;
//! assert_eq!(msg.len(), 2);
//! # Ok(())
//! # }
//! ```

mod context;
mod registry;
mod socket;

pub use context::Context;
pub use registry::{EngineFactory, MechanismFactory, Registry};
pub use socket::Socket;

pub use pipemq_zmtp::mechanism::{
    CurveKeyPair, CurvePublicKey, CurveSecretKey, MechanismOption, PlainAuthenticator,
    PlainCredentials, StaticPlainAuthenticator,
};
pub use pipemq_zmtp::SocketType;

/// Convenient imports for ZeroMQ protocol.
///
/// ```rust
/// use pipemq::zmq::prelude::*;
/// ```
pub mod prelude {
    pub use super::{
        Context, CurveKeyPair, MechanismOption, PlainCredentials, Registry, Socket, SocketType,
    };
    pub use bytes::Bytes;
    pub use pipemq_core::monitor::{create_monitor, EventKind, SocketEvent, SocketMonitor};
    pub use pipemq_core::options::SocketOptions;
}
