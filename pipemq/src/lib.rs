//! # Pipemq
//!
//! A ZeroMQ-compatible pipeline messaging runtime built on `io_uring`.
//!
//! ## Architecture
//!
//! - **`pipemq-core`**: errors, endpoints, options, cancellation, events and
//!   the TCP/IPC transports
//! - **`pipemq-zmtp`**: ZMTP 3.1 wire codec, NULL/PLAIN/CURVE handshakes,
//!   connection and bind drivers, PUSH/PULL engines
//! - **`pipemq`**: Public API surface (this crate)
//!
//! ## Protocols (opt-in via features)
//!
//! - **`zmq`** (default) - ZeroMQ (ZMTP 3.x) PUSH/PULL sockets
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! # #[cfg(feature = "zmq")]
//! use pipemq::zmq::prelude::*;
//!
//! # #[cfg(feature = "zmq")]
//! # async fn example() -> pipemq::Result<()> {
//! let ctx = Context::new();
//! let push = ctx.new_socket(SocketType::Push, "NULL", &[])?;
//! push.connect("tcp://127.0.0.1:5555").await?;
//! push.send(vec![Bytes::from("work")]).await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Logging
//!
//! Drivers and engines log through `tracing`; lifecycle events go to the
//! context's event bus. See [`dev_tracing`] for a quick subscriber.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod dev_tracing;

// Re-export core types
pub use bytes::Bytes;
pub use pipemq_core::error::{Error, ErrorClass, Result};

// Protocol modules (opt-in via features)
#[cfg(feature = "zmq")]
pub mod zmq;
