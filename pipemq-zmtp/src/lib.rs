//! # Pipemq ZMTP
//!
//! `ZeroMQ` (ZMTP 3.1) protocol implementation for Pipemq.
//!
//! ## Layers
//!
//! - **Wire**: [`codec`], [`greeting`] and [`metadata`] encode and decode
//!   frames bit-exactly; [`wire::FramedStream`] runs them over any
//!   [`Connection`](pipemq_core::transport::Connection).
//! - **Handshake**: a [`mechanism::Mechanism`] (NULL, PLAIN or CURVE) turns a framed
//!   stream into a ready [`socket::ZmtpSocket`]; [`handshake::negotiate`]
//!   wraps greeting exchange, mechanism and metadata validation.
//! - **Drivers**: [`driver::ConnectionDriver`] keeps one outbound address
//!   connected; [`driver::BindDriver`] serves every peer of one listener.
//! - **Engines**: [`push::PushEngine`] and [`pull::PullEngine`] implement
//!   the pipeline pattern on top of the drivers.
//!
//! ## Features
//!
//! - **Zero-copy**: Message parts are `Bytes`
//! - **`io_uring`**: Completion-based I/O via `compio`
//! - **Interoperable**: Speaks ZMTP 3.1 NULL, PLAIN and CURVE

// Allow some pedantic lints
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::needless_pass_by_value)]
#![allow(clippy::unused_async)]

pub mod codec;
pub mod driver;
pub mod engine;
pub mod greeting;
pub mod handshake;
pub mod mechanism;
pub mod metadata;
pub mod pull;
pub mod push;
pub mod socket;
pub mod socket_type;
pub mod wire;

pub use engine::PatternEngine;
pub use pull::PullEngine;
pub use push::PushEngine;
pub use socket_type::SocketType;

/// Prelude module for convenient imports
///
/// ```rust
/// use pipemq_zmtp::prelude::*;
/// ```
pub mod prelude {
    pub use super::mechanism::{
        CurveMechanism, Mechanism, MechanismOption, NullMechanism, PlainMechanism,
    };
    pub use super::{PatternEngine, PullEngine, PushEngine, SocketType};
    pub use bytes::Bytes;
}
