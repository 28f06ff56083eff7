//! Per-address drivers.
//!
//! A [`ConnectionDriver`] owns one outbound address and keeps it connected;
//! a [`BindDriver`] owns one listening address and serves every peer that
//! connects to it. Both hand each ready socket to a [`SocketHandler`]
//! supplied by the pattern engine.

mod bind;
mod connection;

pub use bind::BindDriver;
pub use connection::ConnectionDriver;

use crate::socket::ZmtpSocket;
use futures::future::LocalBoxFuture;
use pipemq_core::cancel::CancelToken;
use pipemq_core::error::Result;
use std::rc::Rc;

/// Session future returned by a [`SocketHandler`].
pub type HandlerFuture = LocalBoxFuture<'static, Result<()>>;

/// Pumps frames for one live peer until error or cancellation.
///
/// The synchronous part of the call runs before the driver yields, so an
/// engine can register the peer's queue there; the returned future does the
/// I/O.
pub type SocketHandler = Rc<dyn Fn(Box<dyn ZmtpSocket>, CancelToken) -> HandlerFuture>;
