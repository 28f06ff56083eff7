//! Pipemq Core
//!
//! This crate contains the protocol-agnostic building blocks of the socket
//! runtime:
//! - Error taxonomy (`error`)
//! - Endpoint parsing (`endpoint`) and socket options (`options`)
//! - Reconnect backoff (`reconnect`) and timeouts (`timeout`)
//! - Lifecycle events (`monitor`)
//! - Cancellation scopes and wait groups (`cancel`, `wait`)
//! - Transport contract with TCP and IPC implementations (`transport`, `tcp`, `ipc`)

// The tcp module needs raw fd/socket access for socket configuration
#![cfg_attr(not(test), deny(unsafe_code))]
#![allow(clippy::module_name_repetitions)]
pub mod cancel;
pub mod endpoint;
pub mod error;
pub mod monitor;
pub mod options;
pub mod reconnect;
pub mod tcp;
pub mod timeout;
pub mod transport;
pub mod wait;

#[cfg(unix)]
pub mod ipc;

pub mod prelude {
    pub use crate::cancel::{CancelToken, Canceller};
    pub use crate::endpoint::Endpoint;
    pub use crate::error::{Error, ErrorClass, Result};
    pub use crate::monitor::{
        create_monitor, EventBus, EventKind, SocketEvent, SocketMonitor, TracingBus,
    };
    pub use crate::options::SocketOptions;
    pub use crate::reconnect::ReconnectState;
    pub use crate::tcp::TcpTransport;
    pub use crate::transport::{Connection, Listener, Transport};
    pub use crate::wait::{Finisher, WaitCloser, WaitGroup, WaitGuard};

    #[cfg(unix)]
    pub use crate::ipc::IpcTransport;
}
