//! TCP transport.
//!
//! # Safety
//!
//! This module uses unsafe code to access raw file descriptors/sockets for
//! TCP socket configuration. The unsafe operations are encapsulated and safe
//! to use from the public API.

#![allow(unsafe_code)]

use crate::endpoint::Endpoint;
use crate::error::{Error, Result};
use crate::transport::{
    Connection, ConnectionReader, ConnectionWriter, Listener, StreamReader, StreamWriter, Transport,
};
use async_trait::async_trait;
use compio::net::{TcpListener, TcpStream};
use std::io;
use tracing::{debug, trace};

/// Enable TCP_NODELAY on a compio TcpStream.
///
/// Frames are written whole, so Nagle's algorithm only adds latency.
///
/// # Errors
///
/// Returns an error if the socket option cannot be set.
#[inline]
pub fn enable_tcp_nodelay(stream: &TcpStream) -> io::Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::io::{AsRawFd, FromRawFd};
        let fd = stream.as_raw_fd();
        let sock = unsafe { socket2::Socket::from_raw_fd(fd) };
        let result = sock.set_nodelay(true);
        std::mem::forget(sock); // Don't close the fd
        result
    }

    #[cfg(windows)]
    {
        use std::os::windows::io::{AsRawSocket, FromRawSocket};
        let raw = stream.as_raw_socket();
        let sock = unsafe { socket2::Socket::from_raw_socket(raw) };
        let result = sock.set_nodelay(true);
        std::mem::forget(sock); // Don't close the socket
        result
    }

    #[cfg(not(any(unix, windows)))]
    {
        let _ = stream;
        Ok(())
    }
}

/// `tcp://` transport.
#[derive(Debug, Clone, Copy, Default)]
pub struct TcpTransport;

struct TcpConnection {
    stream: TcpStream,
    local: String,
    peer: String,
}

impl TcpConnection {
    fn new(stream: TcpStream) -> io::Result<Self> {
        if let Err(e) = enable_tcp_nodelay(&stream) {
            debug!("[TCP] Failed to set TCP_NODELAY: {}", e);
        }
        let local = Endpoint::Tcp(stream.local_addr()?).to_string();
        let peer = Endpoint::Tcp(stream.peer_addr()?).to_string();
        Ok(Self {
            stream,
            local,
            peer,
        })
    }
}

impl Connection for TcpConnection {
    fn local_addr(&self) -> &str {
        &self.local
    }

    fn peer_addr(&self) -> &str {
        &self.peer
    }

    fn into_split(self: Box<Self>) -> (Box<dyn ConnectionReader>, Box<dyn ConnectionWriter>) {
        let (read, write) = self.stream.into_split();
        (Box::new(StreamReader(read)), Box::new(StreamWriter(write)))
    }
}

struct TcpAcceptor {
    listener: TcpListener,
    endpoint: Endpoint,
}

#[async_trait(?Send)]
impl Listener for TcpAcceptor {
    async fn accept(&self) -> io::Result<Box<dyn Connection>> {
        let (stream, addr) = self.listener.accept().await?;
        trace!("[TCP] Accepted {}", addr);
        Ok(Box::new(TcpConnection::new(stream)?))
    }

    fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }
}

#[async_trait(?Send)]
impl Transport for TcpTransport {
    fn scheme(&self) -> &'static str {
        "tcp"
    }

    async fn bind(&self, endpoint: &Endpoint) -> Result<Box<dyn Listener>> {
        let Endpoint::Tcp(addr) = endpoint else {
            return Err(Error::fatal_address(endpoint.to_string(), "not a tcp endpoint"));
        };
        let listener = TcpListener::bind(*addr).await?;
        let endpoint = Endpoint::Tcp(listener.local_addr()?);
        debug!("[TCP] Listening on {}", endpoint);
        Ok(Box::new(TcpAcceptor { listener, endpoint }))
    }

    async fn connect(&self, endpoint: &Endpoint) -> Result<Box<dyn Connection>> {
        let Endpoint::Tcp(addr) = endpoint else {
            return Err(Error::fatal_address(endpoint.to_string(), "not a tcp endpoint"));
        };
        if addr.port() == 0 || addr.ip().is_unspecified() {
            return Err(Error::fatal_address(
                endpoint.to_string(),
                "cannot dial a wildcard address",
            ));
        }
        let stream = TcpStream::connect(*addr).await?;
        Ok(Box::new(TcpConnection::new(stream)?))
    }
}
