//! IPC transport via Unix domain sockets.

use crate::endpoint::Endpoint;
use crate::error::{Error, Result};
use crate::transport::{
    Connection, ConnectionReader, ConnectionWriter, Listener, StreamReader, StreamWriter, Transport,
};
use async_trait::async_trait;
use compio::net::{UnixListener, UnixStream};
use std::io;
use std::path::Path;
use tracing::debug;

/// `ipc://` transport.
#[derive(Debug, Clone, Copy, Default)]
pub struct IpcTransport;

struct IpcConnection {
    stream: UnixStream,
    local: String,
    peer: String,
}

impl Connection for IpcConnection {
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

struct IpcAcceptor {
    listener: UnixListener,
    endpoint: Endpoint,
}

#[async_trait(?Send)]
impl Listener for IpcAcceptor {
    async fn accept(&self) -> io::Result<Box<dyn Connection>> {
        let (stream, _addr) = self.listener.accept().await?;
        // Accepted unix peers are unnamed; both ends are identified by the socket path.
        let name = self.endpoint.to_string();
        Ok(Box::new(IpcConnection {
            stream,
            local: name.clone(),
            peer: name,
        }))
    }

    fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }
}

fn socket_path(endpoint: &Endpoint) -> Result<&Path> {
    match endpoint {
        Endpoint::Ipc(path) => Ok(path),
        other => Err(Error::fatal_address(other.to_string(), "not an ipc endpoint")),
    }
}

#[async_trait(?Send)]
impl Transport for IpcTransport {
    fn scheme(&self) -> &'static str {
        "ipc"
    }

    async fn bind(&self, endpoint: &Endpoint) -> Result<Box<dyn Listener>> {
        let path = socket_path(endpoint)?;
        // A stale socket file from a previous run would make bind fail.
        if path.exists() {
            std::fs::remove_file(path)?;
        }
        let listener = UnixListener::bind(path).await?;
        debug!("[IPC] Listening on {}", endpoint);
        Ok(Box::new(IpcAcceptor {
            listener,
            endpoint: endpoint.clone(),
        }))
    }

    async fn connect(&self, endpoint: &Endpoint) -> Result<Box<dyn Connection>> {
        let path = socket_path(endpoint)?;
        let stream = UnixStream::connect(path).await?;
        let name = endpoint.to_string();
        Ok(Box::new(IpcConnection {
            stream,
            local: name.clone(),
            peer: name,
        }))
    }
}
