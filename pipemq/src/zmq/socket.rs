//! Address-string facade over a pattern engine.

use super::registry::Registry;
use bytes::Bytes;
use pipemq_core::endpoint::Endpoint;
use pipemq_core::error::Result;
use pipemq_core::transport::Transport;
use pipemq_zmtp::{PatternEngine, SocketType};
use std::rc::Rc;

/// A PUSH or PULL socket.
///
/// Addresses are URLs such as `tcp://127.0.0.1:5555` or `ipc:///tmp/feed`;
/// the scheme selects the transport. Dropping the socket cancels every
/// driver it owns; [`close`](Self::close) also waits for them to exit.
pub struct Socket {
    engine: Box<dyn PatternEngine>,
    registry: Rc<Registry>,
}

impl Socket {
    pub(crate) fn new(engine: Box<dyn PatternEngine>, registry: Rc<Registry>) -> Self {
        Self { engine, registry }
    }

    /// Pattern this socket implements.
    #[must_use]
    pub fn socket_type(&self) -> SocketType {
        self.engine.socket_type()
    }

    fn resolve(&self, address: &str) -> Result<(Rc<dyn Transport>, Endpoint)> {
        let endpoint = Endpoint::parse(address)?;
        let transport = self.registry.transport(endpoint.scheme())?;
        Ok((transport, endpoint))
    }

    /// Connect to `address`, retrying in the background until it answers.
    ///
    /// Returns once the first attempt has finished; an invalid address fails
    /// here instead of being retried.
    pub async fn connect(&self, address: &str) -> Result<()> {
        let (transport, endpoint) = self.resolve(address)?;
        self.engine.connect(transport, endpoint).await
    }

    /// Stop the outbound driver for `address`.
    pub async fn disconnect(&self, address: &str) -> Result<()> {
        let endpoint = Endpoint::parse(address)?;
        self.engine.disconnect(&endpoint).await
    }

    /// Listen on `address` and return the address actually bound.
    ///
    /// Port 0 picks a free port; pass the returned string to `connect` and
    /// `unbind`.
    pub async fn bind(&self, address: &str) -> Result<String> {
        let (transport, endpoint) = self.resolve(address)?;
        let bound = self.engine.bind(transport, endpoint).await?;
        Ok(bound.to_string())
    }

    /// Stop listening on `address` and drop its peers.
    pub async fn unbind(&self, address: &str) -> Result<()> {
        let endpoint = Endpoint::parse(address)?;
        self.engine.unbind(&endpoint).await
    }

    /// Send one multipart message.
    pub async fn send(&self, parts: Vec<Bytes>) -> Result<()> {
        self.engine.send(parts).await
    }

    /// Receive one multipart message.
    pub async fn recv(&self) -> Result<Vec<Bytes>> {
        self.engine.recv().await
    }

    /// Cancel every driver and wait for them to exit. Idempotent.
    pub async fn close(&self) -> Result<()> {
        self.engine.close().await
    }

    /// Address most recently connected or bound.
    #[must_use]
    pub fn last_endpoint(&self) -> Option<String> {
        self.engine.last_endpoint().map(|e| e.to_string())
    }

    /// Peers currently past the handshake.
    #[must_use]
    pub fn peer_count(&self) -> usize {
        self.engine.peer_count()
    }
}
