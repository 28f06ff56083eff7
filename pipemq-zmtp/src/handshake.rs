//! Shared handshake protocol for inbound and outbound connections.
//!
//! 1. Exchange greetings; the peer must speak ZMTP 3.x, name the same
//!    mechanism and take a compatible role. Failure posts `FailedGreeting`.
//! 2. Run the mechanism handshake to obtain a framed socket and the peer's
//!    metadata. Failure posts `FailedHandshake`.
//! 3. Check the peer metadata with the pattern's validator. Failure posts
//!    `FailedHandshake`; success posts `Ready`.
//!
//! Each stage is bounded by the handshake timeout.

use crate::codec::Command;
use crate::mechanism::Mechanism;
use crate::metadata::Metadata;
use crate::socket::ZmtpSocket;
use crate::wire::FramedStream;
use pipemq_core::error::{Error, Result};
use pipemq_core::monitor::{EventBus, EventKind, SocketEvent};
use pipemq_core::options::SocketOptions;
use pipemq_core::timeout::with_timeout;
use pipemq_core::transport::Connection;
use std::rc::Rc;
use tracing::debug;

/// Pattern-specific check of the peer's handshake metadata.
pub type MetadataValidator = Rc<dyn Fn(&Metadata) -> Result<()>>;

/// Everything a driver needs to turn a raw connection into a ready socket.
pub struct PeerConfig {
    pub mechanism: Rc<dyn Mechanism>,
    pub options: SocketOptions,
    pub events: Rc<dyn EventBus>,
    /// Metadata announced to every peer.
    pub metadata: Metadata,
    pub validator: MetadataValidator,
}

impl PeerConfig {
    pub(crate) fn post(&self, kind: EventKind, local: &str, remote: &str, note: impl Into<String>) {
        self.events.post(SocketEvent::new(kind, local, remote, note));
    }
}

async fn exchange_greetings(cfg: &PeerConfig, stream: &mut FramedStream) -> Result<()> {
    let mechanism = &cfg.mechanism;
    stream.write_greeting(&mechanism.local_greeting()?).await?;
    let peer = stream.read_greeting().await?;

    if peer.major < 3 {
        return Err(Error::protocol(format!(
            "unsupported ZMTP version {}.{}",
            peer.major, peer.minor
        )));
    }
    if peer.mechanism() != mechanism.name() {
        return Err(Error::handshake(format!(
            "mechanism mismatch: local {}, peer {}",
            mechanism.name(),
            peer.mechanism()
        )));
    }
    mechanism.validate_greeting(&peer)
}

/// Run the full handshake over `conn`, posting an event for the outcome.
pub async fn negotiate(
    cfg: &PeerConfig,
    conn: Box<dyn Connection>,
) -> Result<Box<dyn ZmtpSocket>> {
    let local = conn.local_addr().to_string();
    let remote = conn.peer_addr().to_string();
    let limit = cfg.options.handshake_timeout;
    let mut stream =
        FramedStream::new(conn, cfg.options.read_buffer_size, cfg.options.max_msg_size);

    let greeted = with_timeout(limit, "greeting", exchange_greetings(cfg, &mut stream)).await;
    if let Err(e) = greeted.map_err(Error::from).and_then(|r| r) {
        cfg.post(EventKind::FailedGreeting, &local, &remote, e.to_string());
        return Err(e);
    }

    let shaken =
        with_timeout(limit, "handshake", cfg.mechanism.handshake(stream, &cfg.metadata)).await;
    let (mut socket, peer_meta) = match shaken.map_err(Error::from).and_then(|r| r) {
        Ok(done) => done,
        Err(e) => {
            cfg.post(EventKind::FailedHandshake, &local, &remote, e.to_string());
            return Err(e);
        }
    };

    if let Err(e) = (cfg.validator)(&peer_meta) {
        cfg.post(EventKind::FailedHandshake, &local, &remote, e.to_string());
        // Best effort: tell the peer why before dropping the connection.
        let _ = socket.send_command(Command::error(&e.to_string())).await;
        let _ = socket.close().await;
        return Err(e);
    }

    debug!(local = %local, remote = %remote, "[HANDSHAKE] Peer ready");
    cfg.post(EventKind::Ready, &local, &remote, "");
    Ok(socket)
}
