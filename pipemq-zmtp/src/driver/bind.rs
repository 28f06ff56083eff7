use super::SocketHandler;
use crate::handshake::{negotiate, PeerConfig};
use pipemq_core::cancel::CancelToken;
use pipemq_core::endpoint::Endpoint;
use pipemq_core::error::Result;
use pipemq_core::monitor::EventKind;
use pipemq_core::transport::{Connection, Listener, Transport};
use pipemq_core::wait::{WaitCloser, WaitGroup, WaitGuard};
use std::rc::Rc;
use std::time::Duration;
use tracing::{debug, trace, warn};

/// Pause after a failed accept so a persistent error (e.g. EMFILE) cannot spin.
const ACCEPT_RETRY_DELAY: Duration = Duration::from_millis(10);

/// Owns one listening address and serves every peer that connects to it.
pub struct BindDriver {
    endpoint: Endpoint,
    closer: WaitCloser<Result<()>>,
}

impl BindDriver {
    /// Bind `endpoint` and start accepting.
    ///
    /// Bind errors are returned directly. The stored endpoint is the one the
    /// listener actually bound, so `tcp://127.0.0.1:0` resolves to its port.
    pub async fn start(
        cfg: Rc<PeerConfig>,
        transport: Rc<dyn Transport>,
        endpoint: &Endpoint,
        handler: SocketHandler,
        parent: &CancelToken,
    ) -> Result<Self> {
        let listener = transport.bind(endpoint).await?;
        let bound = listener.endpoint().clone();
        debug!("[BIND] Listening on {}", bound);

        let (closer, finisher) = WaitCloser::new(parent);
        let cancel = closer.token();
        compio::runtime::spawn(async move {
            accept_loop(cfg, listener, handler, cancel).await;
            finisher.finish(Ok(()));
        })
        .detach();

        Ok(Self {
            endpoint: bound,
            closer,
        })
    }

    #[must_use]
    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// Stop accepting, close every peer session and wait for them to exit.
    pub async fn close(self) -> Result<()> {
        trace!("[BIND] Closing listener {}", self.endpoint);
        self.closer.close().await.unwrap_or(Ok(()))
    }
}

async fn accept_loop(
    cfg: Rc<PeerConfig>,
    listener: Box<dyn Listener>,
    handler: SocketHandler,
    cancel: CancelToken,
) {
    let local = listener.endpoint().to_string();
    let peers = WaitGroup::new();

    while let Some(accepted) = cancel.run(listener.accept()).await {
        match accepted {
            Ok(conn) => {
                cfg.post(EventKind::Accepted, conn.local_addr(), conn.peer_addr(), "");
                let guard = peers.add();
                compio::runtime::spawn(serve_peer(
                    cfg.clone(),
                    conn,
                    handler.clone(),
                    cancel.clone(),
                    guard,
                ))
                .detach();
            }
            Err(e) => {
                warn!("[BIND] Accept on {} failed: {}", local, e);
                cfg.post(EventKind::AcceptFailed, &local, "", e.to_string());
                if cancel.run(compio::time::sleep(ACCEPT_RETRY_DELAY)).await.is_none() {
                    break;
                }
            }
        }
    }

    drop(listener);
    trace!("[BIND] Waiting for {} peer(s) on {}", peers.active(), local);
    peers.wait().await;
    debug!("[BIND] Listener {} closed", local);
}

async fn serve_peer(
    cfg: Rc<PeerConfig>,
    conn: Box<dyn Connection>,
    handler: SocketHandler,
    cancel: CancelToken,
    _guard: WaitGuard,
) {
    let socket = match cancel.run(negotiate(&cfg, conn)).await {
        Some(Ok(socket)) => socket,
        // negotiate already posted the failure event
        Some(Err(_)) | None => return,
    };
    let local = socket.local_addr().to_string();
    let remote = socket.peer_addr().to_string();

    let note = match cancel.run(handler(socket, cancel.clone())).await {
        None => "closed".to_string(),
        Some(Ok(())) => "session ended".to_string(),
        Some(Err(e)) => e.to_string(),
    };
    cfg.post(EventKind::Disconnected, &local, &remote, note);
}
