use super::{HandlerFuture, SocketHandler};
use crate::handshake::{negotiate, PeerConfig};
use crate::socket::ZmtpSocket;
use pipemq_core::cancel::CancelToken;
use pipemq_core::endpoint::Endpoint;
use pipemq_core::error::{Error, Result};
use pipemq_core::monitor::EventKind;
use pipemq_core::reconnect::ReconnectState;
use pipemq_core::timeout::with_timeout;
use pipemq_core::transport::Transport;
use pipemq_core::wait::WaitCloser;
use std::rc::Rc;
use std::time::{Duration, Instant};
use tracing::{debug, trace, warn};

/// Owns one outbound address: dial, handshake, run the handler, and
/// reconnect with backoff until closed or a fatal address error.
pub struct ConnectionDriver {
    endpoint: Endpoint,
    closer: WaitCloser<Result<()>>,
}

impl ConnectionDriver {
    /// Start driving `endpoint`.
    ///
    /// The first attempt runs before this returns: a fatal address error is
    /// returned directly, and on success the handler has already been
    /// invoked. Transient failures are retried in the background.
    pub async fn start(
        cfg: Rc<PeerConfig>,
        transport: Rc<dyn Transport>,
        endpoint: Endpoint,
        handler: SocketHandler,
        parent: &CancelToken,
    ) -> Result<Self> {
        let (closer, finisher) = WaitCloser::new(parent);
        let mut worker = Worker {
            backoff: ReconnectState::new(&cfg.options),
            cfg,
            transport,
            endpoint: endpoint.clone(),
            handler,
            cancel: closer.token(),
        };

        let started = Instant::now();
        let first = match worker.try_connect().await {
            Ok(socket) => Step::Serve(worker.open(socket)),
            Err(e) if e.is_fatal() || e.is_cancelled() => return Err(e),
            Err(_) => Step::Wait(worker.backoff.remaining_after(started.elapsed())),
        };

        compio::runtime::spawn(async move {
            let result = worker.run(first).await;
            finisher.finish(result);
        })
        .detach();

        Ok(Self { endpoint, closer })
    }

    #[must_use]
    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// True once the worker has stopped on its own.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.closer.is_finished()
    }

    /// Cancel the driver and wait for its worker to exit.
    ///
    /// Returns the worker's terminal error, if it stopped on one.
    pub async fn close(self) -> Result<()> {
        trace!("[CONNECT] Closing driver for {}", self.endpoint);
        self.closer.close().await.unwrap_or(Ok(()))
    }
}

struct Session {
    run: HandlerFuture,
    local: String,
    remote: String,
}

enum Step {
    Dial,
    Wait(Duration),
    Serve(Session),
}

struct Worker {
    cfg: Rc<PeerConfig>,
    transport: Rc<dyn Transport>,
    endpoint: Endpoint,
    handler: SocketHandler,
    cancel: CancelToken,
    backoff: ReconnectState,
}

impl Worker {
    async fn try_connect(&mut self) -> Result<Box<dyn ZmtpSocket>> {
        let remote = self.endpoint.to_string();
        let dial = with_timeout(
            self.cfg.options.connect_timeout,
            "connect",
            self.transport.connect(&self.endpoint),
        );
        let conn = match self.cancel.run(dial).await {
            None => return Err(Error::Cancelled),
            Some(dialed) => dialed.map_err(Error::from).and_then(|r| r),
        };
        let conn = match conn {
            Ok(conn) => conn,
            Err(e) => {
                self.cfg.post(EventKind::ConnectFailed, "", &remote, e.to_string());
                return Err(e);
            }
        };
        self.cfg
            .post(EventKind::Connected, conn.local_addr(), conn.peer_addr(), "");

        let socket = self
            .cancel
            .run(negotiate(&self.cfg, conn))
            .await
            .unwrap_or(Err(Error::Cancelled))?;
        self.backoff.reset();
        Ok(socket)
    }

    fn open(&self, socket: Box<dyn ZmtpSocket>) -> Session {
        let local = socket.local_addr().to_string();
        let remote = socket.peer_addr().to_string();
        debug!("[CONNECT] Session open {} -> {}", local, remote);
        Session {
            run: (self.handler)(socket, self.cancel.clone()),
            local,
            remote,
        }
    }

    async fn run(mut self, mut step: Step) -> Result<()> {
        loop {
            step = match step {
                Step::Dial => {
                    let started = Instant::now();
                    match self.try_connect().await {
                        Ok(socket) => Step::Serve(self.open(socket)),
                        Err(Error::Cancelled) => return Ok(()),
                        Err(e) if e.is_fatal() => {
                            warn!("[CONNECT] Giving up on {}: {}", self.endpoint, e);
                            return Err(e);
                        }
                        Err(_) => Step::Wait(self.backoff.remaining_after(started.elapsed())),
                    }
                }
                Step::Wait(delay) => {
                    trace!("[CONNECT] Retrying {} in {:?}", self.endpoint, delay);
                    if self.cancel.run(compio::time::sleep(delay)).await.is_none() {
                        return Ok(());
                    }
                    Step::Dial
                }
                Step::Serve(session) => {
                    let result = self.cancel.run(session.run).await;
                    let note = match &result {
                        None => "closed".to_string(),
                        Some(Ok(())) => "session ended".to_string(),
                        Some(Err(e)) => e.to_string(),
                    };
                    self.cfg
                        .post(EventKind::Disconnected, &session.local, &session.remote, note);
                    match result {
                        None => return Ok(()),
                        Some(Err(e)) if e.is_fatal() => return Err(e),
                        Some(_) if self.cancel.is_cancelled() => return Ok(()),
                        Some(_) => Step::Wait(self.backoff.next_delay()),
                    }
                }
            };
        }
    }
}
