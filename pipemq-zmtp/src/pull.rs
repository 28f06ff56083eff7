//! PULL pattern engine
//!
//! PULL sockets are receive-only endpoints in the pipeline pattern. Frames
//! from every peer are merged into one stream of complete messages.
//!
//! Each peer session reads frames into its own bounded queue (capacity
//! `recv_hwm`), one complete multipart message per entry. A forwarder task
//! per peer moves finished messages into a shared rendezvous channel that
//! `recv` consumes. A slow consumer therefore stalls peers one at a time:
//! the rendezvous blocks the forwarder, the peer queue fills and only then
//! does that peer's read loop stop pulling from the wire.

use crate::codec::Frame;
use crate::driver::{HandlerFuture, SocketHandler};
use crate::engine::{EngineCore, PatternEngine};
use crate::mechanism::Mechanism;
use crate::socket::ZmtpSocket;
use crate::socket_type::SocketType;
use async_trait::async_trait;
use bytes::Bytes;
use flume::{Receiver, Sender};
use pipemq_core::cancel::CancelToken;
use pipemq_core::endpoint::Endpoint;
use pipemq_core::error::{Error, Result};
use pipemq_core::monitor::EventBus;
use pipemq_core::options::SocketOptions;
use pipemq_core::timeout::with_timeout;
use pipemq_core::transport::Transport;
use pipemq_core::wait::WaitGuard;
use std::cell::Cell;
use std::rc::Rc;
use tracing::trace;

type Inbound = Vec<Bytes>;

/// Counts live peer sessions.
struct LivePeer(Rc<Cell<usize>>);

impl LivePeer {
    fn enter(count: &Rc<Cell<usize>>) -> Self {
        count.set(count.get() + 1);
        Self(count.clone())
    }
}

impl Drop for LivePeer {
    fn drop(&mut self) {
        self.0.set(self.0.get().saturating_sub(1));
    }
}

/// PULL socket engine.
pub struct PullEngine {
    core: EngineCore,
    inlet: Sender<Inbound>,
    outlet: Receiver<Inbound>,
    live: Rc<Cell<usize>>,
}

impl PullEngine {
    pub fn new(
        mechanism: Rc<dyn Mechanism>,
        options: SocketOptions,
        events: Rc<dyn EventBus>,
    ) -> Result<Self> {
        let (inlet, outlet) = flume::bounded(0);
        Ok(Self {
            core: EngineCore::new(SocketType::Pull, mechanism, options, events)?,
            inlet,
            outlet,
            live: Rc::new(Cell::new(0)),
        })
    }

    fn handler(&self) -> SocketHandler {
        let inlet = self.inlet.clone();
        let tasks = self.core.tasks();
        let live = self.live.clone();
        let capacity = self.core.options().recv_hwm;
        let limit = self.core.options().max_msg_size;
        Rc::new(move |socket: Box<dyn ZmtpSocket>, cancel: CancelToken| -> HandlerFuture {
            let Some(guard) = tasks.track() else {
                return Box::pin(async { Err(Error::Cancelled) });
            };
            let (queue_tx, queue_rx) = flume::bounded(capacity);
            compio::runtime::spawn(forward(queue_rx, inlet.clone(), cancel, guard)).detach();
            Box::pin(read_messages(socket, queue_tx, limit, LivePeer::enter(&live)))
        })
    }
}

/// Move complete messages from one peer queue into the shared rendezvous.
///
/// Runs until the peer queue is closed and drained, or the engine closes.
async fn forward(
    queue: Receiver<Inbound>,
    inlet: Sender<Inbound>,
    cancel: CancelToken,
    _guard: WaitGuard,
) {
    while let Some(Ok(parts)) = cancel.run(queue.recv_async()).await {
        match cancel.run(inlet.send_async(parts)).await {
            Some(Ok(())) => {}
            _ => break,
        }
    }
}

/// Group frames from one peer into messages and queue them.
///
/// `limit` bounds a whole multipart message, not a single frame. Every part
/// counts at least one byte so a stream of empty `more` frames is bounded too.
async fn read_messages(
    mut socket: Box<dyn ZmtpSocket>,
    queue: Sender<Inbound>,
    limit: Option<usize>,
    _live: LivePeer,
) -> Result<()> {
    let mut parts = Vec::new();
    let mut size = 0usize;
    loop {
        match socket.read().await? {
            Frame::Message(msg) => {
                size = size.saturating_add(msg.body.len().max(1));
                if let Some(max) = limit {
                    if size > max {
                        return Err(Error::Protocol(format!(
                            "multipart message from {} exceeds {max} bytes",
                            socket.peer_addr()
                        )));
                    }
                }
                let more = msg.more;
                parts.push(msg.body);
                if more {
                    continue;
                }
                size = 0;
                if queue.send_async(std::mem::take(&mut parts)).await.is_err() {
                    return Ok(());
                }
            }
            Frame::Command(cmd) => {
                trace!("[PULL] Ignoring {} command from {}", cmd.name, socket.peer_addr());
            }
        }
    }
}

#[async_trait(?Send)]
impl PatternEngine for PullEngine {
    fn socket_type(&self) -> SocketType {
        self.core.socket_type()
    }

    async fn connect(&self, transport: Rc<dyn Transport>, endpoint: Endpoint) -> Result<()> {
        self.core.connect(transport, endpoint, self.handler()).await
    }

    async fn disconnect(&self, endpoint: &Endpoint) -> Result<()> {
        self.core.disconnect(endpoint).await
    }

    async fn bind(&self, transport: Rc<dyn Transport>, endpoint: Endpoint) -> Result<Endpoint> {
        self.core.bind(transport, endpoint, self.handler()).await
    }

    async fn unbind(&self, endpoint: &Endpoint) -> Result<()> {
        self.core.unbind(endpoint).await
    }

    async fn send(&self, _parts: Vec<Bytes>) -> Result<()> {
        Err(Error::OperationNotPermitted)
    }

    /// Wait for the next complete message from any peer.
    ///
    /// Returns `Cancelled` if the engine is closed while waiting and a
    /// timed-out I/O error once `recv_timeout` elapses.
    async fn recv(&self) -> Result<Vec<Bytes>> {
        self.core.ensure_open()?;
        let cancel = self.core.token();
        let next = self.outlet.recv_async();

        let received = match self.core.options().recv_timeout {
            Some(limit) => cancel
                .run(with_timeout(limit, "recv", next))
                .await
                .map(|r| r.map_err(Error::from)),
            None => cancel.run(next).await.map(Ok),
        };
        match received {
            Some(Ok(Ok(parts))) => Ok(parts),
            Some(Err(e)) => Err(e),
            // engine holds the inlet, so a disconnect only happens on teardown
            Some(Ok(Err(_))) | None => Err(Error::Cancelled),
        }
    }

    async fn close(&self) -> Result<()> {
        self.core.close().await
    }

    fn last_endpoint(&self) -> Option<Endpoint> {
        self.core.last_endpoint()
    }

    fn peer_count(&self) -> usize {
        self.live.get()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{Command, Message};
    use crate::socket::PeerSocket;
    use crate::wire::testing::ScriptedConnection;
    use crate::wire::FramedStream;
    use bytes::BytesMut;
    use pipemq_core::monitor::TracingBus;
    use std::time::Duration;

    fn engine(options: SocketOptions) -> PullEngine {
        let mechanism = Rc::new(crate::mechanism::NullMechanism);
        PullEngine::new(mechanism, options, Rc::new(TracingBus)).unwrap()
    }

    fn scripted(frames: &[Frame]) -> Box<dyn ZmtpSocket> {
        let mut wire = BytesMut::new();
        for frame in frames {
            frame.encode(&mut wire);
        }
        let (conn, _) = ScriptedConnection::new(wire.to_vec(), 3);
        Box::new(PeerSocket::plaintext(FramedStream::new(Box::new(conn), 16, None)))
    }

    #[compio::test]
    async fn test_read_loop_groups_multipart() {
        let (tx, rx) = flume::unbounded();
        let count = Rc::new(Cell::new(0));
        let socket = scripted(&[
            Message::new("a", true).into(),
            Command::new("PING", Bytes::new()).unwrap().into(),
            Message::new("b", false).into(),
            Message::new("c", false).into(),
        ]);

        // ends with EOF once the script is exhausted
        assert!(read_messages(socket, tx, None, LivePeer::enter(&count)).await.is_err());
        assert_eq!(count.get(), 0);
        assert_eq!(rx.try_recv().unwrap(), vec![Bytes::from("a"), Bytes::from("b")]);
        assert_eq!(rx.try_recv().unwrap(), vec![Bytes::from("c")]);
        assert!(rx.try_recv().is_err());
    }

    #[compio::test]
    async fn test_oversized_group_ends_session() {
        let (tx, rx) = flume::unbounded();
        let count = Rc::new(Cell::new(0));
        let socket = scripted(&[
            Message::new("abc", false).into(),
            Message::new("ab", true).into(),
            Message::new("cd", true).into(),
            Message::new("e", false).into(),
        ]);

        let err = read_messages(socket, tx, Some(4), LivePeer::enter(&count)).await.unwrap_err();
        assert!(matches!(err, Error::Protocol(_)));
        assert_eq!(rx.try_recv().unwrap(), vec![Bytes::from("abc")]);
        assert!(rx.try_recv().is_err());
    }

    #[compio::test]
    async fn test_empty_more_frames_count_toward_limit() {
        let (tx, rx) = flume::unbounded();
        let count = Rc::new(Cell::new(0));
        let frames: Vec<Frame> = (0..16).map(|_| Message::new(Bytes::new(), true).into()).collect();

        let err = read_messages(scripted(&frames), tx, Some(8), LivePeer::enter(&count))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Protocol(_)));
        assert!(rx.try_recv().is_err());
    }

    #[compio::test]
    async fn test_recv_through_handler() {
        let engine = engine(SocketOptions::default());
        let socket = scripted(&[Message::new("x", true).into(), Message::new("y", false).into()]);

        let session = (engine.handler())(socket, engine.core.token());
        compio::runtime::spawn(session).detach();

        assert_eq!(engine.recv().await.unwrap(), vec![Bytes::from("x"), Bytes::from("y")]);
        engine.close().await.unwrap();
    }

    #[compio::test]
    async fn test_recv_timeout() {
        let engine = engine(SocketOptions::default().with_recv_timeout(Duration::from_millis(20)));
        let err = engine.recv().await.unwrap_err();
        assert!(err.is_timeout());
    }

    #[compio::test]
    async fn test_close_cancels_pending_recv() {
        let engine = Rc::new(engine(SocketOptions::default()));
        let closer = engine.clone();
        compio::runtime::spawn(async move {
            compio::time::sleep(Duration::from_millis(20)).await;
            closer.close().await.unwrap();
        })
        .detach();

        assert!(matches!(engine.recv().await, Err(Error::Cancelled)));
        let sent = engine.send(vec![Bytes::from("z")]).await;
        assert!(matches!(sent, Err(Error::OperationNotPermitted)));
    }
}
