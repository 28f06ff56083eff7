//! PUSH pattern engine
//!
//! PUSH sockets are send-only endpoints in the pipeline pattern. Every
//! message goes to exactly one live PULL peer, chosen round-robin.
//!
//! # Characteristics
//!
//! - **Send-only**: `recv` fails with `OperationNotPermitted`
//! - **Non-blocking**: `send` never waits; a full peer queue is skipped
//! - **Fair-ish**: the scan starts after the peer that took the last message
//!
//! `send` fails with `NoPeers` when nobody is connected and with
//! `AllPeersBusy` when every peer queue is at its high-water mark.

use crate::codec::Frame;
use crate::driver::{HandlerFuture, SocketHandler};
use crate::engine::{EngineCore, PatternEngine};
use crate::mechanism::Mechanism;
use crate::socket::{SocketReader, SocketWriter, ZmtpSocket};
use crate::socket_type::SocketType;
use async_trait::async_trait;
use bytes::Bytes;
use flume::{Receiver, Sender, TrySendError};
use futures::future::{select, Either};
use parking_lot::{Mutex, RwLock};
use pipemq_core::cancel::CancelToken;
use pipemq_core::endpoint::Endpoint;
use pipemq_core::error::{Error, Result};
use pipemq_core::monitor::EventBus;
use pipemq_core::options::SocketOptions;
use pipemq_core::transport::Transport;
use std::collections::BTreeMap;
use std::ops::Bound;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::trace;

type Outbound = Vec<Bytes>;

/// Live peer queues in connection order.
#[derive(Default)]
pub(crate) struct PeerRegistry {
    queues: RwLock<BTreeMap<u64, Sender<Outbound>>>,
    next_index: AtomicU64,
    /// Index of the peer that accepted the last message.
    cursor: Mutex<Option<u64>>,
}

/// Registration of one peer queue; dropping it removes the queue.
pub(crate) struct PeerSlot {
    registry: Rc<PeerRegistry>,
    index: u64,
}

impl Drop for PeerSlot {
    fn drop(&mut self) {
        self.registry.queues.write().remove(&self.index);
        trace!("[PUSH] Peer {} deregistered", self.index);
    }
}

impl PeerRegistry {
    pub(crate) fn register(self: &Rc<Self>, capacity: usize) -> (PeerSlot, Receiver<Outbound>) {
        let (tx, rx) = flume::bounded(capacity);
        let index = self.next_index.fetch_add(1, Ordering::Relaxed);
        self.queues.write().insert(index, tx);
        trace!("[PUSH] Peer {} registered", index);
        (
            PeerSlot {
                registry: self.clone(),
                index,
            },
            rx,
        )
    }

    pub(crate) fn len(&self) -> usize {
        self.queues.read().len()
    }

    /// Hand `parts` to the next peer with room, without waiting.
    pub(crate) fn dispatch(&self, mut parts: Outbound) -> Result<()> {
        let queues = self.queues.read();
        if queues.is_empty() {
            return Err(Error::NoPeers);
        }

        let mut cursor = self.cursor.lock();
        let last = *cursor;
        let after = last.map_or(Bound::Unbounded, Bound::Excluded);
        let wrapped = last.map(|last| queues.range(..=last));
        let candidates = queues
            .range((after, Bound::Unbounded))
            .chain(wrapped.into_iter().flatten());

        for (&index, queue) in candidates {
            match queue.try_send(parts) {
                Ok(()) => {
                    *cursor = Some(index);
                    return Ok(());
                }
                Err(TrySendError::Full(back) | TrySendError::Disconnected(back)) => parts = back,
            }
        }
        Err(Error::AllPeersBusy)
    }
}

/// PUSH socket engine.
pub struct PushEngine {
    core: EngineCore,
    peers: Rc<PeerRegistry>,
}

impl PushEngine {
    pub fn new(
        mechanism: Rc<dyn Mechanism>,
        options: SocketOptions,
        events: Rc<dyn EventBus>,
    ) -> Result<Self> {
        Ok(Self {
            core: EngineCore::new(SocketType::Push, mechanism, options, events)?,
            peers: Rc::new(PeerRegistry::default()),
        })
    }

    /// Register the peer's queue, then drain it onto the wire.
    fn handler(&self) -> SocketHandler {
        let peers = self.peers.clone();
        let capacity = self.core.options().send_hwm;
        Rc::new(move |socket: Box<dyn ZmtpSocket>, cancel: CancelToken| -> HandlerFuture {
            let (slot, queue) = peers.register(capacity);
            Box::pin(pump(socket, queue, cancel, slot))
        })
    }
}

/// Write queued messages to one peer until it goes away or the engine closes.
///
/// The socket is split so one long-lived read runs beside the writes. A
/// closed peer is noticed without waiting for the next write, and no read
/// is ever abandoned halfway through a frame.
async fn pump(
    socket: Box<dyn ZmtpSocket>,
    queue: Receiver<Outbound>,
    cancel: CancelToken,
    _slot: PeerSlot,
) -> Result<()> {
    let (mut reader, mut writer) = socket.into_split();
    let ended = {
        let inbound = watch_inbound(reader.as_mut());
        let outbound = write_queued(writer.as_mut(), &queue);
        futures::pin_mut!(inbound, outbound);
        let finished = cancel.run(select(inbound, outbound)).await.map(|either| match either {
            Either::Left((res, _)) | Either::Right((res, _)) => res,
        });
        finished.unwrap_or(Ok(()))
    };
    let _ = writer.close().await;
    ended
}

/// Read until the peer fails. PULL peers send no messages; commands are logged.
async fn watch_inbound(reader: &mut dyn SocketReader) -> Result<()> {
    loop {
        if let Frame::Command(cmd) = reader.read().await? {
            trace!("[PUSH] Ignoring {} command from {}", cmd.name, reader.peer_addr());
        }
    }
}

async fn write_queued(writer: &mut dyn SocketWriter, queue: &Receiver<Outbound>) -> Result<()> {
    while let Ok(parts) = queue.recv_async().await {
        writer.send_multipart(parts).await?;
    }
    Ok(())
}

#[async_trait(?Send)]
impl PatternEngine for PushEngine {
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

    async fn send(&self, parts: Vec<Bytes>) -> Result<()> {
        self.core.ensure_open()?;
        if parts.is_empty() {
            return Err(Error::EmptyMessage);
        }
        self.peers.dispatch(parts)
    }

    async fn recv(&self) -> Result<Vec<Bytes>> {
        Err(Error::OperationNotPermitted)
    }

    async fn close(&self) -> Result<()> {
        self.core.close().await
    }

    fn last_endpoint(&self) -> Option<Endpoint> {
        self.core.last_endpoint()
    }

    fn peer_count(&self) -> usize {
        self.peers.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{Command, Message};
    use crate::mechanism::NullMechanism;
    use crate::socket::PeerSocket;
    use pipemq_core::cancel::Canceller;
    use pipemq_core::monitor::TracingBus;
    use std::cell::{Cell, RefCell};
    use std::time::Duration;

    /// Reader whose reads never complete; counts how many were started.
    struct SilentReader(Rc<Cell<u32>>);

    #[async_trait(?Send)]
    impl SocketReader for SilentReader {
        async fn read(&mut self) -> Result<Frame> {
            self.0.set(self.0.get() + 1);
            futures::future::pending().await
        }

        fn peer_addr(&self) -> &str {
            "mem://peer"
        }
    }

    struct CollectingWriter(Rc<RefCell<Vec<Outbound>>>);

    #[async_trait(?Send)]
    impl SocketWriter for CollectingWriter {
        async fn send_message(&mut self, msg: Message) -> Result<()> {
            self.0.borrow_mut().push(vec![msg.body]);
            Ok(())
        }

        async fn send_command(&mut self, _cmd: Command) -> Result<()> {
            Ok(())
        }

        async fn send_multipart(&mut self, parts: Vec<Bytes>) -> Result<()> {
            self.0.borrow_mut().push(parts);
            Ok(())
        }

        async fn close(&mut self) -> Result<()> {
            Ok(())
        }

        fn local_addr(&self) -> &str {
            "mem://local"
        }
    }

    fn msg(body: &'static str) -> Outbound {
        vec![Bytes::from_static(body.as_bytes())]
    }

    #[test]
    fn test_dispatch_without_peers() {
        let registry = Rc::new(PeerRegistry::default());
        assert!(matches!(registry.dispatch(msg("a")), Err(Error::NoPeers)));
    }

    #[test]
    fn test_dispatch_rotates_across_peers() {
        let registry = Rc::new(PeerRegistry::default());
        let peers: Vec<_> = (0..3).map(|_| registry.register(10)).collect();

        for body in ["a", "b", "c"] {
            registry.dispatch(msg(body)).unwrap();
        }

        for (_, queue) in &peers {
            assert_eq!(queue.len(), 1, "every peer should get one message");
        }
    }

    #[test]
    fn test_dispatch_skips_full_peer() {
        let registry = Rc::new(PeerRegistry::default());
        let (_a, queue_a) = registry.register(1);
        let (_b, queue_b) = registry.register(1);

        registry.dispatch(msg("1")).unwrap();
        registry.dispatch(msg("2")).unwrap();
        assert_eq!(queue_a.len(), 1);
        assert_eq!(queue_b.len(), 1);

        assert!(matches!(registry.dispatch(msg("3")), Err(Error::AllPeersBusy)));

        queue_b.try_recv().unwrap();
        registry.dispatch(msg("4")).unwrap();
        assert_eq!(queue_b.try_recv().unwrap(), msg("4"));
    }

    #[test]
    fn test_dropped_slot_deregisters() {
        let registry = Rc::new(PeerRegistry::default());
        let (slot, _queue) = registry.register(1);
        assert_eq!(registry.len(), 1);
        drop(slot);
        assert_eq!(registry.len(), 0);
        assert!(matches!(registry.dispatch(msg("a")), Err(Error::NoPeers)));
    }

    #[test]
    fn test_multipart_stays_together() {
        let registry = Rc::new(PeerRegistry::default());
        let (_slot, queue) = registry.register(4);
        let parts = vec![Bytes::from_static(b"a"), Bytes::from_static(b"b")];
        registry.dispatch(parts.clone()).unwrap();
        assert_eq!(queue.try_recv().unwrap(), parts);
    }

    #[compio::test]
    async fn test_pump_keeps_one_read_across_writes() {
        let reads = Rc::new(Cell::new(0));
        let written = Rc::new(RefCell::new(Vec::new()));
        let socket = PeerSocket::new(
            Box::new(SilentReader(reads.clone())),
            Box::new(CollectingWriter(written.clone())),
        );
        let registry = Rc::new(PeerRegistry::default());
        let (slot, queue) = registry.register(8);
        let canceller = Canceller::new();

        let feed = async {
            for body in ["a", "b", "c"] {
                registry.dispatch(msg(body)).unwrap();
                compio::time::sleep(Duration::from_millis(5)).await;
            }
            for _ in 0..100 {
                if written.borrow().len() == 3 {
                    break;
                }
                compio::time::sleep(Duration::from_millis(5)).await;
            }
            canceller.cancel();
        };
        let session = pump(Box::new(socket), queue, canceller.token(), slot);
        let (result, ()) = futures::join!(session, feed);

        assert!(result.is_ok());
        assert_eq!(*written.borrow(), vec![msg("a"), msg("b"), msg("c")]);
        assert_eq!(reads.get(), 1, "the pending read must survive every write");
        assert_eq!(registry.len(), 0);
    }

    #[compio::test]
    async fn test_engine_policy_errors() {
        let engine =
            PushEngine::new(Rc::new(NullMechanism), SocketOptions::default(), Rc::new(TracingBus))
                .unwrap();
        assert!(matches!(engine.recv().await, Err(Error::OperationNotPermitted)));
        assert!(matches!(engine.send(Vec::new()).await, Err(Error::EmptyMessage)));
        assert!(matches!(engine.send(msg("x")).await, Err(Error::NoPeers)));

        engine.close().await.unwrap();
        engine.close().await.unwrap();
        assert!(matches!(engine.send(msg("x")).await, Err(Error::Cancelled)));
    }
}
