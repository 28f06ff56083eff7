//! Pattern engine plumbing shared by PUSH and PULL.
//!
//! [`EngineCore`] owns the per-address drivers of one socket, the
//! cancellation scope they run under and the wait group of any helper tasks
//! the pattern spawns. Pattern engines add their routing state on top and
//! expose it through [`PatternEngine`].

use crate::driver::{BindDriver, ConnectionDriver, SocketHandler};
use crate::handshake::{MetadataValidator, PeerConfig};
use crate::mechanism::Mechanism;
use crate::metadata::{Metadata, SOCKET_TYPE};
use crate::socket_type::SocketType;
use async_trait::async_trait;
use bytes::Bytes;
use hashbrown::HashMap;
use parking_lot::Mutex;
use pipemq_core::cancel::{CancelToken, Canceller};
use pipemq_core::endpoint::Endpoint;
use pipemq_core::error::{Error, Result};
use pipemq_core::monitor::EventBus;
use pipemq_core::options::SocketOptions;
use pipemq_core::transport::Transport;
use pipemq_core::wait::{WaitGroup, WaitGuard};
use std::rc::Rc;
use tracing::{debug, trace};

/// A socket pattern driven by per-address drivers.
#[async_trait(?Send)]
pub trait PatternEngine {
    fn socket_type(&self) -> SocketType;

    /// Start an outbound driver for `endpoint`.
    async fn connect(&self, transport: Rc<dyn Transport>, endpoint: Endpoint) -> Result<()>;

    /// Close the outbound driver for `endpoint`.
    async fn disconnect(&self, endpoint: &Endpoint) -> Result<()>;

    /// Start a listener on `endpoint`; returns the endpoint actually bound.
    async fn bind(&self, transport: Rc<dyn Transport>, endpoint: Endpoint) -> Result<Endpoint>;

    /// Close the listener bound at `endpoint` and every peer it accepted.
    async fn unbind(&self, endpoint: &Endpoint) -> Result<()>;

    async fn send(&self, parts: Vec<Bytes>) -> Result<()>;

    async fn recv(&self) -> Result<Vec<Bytes>>;

    /// Cancel every driver and wait for all workers to exit. Idempotent.
    async fn close(&self) -> Result<()>;

    /// Most recent endpoint successfully connected or bound.
    fn last_endpoint(&self) -> Option<Endpoint>;

    /// Number of peers currently past the handshake.
    fn peer_count(&self) -> usize;
}

enum Slot<D> {
    /// Driver start in progress; reserves the address.
    Pending,
    Live(D),
}

impl<D> Slot<D> {
    fn into_live(self) -> Option<D> {
        match self {
            Slot::Live(driver) => Some(driver),
            Slot::Pending => None,
        }
    }
}

/// Shared handle to an engine's helper-task wait group.
#[derive(Clone)]
pub struct TaskTracker {
    tasks: Rc<Mutex<Option<WaitGroup>>>,
}

impl TaskTracker {
    /// Register a helper task, or `None` once the engine is closing.
    pub fn track(&self) -> Option<WaitGuard> {
        self.tasks.lock().as_ref().map(WaitGroup::add)
    }
}

/// Driver bookkeeping and lifecycle common to every pattern.
pub struct EngineCore {
    socket_type: SocketType,
    peer: Rc<PeerConfig>,
    canceller: Canceller,
    tasks: TaskTracker,
    connections: Mutex<HashMap<String, Slot<ConnectionDriver>>>,
    binds: Mutex<HashMap<String, Slot<BindDriver>>>,
    last_endpoint: Mutex<Option<Endpoint>>,
}

/// Accept peers that declare a type `local` may talk to.
fn socket_type_validator(local: SocketType) -> MetadataValidator {
    Rc::new(move |meta: &Metadata| {
        let declared = meta
            .socket_type()
            .ok_or_else(|| Error::handshake("peer did not declare a Socket-Type"))?;
        let peer: SocketType = declared
            .parse()
            .map_err(|e| Error::handshake(format!("{e}")))?;
        if local.is_compatible(peer) {
            Ok(())
        } else {
            Err(Error::handshake(format!("{local} cannot talk to {peer}")))
        }
    })
}

impl EngineCore {
    pub fn new(
        socket_type: SocketType,
        mechanism: Rc<dyn Mechanism>,
        options: SocketOptions,
        events: Rc<dyn EventBus>,
    ) -> Result<Self> {
        let peer = PeerConfig {
            mechanism,
            options,
            events,
            metadata: Metadata::new().with(SOCKET_TYPE, socket_type.as_str())?,
            validator: socket_type_validator(socket_type),
        };
        Ok(Self {
            socket_type,
            peer: Rc::new(peer),
            canceller: Canceller::new(),
            tasks: TaskTracker {
                tasks: Rc::new(Mutex::new(Some(WaitGroup::new()))),
            },
            connections: Mutex::new(HashMap::new()),
            binds: Mutex::new(HashMap::new()),
            last_endpoint: Mutex::new(None),
        })
    }

    #[must_use]
    pub fn socket_type(&self) -> SocketType {
        self.socket_type
    }

    #[must_use]
    pub fn options(&self) -> &SocketOptions {
        &self.peer.options
    }

    /// Token cancelled when the engine closes.
    #[must_use]
    pub fn token(&self) -> CancelToken {
        self.canceller.token()
    }

    #[must_use]
    pub fn tasks(&self) -> TaskTracker {
        self.tasks.clone()
    }

    pub fn ensure_open(&self) -> Result<()> {
        if self.canceller.is_cancelled() {
            return Err(Error::Cancelled);
        }
        Ok(())
    }

    #[must_use]
    pub fn last_endpoint(&self) -> Option<Endpoint> {
        self.last_endpoint.lock().clone()
    }

    pub async fn connect(
        &self,
        transport: Rc<dyn Transport>,
        endpoint: Endpoint,
        handler: SocketHandler,
    ) -> Result<()> {
        self.ensure_open()?;
        let key = endpoint.to_string();
        {
            let mut connections = self.connections.lock();
            if connections.contains_key(&key) {
                return Err(Error::AlreadyConnected(key));
            }
            connections.insert(key.clone(), Slot::Pending);
        }

        let started = ConnectionDriver::start(
            self.peer.clone(),
            transport,
            endpoint.clone(),
            handler,
            &self.token(),
        )
        .await;

        let driver = match started {
            Ok(driver) => driver,
            Err(e) => {
                self.connections.lock().remove(&key);
                return Err(e);
            }
        };
        if self.canceller.is_cancelled() {
            // close() ran while the first attempt was in flight
            let _ = driver.close().await;
            return Err(Error::Cancelled);
        }
        self.connections.lock().insert(key, Slot::Live(driver));
        *self.last_endpoint.lock() = Some(endpoint.clone());
        debug!("[{}] Connected to {}", self.socket_type, endpoint);
        Ok(())
    }

    pub async fn disconnect(&self, endpoint: &Endpoint) -> Result<()> {
        self.ensure_open()?;
        let key = endpoint.to_string();
        let driver = {
            let mut connections = self.connections.lock();
            match connections.get(&key) {
                Some(Slot::Live(_)) => connections.remove(&key).and_then(Slot::into_live),
                _ => None,
            }
        };
        let driver = driver.ok_or(Error::NeverConnected(key))?;
        debug!("[{}] Disconnecting from {}", self.socket_type, endpoint);
        driver.close().await
    }

    /// Bind and register the listener under the endpoint it actually bound.
    pub async fn bind(
        &self,
        transport: Rc<dyn Transport>,
        endpoint: Endpoint,
        handler: SocketHandler,
    ) -> Result<Endpoint> {
        self.ensure_open()?;
        let requested = endpoint.to_string();
        {
            let mut binds = self.binds.lock();
            if binds.contains_key(&requested) {
                return Err(Error::AlreadyBound(requested));
            }
            binds.insert(requested.clone(), Slot::Pending);
        }

        let token = self.token();
        let started =
            BindDriver::start(self.peer.clone(), transport, &endpoint, handler, &token).await;
        self.binds.lock().remove(&requested);

        let driver = started?;
        if self.canceller.is_cancelled() {
            let _ = driver.close().await;
            return Err(Error::Cancelled);
        }
        let bound = driver.endpoint().clone();
        self.binds.lock().insert(bound.to_string(), Slot::Live(driver));
        *self.last_endpoint.lock() = Some(bound.clone());
        debug!("[{}] Bound to {}", self.socket_type, bound);
        Ok(bound)
    }

    pub async fn unbind(&self, endpoint: &Endpoint) -> Result<()> {
        self.ensure_open()?;
        let key = endpoint.to_string();
        let driver = {
            let mut binds = self.binds.lock();
            match binds.get(&key) {
                Some(Slot::Live(_)) => binds.remove(&key).and_then(Slot::into_live),
                _ => None,
            }
        };
        let driver = driver.ok_or(Error::NeverBound(key))?;
        debug!("[{}] Unbinding {}", self.socket_type, endpoint);
        driver.close().await
    }

    pub async fn close(&self) -> Result<()> {
        let Some(tasks) = self.tasks.tasks.lock().take() else {
            return Ok(());
        };
        self.canceller.cancel();

        let connections: Vec<_> = self
            .connections
            .lock()
            .drain()
            .filter_map(|(_, slot)| slot.into_live())
            .collect();
        let binds: Vec<_> = self
            .binds
            .lock()
            .drain()
            .filter_map(|(_, slot)| slot.into_live())
            .collect();

        for driver in connections {
            let endpoint = driver.endpoint().to_string();
            if let Err(e) = driver.close().await {
                trace!("[{}] Driver for {} had stopped: {}", self.socket_type, endpoint, e);
            }
        }
        for driver in binds {
            let _ = driver.close().await;
        }

        tasks.wait().await;
        debug!("[{}] Closed", self.socket_type);
        Ok(())
    }
}
