//! Socket factory bound to a registry, default options and an event bus.

use super::registry::Registry;
use super::socket::Socket;
use pipemq_core::error::Result;
use pipemq_core::monitor::{EventBus, TracingBus};
use pipemq_core::options::SocketOptions;
use pipemq_zmtp::mechanism::MechanismOption;
use pipemq_zmtp::SocketType;
use std::rc::Rc;
use tracing::debug;

/// Creates sockets from a [`Registry`].
///
/// Every socket made by one context shares its options and event bus.
/// Events go to [`TracingBus`] unless another bus is set.
#[derive(Clone)]
pub struct Context {
    registry: Rc<Registry>,
    options: SocketOptions,
    events: Rc<dyn EventBus>,
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}

impl Context {
    /// Context over [`Registry::standard`].
    #[must_use]
    pub fn new() -> Self {
        Self::with_registry(Registry::standard())
    }

    /// Context over a custom registry.
    #[must_use]
    pub fn with_registry(registry: Registry) -> Self {
        Self {
            registry: Rc::new(registry),
            options: SocketOptions::default(),
            events: Rc::new(TracingBus),
        }
    }

    /// Options applied to sockets created from now on.
    #[must_use]
    pub fn with_options(mut self, options: SocketOptions) -> Self {
        self.options = options;
        self
    }

    /// Send lifecycle events to `events`, e.g. a monitor channel.
    #[must_use]
    pub fn with_events(mut self, events: Rc<dyn EventBus>) -> Self {
        self.events = events;
        self
    }

    /// Registry sockets are built from.
    #[must_use]
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Options given to new sockets.
    #[must_use]
    pub fn options(&self) -> &SocketOptions {
        &self.options
    }

    /// Create a socket of `socket_type` secured by mechanism `mechanism`.
    ///
    /// # Errors
    ///
    /// `MechanismNotFound`/`SocketTypeNotFound` for unregistered names and
    /// `InvalidOption` when the mechanism rejects `options`.
    pub fn new_socket(
        &self,
        socket_type: SocketType,
        mechanism: &str,
        options: &[MechanismOption],
    ) -> Result<Socket> {
        let mechanism = self.registry.mechanism(mechanism, options)?;
        debug!(
            "[CONTEXT] New {} socket using {}",
            socket_type,
            mechanism.name()
        );
        let engine = self.registry.engine(
            socket_type,
            mechanism,
            self.options.clone(),
            self.events.clone(),
        )?;
        Ok(Socket::new(engine, self.registry.clone()))
    }
}
