//! Name-to-factory lookup for transports, mechanisms and socket types.

use hashbrown::HashMap;
use pipemq_core::error::{Error, Result};
use pipemq_core::monitor::EventBus;
use pipemq_core::options::SocketOptions;
use pipemq_core::tcp::TcpTransport;
use pipemq_core::transport::Transport;
use pipemq_zmtp::mechanism::{
    CurveMechanism, Mechanism, MechanismOption, NullMechanism, PlainMechanism,
};
use pipemq_zmtp::{PatternEngine, PullEngine, PushEngine, SocketType};
use std::rc::Rc;

/// Builds a configured mechanism from typed options.
pub type MechanismFactory = Rc<dyn Fn(&[MechanismOption]) -> Result<Rc<dyn Mechanism>>>;

/// Builds a pattern engine for one socket type.
pub type EngineFactory = Rc<
    dyn Fn(Rc<dyn Mechanism>, SocketOptions, Rc<dyn EventBus>) -> Result<Box<dyn PatternEngine>>,
>;

/// Registry of the pieces a [`Context`](super::Context) assembles sockets from.
///
/// Registries are plain values: build one, register into it and hand it to a
/// context. Registering a name twice fails with `AlreadyRegistered`.
#[derive(Clone, Default)]
pub struct Registry {
    transports: HashMap<String, Rc<dyn Transport>>,
    mechanisms: HashMap<String, MechanismFactory>,
    engines: HashMap<SocketType, EngineFactory>,
}

impl Registry {
    /// Empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with `tcp` (and `ipc` on Unix), NULL, PLAIN and CURVE, PUSH and PULL.
    #[must_use]
    pub fn standard() -> Self {
        let mut registry = Self::new();

        registry.transports.insert("tcp".into(), Rc::new(TcpTransport));
        #[cfg(unix)]
        registry
            .transports
            .insert("ipc".into(), Rc::new(pipemq_core::ipc::IpcTransport));

        registry.mechanisms.insert(
            NullMechanism::NAME.into(),
            Rc::new(|options: &[MechanismOption]| -> Result<Rc<dyn Mechanism>> {
                Ok(Rc::new(NullMechanism::from_options(options)?))
            }),
        );
        registry.mechanisms.insert(
            PlainMechanism::NAME.into(),
            Rc::new(|options: &[MechanismOption]| -> Result<Rc<dyn Mechanism>> {
                Ok(Rc::new(PlainMechanism::from_options(options)?))
            }),
        );
        registry.mechanisms.insert(
            CurveMechanism::NAME.into(),
            Rc::new(|options: &[MechanismOption]| -> Result<Rc<dyn Mechanism>> {
                Ok(Rc::new(CurveMechanism::from_options(options)?))
            }),
        );

        registry.engines.insert(SocketType::Push, Rc::new(push_engine));
        registry.engines.insert(SocketType::Pull, Rc::new(pull_engine));
        registry
    }

    /// Register a transport under its own scheme.
    pub fn register_transport(&mut self, transport: Rc<dyn Transport>) -> Result<()> {
        let scheme = transport.scheme();
        if self.transports.contains_key(scheme) {
            return Err(Error::AlreadyRegistered(format!("transport {scheme}")));
        }
        self.transports.insert(scheme.to_string(), transport);
        Ok(())
    }

    /// Register a mechanism factory under `name`.
    pub fn register_mechanism(&mut self, name: &str, factory: MechanismFactory) -> Result<()> {
        if self.mechanisms.contains_key(name) {
            return Err(Error::AlreadyRegistered(format!("mechanism {name}")));
        }
        self.mechanisms.insert(name.to_string(), factory);
        Ok(())
    }

    /// Register the engine factory for `socket_type`.
    pub fn register_engine(
        &mut self,
        socket_type: SocketType,
        factory: EngineFactory,
    ) -> Result<()> {
        if self.engines.contains_key(&socket_type) {
            return Err(Error::AlreadyRegistered(format!("socket type {socket_type}")));
        }
        self.engines.insert(socket_type, factory);
        Ok(())
    }

    /// Transport registered for `scheme`.
    pub fn transport(&self, scheme: &str) -> Result<Rc<dyn Transport>> {
        self.transports
            .get(scheme)
            .cloned()
            .ok_or_else(|| Error::TransportNotFound(scheme.to_string()))
    }

    /// Build mechanism `name` with `options`.
    pub fn mechanism(&self, name: &str, options: &[MechanismOption]) -> Result<Rc<dyn Mechanism>> {
        let factory = self
            .mechanisms
            .get(name)
            .ok_or_else(|| Error::MechanismNotFound(name.to_string()))?;
        factory(options)
    }

    /// Build the engine for `socket_type`.
    pub fn engine(
        &self,
        socket_type: SocketType,
        mechanism: Rc<dyn Mechanism>,
        options: SocketOptions,
        events: Rc<dyn EventBus>,
    ) -> Result<Box<dyn PatternEngine>> {
        let factory = self
            .engines
            .get(&socket_type)
            .ok_or_else(|| Error::SocketTypeNotFound(socket_type.to_string()))?;
        factory(mechanism, options, events)
    }

    /// Registered transport schemes, sorted.
    #[must_use]
    pub fn schemes(&self) -> Vec<&str> {
        let mut schemes: Vec<_> = self.transports.keys().map(String::as_str).collect();
        schemes.sort_unstable();
        schemes
    }
}

fn push_engine(
    mechanism: Rc<dyn Mechanism>,
    options: SocketOptions,
    events: Rc<dyn EventBus>,
) -> Result<Box<dyn PatternEngine>> {
    Ok(Box::new(PushEngine::new(mechanism, options, events)?))
}

fn pull_engine(
    mechanism: Rc<dyn Mechanism>,
    options: SocketOptions,
    events: Rc<dyn EventBus>,
) -> Result<Box<dyn PatternEngine>> {
    Ok(Box::new(PullEngine::new(mechanism, options, events)?))
}
