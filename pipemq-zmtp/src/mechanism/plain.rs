//! PLAIN authentication mechanism (RFC 23)
//!
//! PLAIN provides simple username/password authentication.
//!
//! ## Security Warning
//!
//! PLAIN sends credentials in cleartext! Only use over loopback, IPC or an
//! otherwise trusted network.
//!
//! ## Protocol Flow
//!
//! ```text
//! C: HELLO    [u8 len][username][u8 len][password]
//! S: WELCOME  (empty) | ERROR [u8 len][reason]
//! C: INITIATE [metadata]
//! S: READY    [metadata]
//! ```

use crate::codec::{Command, Frame};
use crate::greeting::Greeting;
use crate::mechanism::{expect_command, Mechanism, MechanismOption};
use crate::metadata::Metadata;
use crate::socket::{PeerSocket, ZmtpSocket};
use crate::wire::FramedStream;
use async_trait::async_trait;
use bytes::{Buf, BufMut, Bytes, BytesMut};
use hashbrown::HashMap;
use pipemq_core::error::{Error, Result};
use std::rc::Rc;
use tracing::{debug, warn};

/// PLAIN client credentials
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlainCredentials {
    pub username: String,
    pub password: String,
}

impl PlainCredentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    fn encode_hello(&self) -> Result<Bytes> {
        let (user, pass) = (self.username.as_bytes(), self.password.as_bytes());
        if user.len() > 255 || pass.len() > 255 {
            return Err(Error::InvalidOption(
                "PLAIN username and password must be at most 255 bytes".into(),
            ));
        }
        let mut body = BytesMut::with_capacity(2 + user.len() + pass.len());
        body.put_u8(user.len() as u8);
        body.put_slice(user);
        body.put_u8(pass.len() as u8);
        body.put_slice(pass);
        Ok(body.freeze())
    }

    fn decode_hello(mut body: Bytes) -> Result<Self> {
        let mut field = |what: &str| -> Result<String> {
            if body.is_empty() {
                return Err(Error::handshake(format!("HELLO missing {what}")));
            }
            let len = body.get_u8() as usize;
            if body.len() < len {
                return Err(Error::handshake(format!("HELLO {what} truncated")));
            }
            Ok(String::from_utf8_lossy(&body.split_to(len)).into_owned())
        };
        let username = field("username")?;
        let password = field("password")?;
        Ok(Self { username, password })
    }
}

/// PLAIN authentication handler trait
///
/// Implement this to provide custom credential validation.
#[async_trait(?Send)]
pub trait PlainAuthenticator {
    /// Validate username and password
    ///
    /// # Returns
    /// * `Ok(user_id)` - Authentication successful
    /// * `Err(reason)` - Authentication failed, the reason is sent to the peer
    async fn authenticate(
        &self,
        username: &str,
        password: &str,
        address: &str,
    ) -> std::result::Result<String, String>;
}

/// Simple credential map handler
///
/// Validates against a static map of username → password.
#[derive(Debug, Clone, Default)]
pub struct StaticPlainAuthenticator {
    credentials: HashMap<String, String>,
}

impl StaticPlainAuthenticator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_user(&mut self, username: impl Into<String>, password: impl Into<String>) {
        self.credentials.insert(username.into(), password.into());
    }

    #[must_use]
    pub fn with_user(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.add_user(username, password);
        self
    }
}

#[async_trait(?Send)]
impl PlainAuthenticator for StaticPlainAuthenticator {
    async fn authenticate(
        &self,
        username: &str,
        password: &str,
        _address: &str,
    ) -> std::result::Result<String, String> {
        match self.credentials.get(username) {
            Some(expected_password) if expected_password == password => Ok(username.to_string()),
            Some(_) => Err("Invalid password".to_string()),
            None => Err("Unknown user".to_string()),
        }
    }
}

#[derive(Clone)]
enum Role {
    Client(PlainCredentials),
    Server(Rc<dyn PlainAuthenticator>),
}

/// PLAIN mechanism, either as client (credentials) or server (authenticator).
#[derive(Clone)]
pub struct PlainMechanism {
    role: Role,
}

impl PlainMechanism {
    pub const NAME: &'static str = "PLAIN";

    #[must_use]
    pub fn client(credentials: PlainCredentials) -> Self {
        Self {
            role: Role::Client(credentials),
        }
    }

    #[must_use]
    pub fn server(authenticator: Rc<dyn PlainAuthenticator>) -> Self {
        Self {
            role: Role::Server(authenticator),
        }
    }

    /// Build from typed options.
    ///
    /// `Server(true)` requires an authenticator; otherwise credentials are required.
    pub fn from_options(options: &[MechanismOption]) -> Result<Self> {
        let mut server = false;
        let mut credentials = None;
        let mut authenticator = None;
        for option in options {
            match option {
                MechanismOption::Server(v) => server = *v,
                MechanismOption::PlainCredentials(c) => credentials = Some(c.clone()),
                MechanismOption::PlainAuthenticator(a) => authenticator = Some(a.clone()),
                other => {
                    return Err(Error::InvalidOption(format!(
                        "{other:?} is not supported by PLAIN"
                    )))
                }
            }
        }

        match (server, credentials, authenticator) {
            (true, None, Some(auth)) => Ok(Self::server(auth)),
            (false, Some(creds), None) => {
                creds.encode_hello()?;
                Ok(Self::client(creds))
            }
            (true, _, None) => Err(Error::InvalidOption(
                "PLAIN server requires an authenticator".into(),
            )),
            (false, None, _) => Err(Error::InvalidOption(
                "PLAIN client requires credentials".into(),
            )),
            _ => Err(Error::InvalidOption(
                "PLAIN credentials and authenticator are mutually exclusive".into(),
            )),
        }
    }

    async fn client_handshake(
        creds: &PlainCredentials,
        stream: &mut FramedStream,
        local: &Metadata,
    ) -> Result<Metadata> {
        debug!("[PLAIN CLIENT] Authenticating as {}", creds.username);
        let hello = Command::new("HELLO", creds.encode_hello()?)?;
        stream.write_frame(&Frame::Command(hello)).await?;
        expect_command(stream.read_frame().await?, "WELCOME")?;

        let initiate = Command::new("INITIATE", local.to_bytes())?;
        stream.write_frame(&Frame::Command(initiate)).await?;
        let ready = expect_command(stream.read_frame().await?, "READY")?;
        Ok(Metadata::parse(&ready.body)?)
    }

    async fn server_handshake(
        auth: &dyn PlainAuthenticator,
        stream: &mut FramedStream,
        local: &Metadata,
    ) -> Result<Metadata> {
        let hello = expect_command(stream.read_frame().await?, "HELLO")?;
        let creds = PlainCredentials::decode_hello(hello.body)?;

        let peer = stream.peer_addr().to_string();
        if let Err(reason) = auth.authenticate(&creds.username, &creds.password, &peer).await {
            warn!("[PLAIN SERVER] Rejected {} from {}: {}", creds.username, peer, reason);
            stream.write_frame(&Frame::Command(Command::error(&reason))).await?;
            return Err(Error::handshake(format!("authentication failed: {reason}")));
        }
        debug!("[PLAIN SERVER] Accepted {} from {}", creds.username, peer);

        stream
            .write_frame(&Frame::Command(Command::new("WELCOME", Bytes::new())?))
            .await?;
        let initiate = expect_command(stream.read_frame().await?, "INITIATE")?;
        let peer_meta = Metadata::parse(&initiate.body)?;

        let ready = Command::new("READY", local.to_bytes())?;
        stream.write_frame(&Frame::Command(ready)).await?;
        Ok(peer_meta)
    }
}

#[async_trait(?Send)]
impl Mechanism for PlainMechanism {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn as_server(&self) -> bool {
        matches!(self.role, Role::Server(_))
    }

    fn validate_greeting(&self, peer: &Greeting) -> Result<()> {
        if peer.as_server == self.as_server() {
            let role = if peer.as_server { "server" } else { "client" };
            return Err(Error::handshake(format!("both PLAIN peers are {role}s")));
        }
        Ok(())
    }

    async fn handshake(
        &self,
        mut stream: FramedStream,
        local: &Metadata,
    ) -> Result<(Box<dyn ZmtpSocket>, Metadata)> {
        let peer_meta = match &self.role {
            Role::Client(creds) => Self::client_handshake(creds, &mut stream, local).await?,
            Role::Server(auth) => Self::server_handshake(auth.as_ref(), &mut stream, local).await?,
        };
        Ok((Box::new(PeerSocket::plaintext(stream)), peer_meta))
    }
}
