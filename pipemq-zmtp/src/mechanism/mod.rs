pub mod curve;
pub mod null;
pub mod plain;

use crate::codec::{Command, Frame};
use crate::greeting::Greeting;
use crate::metadata::Metadata;
use crate::socket::ZmtpSocket;
use crate::wire::FramedStream;
use async_trait::async_trait;
use pipemq_core::error::{Error, Result};
use std::fmt;
use std::rc::Rc;

pub use curve::{CurveKeyPair, CurveMechanism, CurvePublicKey, CurveSecretKey};
pub use null::NullMechanism;
pub use plain::{PlainAuthenticator, PlainCredentials, PlainMechanism, StaticPlainAuthenticator};

/// Trait implemented by each security mechanism.
///
/// A mechanism runs right after the greeting exchange. It owns the stream
/// for the duration of its handshake and hands back a framed socket plus the
/// metadata the peer announced.
#[async_trait(?Send)]
pub trait Mechanism {
    /// Name advertised in the greeting (at most 20 ASCII bytes).
    fn name(&self) -> &'static str;

    /// Whether this side takes the server role.
    fn as_server(&self) -> bool;

    fn local_greeting(&self) -> Result<Greeting> {
        Ok(Greeting::new(self.name(), self.as_server())?)
    }

    /// Check role compatibility with the peer's greeting.
    ///
    /// The mechanism name itself is compared by the caller.
    fn validate_greeting(&self, peer: &Greeting) -> Result<()>;

    async fn handshake(
        &self,
        stream: FramedStream,
        local: &Metadata,
    ) -> Result<(Box<dyn ZmtpSocket>, Metadata)>;
}

/// Typed mechanism configuration, validated by each mechanism's factory.
#[derive(Clone)]
pub enum MechanismOption {
    /// Take the server role during the handshake.
    Server(bool),
    /// PLAIN client credentials.
    PlainCredentials(PlainCredentials),
    /// PLAIN server credential check.
    PlainAuthenticator(Rc<dyn PlainAuthenticator>),
    /// CURVE server long-term key pair.
    CurveServerKeys(CurveKeyPair),
    /// CURVE client long-term key pair.
    CurveClientKeys(CurveKeyPair),
    /// Long-term public key of the CURVE server a client dials.
    CurvePeerKey(CurvePublicKey),
}

impl fmt::Debug for MechanismOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Server(v) => f.debug_tuple("Server").field(v).finish(),
            Self::PlainCredentials(c) => {
                f.debug_tuple("PlainCredentials").field(&c.username).finish()
            }
            Self::PlainAuthenticator(_) => f.write_str("PlainAuthenticator(..)"),
            Self::CurveServerKeys(k) => f.debug_tuple("CurveServerKeys").field(&k.public).finish(),
            Self::CurveClientKeys(k) => f.debug_tuple("CurveClientKeys").field(&k.public).finish(),
            Self::CurvePeerKey(k) => f.debug_tuple("CurvePeerKey").field(k).finish(),
        }
    }
}

/// Expect a command named `name`; an `ERROR` command fails with its reason.
pub(crate) fn expect_command(frame: Frame, name: &str) -> Result<Command> {
    match frame {
        Frame::Command(cmd) if cmd.is(name) => Ok(cmd),
        Frame::Command(cmd) if cmd.is("ERROR") => Err(Error::handshake(format!(
            "peer rejected handshake: {}",
            cmd.error_reason()
        ))),
        Frame::Command(cmd) => Err(Error::handshake(format!(
            "expected {name} command, got {}",
            cmd.name
        ))),
        Frame::Message(_) => Err(Error::handshake(format!(
            "expected {name} command, got a message frame"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::Message;
    use bytes::Bytes;

    #[test]
    fn test_expect_command() {
        let ready = Frame::Command(Command::new("READY", Bytes::new()).unwrap());
        assert!(expect_command(ready, "READY").is_ok());

        let err = expect_command(Frame::Command(Command::error("go away")), "READY").unwrap_err();
        assert!(err.to_string().contains("go away"));

        let err = expect_command(Frame::Message(Message::new(Bytes::new(), false)), "READY");
        assert!(matches!(err, Err(Error::Handshake(_))));
    }
}
