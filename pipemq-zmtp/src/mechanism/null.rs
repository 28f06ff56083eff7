use crate::codec::{Command, Frame};
use crate::greeting::Greeting;
use crate::mechanism::{expect_command, Mechanism, MechanismOption};
use crate::metadata::Metadata;
use crate::socket::{PeerSocket, ZmtpSocket};
use crate::wire::FramedStream;
use async_trait::async_trait;
use pipemq_core::error::{Error, Result};
use tracing::trace;

/// NULL mechanism for ZMTP 3.x (ZMTP/NULL).
///
/// Handshake logic is symmetric:
/// - send READY with local metadata
/// - read peer READY (an ERROR command aborts)
///
/// Neither side may claim the server role.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullMechanism;

impl NullMechanism {
    pub const NAME: &'static str = "NULL";

    /// Build from typed options. Only `Server(false)` is meaningful.
    pub fn from_options(options: &[MechanismOption]) -> Result<Self> {
        for option in options {
            match option {
                MechanismOption::Server(false) => {}
                other => {
                    return Err(Error::InvalidOption(format!(
                        "{other:?} is not supported by NULL"
                    )))
                }
            }
        }
        Ok(Self)
    }
}

#[async_trait(?Send)]
impl Mechanism for NullMechanism {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn as_server(&self) -> bool {
        false
    }

    fn validate_greeting(&self, peer: &Greeting) -> Result<()> {
        if peer.as_server {
            return Err(Error::handshake("NULL peer must not claim the server role"));
        }
        Ok(())
    }

    async fn handshake(
        &self,
        mut stream: FramedStream,
        local: &Metadata,
    ) -> Result<(Box<dyn ZmtpSocket>, Metadata)> {
        let ready = Command::new("READY", local.to_bytes())?;
        stream.write_frame(&Frame::Command(ready)).await?;

        let peer_ready = expect_command(stream.read_frame().await?, "READY")?;
        let peer_meta = Metadata::parse(&peer_ready.body)?;
        trace!(peer = %stream.peer_addr(), "[NULL] READY exchanged");

        Ok((Box::new(PeerSocket::plaintext(stream)), peer_meta))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::SOCKET_TYPE;
    use crate::wire::testing::ScriptedConnection;
    use bytes::BytesMut;

    fn ready_wire(socket_type: &str) -> Vec<u8> {
        let meta = Metadata::new().with(SOCKET_TYPE, socket_type.to_string()).unwrap();
        let mut wire = BytesMut::new();
        Command::new("READY", meta.to_bytes()).unwrap().encode(&mut wire);
        wire.to_vec()
    }

    #[compio::test]
    async fn test_ready_exchange() {
        let (conn, written) = ScriptedConnection::new(ready_wire("PULL"), 5);
        let stream = FramedStream::new(Box::new(conn), 64, None);
        let local = Metadata::new().with(SOCKET_TYPE, "PUSH").unwrap();

        let (_socket, peer) = NullMechanism.handshake(stream, &local).await.unwrap();
        assert_eq!(peer.socket_type(), Some("PULL"));
        assert_eq!(&written.borrow()[..], &ready_wire("PUSH")[..]);
    }

    #[compio::test]
    async fn test_error_command_fails_handshake() {
        let mut wire = BytesMut::new();
        Command::error("not welcome").encode(&mut wire);
        let (conn, _) = ScriptedConnection::new(wire.to_vec(), 64);
        let stream = FramedStream::new(Box::new(conn), 64, None);

        let err = NullMechanism
            .handshake(stream, &Metadata::new())
            .await
            .err()
            .unwrap();
        assert!(matches!(err, Error::Handshake(reason) if reason.contains("not welcome")));
    }

    #[test]
    fn test_rejects_server_peer() {
        let peer = Greeting::new("NULL", true).unwrap();
        assert!(NullMechanism.validate_greeting(&peer).is_err());
        assert!(NullMechanism
            .validate_greeting(&Greeting::new("NULL", false).unwrap())
            .is_ok());
    }

    #[test]
    fn test_options() {
        assert!(NullMechanism::from_options(&[MechanismOption::Server(false)]).is_ok());
        assert!(matches!(
            NullMechanism::from_options(&[MechanismOption::Server(true)]),
            Err(Error::InvalidOption(_))
        ));
    }
}
