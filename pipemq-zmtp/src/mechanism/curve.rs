//! CURVE security mechanism (RFC 26, CurveZMQ)
//!
//! CURVE authenticates the server to the client by its long-term public key,
//! authenticates the client by a vouch signed with its own long-term key, and
//! encrypts every message with per-connection transient keys.
//!
//! ## Protocol Flow
//!
//! ```text
//! C: HELLO    [version][padding][C'][nonce][Box(C'->S)[64 zeros]]
//! S: WELCOME  [nonce][Box(S->C')[S' + cookie]]
//! C: INITIATE [cookie][nonce][Box(C'->S')[C + vouch + metadata]]
//! S: READY    [nonce][Box(S'->C')[metadata]]
//!
//! then MESSAGE [nonce][Box(flags + body)] in both directions
//! ```
//!
//! Boxes are NaCl `crypto_box` (X25519, XSalsa20, Poly1305), laid out as
//! 16-byte tag followed by ciphertext.

use crate::codec::{Command, Frame, Message};
use crate::greeting::Greeting;
use crate::mechanism::{expect_command, Mechanism, MechanismOption};
use crate::metadata::Metadata;
use crate::socket::{PeerSocket, SocketReader, SocketWriter, ZmtpSocket};
use crate::wire::{FrameReader, FrameWriter, FramedStream};
use async_trait::async_trait;
use bytes::{BufMut, Bytes, BytesMut};
use crypto_box::aead::generic_array::GenericArray;
use crypto_box::aead::AeadInPlace;
use crypto_box::{PublicKey, SalsaBox, SecretKey};
use pipemq_core::error::{Error, Result};
use rand::rngs::OsRng;
use rand::RngCore;
use std::fmt;
use tracing::{debug, trace, warn};

/// CURVE key size
pub const CURVE_KEY_SIZE: usize = 32;

const TAG_SIZE: usize = 16;
const NONCE_SIZE: usize = 24;

const HELLO_SIZE: usize = 194;
const WELCOME_SIZE: usize = 160;
const COOKIE_SIZE: usize = 96;
const VOUCH_SIZE: usize = 96;
const INITIATE_MIN_SIZE: usize = COOKIE_SIZE + 8 + TAG_SIZE + CURVE_KEY_SIZE + VOUCH_SIZE;

/// Name prefix of a MESSAGE sent as a data frame.
const MESSAGE_PREFIX: &[u8] = b"\x07MESSAGE";

const HELLO_NONCE: &[u8; 16] = b"CurveZMQHELLO---";
const INITIATE_NONCE: &[u8; 16] = b"CurveZMQINITIATE";
const READY_NONCE: &[u8; 16] = b"CurveZMQREADY---";
const CLIENT_MESSAGE_NONCE: &[u8; 16] = b"CurveZMQMESSAGEC";
const SERVER_MESSAGE_NONCE: &[u8; 16] = b"CurveZMQMESSAGES";
const WELCOME_NONCE: &[u8; 8] = b"WELCOME-";
const COOKIE_NONCE: &[u8; 8] = b"COOKIE--";
const VOUCH_NONCE: &[u8; 8] = b"VOUCH---";

/// CURVE public key (32 bytes)
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct CurvePublicKey([u8; CURVE_KEY_SIZE]);

impl CurvePublicKey {
    pub const fn from_bytes(bytes: [u8; CURVE_KEY_SIZE]) -> Self {
        Self(bytes)
    }

    pub const fn as_bytes(&self) -> &[u8; CURVE_KEY_SIZE] {
        &self.0
    }

    fn to_box_key(self) -> PublicKey {
        PublicKey::from(self.0)
    }
}

impl From<[u8; CURVE_KEY_SIZE]> for CurvePublicKey {
    fn from(bytes: [u8; CURVE_KEY_SIZE]) -> Self {
        Self(bytes)
    }
}

impl fmt::Debug for CurvePublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CurvePublicKey(")?;
        for byte in &self.0[..4] {
            write!(f, "{byte:02x}")?;
        }
        write!(f, "..)")
    }
}

/// CURVE secret key (32 bytes)
#[derive(Clone)]
pub struct CurveSecretKey([u8; CURVE_KEY_SIZE]);

impl CurveSecretKey {
    /// Generate a new random secret key
    pub fn generate() -> Self {
        let mut bytes = [0u8; CURVE_KEY_SIZE];
        OsRng.fill_bytes(&mut bytes);
        Self::from_bytes(bytes)
    }

    pub fn from_bytes(bytes: [u8; CURVE_KEY_SIZE]) -> Self {
        Self(bytes)
    }

    pub fn public_key(&self) -> CurvePublicKey {
        CurvePublicKey(*self.to_box_key().public_key().as_bytes())
    }

    fn to_box_key(&self) -> SecretKey {
        SecretKey::from(self.0)
    }
}

impl fmt::Debug for CurveSecretKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("CurveSecretKey([REDACTED])")
    }
}

/// CURVE key pair (public + secret)
#[derive(Debug, Clone)]
pub struct CurveKeyPair {
    pub public: CurvePublicKey,
    pub secret: CurveSecretKey,
}

impl CurveKeyPair {
    /// Generate a new random key pair
    pub fn generate() -> Self {
        Self::from_secret(CurveSecretKey::generate())
    }

    /// Derive the public half from an existing secret key
    pub fn from_secret(secret: CurveSecretKey) -> Self {
        Self {
            public: secret.public_key(),
            secret,
        }
    }
}

#[derive(Clone)]
enum Role {
    Client {
        keys: CurveKeyPair,
        server: CurvePublicKey,
    },
    Server {
        keys: CurveKeyPair,
    },
}

/// CURVE mechanism, either as client (own keys plus server key) or server.
#[derive(Clone)]
pub struct CurveMechanism {
    role: Role,
}

impl CurveMechanism {
    pub const NAME: &'static str = "CURVE";

    #[must_use]
    pub fn client(keys: CurveKeyPair, server: CurvePublicKey) -> Self {
        Self {
            role: Role::Client { keys, server },
        }
    }

    #[must_use]
    pub fn server(keys: CurveKeyPair) -> Self {
        Self {
            role: Role::Server { keys },
        }
    }

    /// Build from typed options.
    ///
    /// A server needs `CurveServerKeys`; a client needs `CurveClientKeys`
    /// and `CurvePeerKey`. `Server(..)` may be given but must agree.
    pub fn from_options(options: &[MechanismOption]) -> Result<Self> {
        let mut server = None;
        let mut server_keys = None;
        let mut client_keys = None;
        let mut peer_key = None;
        for option in options {
            match option {
                MechanismOption::Server(v) => server = Some(*v),
                MechanismOption::CurveServerKeys(keys) => server_keys = Some(keys.clone()),
                MechanismOption::CurveClientKeys(keys) => client_keys = Some(keys.clone()),
                MechanismOption::CurvePeerKey(key) => peer_key = Some(*key),
                other => {
                    return Err(Error::InvalidOption(format!(
                        "{other:?} is not supported by CURVE"
                    )))
                }
            }
        }

        match (server, server_keys, client_keys, peer_key) {
            (None | Some(true), Some(keys), None, None) => Ok(Self::server(keys)),
            (None | Some(false), None, Some(keys), Some(server)) => Ok(Self::client(keys, server)),
            (Some(true), None, _, _) => Err(Error::InvalidOption(
                "CURVE server requires its key pair".into(),
            )),
            (_, None, Some(_), None) => Err(Error::InvalidOption(
                "CURVE client requires the server public key".into(),
            )),
            (_, None, None, _) => Err(Error::InvalidOption(
                "CURVE requires server keys or client keys".into(),
            )),
            _ => Err(Error::InvalidOption(
                "CURVE server and client options are mutually exclusive".into(),
            )),
        }
    }

    async fn client_handshake(
        keys: &CurveKeyPair,
        server: CurvePublicKey,
        stream: &mut FramedStream,
        local: &Metadata,
    ) -> Result<(Session, Metadata)> {
        let transient = CurveSecretKey::generate();
        let transient_public = transient.public_key();
        let to_server = SalsaBox::new(&server.to_box_key(), &transient.to_box_key());

        // HELLO
        let mut hello = BytesMut::with_capacity(HELLO_SIZE);
        hello.put_slice(&[1, 0]);
        hello.put_bytes(0, 72);
        hello.put_slice(transient_public.as_bytes());
        hello.put_u64(1);
        hello.put_slice(&seal(&to_server, &short_nonce(HELLO_NONCE, 1), &[0u8; 64])?);
        write_command(stream, "HELLO", hello.freeze()).await?;

        // WELCOME
        let welcome = expect_command(stream.read_frame().await?, "WELCOME")?;
        if welcome.body.len() != WELCOME_SIZE {
            return Err(Error::handshake("malformed CURVE WELCOME"));
        }
        let nonce = long_nonce(WELCOME_NONCE, &welcome.body[..16]);
        let opened = open(&to_server, &nonce, &welcome.body[16..])
            .ok_or_else(|| Error::handshake("CURVE WELCOME failed to decrypt"))?;
        let server_transient = CurvePublicKey(key_at(&opened, 0));
        let cookie = &opened[CURVE_KEY_SIZE..];
        let session = SalsaBox::new(&server_transient.to_box_key(), &transient.to_box_key());

        // INITIATE
        let vouch_box = SalsaBox::new(&server_transient.to_box_key(), &keys.secret.to_box_key());
        let vouch_random = random_16();
        let mut vouched = Vec::with_capacity(2 * CURVE_KEY_SIZE);
        vouched.extend_from_slice(transient_public.as_bytes());
        vouched.extend_from_slice(server.as_bytes());
        let mut plaintext = Vec::with_capacity(CURVE_KEY_SIZE + VOUCH_SIZE + 64);
        plaintext.extend_from_slice(keys.public.as_bytes());
        plaintext.extend_from_slice(&vouch_random);
        plaintext.extend_from_slice(&seal(
            &vouch_box,
            &long_nonce(VOUCH_NONCE, &vouch_random),
            &vouched,
        )?);
        plaintext.extend_from_slice(&local.to_bytes());

        let mut initiate = BytesMut::with_capacity(COOKIE_SIZE + 8 + TAG_SIZE + plaintext.len());
        initiate.put_slice(cookie);
        initiate.put_u64(2);
        initiate.put_slice(&seal(&session, &short_nonce(INITIATE_NONCE, 2), &plaintext)?);
        write_command(stream, "INITIATE", initiate.freeze()).await?;

        // READY
        let ready = expect_command(stream.read_frame().await?, "READY")?;
        if ready.body.len() < 8 + TAG_SIZE {
            return Err(Error::handshake("malformed CURVE READY"));
        }
        let ready_nonce = nonce_at(&ready.body);
        let metadata = open(&session, &short_nonce(READY_NONCE, ready_nonce), &ready.body[8..])
            .ok_or_else(|| Error::handshake("CURVE READY failed to decrypt"))?;
        let peer_meta = Metadata::parse(&Bytes::from(metadata))?;
        debug!("[CURVE CLIENT] Handshake complete with {}", stream.peer_addr());

        let session = Session {
            peer: server_transient,
            secret: transient,
            send_prefix: CLIENT_MESSAGE_NONCE,
            recv_prefix: SERVER_MESSAGE_NONCE,
            next_nonce: 3,
            peer_nonce: ready_nonce,
        };
        Ok((session, peer_meta))
    }

    async fn server_handshake(
        keys: &CurveKeyPair,
        stream: &mut FramedStream,
        local: &Metadata,
    ) -> Result<(Session, Metadata)> {
        let peer = stream.peer_addr().to_string();

        // HELLO
        let hello = expect_command(stream.read_frame().await?, "HELLO")?;
        if hello.body.len() != HELLO_SIZE {
            return reject(stream, "malformed HELLO").await;
        }
        if hello.body[..2] != [1, 0] {
            return reject(stream, "unsupported CURVE version").await;
        }
        let client_transient = CurvePublicKey(key_at(&hello.body, 74));
        let hello_nonce = nonce_at(&hello.body[106..]);
        let from_client = SalsaBox::new(&client_transient.to_box_key(), &keys.secret.to_box_key());
        let hello_box = &hello.body[114..];
        let signature = open(&from_client, &short_nonce(HELLO_NONCE, hello_nonce), hello_box);
        if signature.as_deref() != Some(&[0u8; 64][..]) {
            return reject(stream, "HELLO signature is invalid").await;
        }

        // WELCOME
        let transient = CurveSecretKey::generate();
        let cookie_key = CurveSecretKey::generate();
        let cookie_box =
            SalsaBox::new(&cookie_key.public_key().to_box_key(), &cookie_key.to_box_key());
        let mut cookie_plain = Vec::with_capacity(2 * CURVE_KEY_SIZE);
        cookie_plain.extend_from_slice(client_transient.as_bytes());
        cookie_plain.extend_from_slice(&transient.0);
        let cookie_random = random_16();
        let mut cookie = Vec::with_capacity(COOKIE_SIZE);
        cookie.extend_from_slice(&cookie_random);
        cookie.extend_from_slice(&seal(
            &cookie_box,
            &long_nonce(COOKIE_NONCE, &cookie_random),
            &cookie_plain,
        )?);

        let mut welcome_plain = Vec::with_capacity(CURVE_KEY_SIZE + COOKIE_SIZE);
        welcome_plain.extend_from_slice(transient.public_key().as_bytes());
        welcome_plain.extend_from_slice(&cookie);
        let welcome_random = random_16();
        let mut welcome = BytesMut::with_capacity(WELCOME_SIZE);
        welcome.put_slice(&welcome_random);
        welcome.put_slice(&seal(
            &from_client,
            &long_nonce(WELCOME_NONCE, &welcome_random),
            &welcome_plain,
        )?);
        write_command(stream, "WELCOME", welcome.freeze()).await?;

        // INITIATE
        let initiate = expect_command(stream.read_frame().await?, "INITIATE")?;
        if initiate.body.len() < INITIATE_MIN_SIZE {
            return reject(stream, "malformed INITIATE").await;
        }
        let echoed = &initiate.body[..COOKIE_SIZE];
        let cookie_ok = open(&cookie_box, &long_nonce(COOKIE_NONCE, &echoed[..16]), &echoed[16..])
            .is_some_and(|plain| plain == cookie_plain);
        if !cookie_ok {
            return reject(stream, "INITIATE cookie is invalid").await;
        }

        let initiate_nonce = nonce_at(&initiate.body[COOKIE_SIZE..]);
        let session = SalsaBox::new(&client_transient.to_box_key(), &transient.to_box_key());
        let Some(plain) = open(
            &session,
            &short_nonce(INITIATE_NONCE, initiate_nonce),
            &initiate.body[COOKIE_SIZE + 8..],
        ) else {
            return reject(stream, "INITIATE failed to decrypt").await;
        };

        let client_long = CurvePublicKey(key_at(&plain, 0));
        let vouch = &plain[CURVE_KEY_SIZE..CURVE_KEY_SIZE + VOUCH_SIZE];
        let vouch_box = SalsaBox::new(&client_long.to_box_key(), &transient.to_box_key());
        let mut expected = Vec::with_capacity(2 * CURVE_KEY_SIZE);
        expected.extend_from_slice(client_transient.as_bytes());
        expected.extend_from_slice(keys.public.as_bytes());
        let vouch_ok = open(&vouch_box, &long_nonce(VOUCH_NONCE, &vouch[..16]), &vouch[16..])
            .is_some_and(|plain| plain == expected);
        if !vouch_ok {
            return reject(stream, "INITIATE vouch is invalid").await;
        }
        let peer_meta = Metadata::parse(&Bytes::copy_from_slice(
            &plain[CURVE_KEY_SIZE + VOUCH_SIZE..],
        ))?;
        debug!("[CURVE SERVER] Accepted client {:?} from {}", client_long, peer);

        // READY
        let mut ready = BytesMut::new();
        ready.put_u64(1);
        ready.put_slice(&seal(&session, &short_nonce(READY_NONCE, 1), &local.to_bytes())?);
        write_command(stream, "READY", ready.freeze()).await?;

        let session = Session {
            peer: client_transient,
            secret: transient,
            send_prefix: SERVER_MESSAGE_NONCE,
            recv_prefix: CLIENT_MESSAGE_NONCE,
            next_nonce: 2,
            peer_nonce: initiate_nonce,
        };
        Ok((session, peer_meta))
    }
}

#[async_trait(?Send)]
impl Mechanism for CurveMechanism {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn as_server(&self) -> bool {
        matches!(self.role, Role::Server { .. })
    }

    fn validate_greeting(&self, peer: &Greeting) -> Result<()> {
        if peer.as_server == self.as_server() {
            let role = if peer.as_server { "server" } else { "client" };
            return Err(Error::handshake(format!("both CURVE peers are {role}s")));
        }
        Ok(())
    }

    async fn handshake(
        &self,
        mut stream: FramedStream,
        local: &Metadata,
    ) -> Result<(Box<dyn ZmtpSocket>, Metadata)> {
        let (session, peer_meta) = match &self.role {
            Role::Client { keys, server } => {
                Self::client_handshake(keys, *server, &mut stream, local).await?
            }
            Role::Server { keys } => Self::server_handshake(keys, &mut stream, local).await?,
        };
        let (reader, writer) = session.wrap(stream);
        Ok((Box::new(PeerSocket::new(reader, writer)), peer_meta))
    }
}

/// Transient keys and nonce state agreed by a finished handshake.
struct Session {
    peer: CurvePublicKey,
    secret: CurveSecretKey,
    send_prefix: &'static [u8; 16],
    recv_prefix: &'static [u8; 16],
    next_nonce: u64,
    peer_nonce: u64,
}

impl Session {
    fn cipher(&self) -> SalsaBox {
        SalsaBox::new(&self.peer.to_box_key(), &self.secret.to_box_key())
    }

    fn wrap(self, stream: FramedStream) -> (Box<dyn SocketReader>, Box<dyn SocketWriter>) {
        let (frames_in, frames_out) = stream.into_split();
        let reader = CurveReader {
            inner: frames_in,
            cipher: self.cipher(),
            prefix: self.recv_prefix,
            last_nonce: self.peer_nonce,
        };
        let writer = CurveWriter {
            inner: frames_out,
            cipher: self.cipher(),
            prefix: self.send_prefix,
            next_nonce: self.next_nonce,
        };
        (Box::new(reader), Box::new(writer))
    }
}

/// Inbound half: opens MESSAGE boxes and enforces increasing nonces.
pub struct CurveReader {
    inner: FrameReader,
    cipher: SalsaBox,
    prefix: &'static [u8; 16],
    last_nonce: u64,
}

impl CurveReader {
    fn open_message(&mut self, boxed: &[u8]) -> Result<Message> {
        if boxed.len() < 8 + TAG_SIZE + 1 {
            return Err(Error::Protocol("CURVE MESSAGE is too short".into()));
        }
        let nonce = nonce_at(boxed);
        if nonce <= self.last_nonce {
            return Err(Error::Protocol(format!(
                "CURVE MESSAGE nonce {nonce} is not above {}",
                self.last_nonce
            )));
        }
        let mut plain = open(&self.cipher, &short_nonce(self.prefix, nonce), &boxed[8..])
            .ok_or_else(|| Error::Protocol("CURVE MESSAGE failed to decrypt".into()))?;
        self.last_nonce = nonce;
        if plain.is_empty() {
            return Err(Error::Protocol("CURVE MESSAGE is missing its flags".into()));
        }
        let flags = plain.remove(0);
        Ok(Message::new(plain, flags & 0x01 != 0))
    }
}

#[async_trait(?Send)]
impl SocketReader for CurveReader {
    async fn read(&mut self) -> Result<Frame> {
        match self.inner.read_frame().await? {
            Frame::Message(msg) => match msg.body.strip_prefix(MESSAGE_PREFIX) {
                Some(boxed) if !msg.more => self.open_message(boxed).map(Frame::Message),
                _ => Err(Error::Protocol(format!(
                    "unencrypted message from CURVE peer {}",
                    self.inner.peer_addr()
                ))),
            },
            Frame::Command(cmd) if cmd.is("MESSAGE") => {
                self.open_message(&cmd.body).map(Frame::Message)
            }
            Frame::Command(cmd) => {
                trace!("[CURVE] Passing through {} command", cmd.name);
                Ok(Frame::Command(cmd))
            }
        }
    }

    fn peer_addr(&self) -> &str {
        self.inner.peer_addr()
    }
}

/// Outbound half: boxes each message part under the next nonce.
pub struct CurveWriter {
    inner: FrameWriter,
    cipher: SalsaBox,
    prefix: &'static [u8; 16],
    next_nonce: u64,
}

impl CurveWriter {
    fn seal_message(&mut self, msg: &Message) -> Result<Frame> {
        let nonce = self.next_nonce;
        self.next_nonce = nonce
            .checked_add(1)
            .ok_or_else(|| Error::Protocol("CURVE nonce space exhausted".into()))?;

        let mut plain = Vec::with_capacity(1 + msg.body.len());
        plain.push(u8::from(msg.more));
        plain.extend_from_slice(&msg.body);

        let boxed = seal(&self.cipher, &short_nonce(self.prefix, nonce), &plain)?;
        let mut body = BytesMut::with_capacity(MESSAGE_PREFIX.len() + 8 + boxed.len());
        body.put_slice(MESSAGE_PREFIX);
        body.put_u64(nonce);
        body.put_slice(&boxed);
        Ok(Frame::Message(Message::new(body.freeze(), false)))
    }
}

#[async_trait(?Send)]
impl SocketWriter for CurveWriter {
    async fn send_message(&mut self, msg: Message) -> Result<()> {
        let frame = self.seal_message(&msg)?;
        self.inner.write_frame(&frame).await
    }

    async fn send_command(&mut self, cmd: Command) -> Result<()> {
        self.inner.write_frame(&Frame::Command(cmd)).await
    }

    /// All boxed parts go out in one transport write.
    async fn send_multipart(&mut self, parts: Vec<Bytes>) -> Result<()> {
        let frames = Message::multipart(parts)
            .iter()
            .map(|msg| self.seal_message(msg))
            .collect::<Result<Vec<_>>>()?;
        self.inner.write_frames(&frames).await
    }

    async fn close(&mut self) -> Result<()> {
        self.inner.shutdown().await
    }

    fn local_addr(&self) -> &str {
        self.inner.local_addr()
    }
}

async fn write_command(stream: &mut FramedStream, name: &str, body: Bytes) -> Result<()> {
    let cmd = Command::new(name, body)?;
    stream.write_frame(&Frame::Command(cmd)).await
}

async fn reject<T>(stream: &mut FramedStream, reason: &str) -> Result<T> {
    warn!("[CURVE SERVER] Rejected {}: {}", stream.peer_addr(), reason);
    stream.write_frame(&Frame::Command(Command::error(reason))).await?;
    Err(Error::handshake(format!("CURVE {reason}")))
}

fn seal(cipher: &SalsaBox, nonce: &[u8; NONCE_SIZE], plain: &[u8]) -> Result<Vec<u8>> {
    let mut out = vec![0u8; TAG_SIZE + plain.len()];
    out[TAG_SIZE..].copy_from_slice(plain);
    let tag = cipher
        .encrypt_in_place_detached(GenericArray::from_slice(nonce), b"", &mut out[TAG_SIZE..])
        .map_err(|_| Error::Protocol("CURVE encryption failed".into()))?;
    out[..TAG_SIZE].copy_from_slice(tag.as_slice());
    Ok(out)
}

fn open(cipher: &SalsaBox, nonce: &[u8; NONCE_SIZE], boxed: &[u8]) -> Option<Vec<u8>> {
    if boxed.len() < TAG_SIZE {
        return None;
    }
    let (tag, ciphertext) = boxed.split_at(TAG_SIZE);
    let mut plain = ciphertext.to_vec();
    cipher
        .decrypt_in_place_detached(
            GenericArray::from_slice(nonce),
            b"",
            &mut plain,
            GenericArray::from_slice(tag),
        )
        .ok()?;
    Some(plain)
}

fn short_nonce(prefix: &[u8; 16], value: u64) -> [u8; NONCE_SIZE] {
    let mut nonce = [0u8; NONCE_SIZE];
    nonce[..16].copy_from_slice(prefix);
    nonce[16..].copy_from_slice(&value.to_be_bytes());
    nonce
}

fn long_nonce(prefix: &[u8; 8], random: &[u8]) -> [u8; NONCE_SIZE] {
    let mut nonce = [0u8; NONCE_SIZE];
    nonce[..8].copy_from_slice(prefix);
    nonce[8..].copy_from_slice(&random[..16]);
    nonce
}

fn random_16() -> [u8; 16] {
    let mut bytes = [0u8; 16];
    OsRng.fill_bytes(&mut bytes);
    bytes
}

/// Big-endian short nonce in the first 8 bytes of `data`.
fn nonce_at(data: &[u8]) -> u64 {
    let mut raw = [0u8; 8];
    raw.copy_from_slice(&data[..8]);
    u64::from_be_bytes(raw)
}

fn key_at(data: &[u8], offset: usize) -> [u8; CURVE_KEY_SIZE] {
    let mut key = [0u8; CURVE_KEY_SIZE];
    key.copy_from_slice(&data[offset..offset + CURVE_KEY_SIZE]);
    key
}
