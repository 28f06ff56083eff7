use bytes::{Buf, BufMut, Bytes, BytesMut};
use thiserror::Error;

/// Message frame, more flag set.
pub const FLAG_MORE: u8 = 0x01;
/// Long (8-byte) length field.
pub const FLAG_LONG: u8 = 0x02;
/// Command frame.
pub const FLAG_COMMAND: u8 = 0x04;

/// Largest body that still fits the 1-byte length field.
pub const SHORT_FRAME_MAX: usize = 255;

/// ZMTP protocol errors
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ZmtpError {
    #[error("Invalid frame header: {0:#04x}")]
    InvalidFrameHeader(u8),

    #[error("Protocol violation: frame size too large")]
    SizeTooLarge,

    #[error("Frame of {size} bytes exceeds limit of {max}")]
    FrameTooLarge { size: u64, max: usize },

    #[error("Invalid command size")]
    InvalidCommandSize,

    #[error("Invalid command name length")]
    InvalidNameLength,

    #[error("Command name is not ASCII")]
    InvalidCommandName,

    #[error("Invalid greeting: {0}")]
    InvalidGreeting(&'static str),

    #[error("Invalid metadata: {0}")]
    InvalidMetadata(&'static str),
}

/// Result type alias for ZMTP operations
pub type Result<T> = std::result::Result<T, ZmtpError>;

impl From<ZmtpError> for pipemq_core::error::Error {
    fn from(err: ZmtpError) -> Self {
        Self::Protocol(err.to_string())
    }
}

/// Named control frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    pub name: String,
    pub body: Bytes,
}

impl Command {
    /// Create a command.
    ///
    /// Names longer than 255 bytes cannot be framed and are rejected.
    pub fn new(name: impl Into<String>, body: impl Into<Bytes>) -> Result<Self> {
        let name = name.into();
        if name.is_empty() || name.len() > 255 || !name.is_ascii() {
            return Err(ZmtpError::InvalidNameLength);
        }
        Ok(Self {
            name,
            body: body.into(),
        })
    }

    /// `ERROR` command carrying a human-readable reason (truncated to 255 bytes).
    #[must_use]
    pub fn error(reason: &str) -> Self {
        let reason = &reason.as_bytes()[..reason.len().min(255)];
        let mut body = BytesMut::with_capacity(1 + reason.len());
        body.put_u8(reason.len() as u8);
        body.put_slice(reason);
        Self {
            name: "ERROR".to_string(),
            body: body.freeze(),
        }
    }

    /// Reason carried by an `ERROR` command body.
    #[must_use]
    pub fn error_reason(&self) -> String {
        let reason: &[u8] = match self.body.first() {
            Some(&len) => self.body.get(1..1 + len as usize).unwrap_or(&self.body[1..]),
            None => &[],
        };
        String::from_utf8_lossy(reason).into_owned()
    }

    #[must_use]
    pub fn is(&self, name: &str) -> bool {
        self.name == name
    }

    fn frame_len(&self) -> usize {
        1 + self.name.len() + self.body.len()
    }

    /// Append the wire form to `dst`.
    pub fn encode<B: BufMut>(&self, dst: &mut B) {
        let len = self.frame_len();
        put_header(dst, FLAG_COMMAND, len);
        dst.put_u8(self.name.len() as u8);
        dst.put_slice(self.name.as_bytes());
        dst.put_slice(&self.body);
    }
}

/// Data frame, one part of a multipart message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub more: bool,
    pub body: Bytes,
}

impl Message {
    pub fn new(body: impl Into<Bytes>, more: bool) -> Self {
        Self {
            more,
            body: body.into(),
        }
    }

    /// Split a multipart message into frames: every part but the last carries `more`.
    #[must_use]
    pub fn multipart(parts: Vec<Bytes>) -> Vec<Self> {
        let last = parts.len().saturating_sub(1);
        parts
            .into_iter()
            .enumerate()
            .map(|(i, body)| Self { more: i < last, body })
            .collect()
    }

    /// Append the wire form to `dst`.
    pub fn encode<B: BufMut>(&self, dst: &mut B) {
        let flags = if self.more { FLAG_MORE } else { 0 };
        put_header(dst, flags, self.body.len());
        dst.put_slice(&self.body);
    }
}

/// Either kind of post-greeting frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Command(Command),
    Message(Message),
}

impl Frame {
    pub fn encode<B: BufMut>(&self, dst: &mut B) {
        match self {
            Frame::Command(cmd) => cmd.encode(dst),
            Frame::Message(msg) => msg.encode(dst),
        }
    }

    /// Encoded size in bytes.
    #[must_use]
    pub fn encoded_len(&self) -> usize {
        let body = match self {
            Frame::Command(cmd) => cmd.frame_len(),
            Frame::Message(msg) => msg.body.len(),
        };
        header_len(body) + body
    }
}

impl From<Command> for Frame {
    fn from(cmd: Command) -> Self {
        Frame::Command(cmd)
    }
}

impl From<Message> for Frame {
    fn from(msg: Message) -> Self {
        Frame::Message(msg)
    }
}

#[inline]
const fn header_len(body_len: usize) -> usize {
    if body_len <= SHORT_FRAME_MAX {
        2
    } else {
        9
    }
}

#[inline]
fn put_header<B: BufMut>(dst: &mut B, flags: u8, len: usize) {
    if len <= SHORT_FRAME_MAX {
        dst.put_u8(flags);
        dst.put_u8(len as u8);
    } else {
        dst.put_u8(flags | FLAG_LONG);
        dst.put_u64(len as u64);
    }
}

/// Sans-IO frame decoder.
///
/// Bytes are accumulated by the caller in a `BytesMut`; `decode` consumes
/// exactly one frame once it is complete and leaves partial input untouched.
#[derive(Debug, Clone, Default)]
pub struct ZmtpDecoder {
    max_frame_size: Option<usize>,
}

impl ZmtpDecoder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject frames whose body exceeds `max`.
    #[must_use]
    pub const fn with_max_frame_size(max: Option<usize>) -> Self {
        Self {
            max_frame_size: max,
        }
    }

    /// Decode a single frame from `src`
    ///
    /// Returns:
    /// - Ok(Some(frame)) → frame decoded
    /// - Ok(None) → need more data
    /// - Err → protocol violation
    pub fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Frame>> {
        let Some(&flags) = src.first() else {
            return Ok(None);
        };

        let is_command = match flags {
            0x00..=0x03 => false,
            0x04 | 0x06 => true,
            other => return Err(ZmtpError::InvalidFrameHeader(other)),
        };
        let is_long = (flags & FLAG_LONG) != 0;
        let header_len = if is_long { 9 } else { 2 };

        if src.len() < header_len {
            return Ok(None);
        }

        let body_len = if is_long {
            let mut buf = &src[1..9];
            let size = buf.get_u64();

            // MSB must be zero in ZMTP 3.x
            if size > 0x7FFF_FFFF_FFFF_FFFF {
                return Err(ZmtpError::SizeTooLarge);
            }
            size
        } else {
            u64::from(src[1])
        };

        if let Some(max) = self.max_frame_size {
            if body_len > max as u64 {
                return Err(ZmtpError::FrameTooLarge {
                    size: body_len,
                    max,
                });
            }
        }
        let body_len = usize::try_from(body_len)
            .ok()
            .filter(|&len| len <= isize::MAX as usize - header_len)
            .ok_or(ZmtpError::SizeTooLarge)?;

        // Never reserve from the announced length.
        let total_len = header_len + body_len;
        if src.len() < total_len {
            return Ok(None);
        }

        src.advance(header_len);
        let body = src.split_to(body_len).freeze();

        if !is_command {
            return Ok(Some(Frame::Message(Message {
                more: (flags & FLAG_MORE) != 0,
                body,
            })));
        }
        decode_command(body).map(|cmd| Some(Frame::Command(cmd)))
    }
}

fn decode_command(mut body: Bytes) -> Result<Command> {
    if body.is_empty() {
        return Err(ZmtpError::InvalidCommandSize);
    }
    let name_len = body.get_u8() as usize;
    if name_len == 0 || name_len > body.len() {
        return Err(ZmtpError::InvalidNameLength);
    }
    let name = body.split_to(name_len);
    let name = std::str::from_utf8(&name)
        .ok()
        .filter(|n| n.is_ascii())
        .ok_or(ZmtpError::InvalidCommandName)?
        .to_string();
    Ok(Command { name, body })
}
