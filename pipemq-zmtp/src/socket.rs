//! Post-handshake framed socket.

use crate::codec::{Command, Frame, Message};
use crate::wire::{FrameReader, FrameWriter, FramedStream};
use async_trait::async_trait;
use bytes::Bytes;
use pipemq_core::error::Result;

/// Framed stream produced by a successful mechanism handshake.
#[async_trait(?Send)]
pub trait ZmtpSocket {
    /// Read the next command or message frame.
    async fn read(&mut self) -> Result<Frame>;

    async fn send_message(&mut self, msg: Message) -> Result<()>;

    async fn send_command(&mut self, cmd: Command) -> Result<()>;

    /// Send every part of a multipart message, setting `more` on all but the last.
    async fn send_multipart(&mut self, parts: Vec<Bytes>) -> Result<()>;

    async fn close(&mut self) -> Result<()>;

    fn local_addr(&self) -> &str;

    fn peer_addr(&self) -> &str;

    /// Separate the inbound and outbound directions.
    fn into_split(self: Box<Self>) -> (Box<dyn SocketReader>, Box<dyn SocketWriter>);
}

/// Inbound direction of a [`ZmtpSocket`].
#[async_trait(?Send)]
pub trait SocketReader {
    async fn read(&mut self) -> Result<Frame>;

    fn peer_addr(&self) -> &str;
}

/// Outbound direction of a [`ZmtpSocket`].
#[async_trait(?Send)]
pub trait SocketWriter {
    async fn send_message(&mut self, msg: Message) -> Result<()>;

    async fn send_command(&mut self, cmd: Command) -> Result<()>;

    async fn send_multipart(&mut self, parts: Vec<Bytes>) -> Result<()> {
        for msg in Message::multipart(parts) {
            self.send_message(msg).await?;
        }
        Ok(())
    }

    async fn close(&mut self) -> Result<()>;

    fn local_addr(&self) -> &str;
}

/// A [`ZmtpSocket`] assembled from one reader and one writer.
///
/// Mechanisms build this from their own halves; NULL and PLAIN use the bare
/// frame halves, CURVE wraps them with encryption.
pub struct PeerSocket {
    reader: Box<dyn SocketReader>,
    writer: Box<dyn SocketWriter>,
}

impl PeerSocket {
    #[must_use]
    pub fn new(reader: Box<dyn SocketReader>, writer: Box<dyn SocketWriter>) -> Self {
        Self { reader, writer }
    }

    /// Socket for mechanisms that leave frames unencrypted.
    #[must_use]
    pub fn plaintext(stream: FramedStream) -> Self {
        let (reader, writer) = stream.into_split();
        Self::new(Box::new(reader), Box::new(writer))
    }
}

#[async_trait(?Send)]
impl ZmtpSocket for PeerSocket {
    async fn read(&mut self) -> Result<Frame> {
        self.reader.read().await
    }

    async fn send_message(&mut self, msg: Message) -> Result<()> {
        self.writer.send_message(msg).await
    }

    async fn send_command(&mut self, cmd: Command) -> Result<()> {
        self.writer.send_command(cmd).await
    }

    async fn send_multipart(&mut self, parts: Vec<Bytes>) -> Result<()> {
        self.writer.send_multipart(parts).await
    }

    async fn close(&mut self) -> Result<()> {
        self.writer.close().await
    }

    fn local_addr(&self) -> &str {
        self.writer.local_addr()
    }

    fn peer_addr(&self) -> &str {
        self.reader.peer_addr()
    }

    fn into_split(self: Box<Self>) -> (Box<dyn SocketReader>, Box<dyn SocketWriter>) {
        (self.reader, self.writer)
    }
}

#[async_trait(?Send)]
impl SocketReader for FrameReader {
    async fn read(&mut self) -> Result<Frame> {
        self.read_frame().await
    }

    fn peer_addr(&self) -> &str {
        FrameReader::peer_addr(self)
    }
}

#[async_trait(?Send)]
impl SocketWriter for FrameWriter {
    async fn send_message(&mut self, msg: Message) -> Result<()> {
        self.write_frame(&Frame::Message(msg)).await
    }

    async fn send_command(&mut self, cmd: Command) -> Result<()> {
        self.write_frame(&Frame::Command(cmd)).await
    }

    /// All parts go out in one transport write.
    async fn send_multipart(&mut self, parts: Vec<Bytes>) -> Result<()> {
        let frames: Vec<Frame> =
            Message::multipart(parts).into_iter().map(Frame::Message).collect();
        self.write_frames(&frames).await
    }

    async fn close(&mut self) -> Result<()> {
        self.shutdown().await
    }

    fn local_addr(&self) -> &str {
        FrameWriter::local_addr(self)
    }
}
