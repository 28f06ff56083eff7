//! Buffered greeting and frame I/O over a transport connection.

use crate::codec::{Frame, ZmtpDecoder};
use crate::greeting::{Greeting, GREETING_SIZE};
use bytes::BytesMut;
use compio::buf::BufResult;
use pipemq_core::error::{Error, Result};
use pipemq_core::transport::{Connection, ConnectionReader, ConnectionWriter};
use std::io;
use tracing::trace;

/// Connection plus receive buffer and decoder.
///
/// The stream can be taken apart with [`into_split`](Self::into_split) once
/// the handshake is over, so frames can be read and written concurrently.
pub struct FramedStream {
    reader: FrameReader,
    writer: FrameWriter,
}

/// Read direction of a [`FramedStream`].
pub struct FrameReader {
    conn: Box<dyn ConnectionReader>,
    recv: BytesMut,
    decoder: ZmtpDecoder,
    scratch: Vec<u8>,
    read_size: usize,
    peer: String,
}

/// Write direction of a [`FramedStream`].
pub struct FrameWriter {
    conn: Box<dyn ConnectionWriter>,
    local: String,
    peer: String,
}

impl FramedStream {
    #[must_use]
    pub fn new(conn: Box<dyn Connection>, read_size: usize, max_frame_size: Option<usize>) -> Self {
        let local = conn.local_addr().to_string();
        let peer = conn.peer_addr().to_string();
        let (read_half, write_half) = conn.into_split();
        Self {
            reader: FrameReader {
                conn: read_half,
                recv: BytesMut::with_capacity(read_size),
                decoder: ZmtpDecoder::with_max_frame_size(max_frame_size),
                scratch: Vec::with_capacity(read_size),
                read_size,
                peer: peer.clone(),
            },
            writer: FrameWriter {
                conn: write_half,
                local,
                peer,
            },
        }
    }

    #[must_use]
    pub fn local_addr(&self) -> &str {
        self.writer.local_addr()
    }

    #[must_use]
    pub fn peer_addr(&self) -> &str {
        self.writer.peer_addr()
    }

    pub async fn write_greeting(&mut self, greeting: &Greeting) -> Result<()> {
        self.writer.write(greeting.encode().to_vec()).await
    }

    pub async fn read_greeting(&mut self) -> Result<Greeting> {
        self.reader.read_greeting().await
    }

    pub async fn read_frame(&mut self) -> Result<Frame> {
        self.reader.read_frame().await
    }

    pub async fn write_frame(&mut self, frame: &Frame) -> Result<()> {
        self.writer.write_frame(frame).await
    }

    /// Write several frames with a single transport write.
    pub async fn write_frames(&mut self, frames: &[Frame]) -> Result<()> {
        self.writer.write_frames(frames).await
    }

    pub async fn shutdown(&mut self) -> Result<()> {
        self.writer.shutdown().await
    }

    #[must_use]
    pub fn into_split(self) -> (FrameReader, FrameWriter) {
        (self.reader, self.writer)
    }
}

impl FrameReader {
    #[must_use]
    pub fn peer_addr(&self) -> &str {
        &self.peer
    }

    /// Pull one chunk from the connection into the receive buffer.
    ///
    /// The buffer only ever grows by what was actually read.
    async fn fill(&mut self) -> Result<()> {
        let mut buf = std::mem::take(&mut self.scratch);
        buf.clear();
        buf.reserve(self.read_size);

        let BufResult(res, buf) = self.conn.read(buf).await;
        let n = res?;
        if n == 0 {
            return Err(Error::Io(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "connection closed by peer",
            )));
        }
        self.recv.extend_from_slice(&buf[..n]);
        self.scratch = buf;
        Ok(())
    }

    pub async fn read_greeting(&mut self) -> Result<Greeting> {
        while self.recv.len() < GREETING_SIZE {
            self.fill().await?;
        }
        let raw = self.recv.split_to(GREETING_SIZE);
        Ok(Greeting::parse(&raw)?)
    }

    pub async fn read_frame(&mut self) -> Result<Frame> {
        loop {
            if let Some(frame) = self.decoder.decode(&mut self.recv)? {
                trace!(peer = %self.peer, "[WIRE] frame in");
                return Ok(frame);
            }
            self.fill().await?;
        }
    }
}

impl FrameWriter {
    #[must_use]
    pub fn local_addr(&self) -> &str {
        &self.local
    }

    #[must_use]
    pub fn peer_addr(&self) -> &str {
        &self.peer
    }

    async fn write(&mut self, buf: Vec<u8>) -> Result<()> {
        let BufResult(res, _) = self.conn.write_all(buf).await;
        res.map_err(Error::from)
    }

    pub async fn write_frame(&mut self, frame: &Frame) -> Result<()> {
        let mut buf = Vec::with_capacity(frame.encoded_len());
        frame.encode(&mut buf);
        self.write(buf).await
    }

    pub async fn write_frames(&mut self, frames: &[Frame]) -> Result<()> {
        let len = frames.iter().map(Frame::encoded_len).sum();
        let mut buf = Vec::with_capacity(len);
        for frame in frames {
            frame.encode(&mut buf);
        }
        self.write(buf).await
    }

    pub async fn shutdown(&mut self) -> Result<()> {
        self.conn.shutdown().await.map_err(Error::from)
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! In-memory connection double for handshake and framing tests.

    use super::*;
    use async_trait::async_trait;
    use std::cell::RefCell;
    use std::rc::Rc;

    /// Serves scripted input in small chunks and records everything written.
    pub struct ScriptedConnection {
        input: Vec<u8>,
        chunk: usize,
        written: Rc<RefCell<Vec<u8>>>,
    }

    impl ScriptedConnection {
        pub fn new(input: Vec<u8>, chunk: usize) -> (Self, Rc<RefCell<Vec<u8>>>) {
            let written = Rc::new(RefCell::new(Vec::new()));
            let conn = Self {
                input,
                chunk,
                written: written.clone(),
            };
            (conn, written)
        }
    }

    impl Connection for ScriptedConnection {
        fn local_addr(&self) -> &str {
            "mem://local"
        }

        fn peer_addr(&self) -> &str {
            "mem://peer"
        }

        fn into_split(self: Box<Self>) -> (Box<dyn ConnectionReader>, Box<dyn ConnectionWriter>) {
            let reader = ScriptedReader {
                input: self.input,
                chunk: self.chunk,
            };
            (Box::new(reader), Box::new(RecordingWriter(self.written)))
        }
    }

    struct ScriptedReader {
        input: Vec<u8>,
        chunk: usize,
    }

    #[async_trait(?Send)]
    impl ConnectionReader for ScriptedReader {
        async fn read(&mut self, mut buf: Vec<u8>) -> BufResult<usize, Vec<u8>> {
            let n = self.chunk.min(self.input.len()).min(buf.capacity());
            buf.extend(self.input.drain(..n));
            BufResult(Ok(n), buf)
        }
    }

    struct RecordingWriter(Rc<RefCell<Vec<u8>>>);

    #[async_trait(?Send)]
    impl ConnectionWriter for RecordingWriter {
        async fn write_all(&mut self, buf: Vec<u8>) -> BufResult<(), Vec<u8>> {
            self.0.borrow_mut().extend_from_slice(&buf);
            BufResult(Ok(()), buf)
        }

        async fn shutdown(&mut self) -> io::Result<()> {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::ScriptedConnection;
    use super::*;
    use crate::codec::{Command, Message};
    use bytes::Bytes;

    #[compio::test]
    async fn test_reads_greeting_and_frames_across_chunks() {
        let mut input = Greeting::new("NULL", false).unwrap().encode().to_vec();
        let mut frames = BytesMut::new();
        Frame::from(Command::new("READY", Bytes::new()).unwrap()).encode(&mut frames);
        Frame::from(Message::new(vec![5u8; 600], false)).encode(&mut frames);
        input.extend_from_slice(&frames);

        let (conn, _) = ScriptedConnection::new(input, 7);
        let mut stream = FramedStream::new(Box::new(conn), 16, None);

        assert_eq!(stream.read_greeting().await.unwrap().mechanism(), "NULL");
        assert!(matches!(stream.read_frame().await.unwrap(), Frame::Command(c) if c.is("READY")));
        let big = stream.read_frame().await.unwrap();
        assert!(matches!(big, Frame::Message(m) if m.body.len() == 600));
    }

    #[compio::test]
    async fn test_eof_is_io_error() {
        let (conn, _) = ScriptedConnection::new(vec![0x00], 4);
        let mut stream = FramedStream::new(Box::new(conn), 16, None);
        assert!(matches!(stream.read_frame().await, Err(Error::Io(_))));
    }

    #[compio::test]
    async fn test_write_frames_coalesces() {
        let (conn, written) = ScriptedConnection::new(Vec::new(), 4);
        let mut stream = FramedStream::new(Box::new(conn), 16, None);
        let parts = vec![Bytes::from_static(b"a"), Bytes::from_static(b"b")];
        let frames: Vec<Frame> = Message::multipart(parts)
            .into_iter()
            .map(Frame::from)
            .collect();

        stream.write_frames(&frames).await.unwrap();
        assert_eq!(&written.borrow()[..], &[0x01, 1, b'a', 0x00, 1, b'b']);
    }
}
