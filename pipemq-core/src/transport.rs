//! Byte-stream transport contract.
//!
//! A [`Transport`] turns an [`Endpoint`] into an outbound [`Connection`] or a
//! [`Listener`]. Connections use compio's ownership-passing buffers so that
//! implementations can hand buffers straight to the completion driver.

use crate::endpoint::Endpoint;
use crate::error::Result;
use async_trait::async_trait;
use compio::buf::BufResult;
use compio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use std::io;

/// Established byte stream to one peer.
///
/// Reading and writing happen through the halves returned by
/// [`into_split`](Connection::into_split), so a pending read never has to be
/// dropped to make room for a write.
pub trait Connection {
    fn local_addr(&self) -> &str;

    fn peer_addr(&self) -> &str;

    /// Separate the two directions of the stream.
    fn into_split(self: Box<Self>) -> (Box<dyn ConnectionReader>, Box<dyn ConnectionWriter>);
}

/// Read direction of a [`Connection`].
#[async_trait(?Send)]
pub trait ConnectionReader {
    /// Read into the spare capacity of `buf`, returning the byte count.
    ///
    /// `Ok(0)` means the peer closed the stream.
    async fn read(&mut self, buf: Vec<u8>) -> BufResult<usize, Vec<u8>>;
}

/// Write direction of a [`Connection`].
#[async_trait(?Send)]
pub trait ConnectionWriter {
    /// Write the whole buffer.
    async fn write_all(&mut self, buf: Vec<u8>) -> BufResult<(), Vec<u8>>;

    /// Shut down the write side.
    async fn shutdown(&mut self) -> io::Result<()>;
}

/// [`ConnectionReader`] over any compio reader, e.g. an owned read half.
pub struct StreamReader<R>(pub R);

#[async_trait(?Send)]
impl<R: AsyncRead + 'static> ConnectionReader for StreamReader<R> {
    async fn read(&mut self, buf: Vec<u8>) -> BufResult<usize, Vec<u8>> {
        AsyncRead::read(&mut self.0, buf).await
    }
}

/// [`ConnectionWriter`] over any compio writer.
pub struct StreamWriter<W>(pub W);

#[async_trait(?Send)]
impl<W: AsyncWrite + 'static> ConnectionWriter for StreamWriter<W> {
    async fn write_all(&mut self, buf: Vec<u8>) -> BufResult<(), Vec<u8>> {
        AsyncWriteExt::write_all(&mut self.0, buf).await
    }

    async fn shutdown(&mut self) -> io::Result<()> {
        AsyncWrite::shutdown(&mut self.0).await
    }
}

/// Bound listening socket. Dropping it stops listening.
#[async_trait(?Send)]
pub trait Listener {
    async fn accept(&self) -> io::Result<Box<dyn Connection>>;

    /// Address actually bound, with any wildcard port resolved.
    fn endpoint(&self) -> &Endpoint;
}

/// Factory for listeners and outbound streams of one URL scheme.
#[async_trait(?Send)]
pub trait Transport {
    fn scheme(&self) -> &'static str;

    async fn bind(&self, endpoint: &Endpoint) -> Result<Box<dyn Listener>>;

    /// Dial `endpoint`.
    ///
    /// Fails with [`Error::FatalAddress`](crate::error::Error::FatalAddress)
    /// when retrying cannot help, and with an I/O error otherwise.
    async fn connect(&self, endpoint: &Endpoint) -> Result<Box<dyn Connection>>;
}
