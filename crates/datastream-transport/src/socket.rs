use std::io::{ErrorKind, Read, Write};
use std::net::{Shutdown, TcpStream};
use std::thread;
use std::time::Duration;

use bytes::{Bytes, BytesMut};
use tracing::debug;

use crate::error::{Result, TransportError};
use crate::traits::ByteStream;

const INITIAL_BUFFER_CAPACITY: usize = 8 * 1024;
const READ_CHUNK_SIZE: usize = 8 * 1024;
const WRITE_RETRY_BACKOFF: Duration = Duration::from_millis(1);

/// Reason recorded when the remote side closes the connection.
pub const REMOTE_CLOSED: &str = "connection closed by peer";

/// Sockets that can be torn down in both directions.
pub trait Disconnect {
    /// Shut down reading and writing.
    fn disconnect(&self) -> std::io::Result<()>;
}

impl Disconnect for TcpStream {
    fn disconnect(&self) -> std::io::Result<()> {
        self.shutdown(Shutdown::Both)
    }
}

#[cfg(unix)]
impl Disconnect for std::os::unix::net::UnixStream {
    fn disconnect(&self) -> std::io::Result<()> {
        self.shutdown(Shutdown::Both)
    }
}

/// A [`ByteStream`] over a std socket.
///
/// Received data is pulled into an internal buffer by [`fill`](Self::fill),
/// which the event loop calls when the socket is readable. Works with
/// blocking and non-blocking sockets; with a non-blocking socket `fill`
/// returns `Ok(0)` when nothing is pending, and `write` sleeps briefly
/// between attempts while the send buffer is full.
pub struct SocketStream<T> {
    inner: T,
    buf: BytesMut,
    open: bool,
    close_reason: Option<String>,
}

impl<T: Read + Write + Disconnect> SocketStream<T> {
    /// Wrap a connected socket.
    pub fn new(inner: T) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            open: true,
            close_reason: None,
        }
    }

    /// Perform one read from the socket into the receive buffer.
    ///
    /// Returns the number of bytes added. End of stream closes the stream
    /// with [`REMOTE_CLOSED`] and returns `Ok(0)`.
    pub fn fill(&mut self) -> Result<usize> {
        if !self.open {
            return Ok(0);
        }

        let mut chunk = [0u8; READ_CHUNK_SIZE];
        loop {
            match self.inner.read(&mut chunk) {
                Ok(0) => {
                    self.close(REMOTE_CLOSED);
                    return Ok(0);
                }
                Ok(n) => {
                    self.buf.extend_from_slice(&chunk[..n]);
                    return Ok(n);
                }
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) if err.kind() == ErrorKind::WouldBlock => return Ok(0),
                Err(err) => return Err(TransportError::Io(err)),
            }
        }
    }

    /// Borrow the underlying socket.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// The reason passed to the first `close` call, if any.
    pub fn close_reason(&self) -> Option<&str> {
        self.close_reason.as_deref()
    }

    /// Consume the stream and return the socket.
    pub fn into_inner(self) -> T {
        self.inner
    }
}

impl SocketStream<TcpStream> {
    /// Wrap a TCP stream with Nagle disabled; frames are written whole.
    pub fn from_tcp(stream: TcpStream) -> Result<Self> {
        stream.set_nodelay(true)?;
        Ok(Self::new(stream))
    }
}

impl<T: Read + Write + Disconnect> ByteStream for SocketStream<T> {
    fn bytes_available(&self) -> usize {
        self.buf.len()
    }

    fn peek(&self, dst: &mut [u8]) -> usize {
        let n = dst.len().min(self.buf.len());
        dst[..n].copy_from_slice(&self.buf[..n]);
        n
    }

    fn read(&mut self, n: usize) -> Bytes {
        let n = n.min(self.buf.len());
        self.buf.split_to(n).freeze()
    }

    fn write(&mut self, data: &[u8]) -> Result<()> {
        if !self.open {
            return Err(TransportError::Closed {
                reason: self.close_reason.clone().unwrap_or_default(),
            });
        }

        let mut offset = 0usize;
        while offset < data.len() {
            match self.inner.write(&data[offset..]) {
                Ok(0) => return Err(TransportError::WriteZero),
                Ok(n) => offset += n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) if err.kind() == ErrorKind::WouldBlock => {
                    thread::sleep(WRITE_RETRY_BACKOFF)
                }
                Err(err) => return Err(TransportError::Io(err)),
            }
        }

        loop {
            match self.inner.flush() {
                Ok(()) => return Ok(()),
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) if err.kind() == ErrorKind::WouldBlock => {
                    thread::sleep(WRITE_RETRY_BACKOFF)
                }
                Err(err) => return Err(TransportError::Io(err)),
            }
        }
    }

    fn is_open(&self) -> bool {
        self.open
    }

    fn close(&mut self, reason: &str) {
        if !self.open {
            return;
        }
        debug!(reason, "closing socket");
        self.open = false;
        self.close_reason = Some(reason.to_string());
        if let Err(err) = self.inner.disconnect() {
            debug!(error = %err, "socket shutdown failed");
        }
    }
}

impl<T> std::fmt::Debug for SocketStream<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SocketStream")
            .field("buffered", &self.buf.len())
            .field("open", &self.open)
            .field("close_reason", &self.close_reason)
            .finish()
    }
}
