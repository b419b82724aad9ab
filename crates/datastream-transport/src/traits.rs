use bytes::Bytes;

use crate::error::Result;

/// A buffered, non-blocking byte stream.
///
/// Implementations keep their own receive buffer: `bytes_available`,
/// `peek` and `read` only ever look at data that has already arrived, so
/// none of them block. `write` hands bytes to the sink, which is
/// responsible for its own buffering and backpressure.
pub trait ByteStream {
    /// Number of received bytes that can be read without blocking.
    fn bytes_available(&self) -> usize;

    /// Copy up to `dst.len()` buffered bytes into `dst` without consuming them.
    ///
    /// Returns the number of bytes copied.
    fn peek(&self, dst: &mut [u8]) -> usize;

    /// Consume and return up to `n` buffered bytes.
    fn read(&mut self, n: usize) -> Bytes;

    /// Write all of `data` to the sink.
    fn write(&mut self, data: &[u8]) -> Result<()>;

    /// Whether the stream is still open for reading and writing.
    fn is_open(&self) -> bool;

    /// Close the stream, recording why.
    ///
    /// Closing an already closed stream keeps the first reason.
    fn close(&mut self, reason: &str);
}

impl<T: ByteStream + ?Sized> ByteStream for &mut T {
    fn bytes_available(&self) -> usize {
        (**self).bytes_available()
    }

    fn peek(&self, dst: &mut [u8]) -> usize {
        (**self).peek(dst)
    }

    fn read(&mut self, n: usize) -> Bytes {
        (**self).read(n)
    }

    fn write(&mut self, data: &[u8]) -> Result<()> {
        (**self).write(data)
    }

    fn is_open(&self) -> bool {
        (**self).is_open()
    }

    fn close(&mut self, reason: &str) {
        (**self).close(reason)
    }
}
