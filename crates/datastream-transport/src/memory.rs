use bytes::{Bytes, BytesMut};
use tracing::debug;

use crate::error::{Result, TransportError};
use crate::traits::ByteStream;

const INITIAL_BUFFER_CAPACITY: usize = 8 * 1024;

/// An in-memory duplex stream.
///
/// Inbound bytes are pushed with [`feed`](Self::feed); everything the peer
/// writes is collected and can be drained with
/// [`take_written`](Self::take_written).
#[derive(Debug)]
pub struct MemoryStream {
    inbound: BytesMut,
    outbound: BytesMut,
    open: bool,
    close_reason: Option<String>,
}

impl MemoryStream {
    /// Create an open, empty stream.
    pub fn new() -> Self {
        Self {
            inbound: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            outbound: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            open: true,
            close_reason: None,
        }
    }

    /// Create an open stream with `bytes` already received.
    pub fn with_inbound(bytes: impl AsRef<[u8]>) -> Self {
        let mut stream = Self::new();
        stream.feed(bytes);
        stream
    }

    /// Append received bytes.
    pub fn feed(&mut self, bytes: impl AsRef<[u8]>) {
        self.inbound.extend_from_slice(bytes.as_ref());
    }

    /// Drain everything written so far.
    pub fn take_written(&mut self) -> Bytes {
        self.outbound.split().freeze()
    }

    /// Bytes written and not yet drained.
    pub fn written(&self) -> &[u8] {
        &self.outbound
    }

    /// The reason passed to the first `close` call, if any.
    pub fn close_reason(&self) -> Option<&str> {
        self.close_reason.as_deref()
    }
}

impl Default for MemoryStream {
    fn default() -> Self {
        Self::new()
    }
}

impl ByteStream for MemoryStream {
    fn bytes_available(&self) -> usize {
        self.inbound.len()
    }

    fn peek(&self, dst: &mut [u8]) -> usize {
        let n = dst.len().min(self.inbound.len());
        dst[..n].copy_from_slice(&self.inbound[..n]);
        n
    }

    fn read(&mut self, n: usize) -> Bytes {
        let n = n.min(self.inbound.len());
        self.inbound.split_to(n).freeze()
    }

    fn write(&mut self, data: &[u8]) -> Result<()> {
        if !self.open {
            return Err(TransportError::Closed {
                reason: self.close_reason.clone().unwrap_or_default(),
            });
        }
        self.outbound.extend_from_slice(data);
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.open
    }

    fn close(&mut self, reason: &str) {
        if !self.open {
            return;
        }
        debug!(reason, "closing memory stream");
        self.open = false;
        self.close_reason = Some(reason.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn peek_does_not_consume() {
        let stream = MemoryStream::with_inbound(b"abcdef");
        let mut buf = [0u8; 4];

        assert_eq!(stream.peek(&mut buf), 4);
        assert_eq!(&buf, b"abcd");
        assert_eq!(stream.bytes_available(), 6);
    }

    #[test]
    fn peek_short_buffer() {
        let stream = MemoryStream::with_inbound(b"ab");
        let mut buf = [0u8; 4];

        assert_eq!(stream.peek(&mut buf), 2);
        assert_eq!(&buf[..2], b"ab");
    }

    #[test]
    fn read_consumes_in_order() {
        let mut stream = MemoryStream::with_inbound(b"hello world");

        assert_eq!(stream.read(5).as_ref(), b"hello");
        assert_eq!(stream.read(100).as_ref(), b" world");
        assert_eq!(stream.bytes_available(), 0);
        assert!(stream.read(1).is_empty());
    }

    #[test]
    fn written_bytes_are_collected() {
        let mut stream = MemoryStream::new();
        stream.write(b"one").unwrap();
        stream.write(b"two").unwrap();

        assert_eq!(stream.written(), b"onetwo");
        assert_eq!(stream.take_written().as_ref(), b"onetwo");
        assert!(stream.written().is_empty());
    }

    #[test]
    fn close_keeps_first_reason() {
        let mut stream = MemoryStream::new();
        stream.close("first");
        stream.close("second");

        assert!(!stream.is_open());
        assert_eq!(stream.close_reason(), Some("first"));
    }

    #[test]
    fn write_after_close_fails() {
        let mut stream = MemoryStream::new();
        stream.close("done");

        let err = stream.write(b"late").unwrap_err();
        assert!(matches!(err, TransportError::Closed { ref reason } if reason == "done"));
        assert!(stream.written().is_empty());
    }

    #[test]
    fn works_through_mut_reference() {
        fn drain<S: ByteStream>(mut stream: S) -> Bytes {
            let n = stream.bytes_available();
            stream.read(n)
        }

        let mut stream = MemoryStream::with_inbound(b"xyz");
        assert_eq!(drain(&mut stream).as_ref(), b"xyz");
        assert_eq!(stream.bytes_available(), 0);
    }
}
