use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{FrameError, Result};

/// Length prefix: one big-endian u32.
pub const LENGTH_PREFIX_SIZE: usize = 4;

/// Default maximum payload size: 4 MiB.
pub const MAX_FRAME_SIZE: usize = 1 << 22;

/// One complete frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// The payload, without the length prefix.
    pub payload: Bytes,
}

impl Frame {
    /// Create a new frame.
    pub fn new(payload: impl Into<Bytes>) -> Self {
        Self {
            payload: payload.into(),
        }
    }

    /// The total wire size of this frame (prefix + payload).
    pub fn wire_size(&self) -> usize {
        LENGTH_PREFIX_SIZE + self.payload.len()
    }
}

/// How much of the frame currently being received has arrived.
///
/// Both counts include the length prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferProgress {
    pub received: usize,
    pub total: usize,
}

impl TransferProgress {
    /// Whether the whole frame has arrived.
    pub fn is_complete(&self) -> bool {
        self.received >= self.total
    }
}

/// Configuration for frame reading and writing.
#[derive(Debug, Clone)]
pub struct FrameConfig {
    /// Maximum payload size in bytes. Default: 4 MiB.
    pub max_frame_size: usize,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            max_frame_size: MAX_FRAME_SIZE,
        }
    }
}

/// Check a declared payload length against the limit.
///
/// Valid lengths are in `1..=max_frame_size`.
pub fn check_length(len: usize, max_frame_size: usize) -> Result<()> {
    if len == 0 {
        return Err(FrameError::ZeroLength);
    }
    if len > max_frame_size {
        return Err(FrameError::FrameTooLarge {
            size: len,
            max: max_frame_size,
        });
    }
    Ok(())
}

/// Encode a frame into the wire format.
///
/// Wire format:
/// ```text
/// ┌──────────────┬──────────────────────────────┐
/// │ Length (4B)  │ Payload                      │
/// │ big-endian   │ (Length bytes, value codec)  │
/// └──────────────┴──────────────────────────────┘
/// ```
pub fn encode_frame(payload: &[u8], dst: &mut BytesMut) -> Result<()> {
    if payload.len() > u32::MAX as usize {
        return Err(FrameError::FrameTooLarge {
            size: payload.len(),
            max: u32::MAX as usize,
        });
    }
    dst.reserve(LENGTH_PREFIX_SIZE + payload.len());
    dst.put_u32(payload.len() as u32);
    dst.put_slice(payload);
    Ok(())
}

/// Decode a frame from a buffer.
///
/// Returns `Ok(None)` if the buffer doesn't contain a complete frame yet.
/// On success, consumes the frame bytes from the buffer. The length is
/// validated as soon as the prefix is present.
pub fn decode_frame(src: &mut BytesMut, max_frame_size: usize) -> Result<Option<Frame>> {
    if src.len() < LENGTH_PREFIX_SIZE {
        return Ok(None);
    }

    let mut prefix = [0u8; LENGTH_PREFIX_SIZE];
    prefix.copy_from_slice(&src[..LENGTH_PREFIX_SIZE]);
    let payload_len = u32::from_be_bytes(prefix) as usize;
    check_length(payload_len, max_frame_size)?;

    let total = LENGTH_PREFIX_SIZE + payload_len;
    if src.len() < total {
        src.reserve(total - src.len());
        return Ok(None);
    }

    src.advance(LENGTH_PREFIX_SIZE);
    let payload = src.split_to(payload_len).freeze();

    Ok(Some(Frame { payload }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_decode_roundtrip() {
        let mut buf = BytesMut::new();
        let payload = b"hello, datastream!";

        encode_frame(payload, &mut buf).unwrap();

        assert_eq!(buf.len(), LENGTH_PREFIX_SIZE + payload.len());
        assert_eq!(&buf[..4], &(payload.len() as u32).to_be_bytes());

        let frame = decode_frame(&mut buf, MAX_FRAME_SIZE).unwrap().unwrap();

        assert_eq!(frame.payload.as_ref(), payload);
        assert!(buf.is_empty());
    }

    #[test]
    fn test_decode_incomplete_prefix() {
        let mut buf = BytesMut::from(&[0x00, 0x00, 0x01][..]);
        let result = decode_frame(&mut buf, MAX_FRAME_SIZE).unwrap();
        assert!(result.is_none());
        assert_eq!(buf.len(), 3);
    }

    #[test]
    fn test_decode_incomplete_payload() {
        let mut buf = BytesMut::new();
        encode_frame(b"hello", &mut buf).unwrap();
        buf.truncate(LENGTH_PREFIX_SIZE + 2);

        let result = decode_frame(&mut buf, MAX_FRAME_SIZE).unwrap();
        assert!(result.is_none());
        assert_eq!(buf.len(), LENGTH_PREFIX_SIZE + 2);
    }

    #[test]
    fn test_decode_zero_length() {
        let mut buf = BytesMut::from(&[0u8, 0, 0, 0][..]);
        let result = decode_frame(&mut buf, MAX_FRAME_SIZE);
        assert!(matches!(result, Err(FrameError::ZeroLength)));
    }

    #[test]
    fn test_decode_frame_too_large() {
        let mut buf = BytesMut::new();
        buf.put_u32(0x0050_0000);

        let result = decode_frame(&mut buf, MAX_FRAME_SIZE);
        assert!(matches!(
            result,
            Err(FrameError::FrameTooLarge { size: 0x0050_0000, max: MAX_FRAME_SIZE })
        ));
    }

    #[test]
    fn test_length_limits() {
        assert!(check_length(1, MAX_FRAME_SIZE).is_ok());
        assert!(check_length(MAX_FRAME_SIZE, MAX_FRAME_SIZE).is_ok());
        assert!(matches!(
            check_length(MAX_FRAME_SIZE + 1, MAX_FRAME_SIZE),
            Err(FrameError::FrameTooLarge { .. })
        ));
        assert!(matches!(
            check_length(0, MAX_FRAME_SIZE),
            Err(FrameError::ZeroLength)
        ));
    }

    #[test]
    fn test_multiple_frames() {
        let mut buf = BytesMut::new();
        encode_frame(b"first", &mut buf).unwrap();
        encode_frame(b"second", &mut buf).unwrap();

        let f1 = decode_frame(&mut buf, MAX_FRAME_SIZE).unwrap().unwrap();
        assert_eq!(f1.payload.as_ref(), b"first");

        let f2 = decode_frame(&mut buf, MAX_FRAME_SIZE).unwrap().unwrap();
        assert_eq!(f2.payload.as_ref(), b"second");

        assert!(buf.is_empty());
    }

    #[test]
    fn test_frame_wire_size() {
        let frame = Frame::new(Bytes::from_static(b"test"));
        assert_eq!(frame.wire_size(), LENGTH_PREFIX_SIZE + 4);
    }

    #[test]
    fn test_progress_completion() {
        let partial = TransferProgress {
            received: 3,
            total: 10,
        };
        let done = TransferProgress {
            received: 10,
            total: 10,
        };
        assert!(!partial.is_complete());
        assert!(done.is_complete());
    }
}
