//! Length-prefixed framing for the DataStream protocol.
//!
//! Every frame on the wire is:
//! - A 4-byte big-endian payload length
//! - The payload: a value-codec encoded sequence
//!
//! The length prefix doubles as the byte-string length of the value codec,
//! so it is peeked (never consumed) until the whole frame has arrived.

#[cfg(feature = "async")]
pub mod async_codec;
pub mod codec;
pub mod error;
pub mod reader;
pub mod writer;

#[cfg(feature = "async")]
pub use async_codec::DataStreamCodec;
pub use codec::{
    check_length, decode_frame, encode_frame, Frame, FrameConfig, TransferProgress, LENGTH_PREFIX_SIZE,
    MAX_FRAME_SIZE,
};
pub use error::{FrameError, Result, REASON_CORRUPT, REASON_TOO_LARGE, REASON_ZERO_LENGTH};
pub use reader::{FrameReader, FrameStatus};
pub use writer::FrameWriter;
