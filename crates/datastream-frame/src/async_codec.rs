//! tokio codec for the DataStream frame format.

use bytes::{Bytes, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::codec::{check_length, decode_frame, encode_frame, Frame, FrameConfig};
use crate::error::FrameError;

/// Frame codec for `tokio_util::codec::Framed`.
///
/// Applies the same length limits as [`FrameReader`](crate::FrameReader)
/// and [`FrameWriter`](crate::FrameWriter).
#[derive(Debug, Clone, Default)]
pub struct DataStreamCodec {
    config: FrameConfig,
}

impl DataStreamCodec {
    /// Create a codec with explicit configuration.
    pub fn with_config(config: FrameConfig) -> Self {
        Self { config }
    }
}

impl Decoder for DataStreamCodec {
    type Item = Frame;
    type Error = FrameError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        decode_frame(src, self.config.max_frame_size)
    }
}

impl Encoder<Bytes> for DataStreamCodec {
    type Error = FrameError;

    fn encode(&mut self, payload: Bytes, dst: &mut BytesMut) -> Result<(), Self::Error> {
        check_length(payload.len(), self.config.max_frame_size)?;
        encode_frame(&payload, dst)
    }
}
