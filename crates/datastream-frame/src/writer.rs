use bytes::BytesMut;
use datastream_transport::ByteStream;

use crate::codec::{check_length, encode_frame, FrameConfig};
use crate::error::{FrameError, Result};

const INITIAL_BUFFER_CAPACITY: usize = 8 * 1024;

/// Writes complete frames to a [`ByteStream`].
///
/// Each frame is assembled in a scratch buffer and handed to the stream in
/// a single `write` call, so the prefix and payload are never split.
#[derive(Debug)]
pub struct FrameWriter {
    buf: BytesMut,
    config: FrameConfig,
}

impl FrameWriter {
    /// Create a new frame writer with default configuration.
    pub fn new() -> Self {
        Self::with_config(FrameConfig::default())
    }

    /// Create a new frame writer with explicit configuration.
    pub fn with_config(config: FrameConfig) -> Self {
        Self {
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            config,
        }
    }

    /// Encode `payload` as one frame and write it to `stream`.
    pub fn write_frame<S: ByteStream + ?Sized>(&mut self, stream: &mut S, payload: &[u8]) -> Result<()> {
        if !stream.is_open() {
            return Err(FrameError::Closed);
        }
        check_length(payload.len(), self.config.max_frame_size)?;

        self.buf.clear();
        encode_frame(payload, &mut self.buf)?;
        stream.write(&self.buf)?;
        Ok(())
    }

    /// Update maximum payload size for subsequent frames.
    pub fn set_max_frame_size(&mut self, max_frame_size: usize) {
        self.config.max_frame_size = max_frame_size;
    }

    /// Current frame writer configuration.
    pub fn config(&self) -> &FrameConfig {
        &self.config
    }
}

impl Default for FrameWriter {
    fn default() -> Self {
        Self::new()
    }
}
