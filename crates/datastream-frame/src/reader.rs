use datastream_transport::ByteStream;
use tracing::{debug, warn};

use crate::codec::{check_length, Frame, FrameConfig, TransferProgress, LENGTH_PREFIX_SIZE};
use crate::error::{FrameError, Result};

/// Outcome of one [`FrameReader::try_read_frame`] call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameStatus {
    /// Fewer than [`LENGTH_PREFIX_SIZE`] bytes are buffered.
    NoFrameYet,
    /// The length is known; the rest of the frame has not arrived.
    Partial(TransferProgress),
    /// A whole frame was consumed from the stream.
    Complete(Frame),
}

/// Pulls complete frames out of a [`ByteStream`].
///
/// The reader remembers the declared length of the frame being received
/// between calls (0 while unknown). Nothing is consumed from the stream
/// until the whole frame is buffered. Any framing violation closes the
/// stream with a descriptive reason and is returned as an error; it is
/// never retried.
#[derive(Debug)]
pub struct FrameReader {
    declared_len: u32,
    config: FrameConfig,
}

impl FrameReader {
    /// Create a new frame reader with default configuration.
    pub fn new() -> Self {
        Self::with_config(FrameConfig::default())
    }

    /// Create a new frame reader with explicit configuration.
    pub fn with_config(config: FrameConfig) -> Self {
        Self {
            declared_len: 0,
            config,
        }
    }

    /// Try to take the next complete frame off `stream`.
    pub fn try_read_frame<S: ByteStream + ?Sized>(&mut self, stream: &mut S) -> Result<FrameStatus> {
        if !stream.is_open() {
            self.declared_len = 0;
            return Ok(FrameStatus::NoFrameYet);
        }

        if self.declared_len == 0 {
            if stream.bytes_available() < LENGTH_PREFIX_SIZE {
                return Ok(FrameStatus::NoFrameYet);
            }

            let mut prefix = [0u8; LENGTH_PREFIX_SIZE];
            let got = stream.peek(&mut prefix);
            if got != LENGTH_PREFIX_SIZE {
                return Err(self.fail(stream, FrameError::MalformedPrefix { got }));
            }

            let declared = u32::from_be_bytes(prefix);
            if let Err(err) = check_length(declared as usize, self.config.max_frame_size) {
                return Err(self.fail(stream, err));
            }
            debug!(declared, "frame length received");
            self.declared_len = declared;
        }

        let total = LENGTH_PREFIX_SIZE + self.declared_len as usize;
        let available = stream.bytes_available();
        if available < total {
            return Ok(FrameStatus::Partial(TransferProgress {
                received: available,
                total,
            }));
        }

        let block = stream.read(total);
        self.declared_len = 0;
        if block.len() != total {
            return Err(self.fail(
                stream,
                FrameError::Truncated {
                    expected: total,
                    got: block.len(),
                },
            ));
        }

        Ok(FrameStatus::Complete(Frame::new(
            block.slice(LENGTH_PREFIX_SIZE..),
        )))
    }

    /// Declared length of the frame being received, if known.
    pub fn pending_len(&self) -> Option<usize> {
        (self.declared_len != 0).then_some(self.declared_len as usize)
    }

    /// Update maximum payload size for subsequent frames.
    pub fn set_max_frame_size(&mut self, max_frame_size: usize) {
        self.config.max_frame_size = max_frame_size;
    }

    /// Current frame reader configuration.
    pub fn config(&self) -> &FrameConfig {
        &self.config
    }

    fn fail<S: ByteStream + ?Sized>(&mut self, stream: &mut S, err: FrameError) -> FrameError {
        warn!(error = %err, "framing violation");
        self.declared_len = 0;
        stream.close(err.close_reason());
        err
    }
}

impl Default for FrameReader {
    fn default() -> Self {
        Self::new()
    }
}
