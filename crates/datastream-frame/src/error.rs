use datastream_transport::TransportError;

/// Close reason for a declared length above the configured limit.
pub const REASON_TOO_LARGE: &str = "Peer tried to send package larger than max package size!";
/// Close reason for a declared length of zero.
pub const REASON_ZERO_LENGTH: &str = "Peer tried to send 0 byte package!";
/// Close reason for a frame that could not be read back whole.
pub const REASON_CORRUPT: &str = "Peer sent corrupt data, closing down!";

/// Errors that can occur during frame encoding/decoding.
///
/// Every decode-side variant is fatal for the connection.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The declared or supplied payload length exceeds the limit.
    #[error("frame too large ({size} bytes, max {max})")]
    FrameTooLarge { size: usize, max: usize },

    /// The declared or supplied payload length is zero.
    #[error("zero-length frame")]
    ZeroLength,

    /// The length prefix could not be read although enough bytes were reported.
    #[error("malformed length prefix ({got} of 4 bytes)")]
    MalformedPrefix { got: usize },

    /// The stream returned fewer bytes than it reported as available.
    #[error("truncated frame ({got} of {expected} bytes)")]
    Truncated { expected: usize, got: usize },

    /// The stream is not open.
    #[error("stream is closed")]
    Closed,

    /// The underlying stream failed.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// An I/O error surfaced through a tokio codec.
    #[error("frame I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl FrameError {
    /// The reason a reader closes the connection with after this error.
    pub fn close_reason(&self) -> &'static str {
        match self {
            FrameError::FrameTooLarge { .. } => REASON_TOO_LARGE,
            FrameError::ZeroLength => REASON_ZERO_LENGTH,
            _ => REASON_CORRUPT,
        }
    }
}

pub type Result<T> = std::result::Result<T, FrameError>;
