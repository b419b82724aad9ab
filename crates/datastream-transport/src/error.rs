/// Errors that can occur in byte-stream operations.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// An I/O error occurred on the underlying socket.
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The stream was closed, locally or by the remote side.
    #[error("stream closed: {reason}")]
    Closed { reason: String },

    /// The sink accepted zero bytes for a non-empty write.
    #[error("write returned zero bytes")]
    WriteZero,
}

pub type Result<T> = std::result::Result<T, TransportError>;
