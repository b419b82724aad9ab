//! The DataStream wire protocol.
//!
//! # Crate Structure
//!
//! - [`transport`]: byte-stream abstraction (in-memory and socket streams)
//! - [`frame`]: length-prefixed framing with partial-frame accumulation
//! - [`value`]: the tagged value codec and flattened-map helpers
//! - [`peer`]: handshake and steady-state codecs plus the connection peer
//!   (behind the default `peer` feature)

/// Re-export transport types.
pub mod transport {
    pub use datastream_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use datastream_frame::*;
}

/// Re-export value codec types.
pub mod value {
    pub use datastream_value::*;
}

/// Re-export peer types (requires `peer` feature).
#[cfg(feature = "peer")]
pub mod peer {
    pub use datastream_peer::*;
}
