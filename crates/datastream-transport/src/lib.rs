//! Byte-stream abstraction for the DataStream protocol peer.
//!
//! The protocol core never touches sockets directly. It consumes a stream
//! that can report how many bytes are buffered, peek without consuming,
//! read, write and close with a reason:
//! - [`MemoryStream`] for tests, capture replay and embedders
//! - [`SocketStream`] over a std TCP or Unix socket
//!
//! This is the lowest layer of datastream. Everything else builds on top of
//! the [`ByteStream`] trait defined here.

pub mod error;
pub mod memory;
pub mod socket;
pub mod traits;

pub use error::{Result, TransportError};
pub use memory::MemoryStream;
pub use socket::{Disconnect, SocketStream, REMOTE_CLOSED};
pub use traits::ByteStream;
