//! Dynamically typed values exchanged inside DataStream frames.
//!
//! A frame payload is an ordered sequence of [`Value`]s. Each value carries
//! an explicit one-byte type tag followed by its body; see [`codec`] for the
//! exact layout. The [`pairs`] module holds the flattened key/value
//! convention shared by the handshake messages and `InitData`.

pub mod codec;
pub mod error;
pub mod pairs;
pub mod value;

pub use codec::{decode_sequence, encode_sequence, encode_sequence_into, MAX_NESTING_DEPTH};
pub use error::{PairError, Result, ValueError};
pub use pairs::{flatten, flatten_into, unflatten};
pub use value::{Timestamp, Value, ValueMap};
