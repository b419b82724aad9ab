use datastream_frame::FrameError;
use datastream_transport::TransportError;
use datastream_value::{PairError, ValueError};

use crate::peer::ConnectionPhase;
use crate::steady::Arity;

/// Close reason when an outgoing message cannot be serialized.
pub const REASON_SERIALIZE: &str = "Could not serialize data for peer!";

/// A well-formed payload that does not describe a valid message.
///
/// During the handshake these are fatal by default; once established the
/// offending message is dropped and the connection carries on.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProtocolError {
    /// The handshake map has no usable `MsgType`.
    #[error("handshake message without MsgType")]
    MissingMsgType,

    /// The `MsgType` is not one we know.
    #[error("unknown handshake message type '{0}'")]
    UnknownMsgType(String),

    /// A required field is absent.
    #[error("{message}: missing field '{field}'")]
    MissingField {
        message: &'static str,
        field: &'static str,
    },

    /// A field holds the wrong kind of value.
    #[error("{message}: field '{field}' should be {expected}, got {got}")]
    InvalidField {
        message: &'static str,
        field: &'static str,
        expected: &'static str,
        got: &'static str,
    },

    /// A flattened map could not be rebuilt.
    #[error("invalid key/value list: {0}")]
    Pairs(#[from] PairError),

    /// A steady-state payload with no elements at all.
    #[error("empty message")]
    Empty,

    /// The leading element is not an integer.
    #[error("request type should be an integer, got {0}")]
    InvalidRequestTag(&'static str),

    /// The leading integer is not a known request type.
    #[error("unknown request type {0}")]
    UnknownRequestType(i64),

    /// Wrong number of positional arguments for the request type.
    #[error("{request}: expected {expected} arguments, got {got}")]
    ArgumentCount {
        request: &'static str,
        expected: Arity,
        got: usize,
    },
}

/// Errors that can occur in peer operations.
#[derive(Debug, thiserror::Error)]
pub enum PeerError {
    /// Transport-level error.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// Frame-level error.
    #[error("frame error: {0}")]
    Frame(#[from] FrameError),

    /// Payload could not be encoded or decoded.
    #[error("value error: {0}")]
    Value(#[from] ValueError),

    /// Payload decoded but is not a valid message.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// The message belongs to the other connection phase.
    #[error("{message} cannot be sent while {phase}")]
    WrongPhase {
        message: &'static str,
        phase: ConnectionPhase,
    },

    /// The handshake was already completed.
    #[error("cannot complete handshake while {from}")]
    InvalidTransition { from: ConnectionPhase },

    /// The connection is closed.
    #[error("connection closed")]
    Closed,
}

pub type Result<T> = std::result::Result<T, PeerError>;
