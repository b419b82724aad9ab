//! The DataStream protocol peer.
//!
//! A connection starts in the handshake phase, where every payload is a
//! flattened key/value map tagged with `MsgType`, and moves once (on the
//! session layer's say-so) to the established phase, where payloads are a
//! request-type tag followed by positional arguments. [`Peer`] owns the
//! stream and the framing state and picks the right codec for the phase.

pub mod error;
pub mod handshake;
pub mod peer;
pub mod steady;

pub use error::{PeerError, ProtocolError, Result, REASON_SERIALIZE};
pub use handshake::{
    ClientDenied, ClientInit, ClientRegistered, HandshakeMessage, Login, LoginFailed,
    LoginSuccess, SessionState, SetupData, SetupDone, SetupFailed, BUILD_DATE,
};
pub use peer::{
    Connection, ConnectionPhase, ConnectionState, Handler, Message, Peer, PeerConfig,
    SUPPORTED_FEATURES,
};
pub use steady::{
    Arity, HeartBeat, HeartBeatReply, InitData, InitRequest, RequestType, RpcCall, SteadyMessage,
    SyncMessage,
};
