use std::fmt;

use datastream_frame::{
    FrameConfig, FrameError, FrameReader, FrameStatus, FrameWriter, TransferProgress, REASON_CORRUPT,
};
use datastream_transport::ByteStream;
use datastream_value::{decode_sequence, encode_sequence};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::{PeerError, ProtocolError, Result, REASON_SERIALIZE};
use crate::handshake::{self, HandshakeMessage};
use crate::steady::{self, SteadyMessage};

/// Protocol capability bits this peer can negotiate. None yet.
pub const SUPPORTED_FEATURES: u16 = 0;

/// Which codec the connection speaks.
///
/// The only transition is `Handshaking` to `Established`, once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionPhase {
    Handshaking,
    Established,
}

impl fmt::Display for ConnectionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionPhase::Handshaking => f.write_str("handshaking"),
            ConnectionPhase::Established => f.write_str("established"),
        }
    }
}

/// Where a connection is in its lifetime.
///
/// `Closed` is terminal and reachable from either phase; the phase a
/// closed connection was in stays available from `phase()`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    Handshaking,
    Established,
    Closed,
}

impl From<ConnectionPhase> for ConnectionState {
    fn from(phase: ConnectionPhase) -> Self {
        match phase {
            ConnectionPhase::Handshaking => ConnectionState::Handshaking,
            ConnectionPhase::Established => ConnectionState::Established,
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionState::Handshaking => f.write_str("handshaking"),
            ConnectionState::Established => f.write_str("established"),
            ConnectionState::Closed => f.write_str("closed"),
        }
    }
}

/// Framing limits and error policy for a [`Peer`].
#[derive(Debug, Clone)]
pub struct PeerConfig {
    pub frame: FrameConfig,
    /// Close the connection when a handshake message fails to decode.
    pub close_on_handshake_error: bool,
    /// Close the connection when a steady-state message fails to decode.
    pub close_on_message_error: bool,
}

impl Default for PeerConfig {
    fn default() -> Self {
        Self {
            frame: FrameConfig::default(),
            close_on_handshake_error: true,
            close_on_message_error: false,
        }
    }
}

/// An outgoing message of either phase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    Handshake(HandshakeMessage),
    Steady(SteadyMessage),
}

impl Message {
    /// Wire name of the message, for logs and errors.
    pub fn name(&self) -> &'static str {
        match self {
            Message::Handshake(m) => m.msg_type(),
            Message::Steady(m) => m.request_type().name(),
        }
    }

    /// The phase in which this message may be sent.
    pub fn phase(&self) -> ConnectionPhase {
        match self {
            Message::Handshake(_) => ConnectionPhase::Handshaking,
            Message::Steady(_) => ConnectionPhase::Established,
        }
    }
}

impl From<HandshakeMessage> for Message {
    fn from(m: HandshakeMessage) -> Self {
        Message::Handshake(m)
    }
}

impl From<SteadyMessage> for Message {
    fn from(m: SteadyMessage) -> Self {
        Message::Steady(m)
    }
}

macro_rules! impl_from_message {
    ($outer:ident => $($ty:path),* $(,)?) => {
        $(
            impl From<$ty> for Message {
                fn from(m: $ty) -> Self {
                    Message::$outer(m.into())
                }
            }
        )*
    };
}

impl_from_message!(Handshake =>
    handshake::ClientInit,
    handshake::ClientDenied,
    handshake::ClientRegistered,
    handshake::SetupData,
    handshake::SetupFailed,
    handshake::SetupDone,
    handshake::Login,
    handshake::LoginFailed,
    handshake::LoginSuccess,
    handshake::SessionState,
);

impl_from_message!(Steady =>
    steady::SyncMessage,
    steady::RpcCall,
    steady::InitRequest,
    steady::InitData,
    steady::HeartBeat,
    steady::HeartBeatReply,
);

/// Receives decoded messages from [`Peer::on_readable`].
///
/// Every callback gets the connection, so a handler can reply or complete
/// the handshake while a batch of frames is being drained.
pub trait Handler<S> {
    fn handle_handshake(&mut self, conn: &mut Connection<S>, message: HandshakeMessage);

    fn handle_message(&mut self, conn: &mut Connection<S>, message: SteadyMessage);

    /// A handshake payload that did not decode to a message.
    fn protocol_error(&mut self, conn: &mut Connection<S>, error: &ProtocolError) {
        let _ = (conn, error);
    }

    /// Receive progress of the frame currently arriving.
    fn transfer_progress(&mut self, progress: TransferProgress) {
        let _ = progress;
    }
}

/// The write half of a peer: the stream, the frame writer and the phase.
#[derive(Debug)]
pub struct Connection<S> {
    stream: S,
    writer: FrameWriter,
    phase: ConnectionPhase,
    config: PeerConfig,
}

impl<S: ByteStream> Connection<S> {
    fn new(stream: S, config: PeerConfig) -> Self {
        Self {
            stream,
            writer: FrameWriter::with_config(config.frame.clone()),
            phase: ConnectionPhase::Handshaking,
            config,
        }
    }

    pub fn phase(&self) -> ConnectionPhase {
        self.phase
    }

    pub fn state(&self) -> ConnectionState {
        if self.stream.is_open() {
            self.phase.into()
        } else {
            ConnectionState::Closed
        }
    }

    pub fn is_established(&self) -> bool {
        self.phase == ConnectionPhase::Established
    }

    pub fn is_open(&self) -> bool {
        self.stream.is_open()
    }

    pub fn config(&self) -> &PeerConfig {
        &self.config
    }

    /// Switch to the steady-state codec.
    ///
    /// Frames already buffered but not yet delivered are decoded with the
    /// new codec.
    pub fn complete_handshake(&mut self) -> Result<()> {
        if !self.stream.is_open() {
            return Err(PeerError::Closed);
        }
        if self.phase != ConnectionPhase::Handshaking {
            return Err(PeerError::InvalidTransition { from: self.phase });
        }
        self.phase = ConnectionPhase::Established;
        debug!("handshake complete, switching to steady-state codec");
        Ok(())
    }

    /// Encode and send one message.
    ///
    /// Sending on a closed connection is dropped with a warning.
    pub fn dispatch(&mut self, message: impl Into<Message>) -> Result<()> {
        let message = message.into();
        if message.phase() != self.phase {
            return Err(PeerError::WrongPhase {
                message: message.name(),
                phase: self.phase,
            });
        }
        if !self.stream.is_open() {
            warn!(message = message.name(), "can't write to a closed socket");
            return Ok(());
        }

        let values = match &message {
            Message::Handshake(m) => m.encode(),
            Message::Steady(m) => m.encode(),
        };
        let payload = match encode_sequence(&values) {
            Ok(payload) => payload,
            Err(err) => {
                warn!(message = message.name(), error = %err, "failed to serialize message");
                self.close(REASON_SERIALIZE);
                return Err(err.into());
            }
        };

        match self.writer.write_frame(&mut self.stream, &payload) {
            Ok(()) => {
                debug!(message = message.name(), bytes = payload.len(), "message sent");
                Ok(())
            }
            Err(FrameError::Closed) => {
                warn!(message = message.name(), "can't write to a closed socket");
                Ok(())
            }
            Err(err @ (FrameError::FrameTooLarge { .. } | FrameError::ZeroLength)) => {
                warn!(message = message.name(), error = %err, "failed to serialize message");
                self.close(REASON_SERIALIZE);
                Err(err.into())
            }
            Err(err) => {
                warn!(message = message.name(), error = %err, "write failed");
                Err(err.into())
            }
        }
    }

    /// Close the underlying stream. Later calls keep the first reason.
    pub fn close(&mut self, reason: &str) {
        if self.stream.is_open() {
            info!(reason, "closing connection");
            self.stream.close(reason);
        }
    }

    pub fn stream(&self) -> &S {
        &self.stream
    }

    pub fn stream_mut(&mut self) -> &mut S {
        &mut self.stream
    }
}

/// One end of a DataStream connection.
///
/// Feed it by calling [`on_readable`](Self::on_readable) whenever the
/// stream may have new bytes; send with [`dispatch`](Self::dispatch).
#[derive(Debug)]
pub struct Peer<S> {
    reader: FrameReader,
    conn: Connection<S>,
}

impl<S: ByteStream> Peer<S> {
    /// A peer in the handshake phase with default limits.
    pub fn new(stream: S) -> Self {
        Self::with_config(stream, PeerConfig::default())
    }

    pub fn with_config(stream: S, config: PeerConfig) -> Self {
        Self {
            reader: FrameReader::with_config(config.frame.clone()),
            conn: Connection::new(stream, config),
        }
    }

    /// Capability bits this peer supports.
    pub fn supported_features() -> u16 {
        SUPPORTED_FEATURES
    }

    /// Whether the given peer features are acceptable. All are.
    pub fn accepts_features(peer_features: u16) -> bool {
        let _ = peer_features;
        true
    }

    /// Capability bits in effect on this connection.
    pub fn enabled_features(&self) -> u16 {
        0
    }

    pub fn phase(&self) -> ConnectionPhase {
        self.conn.phase()
    }

    pub fn state(&self) -> ConnectionState {
        self.conn.state()
    }

    pub fn is_open(&self) -> bool {
        self.conn.is_open()
    }

    pub fn connection(&self) -> &Connection<S> {
        &self.conn
    }

    pub fn connection_mut(&mut self) -> &mut Connection<S> {
        &mut self.conn
    }

    pub fn complete_handshake(&mut self) -> Result<()> {
        self.conn.complete_handshake()
    }

    pub fn dispatch(&mut self, message: impl Into<Message>) -> Result<()> {
        self.conn.dispatch(message)
    }

    pub fn close(&mut self, reason: &str) {
        self.conn.close(reason);
    }

    pub fn stream(&self) -> &S {
        self.conn.stream()
    }

    pub fn stream_mut(&mut self) -> &mut S {
        self.conn.stream_mut()
    }

    pub fn into_stream(self) -> S {
        self.conn.stream
    }

    /// Drain every complete frame from the stream and deliver it.
    ///
    /// Returns the number of messages delivered. Stops when the next frame
    /// is incomplete or the connection closes.
    pub fn on_readable<H: Handler<S>>(&mut self, handler: &mut H) -> usize {
        let mut delivered = 0;

        while self.conn.is_open() {
            let frame = match self.reader.try_read_frame(&mut self.conn.stream) {
                Ok(FrameStatus::NoFrameYet) => break,
                Ok(FrameStatus::Partial(progress)) => {
                    handler.transfer_progress(progress);
                    break;
                }
                Ok(FrameStatus::Complete(frame)) => {
                    let size = frame.wire_size();
                    handler.transfer_progress(TransferProgress {
                        received: size,
                        total: size,
                    });
                    frame
                }
                Err(err) => {
                    // The reader has already closed the stream.
                    debug!(error = %err, "stopped reading");
                    break;
                }
            };

            let values = match decode_sequence(&frame.payload) {
                Ok(values) => values,
                Err(err) => {
                    warn!(error = %err, bytes = frame.payload.len(), "undecodable payload");
                    self.conn.close(REASON_CORRUPT);
                    break;
                }
            };

            match self.conn.phase {
                ConnectionPhase::Handshaking => match HandshakeMessage::decode(values) {
                    Ok(message) => {
                        debug!(msg_type = message.msg_type(), "handshake message received");
                        handler.handle_handshake(&mut self.conn, message);
                        delivered += 1;
                    }
                    Err(err) => {
                        warn!(error = %err, "invalid handshake message");
                        handler.protocol_error(&mut self.conn, &err);
                        if self.conn.config.close_on_handshake_error {
                            self.conn.close(&format!("Invalid handshake message: {err}"));
                        }
                    }
                },
                ConnectionPhase::Established => match SteadyMessage::decode(values) {
                    Ok(message) => {
                        debug!(request = %message.request_type(), "message received");
                        handler.handle_message(&mut self.conn, message);
                        delivered += 1;
                    }
                    Err(err) => {
                        warn!(error = %err, "dropping invalid message");
                        if self.conn.config.close_on_message_error {
                            self.conn.close(&format!("Invalid message: {err}"));
                        }
                    }
                },
            }
        }

        delivered
    }
}
