use datastream_peer::{Connection, HandshakeMessage, Handler, ProtocolError, SteadyMessage};
use datastream_transport::ByteStream;
use tracing::{info, warn};

use crate::output::{print_handshake, print_steady, OutputFormat};

/// Close reason used once `--count` messages have been printed.
pub const REASON_LIMIT: &str = "message limit reached";

/// Prints every delivered message and optionally drives the session.
pub struct SessionPrinter {
    format: OutputFormat,
    switch_on_session_init: bool,
    reply_to_heartbeats: bool,
    limit: Option<usize>,
    delivered: usize,
    protocol_errors: Vec<String>,
}

impl SessionPrinter {
    pub fn new(format: OutputFormat) -> Self {
        Self {
            format,
            switch_on_session_init: false,
            reply_to_heartbeats: false,
            limit: None,
            delivered: 0,
            protocol_errors: Vec::new(),
        }
    }

    /// Complete the handshake when a `SessionInit` arrives.
    pub fn switch_on_session_init(mut self, enabled: bool) -> Self {
        self.switch_on_session_init = enabled;
        self
    }

    /// Answer every `HeartBeat` with a `HeartBeatReply`.
    pub fn reply_to_heartbeats(mut self, enabled: bool) -> Self {
        self.reply_to_heartbeats = enabled;
        self
    }

    /// Close the connection after `limit` printed messages.
    pub fn limit(mut self, limit: Option<usize>) -> Self {
        self.limit = limit;
        self
    }

    pub fn delivered(&self) -> usize {
        self.delivered
    }

    pub fn protocol_errors(&self) -> &[String] {
        &self.protocol_errors
    }

    pub fn limit_reached(&self) -> bool {
        self.limit.is_some_and(|limit| self.delivered >= limit)
    }

    fn count<S: ByteStream>(&mut self, conn: &mut Connection<S>) {
        self.delivered = self.delivered.saturating_add(1);
        if self.limit_reached() {
            conn.close(REASON_LIMIT);
        }
    }
}

impl<S: ByteStream> Handler<S> for SessionPrinter {
    fn handle_handshake(&mut self, conn: &mut Connection<S>, message: HandshakeMessage) {
        if self.limit_reached() {
            return;
        }
        print_handshake(self.delivered + 1, &message, self.format);

        if self.switch_on_session_init && matches!(message, HandshakeMessage::SessionState(_)) {
            match conn.complete_handshake() {
                Ok(()) => info!("session initialized, connection established"),
                Err(err) => warn!(error = %err, "could not complete handshake"),
            }
        }
        self.count(conn);
    }

    fn handle_message(&mut self, conn: &mut Connection<S>, message: SteadyMessage) {
        if self.limit_reached() {
            return;
        }
        print_steady(self.delivered + 1, &message, self.format);

        if self.reply_to_heartbeats {
            if let SteadyMessage::HeartBeat(beat) = &message {
                if let Err(err) = conn.dispatch(beat.reply()) {
                    warn!(error = %err, "could not answer heartbeat");
                }
            }
        }
        self.count(conn);
    }

    fn protocol_error(&mut self, _conn: &mut Connection<S>, error: &ProtocolError) {
        self.protocol_errors.push(error.to_string());
    }
}

#[cfg(test)]
mod tests {
    use datastream_peer::{ConnectionPhase, HeartBeat, Peer, SessionState};
    use datastream_transport::MemoryStream;
    use datastream_value::{encode_sequence, Timestamp};

    use super::*;

    fn framed(values: &[datastream_value::Value]) -> Vec<u8> {
        let payload = encode_sequence(values).unwrap();
        let mut out = (payload.len() as u32).to_be_bytes().to_vec();
        out.extend_from_slice(&payload);
        out
    }

    #[test]
    fn switches_and_answers_heartbeats() {
        let beat = HeartBeat::new(Timestamp::from_millis(5));
        let mut stream = MemoryStream::new();
        stream.feed(framed(&HandshakeMessage::from(SessionState::default()).encode()));
        stream.feed(framed(&SteadyMessage::from(beat).encode()));

        let mut peer = Peer::new(stream);
        let mut printer = SessionPrinter::new(OutputFormat::Json)
            .switch_on_session_init(true)
            .reply_to_heartbeats(true);

        assert_eq!(peer.on_readable(&mut printer), 2);
        assert_eq!(printer.delivered(), 2);
        assert_eq!(peer.phase(), ConnectionPhase::Established);

        let written = peer.stream_mut().take_written();
        assert_eq!(
            written.as_ref(),
            framed(&SteadyMessage::from(beat.reply()).encode()).as_slice()
        );
    }

    #[test]
    fn limit_closes_connection() {
        let mut stream = MemoryStream::new();
        for _ in 0..3 {
            stream.feed(framed(&HandshakeMessage::from(SessionState::default()).encode()));
        }

        let mut peer = Peer::new(stream);
        let mut printer = SessionPrinter::new(OutputFormat::Json).limit(Some(2));

        assert_eq!(peer.on_readable(&mut printer), 2);
        assert!(printer.limit_reached());
        assert_eq!(peer.stream().close_reason(), Some(REASON_LIMIT));
    }
}
