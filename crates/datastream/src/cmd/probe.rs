use std::io::ErrorKind;
use std::net::TcpStream;
use std::time::{Duration, Instant};

use datastream_peer::{ClientInit, Connection, HandshakeMessage, Handler, Peer, SteadyMessage};
use datastream_transport::{SocketStream, TransportError};
use tracing::{debug, warn};

use crate::cmd::ProbeArgs;
use crate::exit::{
    io_error, peer_error, transport_error, CliError, CliResult, DATA_INVALID, FAILURE, SUCCESS,
    TIMEOUT, USAGE,
};
use crate::output::{print_handshake, OutputFormat};

const READ_TIMEOUT: Duration = Duration::from_millis(100);

pub fn run(args: ProbeArgs, format: OutputFormat) -> CliResult<i32> {
    let timeout = parse_duration(&args.timeout)?;
    let socket = TcpStream::connect(&args.addr).map_err(|err| io_error("connect failed", err))?;
    socket
        .set_read_timeout(Some(READ_TIMEOUT))
        .map_err(|err| io_error("socket setup failed", err))?;
    let stream = SocketStream::from_tcp(socket).map_err(|err| transport_error("socket setup failed", err))?;

    let mut peer = Peer::new(stream);
    peer.dispatch(ClientInit::new(args.client_version))
        .map_err(|err| peer_error("send failed", err))?;

    let mut catcher = ReplyCatcher::default();
    let deadline = Instant::now() + timeout;
    loop {
        match peer.stream_mut().fill() {
            Ok(_) => {}
            Err(TransportError::Io(err)) if err.kind() == ErrorKind::TimedOut => {}
            Err(err) => return Err(transport_error("receive failed", err)),
        }
        peer.on_readable(&mut catcher);

        if let Some(reply) = catcher.reply.take() {
            print_handshake(1, &reply, format);
            peer.close("probe finished");
            return Ok(exit_code_for(&reply));
        }
        if !peer.is_open() {
            let reason = peer.stream().close_reason().unwrap_or("unknown reason");
            return Err(CliError::new(FAILURE, format!("connection closed: {reason}")));
        }
        if Instant::now() >= deadline {
            return Err(CliError::new(
                TIMEOUT,
                format!("no answer within {}", args.timeout),
            ));
        }
    }
}

fn exit_code_for(reply: &HandshakeMessage) -> i32 {
    match reply {
        HandshakeMessage::ClientRegistered(_) => SUCCESS,
        HandshakeMessage::ClientDenied(_) => FAILURE,
        _ => DATA_INVALID,
    }
}

/// Keeps the first handshake message received.
#[derive(Default)]
struct ReplyCatcher {
    reply: Option<HandshakeMessage>,
}

impl<S> Handler<S> for ReplyCatcher {
    fn handle_handshake(&mut self, _conn: &mut Connection<S>, message: HandshakeMessage) {
        debug!(msg_type = message.msg_type(), "reply received");
        if self.reply.is_none() {
            self.reply = Some(message);
        }
    }

    fn handle_message(&mut self, _conn: &mut Connection<S>, message: SteadyMessage) {
        warn!(request = %message.request_type(), "unexpected message during probe");
    }
}

fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "duration must not be empty"));
    }

    let (number, millis) = if let Some(num) = input.strip_suffix("ms") {
        (num, true)
    } else if let Some(num) = input.strip_suffix('s') {
        (num, false)
    } else {
        (input, false)
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid duration value: {input}")))?;
    if value == 0 {
        return Err(CliError::new(USAGE, "duration must be greater than zero"));
    }

    Ok(if millis {
        Duration::from_millis(value)
    } else {
        Duration::from_secs(value)
    })
}
