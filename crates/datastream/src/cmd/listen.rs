use std::io::ErrorKind;
use std::net::TcpListener;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use datastream_peer::Peer;
use datastream_transport::{SocketStream, TransportError};
use tracing::info;

use crate::cmd::ListenArgs;
use crate::exit::{io_error, transport_error, CliError, CliResult, INTERNAL, SUCCESS};
use crate::output::OutputFormat;
use crate::session::SessionPrinter;

const POLL_INTERVAL: Duration = Duration::from_millis(25);
const READ_TIMEOUT: Duration = Duration::from_millis(200);

pub fn run(args: ListenArgs, format: OutputFormat) -> CliResult<i32> {
    let listener = TcpListener::bind(&args.addr).map_err(|err| io_error("bind failed", err))?;
    listener
        .set_nonblocking(true)
        .map_err(|err| io_error("bind failed", err))?;
    if let Ok(local) = listener.local_addr() {
        info!(addr = %local, "listening");
    }

    let running = Arc::new(AtomicBool::new(true));
    install_ctrlc_handler(running.clone())?;

    let socket = loop {
        if !running.load(Ordering::SeqCst) {
            return Ok(SUCCESS);
        }
        match listener.accept() {
            Ok((socket, remote)) => {
                info!(remote = %remote, "peer connected");
                break socket;
            }
            Err(err) if err.kind() == ErrorKind::WouldBlock => thread::sleep(POLL_INTERVAL),
            Err(err) => return Err(io_error("accept failed", err)),
        }
    };
    socket
        .set_nonblocking(false)
        .and_then(|()| socket.set_read_timeout(Some(READ_TIMEOUT)))
        .map_err(|err| io_error("socket setup failed", err))?;

    let stream = SocketStream::from_tcp(socket).map_err(|err| transport_error("socket setup failed", err))?;
    let mut peer = Peer::with_config(stream, args.peer.config());
    let mut printer = SessionPrinter::new(format)
        .switch_on_session_init(true)
        .reply_to_heartbeats(true)
        .limit(args.count);

    while running.load(Ordering::SeqCst) && peer.is_open() {
        match peer.stream_mut().fill() {
            Ok(_) => {}
            Err(TransportError::Io(err)) if err.kind() == ErrorKind::TimedOut => continue,
            Err(err) => return Err(transport_error("receive failed", err)),
        }
        peer.on_readable(&mut printer);
    }

    if let Some(reason) = peer.stream().close_reason() {
        info!(reason, delivered = printer.delivered(), "connection finished");
    }
    Ok(SUCCESS)
}

fn install_ctrlc_handler(running: Arc<AtomicBool>) -> CliResult<()> {
    ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
    })
    .map_err(|err| CliError::new(INTERNAL, format!("signal handler setup failed: {err}")))
}
