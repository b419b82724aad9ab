use std::fs;

use datastream_peer::Peer;
use datastream_transport::{ByteStream, MemoryStream};
use tracing::debug;

use crate::cmd::InspectArgs;
use crate::exit::{io_error, peer_error, CliResult, DATA_INVALID, SUCCESS};
use crate::output::{print_summary, OutputFormat, SummaryOutput};
use crate::session::SessionPrinter;

pub fn run(args: InspectArgs, format: OutputFormat) -> CliResult<i32> {
    let bytes = fs::read(&args.file)
        .map_err(|err| io_error(&format!("failed reading {}", args.file.display()), err))?;
    debug!(bytes = bytes.len(), "capture loaded");

    let mut peer = Peer::with_config(MemoryStream::with_inbound(bytes), args.peer.config());
    if args.established {
        peer.complete_handshake()
            .map_err(|err| peer_error("cannot start established", err))?;
    }

    let mut printer =
        SessionPrinter::new(format).switch_on_session_init(args.switch_on_session_init);
    peer.on_readable(&mut printer);

    let summary = SummaryOutput {
        delivered: printer.delivered(),
        protocol_errors: printer.protocol_errors().to_vec(),
        state: peer.state(),
        phase: peer.phase(),
        open: peer.is_open(),
        close_reason: peer.stream().close_reason().map(str::to_string),
        pending_bytes: peer.stream().bytes_available(),
    };
    print_summary(&summary, format);

    if summary.close_reason.is_some() || !summary.protocol_errors.is_empty() {
        return Ok(DATA_INVALID);
    }
    Ok(SUCCESS)
}
