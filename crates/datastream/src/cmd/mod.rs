use clap::{Args, Subcommand};
use datastream_frame::{FrameConfig, MAX_FRAME_SIZE};
use datastream_peer::PeerConfig;
use std::path::PathBuf;

use crate::exit::CliResult;
use crate::output::OutputFormat;

pub mod inspect;
pub mod listen;
pub mod probe;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Decode a raw capture of one direction of a connection.
    Inspect(InspectArgs),
    /// Accept one connection and print received messages.
    Listen(ListenArgs),
    /// Send ClientInit to a core and print its answer.
    Probe(ProbeArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Inspect(args) => inspect::run(args, format),
        Command::Listen(args) => listen::run(args, format),
        Command::Probe(args) => probe::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

#[derive(Args, Debug)]
pub struct InspectArgs {
    /// Capture file holding the raw bytes received on a connection.
    pub file: PathBuf,
    /// Treat the capture as starting after the handshake.
    #[arg(long, conflicts_with = "switch_on_session_init")]
    pub established: bool,
    /// Switch to the steady-state codec after a SessionInit message.
    #[arg(long)]
    pub switch_on_session_init: bool,
    #[command(flatten)]
    pub peer: PeerArgs,
}

#[derive(Args, Debug)]
pub struct ListenArgs {
    /// Address to bind, e.g. 127.0.0.1:4242.
    pub addr: String,
    /// Exit after printing N messages.
    #[arg(long)]
    pub count: Option<usize>,
    #[command(flatten)]
    pub peer: PeerArgs,
}

#[derive(Args, Debug)]
pub struct ProbeArgs {
    /// Core address, e.g. 127.0.0.1:4242.
    pub addr: String,
    /// Version string announced in ClientInit.
    #[arg(long, default_value = env!("CARGO_PKG_VERSION"))]
    pub client_version: String,
    /// Maximum time to wait for the answer (e.g. 5s, 500ms).
    #[arg(long, default_value = "5s")]
    pub timeout: String,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

/// Framing limit and decode-error policy shared by commands that run a peer.
#[derive(Args, Debug)]
pub struct PeerArgs {
    /// Maximum frame payload size in bytes.
    #[arg(long, value_name = "BYTES", default_value_t = MAX_FRAME_SIZE)]
    pub max_frame_size: usize,
    /// Keep the connection open after an invalid handshake message.
    #[arg(long)]
    pub tolerate_handshake_errors: bool,
    /// Close the connection on an invalid steady-state message.
    #[arg(long)]
    pub strict: bool,
}

impl PeerArgs {
    pub fn config(&self) -> PeerConfig {
        PeerConfig {
            frame: FrameConfig {
                max_frame_size: self.max_frame_size,
            },
            close_on_handshake_error: !self.tolerate_handshake_errors,
            close_on_message_error: self.strict,
        }
    }
}
