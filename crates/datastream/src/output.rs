use std::io::IsTerminal;

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use datastream_peer::{ConnectionPhase, ConnectionState, HandshakeMessage, SteadyMessage};
use serde::Serialize;

#[derive(Clone, Debug, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

#[derive(Serialize)]
struct MessageOutput<'a, M> {
    index: usize,
    phase: ConnectionPhase,
    name: &'a str,
    message: &'a M,
}

/// What a session ended with.
#[derive(Debug, Serialize)]
pub struct SummaryOutput {
    pub delivered: usize,
    pub protocol_errors: Vec<String>,
    pub state: ConnectionState,
    /// Codec in use when the session ended, closed or not.
    pub phase: ConnectionPhase,
    pub open: bool,
    pub close_reason: Option<String>,
    /// Bytes left over that did not form a complete frame.
    pub pending_bytes: usize,
}

pub fn print_handshake(index: usize, message: &HandshakeMessage, format: OutputFormat) {
    print_message(
        index,
        ConnectionPhase::Handshaking,
        message.msg_type(),
        message,
        format,
    );
}

pub fn print_steady(index: usize, message: &SteadyMessage, format: OutputFormat) {
    print_message(
        index,
        ConnectionPhase::Established,
        message.request_type().name(),
        message,
        format,
    );
}

fn print_message<M: Serialize>(
    index: usize,
    phase: ConnectionPhase,
    name: &str,
    message: &M,
    format: OutputFormat,
) {
    match format {
        OutputFormat::Json => {
            let out = MessageOutput {
                index,
                phase,
                name,
                message,
            };
            println!("{}", to_json(&out));
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["#", "PHASE", "MESSAGE", "CONTENT"])
                .add_row(vec![
                    index.to_string(),
                    phase.to_string(),
                    name.to_string(),
                    to_json(message),
                ]);
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!("#{index} {phase} {name} {}", to_json(message));
        }
    }
}

pub fn print_summary(summary: &SummaryOutput, format: OutputFormat) {
    match format {
        OutputFormat::Json => println!("{}", to_json(summary)),
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["FIELD", "VALUE"])
                .add_row(vec!["delivered".to_string(), summary.delivered.to_string()])
                .add_row(vec!["state".to_string(), summary.state.to_string()])
                .add_row(vec!["phase".to_string(), summary.phase.to_string()])
                .add_row(vec!["open".to_string(), summary.open.to_string()])
                .add_row(vec![
                    "close_reason".to_string(),
                    summary.close_reason.clone().unwrap_or_default(),
                ])
                .add_row(vec![
                    "pending_bytes".to_string(),
                    summary.pending_bytes.to_string(),
                ]);
            for error in &summary.protocol_errors {
                table.add_row(vec!["protocol_error".to_string(), error.clone()]);
            }
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!(
                "delivered={} state={} phase={} pending_bytes={}",
                summary.delivered, summary.state, summary.phase, summary.pending_bytes
            );
            if let Some(reason) = &summary.close_reason {
                println!("closed: {reason}");
            }
            for error in &summary.protocol_errors {
                println!("protocol error: {error}");
            }
        }
    }
}

fn to_json<T: Serialize + ?Sized>(value: &T) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| "{}".to_string())
}
