mod cmd;
mod exit;
mod logging;
mod output;
mod session;

use clap::Parser;

use crate::cmd::Command;
use crate::logging::{init_logging, LogFormat, LogLevel};
use crate::output::OutputFormat;

#[derive(Parser, Debug)]
#[command(name = "datastream", version, about = "DataStream protocol tool")]
struct Cli {
    /// Output format.
    #[arg(long, value_name = "FORMAT", global = true)]
    format: Option<OutputFormat>,

    /// Log output format (stderr).
    #[arg(long, value_name = "FORMAT", default_value = "text", global = true)]
    log_format: LogFormat,

    /// Minimum log level (stderr).
    #[arg(long, value_name = "LEVEL", default_value = "info", global = true, env = "DATASTREAM_LOG_LEVEL")]
    log_level: LogLevel,

    #[command(subcommand)]
    command: Command,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.log_format, cli.log_level);

    let format = cli.format.unwrap_or_else(OutputFormat::default_for_stdout);
    match cmd::run(cli.command, format) {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("error: {err}");
            std::process::exit(err.code);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_inspect_subcommand() {
        let cli = Cli::try_parse_from([
            "datastream",
            "inspect",
            "capture.bin",
            "--switch-on-session-init",
            "--format",
            "json",
        ])
        .expect("inspect args should parse");

        assert!(matches!(cli.command, Command::Inspect(_)));
        assert_eq!(cli.format, Some(OutputFormat::Json));
    }

    #[test]
    fn rejects_conflicting_phase_flags() {
        let err = Cli::try_parse_from([
            "datastream",
            "inspect",
            "capture.bin",
            "--established",
            "--switch-on-session-init",
        ])
        .expect_err("conflicting args should fail");

        assert_eq!(err.kind(), clap::error::ErrorKind::ArgumentConflict);
    }

    #[test]
    fn parses_probe_defaults() {
        let cli = Cli::try_parse_from(["datastream", "probe", "127.0.0.1:4242"])
            .expect("probe args should parse");
        match cli.command {
            Command::Probe(args) => {
                assert_eq!(args.client_version, env!("CARGO_PKG_VERSION"));
                assert_eq!(args.timeout, "5s");
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn parses_listen_count() {
        let cli = Cli::try_parse_from(["datastream", "listen", "127.0.0.1:0", "--count", "3"])
            .expect("listen args should parse");
        assert!(matches!(cli.command, Command::Listen(ref args) if args.count == Some(3)));
    }
}
