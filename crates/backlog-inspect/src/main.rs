//! backlog-inspect entry point.
//!
//! Decodes hex-encoded backlog messages given on the command line or read
//! from a capture file (one message per line, `#` starts a comment) and
//! prints a report for each.

use std::path::PathBuf;

use anyhow::{bail, Context};
use clap::Parser;
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;

use backlog_core::{BacklogConfig, MessageTypeRegistry};
use backlog_inspect::{parse_hex_message, render_message};

#[derive(Parser, Debug)]
#[command(name = "backlog-inspect", version, about = "Decode captured backlog messages")]
struct Cli {
    /// TOML file with `[codec]` limits and extra `[plugins]` type codes.
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Capture file with one hex-encoded message per line.
    #[arg(long, value_name = "PATH")]
    file: Option<PathBuf>,

    /// Default log filter, overridden by `RUST_LOG`.
    #[arg(long, value_name = "LEVEL", default_value = "info")]
    log_level: String,

    /// Hex-encoded messages.
    #[arg(value_name = "HEX")]
    messages: Vec<String>,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr so reports on stdout stay clean.
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level)),
        )
        .init();

    let config = match &cli.config {
        Some(path) => BacklogConfig::load(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => BacklogConfig::default(),
    };
    let registry = MessageTypeRegistry::from_config(&config).context("registering plugins")?;
    debug!(plugins = registry.plugins().count(), "message type registry ready");

    let mut lines = cli.messages.clone();
    if let Some(path) = &cli.file {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading capture {}", path.display()))?;
        lines.extend(capture_lines(&content));
    }
    if lines.is_empty() {
        bail!("no messages given; pass hex strings or --file");
    }

    let mut failures = 0usize;
    for (index, line) in lines.iter().enumerate() {
        let report = parse_hex_message(line, config.codec.max_payload_size)
            .map_err(anyhow::Error::from)
            .and_then(|msg| render_message(&msg, &registry).map_err(anyhow::Error::from));
        match report {
            Ok(report) => println!("message {index}\n{report}"),
            Err(e) => {
                error!(index, "cannot decode message: {e}");
                failures += 1;
            }
        }
    }

    info!(total = lines.len(), failures, "inspection finished");
    if failures > 0 {
        bail!("{failures} of {} messages could not be decoded", lines.len());
    }
    Ok(())
}

/// Non-empty, non-comment lines of a capture file.
fn capture_lines(content: &str) -> impl Iterator<Item = String> + '_ {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parses_hex_arguments_and_config() {
        let cli = Cli::try_parse_from([
            "backlog-inspect",
            "--config",
            "/etc/backlog.toml",
            "0a0000000000000000",
            "020000000000000000",
        ])
        .expect("args should parse");

        assert_eq!(cli.config, Some(PathBuf::from("/etc/backlog.toml")));
        assert_eq!(cli.messages.len(), 2);
        assert_eq!(cli.log_level, "info");
    }

    #[test]
    fn test_parses_capture_file_without_positional_messages() {
        let cli = Cli::try_parse_from(["backlog-inspect", "--file", "capture.txt"])
            .expect("args should parse");

        assert_eq!(cli.file, Some(PathBuf::from("capture.txt")));
        assert!(cli.messages.is_empty());
    }

    #[test]
    fn test_log_level_flag_overrides_default() {
        let cli = Cli::try_parse_from([
            "backlog-inspect",
            "--log-level",
            "debug",
            "020000000000000000",
        ])
        .expect("args should parse");

        assert_eq!(cli.log_level, "debug");
    }

    #[test]
    fn test_capture_lines_skips_blanks_and_comments() {
        let content = "# ping from station 4\n020000000000000000\n\n  0a0000000000000000  \n";

        let lines: Vec<String> = capture_lines(content).collect();

        assert_eq!(lines, vec!["020000000000000000", "0a0000000000000000"]);
    }

    #[test]
    fn test_capture_file_messages_decode() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("capture.txt");
        std::fs::write(&path, "# header only\n3c e803000000000000\n").unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let line = capture_lines(&content).next().unwrap();
        let msg = parse_hex_message(&line, backlog_core::MAX_PAYLOAD_SIZE).unwrap();

        assert_eq!(msg.msg_type(), 60);
        assert_eq!(msg.timestamp(), 1000);
    }
}
