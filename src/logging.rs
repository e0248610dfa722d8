//! Logging setup for `trellis` using `tracing` + `tracing-subscriber`.
//!
//! Priority for determining the log level:
//! 1. `--log-level` CLI flag (if provided)
//! 2. `TRELLIS_LOG` environment variable (e.g. "info", "debug")
//! 3. default to `info`

use clap::ValueEnum;
use tracing::Level;
use tracing_subscriber::fmt;

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum LogLevel {
  Error,
  Warn,
  Info,
  Debug,
  Trace,
}

impl From<LogLevel> for Level {
  fn from(level: LogLevel) -> Self {
    match level {
      LogLevel::Error => Level::ERROR,
      LogLevel::Warn => Level::WARN,
      LogLevel::Info => Level::INFO,
      LogLevel::Debug => Level::DEBUG,
      LogLevel::Trace => Level::TRACE,
    }
  }
}

/// Install the global subscriber. Call once, at startup.
///
/// Logs go to stderr so command output on stdout stays machine readable.
pub fn init_logging(cli_level: Option<LogLevel>) {
  let level = match cli_level {
    Some(level) => level.into(),
    None => std::env::var("TRELLIS_LOG")
      .ok()
      .and_then(|s| parse_level(&s))
      .unwrap_or(Level::INFO),
  };

  fmt()
    .with_max_level(level)
    .with_target(true)
    .with_writer(std::io::stderr)
    .init();
}

fn parse_level(s: &str) -> Option<Level> {
  match s.trim().to_lowercase().as_str() {
    "error" => Some(Level::ERROR),
    "warn" | "warning" => Some(Level::WARN),
    "info" => Some(Level::INFO),
    "debug" => Some(Level::DEBUG),
    "trace" => Some(Level::TRACE),
    _ => None,
  }
}
