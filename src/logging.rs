//! Tracing subscriber setup
//!
//! Installs one global subscriber for the binary, writing to stderr in
//! either human-readable or JSON form.

use std::io;

use tracing_subscriber::{fmt, EnvFilter};

/// Output format for log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Human-readable lines.
    #[default]
    Pretty,
    /// One JSON object per line, event fields flattened.
    Json,
}

/// Install the global tracing subscriber.
///
/// Filtering comes from `RUST_LOG`, defaulting to `info`. Logs go to
/// stderr so a chart drawn on stdout stays readable.
pub fn init_logging(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    match format {
        LogFormat::Pretty => fmt()
            .with_env_filter(filter)
            .with_writer(io::stderr)
            .init(),
        LogFormat::Json => fmt()
            .with_env_filter(filter)
            .with_writer(io::stderr)
            .json()
            .flatten_event(true)
            .init(),
    }
}
