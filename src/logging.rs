/// Structured logging setup using tracing
///
/// Writes to stderr ONLY (never stdout): the MCP transport owns stdout.
/// Auto-detects format: human-readable with ANSI colors when stderr is a terminal,
/// structured JSON when piped/redirected. When `log_file` is configured, a JSON
/// copy of every event is appended there as well.

use std::fs::{File, OpenOptions};
use std::io::IsTerminal;
use std::sync::Arc;
use tracing_subscriber::{
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter, Layer,
};
use crate::config::Config;

/// Initialize tracing subscriber with stderr output (plus optional file output)
///
/// Log level from config.log_level (default: info)
/// RUST_LOG env var can override at runtime
pub fn init_logging(config: &Config) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let stderr_layer = if std::io::stderr().is_terminal() {
        tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_ansi(true)
            .boxed()
    } else {
        tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .json()
            .boxed()
    };

    let (file_layer, file_error) = match config.log_file.as_deref().map(open_log_file) {
        Some(Ok(file)) => (
            Some(
                tracing_subscriber::fmt::layer()
                    .with_writer(Arc::new(file))
                    .with_ansi(false)
                    .json(),
            ),
            None,
        ),
        Some(Err(e)) => (None, Some(e)),
        None => (None, None),
    };

    // try_init: the CLI and tests may initialise more than once per process
    let _ = tracing_subscriber::registry()
        .with(env_filter)
        .with(stderr_layer)
        .with(file_layer)
        .try_init();

    if let Some(e) = file_error {
        tracing::warn!(
            log_file = ?config.log_file,
            error = %e,
            "Could not open log file, logging to stderr only"
        );
    }
}

fn open_log_file(path: &str) -> std::io::Result<File> {
    OpenOptions::new().create(true).append(true).open(path)
}
