//!
//! src/logging.rs
//!
//! Initializes the tracing subscriber shared by both pipelines.
//! Logs go to stderr so the printed table and plot own stdout.
//!

use tracing_subscriber::{EnvFilter, fmt, prelude::*};
use tracing_error::ErrorLayer;
use tracing_appender::non_blocking;

use crate::config::{LogFormat, LoggingConfig};
use crate::errors::ReportError;

/// Flushes buffered log lines when dropped; hold it until main returns
pub struct LoggingGuard(tracing_appender::non_blocking::WorkerGuard);

pub fn init_logging(cfg: &LoggingConfig) -> Result<LoggingGuard, ReportError> {
    let (writer, guard) = non_blocking(std::io::stderr());
    let filter = std::env::var("RUST_LOG")
        .ok()
        .map(EnvFilter::new)
        .unwrap_or_else(|| EnvFilter::new(cfg.filter_directives.clone()));

    let time = fmt::time::UtcTime::rfc_3339();
    let base = fmt::layer()
        .with_writer(writer)
        .with_timer(time)
        .with_ansi(cfg.with_ansi)
        .with_target(cfg.include_target)
        .with_file(cfg.include_file_line)
        .with_line_number(cfg.include_file_line);

    let registry = tracing_subscriber::registry()
        .with(filter)
        .with(ErrorLayer::default());

    let result = match cfg.format {
        LogFormat::Json => registry
            .with(base.json().flatten_event(true).with_current_span(true))
            .try_init(),
        LogFormat::Pretty => registry
            .with(base.compact())
            .try_init(),
    };
    result.map_err(|e| ReportError::Config(format!("logging init: {e}")))?;

    Ok( LoggingGuard(guard) )
}
