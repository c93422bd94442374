// Local crates
use crate::helpers::load_config::{LogFormat, LoggingConfig};

// External crates
use anyhow::{Context, Result};
use std::io;
use std::panic;
use tracing::error;
use tracing_appender::{non_blocking::WorkerGuard, rolling};
use tracing_error::ErrorLayer;
use tracing_subscriber::{
    Layer,
    filter::{Directive, EnvFilter},
    fmt,
    prelude::*,
    registry::Registry,
};

const LOG_FILE_PREFIX: &str = "log_forwarder.log";

/// Install the global tracing subscriber.
///
/// Console output goes to stderr. When `logging.directory` is set, events are
/// also written to a daily rolling file; keep the returned guard alive for the
/// lifetime of the process or buffered lines are lost.
pub fn init_tracing(config: &LoggingConfig) -> Result<Option<WorkerGuard>> {
    let mut filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .with_context(|| format!("Invalid logging level {:?}", config.level))?;

    // Keep the socket layer of tokio quiet unless asked for
    if let Ok(tokio_directive) = "tokio=warn".parse::<Directive>() {
        filter = filter.add_directive(tokio_directive);
    }

    let console_layer = match config.format {
        LogFormat::Text => fmt::layer()
            .with_writer(io::stderr)
            .with_target(false)
            .with_timer(fmt::time::UtcTime::rfc_3339())
            .boxed(),
        LogFormat::Json => fmt::layer()
            .json()
            .with_writer(io::stderr)
            .with_file(true)
            .with_line_number(true)
            .with_target(false)
            .with_timer(fmt::time::UtcTime::rfc_3339())
            .boxed(),
    };

    let (file_layer, guard) = match &config.directory {
        Some(directory) => {
            let file_appender = rolling::daily(directory, LOG_FILE_PREFIX);
            let (non_blocking_writer, guard) = tracing_appender::non_blocking(file_appender);
            let layer = fmt::layer()
                .json()
                .with_ansi(false)
                .with_writer(non_blocking_writer)
                .with_file(true)
                .with_line_number(true)
                .with_thread_ids(true)
                .with_target(false)
                .with_timer(fmt::time::UtcTime::rfc_3339());
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    let subscriber = Registry::default()
        .with(filter)
        .with(console_layer)
        .with(file_layer)
        .with(ErrorLayer::default());

    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set global tracing subscriber")?;

    Ok(guard)
}

/// Route panics through tracing so they end up in the same sinks as every
/// other event.
pub fn init_panic_handler() {
    panic::set_hook(Box::new(|panic_info| {
        let msg = match panic_info.payload().downcast_ref::<&str>() {
            Some(s) => (*s).to_owned(),
            None => match panic_info.payload().downcast_ref::<String>() {
                Some(s) => s.clone(),
                None => "Unknown panic".to_owned(),
            },
        };

        let location = panic_info
            .location()
            .map(|l| format!("{}:{}", l.file(), l.line()))
            .unwrap_or_else(|| "unknown location".to_string());

        error!(
            panic_message = %msg,
            location = %location,
            "Application panicked!"
        );
    }));
}
