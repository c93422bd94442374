// Local crates
use crate::{
    helpers::{load_config::Config, shutdown::Shutdown},
    metrics::metrics::{
        BATCHES_WRITTEN_TOTAL, BYTES_WRITTEN_TOTAL, FILE_READ_ERRORS_TOTAL,
        FILES_DISCOVERED_TOTAL, LINES_READ_TOTAL, RECORDS_PARSED_TOTAL, SEND_ATTEMPTS_TOTAL,
        SEND_FAILURES_TOTAL, SERIALIZATION_FAILURES_TOTAL,
    },
    parser::parser::RawLineParser,
    runtime::orchestrator::{
        DeliveryConfig, DeliveryOrchestrator, DeliveryReport, is_scannable_root,
    },
    shipper::shipper::BatchSender,
};

// External crates
use anyhow::{Result, bail};
use std::path::PathBuf;
use tracing::instrument;

/// Log Forwarder runtime initialization and run.
///
/// Validates the root directory before anything touches the network, then
/// drives one delivery to completion. Ctrl+C ends the run early; the
/// returned report is `None` in that case.
#[instrument(
    name = "log_forwarder_runtime::run",
    target = "runtime::runtime",
    skip_all,
    level = "debug"
)]
pub async fn run_log_forwarder(root: PathBuf, cfg: Config) -> Result<Option<DeliveryReport>> {
    if !is_scannable_root(&root) {
        tracing::error!(
            root = %root.display(),
            "Log folder not found. Please provide a valid directory path"
        );
        bail!("Log folder not found: {}", root.display());
    }

    let shutdown = Shutdown::new();
    shutdown.listen_for_ctrl_c();
    let mut shutdown_rx = shutdown.subscribe();

    tracing::debug!(
        destination = %cfg.shipper.target(),
        batch_size = cfg.shipper.batch_size,
        retry_delay = ?cfg.shipper.retry_delay(),
        "Initializing Log Forwarder components"
    );
    let sender = BatchSender::from_config(&cfg.shipper);
    let parser = RawLineParser::from_config(&cfg.parser);
    let mut orchestrator =
        DeliveryOrchestrator::new(DeliveryConfig::from_config(&root, &cfg), parser, sender);

    tokio::select! {
        report = orchestrator.run() => {
            log_run_summary(&report);
            tracing::info!("Log sending process complete");
            Ok(Some(report))
        }

        _ = shutdown_rx.recv() => {
            tracing::warn!(
                state = %orchestrator.state(),
                "Shutdown signal received, abandoning delivery"
            );
            Ok(None)
        }
    }
}

fn log_run_summary(report: &DeliveryReport) {
    tracing::info!(
        files_found = report.files_found,
        records_prepared = report.records_prepared,
        attempts = report.attempts,
        records_written = report.summary.map_or(0, |s| s.records_written),
        "Delivery finished"
    );

    tracing::debug!(
        files_discovered = FILES_DISCOVERED_TOTAL.get(),
        file_read_errors = FILE_READ_ERRORS_TOTAL.get(),
        lines_read = LINES_READ_TOTAL.get(),
        records_parsed = RECORDS_PARSED_TOTAL.get(),
        serialization_failures = SERIALIZATION_FAILURES_TOTAL.get(),
        send_attempts = SEND_ATTEMPTS_TOTAL.get(),
        send_failures = SEND_FAILURES_TOTAL.get(),
        batches_written = BATCHES_WRITTEN_TOTAL.get(),
        bytes_written = BYTES_WRITTEN_TOTAL.get(),
        "Pipeline metrics"
    );
}
