//! Delivery orchestration.
//!
//! Drives one complete run as a small state machine:
//!
//! ```text
//! Scanning -> Processing -> Sending -> Done
//!                             ^   |
//!                             |   v
//!                           RetryWait
//! ```
//!
//! The whole record set is built in memory before the first send attempt and
//! every retry resends it from the beginning. Retries never stop on their own;
//! a destination that stays unreachable keeps the run in the
//! `Sending`/`RetryWait` loop until the process is terminated.
//!
//! Streaming records to the sink while files are still being read would be the
//! natural next step for very large trees; it is not done here.

// Local crates
use crate::{
    helpers::load_config::{CollectorConfig, Config, DEFAULT_RETRY_DELAY_MS},
    metrics::metrics::{SEND_ATTEMPTS_TOTAL, SEND_FAILURES_TOTAL},
    parser::{parser::LineParser, record::Record},
    shipper::shipper::{RecordSink, SendSummary},
    tailer::reader::FileProcessor,
    watcher::discovery::FileCollector,
};

// External crates
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::time::sleep;
use tracing::instrument;

/// Where a run currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryState {
    /// Listing files below the root directory.
    Scanning,
    /// Reading every discovered file into records.
    Processing,
    /// Handing the complete record set to the sink.
    Sending,
    /// Pausing before the next full send attempt.
    RetryWait,
    /// Terminal state.
    Done,
}

impl fmt::Display for DeliveryState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Scanning => "scanning",
            Self::Processing => "processing",
            Self::Sending => "sending",
            Self::RetryWait => "retry_wait",
            Self::Done => "done",
        };
        f.write_str(name)
    }
}

/// Inputs of a delivery run.
#[derive(Debug, Clone)]
pub struct DeliveryConfig {
    /// Directory to scan.
    pub root: PathBuf,
    /// File discovery settings.
    pub collector: CollectorConfig,
    /// Fixed pause between two send attempts.
    pub retry_delay: Duration,
}

impl DeliveryConfig {
    /// Defaults for everything but the root directory.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            collector: CollectorConfig::default(),
            retry_delay: Duration::from_millis(DEFAULT_RETRY_DELAY_MS),
        }
    }

    /// Take collector and retry settings from a loaded configuration.
    #[must_use]
    pub fn from_config(root: impl Into<PathBuf>, config: &Config) -> Self {
        Self {
            root: root.into(),
            collector: config.collector.clone(),
            retry_delay: config.shipper.retry_delay(),
        }
    }

    /// Set the retry delay
    #[must_use]
    pub fn with_retry_delay(mut self, retry_delay: Duration) -> Self {
        self.retry_delay = retry_delay;
        self
    }

    /// Set the collector settings
    #[must_use]
    pub fn with_collector(mut self, collector: CollectorConfig) -> Self {
        self.collector = collector;
        self
    }
}

/// What a finished run did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeliveryReport {
    /// Files returned by the scan.
    pub files_found: usize,
    /// Records built from all files.
    pub records_prepared: usize,
    /// Send attempts made, including the successful one.
    pub attempts: u64,
    /// Summary of the successful attempt; `None` when there was nothing to send.
    pub summary: Option<SendSummary>,
}

/// Runs scan, processing and send-with-retry for one root directory.
#[derive(Debug)]
pub struct DeliveryOrchestrator<P, S> {
    config: DeliveryConfig,
    collector: FileCollector,
    processor: FileProcessor<P>,
    sink: S,
    state: DeliveryState,
}

impl<P, S> DeliveryOrchestrator<P, S>
where
    P: LineParser,
    S: RecordSink,
{
    /// Assemble an orchestrator. Nothing happens until [`Self::run`].
    #[must_use]
    pub fn new(config: DeliveryConfig, parser: P, sink: S) -> Self {
        Self {
            collector: FileCollector::new(config.collector.clone()),
            processor: FileProcessor::new(parser),
            config,
            sink,
            state: DeliveryState::Scanning,
        }
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> DeliveryState {
        self.state
    }

    /// The sink records are delivered to.
    #[must_use]
    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Run until `Done`.
    ///
    /// Only returns once the records were delivered, or when there was
    /// nothing to deliver.
    #[instrument(
        name = "log_forwarder::delivery",
        target = "runtime::orchestrator",
        skip_all,
        level = "debug"
    )]
    pub async fn run(&mut self) -> DeliveryReport {
        let mut report = DeliveryReport::default();
        let mut files: Vec<PathBuf> = Vec::new();
        let mut records: Vec<Record> = Vec::new();

        self.transition(DeliveryState::Scanning);

        loop {
            match self.state {
                DeliveryState::Scanning => {
                    tracing::info!(
                        root = %self.config.root.display(),
                        "Scanning for log files (including subfolders)"
                    );
                    files = self.collector.collect(&self.config.root);
                    report.files_found = files.len();

                    if files.is_empty() {
                        tracing::info!(
                            root = %self.config.root.display(),
                            "No files found in root folder or its subfolders"
                        );
                        self.transition(DeliveryState::Done);
                    } else {
                        tracing::info!(files = files.len(), "Found files, processing");
                        self.transition(DeliveryState::Processing);
                    }
                }

                DeliveryState::Processing => {
                    records = self.process_all(&files).await;
                    report.records_prepared = records.len();

                    if records.is_empty() {
                        tracing::info!("No processable log lines found in any file");
                        self.transition(DeliveryState::Done);
                    } else {
                        tracing::info!(
                            records = records.len(),
                            "Prepared log entries to send"
                        );
                        self.transition(DeliveryState::Sending);
                    }
                }

                DeliveryState::Sending => {
                    report.attempts += 1;
                    SEND_ATTEMPTS_TOTAL.inc();

                    match self.sink.send_all(&records).await {
                        Ok(summary) => {
                            report.summary = Some(summary);
                            self.transition(DeliveryState::Done);
                        }
                        Err(e) => {
                            SEND_FAILURES_TOTAL.inc();
                            tracing::warn!(
                                error = %e,
                                attempt = report.attempts,
                                retry_delay = ?self.config.retry_delay,
                                "Send attempt failed, will retry sending the full record set"
                            );
                            self.transition(DeliveryState::RetryWait);
                        }
                    }
                }

                DeliveryState::RetryWait => {
                    sleep(self.config.retry_delay).await;
                    self.transition(DeliveryState::Sending);
                }

                DeliveryState::Done => break,
            }
        }

        report
    }

    async fn process_all(&self, files: &[PathBuf]) -> Vec<Record> {
        let total = files.len();
        let mut records = Vec::new();

        for (index, path) in files.iter().enumerate() {
            records.extend(self.processor.process_file(path).await);

            let processed = index + 1;
            tracing::debug!(
                processed,
                total,
                percent = processed * 100 / total,
                path = %path.display(),
                "Processing files"
            );
        }

        tracing::info!(files = total, "File processing complete");
        records
    }

    fn transition(&mut self, next: DeliveryState) {
        tracing::trace!(from = %self.state, to = %next, "Delivery state transition");
        self.state = next;
    }
}

/// True when `root` is an existing directory.
#[must_use]
pub fn is_scannable_root(root: &Path) -> bool {
    root.is_dir()
}
