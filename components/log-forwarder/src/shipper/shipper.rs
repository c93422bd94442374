//! Shipper - responsibility and behavior
//!
//! The Shipper takes *already-parsed* records and forwards them to the
//! downstream ingestion endpoint (e.g. a Logstash `tcp` input using the
//! `json_lines` codec) over a plain TCP connection.
//!
//! Key responsibilities:
//! - Open one TCP connection per delivery attempt, bounded by a connect
//!   timeout, and close it on every exit path.
//! - Split the records into fixed-size batches, preserving order.
//! - Encode every record as one line of JSON terminated by `\n` and write a
//!   whole batch as one buffer.
//! - Report failures as values; the Shipper never retries on its own.
//!
//! Important design notes:
//! - Delivery is write-only. Nothing is read back from the destination, so
//!   there is no acknowledgment and no backpressure signal.
//! - A failed attempt is not rolled back. Batches written before the failure
//!   stay delivered and are sent again by the next attempt, so the
//!   destination sees every record *at least once*.

// Local crates
use crate::{
    helpers::load_config::{
        DEFAULT_BATCH_SIZE, DEFAULT_CONNECT_TIMEOUT_MS, DEFAULT_WRITE_TIMEOUT_MS, ShipperConfig,
    },
    metrics::metrics::{
        BATCH_WRITE_DURATION_SECONDS, BATCHES_WRITTEN_TOTAL, BYTES_WRITTEN_TOTAL,
        SERIALIZATION_FAILURES_TOTAL, observe_duration,
    },
    parser::record::Record,
};

// External crates
use bytes::{BufMut, Bytes, BytesMut};
use serde::Serialize;
use std::future::Future;
use std::io;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::instrument;

/// Line delimiter between encoded records.
const RECORD_DELIMITER: u8 = b'\n';

/// Shipper error handling
/// - Clearly separates connection problems from write problems so the caller
///   can log them meaningfully. Every variant is retryable.
#[derive(Debug, thiserror::Error)]
pub enum ShipperError {
    /// The destination refused the connection or could not be resolved.
    #[error("connection failed to {target}: {source}")]
    ConnectionFailed {
        /// `host:port` of the destination.
        target: String,
        /// Underlying socket error.
        #[source]
        source: io::Error,
    },

    /// The connection was not established within the connect timeout.
    #[error("connection to {target} timed out after {timeout:?}")]
    ConnectTimeout {
        /// `host:port` of the destination.
        target: String,
        /// Configured connect timeout.
        timeout: Duration,
    },

    /// Writing a batch failed part-way.
    #[error("write of batch {batch} failed: {source}")]
    WriteFailed {
        /// Zero-based batch index within the attempt.
        batch: usize,
        /// Underlying socket error.
        #[source]
        source: io::Error,
    },

    /// Writing a batch did not finish within the write timeout.
    #[error("write of batch {batch} timed out after {timeout:?}")]
    WriteTimeout {
        /// Zero-based batch index within the attempt.
        batch: usize,
        /// Configured write timeout.
        timeout: Duration,
    },
}

/// Outcome of one successful delivery attempt.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SendSummary {
    /// Batches fully written to the connection.
    pub batches_written: usize,
    /// Records contained in the written batches.
    pub records_written: usize,
    /// Records dropped because they could not be encoded.
    pub records_skipped: usize,
    /// Payload bytes written.
    pub bytes_written: usize,
}

/// Destination for a complete record set.
///
/// One call is one delivery attempt: it either delivers everything it could
/// encode and returns `Ok`, or stops at the first network failure and returns
/// `Err`. Implementations must not retry internally.
pub trait RecordSink {
    /// Deliver `records` in order.
    fn send_all(
        &self,
        records: &[Record],
    ) -> impl Future<Output = Result<SendSummary, ShipperError>>;
}

/// One batch of encoded records, ready to be written as a single buffer.
#[derive(Debug, Clone, Default)]
pub struct EncodedBatch {
    /// Newline-delimited JSON lines.
    pub payload: Bytes,
    /// Records present in `payload`.
    pub encoded: usize,
    /// Records that failed to serialize and were left out.
    pub skipped: usize,
}

impl EncodedBatch {
    /// True when no record of the batch could be encoded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.encoded == 0
    }
}

/// Encode every item of `batch` as one JSON line.
///
/// Items that fail to serialize are logged and skipped; they never abort the
/// rest of the batch.
pub fn encode_batch<T: Serialize>(batch: &[T]) -> EncodedBatch {
    let mut payload = BytesMut::with_capacity(batch.len() * 64);
    let mut encoded = 0;
    let mut skipped = 0;

    for item in batch {
        // Serialize to a scratch buffer first so a failure cannot leave a
        // half-written line in the payload.
        match serde_json::to_vec(item) {
            Ok(line) => {
                payload.put_slice(&line);
                payload.put_u8(RECORD_DELIMITER);
                encoded += 1;
            }
            Err(e) => {
                SERIALIZATION_FAILURES_TOTAL.inc();
                skipped += 1;
                tracing::error!(error = %e, "Error serializing record, skipping it");
            }
        }
    }

    EncodedBatch {
        payload: payload.freeze(),
        encoded,
        skipped,
    }
}

/// TCP batch sender.
///
/// Owns nothing between calls: every [`RecordSink::send_all`] opens a fresh
/// connection and drops it before returning.
#[derive(Debug)]
pub struct BatchSender {
    host: String,
    port: u16,
    batch_size: usize,
    connect_timeout: Duration,
    write_timeout: Duration,
    connection_attempts: AtomicU64,
}

impl BatchSender {
    /// Create a sender for `host:port` with default batching and timeouts.
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            batch_size: DEFAULT_BATCH_SIZE,
            connect_timeout: Duration::from_millis(DEFAULT_CONNECT_TIMEOUT_MS),
            write_timeout: Duration::from_millis(DEFAULT_WRITE_TIMEOUT_MS),
            connection_attempts: AtomicU64::new(0),
        }
    }

    /// Create a sender from the `[shipper]` configuration section.
    #[must_use]
    pub fn from_config(config: &ShipperConfig) -> Self {
        Self::new(config.host.clone(), config.port)
            .with_batch_size(config.batch_size)
            .with_connect_timeout(config.connect_timeout())
            .with_write_timeout(config.write_timeout())
    }

    /// Set the number of records per batch (at least 1)
    #[must_use]
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Set connect timeout
    #[must_use]
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set per-batch write timeout
    #[must_use]
    pub fn with_write_timeout(mut self, timeout: Duration) -> Self {
        self.write_timeout = timeout;
        self
    }

    /// `host:port` of the destination.
    #[must_use]
    pub fn target(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Records per batch.
    #[must_use]
    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Number of connections this sender has tried to open.
    #[must_use]
    pub fn connection_attempts(&self) -> u64 {
        self.connection_attempts.load(Ordering::Relaxed)
    }

    /// Open a connection to the destination, bounded by the connect timeout.
    async fn connect(&self) -> Result<TcpStream, ShipperError> {
        self.connection_attempts.fetch_add(1, Ordering::Relaxed);

        let connect_result = timeout(
            self.connect_timeout,
            TcpStream::connect((self.host.as_str(), self.port)),
        )
        .await;

        let stream = match connect_result {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => {
                return Err(ShipperError::ConnectionFailed {
                    target: self.target(),
                    source: e,
                });
            }
            Err(_) => {
                return Err(ShipperError::ConnectTimeout {
                    target: self.target(),
                    timeout: self.connect_timeout,
                });
            }
        };

        // Set TCP_NODELAY for lower latency (non-fatal if it fails)
        if let Err(e) = stream.set_nodelay(true) {
            tracing::debug!(
                error = %e,
                "Failed to set TCP_NODELAY, continuing with default buffering"
            );
        }

        Ok(stream)
    }

    /// Write one whole batch buffer, bounded by the write timeout.
    async fn write_batch(
        &self,
        stream: &mut TcpStream,
        batch: usize,
        payload: &[u8],
    ) -> Result<(), ShipperError> {
        let start = Instant::now();

        match timeout(self.write_timeout, stream.write_all(payload)).await {
            Ok(Ok(())) => {
                observe_duration(&BATCH_WRITE_DURATION_SECONDS, start);
                Ok(())
            }
            Ok(Err(e)) => Err(ShipperError::WriteFailed { batch, source: e }),
            Err(_) => Err(ShipperError::WriteTimeout {
                batch,
                timeout: self.write_timeout,
            }),
        }
    }

    async fn deliver(&self, records: &[Record]) -> Result<SendSummary, ShipperError> {
        let mut stream = self.connect().await?;
        tracing::info!(
            target_addr = %self.target(),
            records = records.len(),
            batch_size = self.batch_size,
            "Connected to destination, sending data"
        );

        let mut summary = SendSummary::default();

        for (index, batch) in records.chunks(self.batch_size).enumerate() {
            let encoded = encode_batch(batch);
            summary.records_skipped += encoded.skipped;

            if encoded.is_empty() {
                tracing::warn!(
                    batch = index,
                    skipped = encoded.skipped,
                    "No record of the batch could be serialized, skipping batch"
                );
                continue;
            }

            self.write_batch(&mut stream, index, &encoded.payload).await?;

            BATCHES_WRITTEN_TOTAL.inc();
            BYTES_WRITTEN_TOTAL.inc_by(encoded.payload.len() as u64);
            summary.batches_written += 1;
            summary.records_written += encoded.encoded;
            summary.bytes_written += encoded.payload.len();

            tracing::trace!(
                batch = index,
                sent = summary.records_written,
                total = records.len(),
                "Batch written"
            );
        }

        // Everything is already handed to the socket; a failed half-close only
        // affects how the peer observes EOF.
        if let Err(e) = stream.shutdown().await {
            tracing::debug!(error = %e, "Failed to shut down connection cleanly");
        }

        Ok(summary)
    }
}

impl RecordSink for BatchSender {
    #[instrument(
        name = "log_forwarder_shipper::send_all",
        target = "shipper::shipper::BatchSender",
        skip_all,
        fields(records = records.len()),
        level = "debug"
    )]
    async fn send_all(&self, records: &[Record]) -> Result<SendSummary, ShipperError> {
        if records.is_empty() {
            tracing::info!("No data to send");
            return Ok(SendSummary::default());
        }

        match self.deliver(records).await {
            Ok(summary) => {
                tracing::info!(
                    target_addr = %self.target(),
                    records_written = summary.records_written,
                    records_skipped = summary.records_skipped,
                    batches_written = summary.batches_written,
                    bytes_written = summary.bytes_written,
                    "Successfully sent log entries"
                );
                Ok(summary)
            }
            Err(e) => {
                tracing::error!(
                    error = %e,
                    target_addr = %self.target(),
                    "Failed to connect or send to destination"
                );
                Err(e)
            }
        }
    }
}
