#![allow(missing_docs)]

// External crates
use lazy_static::lazy_static;
use prometheus::{
    Histogram, IntCounter, register_histogram, register_int_counter,
};
use std::time::Instant;

/// Helper to observe histogram duration
pub fn observe_duration(hist: &Histogram, start: Instant) {
    let elapsed = start.elapsed().as_secs_f64();
    hist.observe(elapsed);
}

lazy_static! {
    // ======== Discovery & Reading Metrics ========
    pub static ref FILES_DISCOVERED_TOTAL: IntCounter = register_int_counter!(
        "logforwarder_files_discovered_total",
        "Number of files found below the root directory"
    ).unwrap();

    pub static ref FILE_READ_ERRORS_TOTAL: IntCounter = register_int_counter!(
        "logforwarder_file_read_errors_total",
        "Number of files that could not be opened or fully read"
    ).unwrap();

    pub static ref LINES_READ_TOTAL: IntCounter = register_int_counter!(
        "logforwarder_lines_read_total",
        "Total number of lines read from log files"
    ).unwrap();

    // ======== Parsing Metrics ========
    pub static ref RECORDS_PARSED_TOTAL: IntCounter = register_int_counter!(
        "logforwarder_records_parsed_total",
        "Number of non-blank lines turned into records"
    ).unwrap();

    pub static ref SERIALIZATION_FAILURES_TOTAL: IntCounter = register_int_counter!(
        "logforwarder_serialization_failures_total",
        "Number of records dropped because they could not be encoded"
    ).unwrap();

    // ======== Shipper Metrics ========
    pub static ref SEND_ATTEMPTS_TOTAL: IntCounter = register_int_counter!(
        "logforwarder_send_attempts_total",
        "Number of full delivery attempts"
    ).unwrap();

    pub static ref SEND_FAILURES_TOTAL: IntCounter = register_int_counter!(
        "logforwarder_send_failures_total",
        "Number of failed delivery attempts"
    ).unwrap();

    pub static ref BATCHES_WRITTEN_TOTAL: IntCounter = register_int_counter!(
        "logforwarder_batches_written_total",
        "Number of record batches fully written to the destination"
    ).unwrap();

    pub static ref BYTES_WRITTEN_TOTAL: IntCounter = register_int_counter!(
        "logforwarder_bytes_written_total",
        "Number of payload bytes written to the destination"
    ).unwrap();

    pub static ref BATCH_WRITE_DURATION_SECONDS: Histogram = register_histogram!(
        "logforwarder_batch_write_duration_seconds",
        "Histogram of single batch write durations (seconds)",
        vec![0.0005, 0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0]
    ).unwrap();
}
