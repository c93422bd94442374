//! Log Forwarder library.
//!
//! Recursively collects log files below a root directory, turns every
//! non-blank line into a [`parser::record::Record`] and ships the records as
//! newline-delimited JSON over TCP, retrying the whole delivery until it
//! succeeds.
//!
//! ```text
//! FileCollector -> FileProcessor (LineParser) -> DeliveryOrchestrator -> BatchSender -> TCP
//! ```

pub mod cli;
pub mod helpers;
pub mod instrumentation;
pub mod metrics;
pub mod parser;
pub mod runtime;
pub mod shipper;
pub mod tailer;
pub mod watcher;
