// Local crates
use crate::{
    metrics::metrics::{FILE_READ_ERRORS_TOTAL, LINES_READ_TOTAL, RECORDS_PARSED_TOTAL},
    parser::{parser::LineParser, record::Record},
};

// External crates
use std::path::Path;
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::instrument;

const READ_BUFFER_SIZE: usize = 16384;

/// Reads one log file at a time and turns its lines into records.
///
/// Processing a file never fails the run: open errors yield no records, a read
/// error part-way through keeps whatever was parsed before it. Both are
/// logged.
#[derive(Debug, Clone)]
pub struct FileProcessor<P> {
    parser: P,
}

impl<P: LineParser> FileProcessor<P> {
    /// Build a processor around a line parser.
    #[must_use]
    pub fn new(parser: P) -> Self {
        Self { parser }
    }

    /// The parser applied to every line.
    #[must_use]
    pub fn parser(&self) -> &P {
        &self.parser
    }

    /// Read `path` and return its records in line order.
    #[instrument(
        name = "log_forwarder::process_file",
        target = "tailer::reader",
        skip_all,
        fields(path = %path.display()),
        level = "debug"
    )]
    pub async fn process_file(&self, path: &Path) -> Vec<Record> {
        let mut records = Vec::new();

        let file = match File::open(path).await {
            Ok(file) => file,
            Err(e) => {
                FILE_READ_ERRORS_TOTAL.inc();
                tracing::error!(
                    error = %e,
                    path = %path.display(),
                    "Failed to open log file, skipping it"
                );
                return records;
            }
        };

        let mut reader = BufReader::with_capacity(READ_BUFFER_SIZE, file);
        let mut raw_line = Vec::new();
        let mut lines_read: u64 = 0;

        loop {
            raw_line.clear();
            match reader.read_until(b'\n', &mut raw_line).await {
                Ok(0) => break,
                Ok(_) => {
                    let text = decode_dropping_invalid(&raw_line);
                    // A lone '\r' ends a line as well; '\r\n' leaves an empty
                    // piece behind, which the parser skips.
                    for line in text.split('\r') {
                        lines_read += 1;
                        if let Some(record) = self.parser.parse(line) {
                            records.push(record);
                        }
                    }
                }
                Err(e) => {
                    FILE_READ_ERRORS_TOTAL.inc();
                    tracing::error!(
                        error = %e,
                        path = %path.display(),
                        kept_records = records.len(),
                        "Error reading log file, keeping records parsed so far"
                    );
                    break;
                }
            }
        }

        LINES_READ_TOTAL.inc_by(lines_read);
        RECORDS_PARSED_TOTAL.inc_by(records.len() as u64);
        tracing::trace!(
            lines_read,
            records = records.len(),
            "Finished reading log file"
        );

        records
    }
}

/// Decode UTF-8, dropping every byte sequence that is not valid UTF-8.
fn decode_dropping_invalid(bytes: &[u8]) -> String {
    let mut text = String::with_capacity(bytes.len());
    for chunk in bytes.utf8_chunks() {
        text.push_str(chunk.valid());
    }
    text
}
