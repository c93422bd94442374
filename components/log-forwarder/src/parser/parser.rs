//! Line parsing.
//!
//! A parser turns exactly one raw line into zero or one [`Record`]. Other
//! formats (syslog, CRI, JSON logs) plug in behind [`LineParser`].

// Local crates
use crate::{helpers::load_config::ParserConfig, parser::record::Record};

// External crates
use serde_json::Value;
use std::collections::BTreeMap;

/// Parse a single raw line into a [`Record`], or `None` when it should be
/// skipped.
///
/// Implementations must be pure: the same line always yields the same result.
pub trait LineParser {
    /// Parse one line. Returning `None` means the line contributes nothing.
    fn parse(&self, line: &str) -> Option<Record>;
}

/// Wrap a line in a `raw_content` record after trimming surrounding
/// whitespace. Blank lines are skipped.
#[must_use]
pub fn parse_line(line: &str) -> Option<Record> {
    Record::from_line(line)
}

/// Default whole-line parser.
///
/// Captures the trimmed line as `raw_content` and attaches the configured
/// static fields (empty by default) to every record.
#[derive(Debug, Clone, Default)]
pub struct RawLineParser {
    static_fields: BTreeMap<String, Value>,
}

impl RawLineParser {
    /// Build a parser that attaches no extra fields.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a parser from the `[parser]` configuration section.
    #[must_use]
    pub fn from_config(config: &ParserConfig) -> Self {
        Self {
            static_fields: config.static_fields.clone(),
        }
    }
}

impl LineParser for RawLineParser {
    fn parse(&self, line: &str) -> Option<Record> {
        let record = parse_line(line)?;
        if self.static_fields.is_empty() {
            return Some(record);
        }
        Some(record.with_fields(&self.static_fields))
    }
}
