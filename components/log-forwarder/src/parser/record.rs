// External crates
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;

/// Name of the field carrying the trimmed line text on the wire.
pub const RAW_CONTENT_FIELD: &str = "raw_content";

/// Uniformly structured unit derived from one non-blank log line.
///
/// Serializes as a flat JSON object:
///
/// ```text
/// {"raw_content":"<trimmed line>", ...extra fields}
/// ```
///
/// A `Record` can only be built from a line that still has content after
/// trimming, and it cannot be mutated once built. Extra fields are the
/// extension point for richer parsers; they are omitted from the wire format
/// when empty and can never shadow `raw_content`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Record {
    raw_content: String,
    #[serde(flatten, skip_serializing_if = "BTreeMap::is_empty")]
    fields: BTreeMap<String, Value>,
}

impl Record {
    /// Build a record from a raw line, or `None` when the line is blank.
    #[must_use]
    pub fn from_line(line: &str) -> Option<Self> {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return None;
        }

        Some(Self {
            raw_content: trimmed.to_owned(),
            fields: BTreeMap::new(),
        })
    }

    /// Attach an extra key/value pair. A key named `raw_content` is ignored.
    #[must_use]
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        let key = key.into();
        if key != RAW_CONTENT_FIELD {
            self.fields.insert(key, value.into());
        }
        self
    }

    /// Attach every pair of `fields`, skipping `raw_content`.
    #[must_use]
    pub fn with_fields<'a, I>(self, fields: I) -> Self
    where
        I: IntoIterator<Item = (&'a String, &'a Value)>,
    {
        fields
            .into_iter()
            .fold(self, |record, (key, value)| record.with_field(key.clone(), value.clone()))
    }

    /// Trimmed text of the originating line.
    #[must_use]
    pub fn raw_content(&self) -> &str {
        &self.raw_content
    }

    /// Extra fields attached to this record.
    #[must_use]
    pub fn fields(&self) -> &BTreeMap<String, Value> {
        &self.fields
    }
}
