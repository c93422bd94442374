//! Reading log files into records.

pub mod reader;
