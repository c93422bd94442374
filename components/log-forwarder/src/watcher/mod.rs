//! Discovery of log files below the root directory.

pub mod discovery;
