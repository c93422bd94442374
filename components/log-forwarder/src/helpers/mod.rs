//! Configuration loading and process-level helpers.

pub mod load_config;
pub mod shutdown;
