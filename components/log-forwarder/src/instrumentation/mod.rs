//! Tracing subscriber setup.

pub mod tracing;
