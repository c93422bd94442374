//! Prometheus metrics for the delivery pipeline.

pub mod metrics;
