//! TCP delivery of record batches.

pub mod shipper;
