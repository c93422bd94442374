//! Command line entrypoint.

pub mod cli;
