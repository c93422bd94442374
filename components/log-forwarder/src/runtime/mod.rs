//! Delivery state machine and application runtime.

pub mod orchestrator;
pub mod runtime;
