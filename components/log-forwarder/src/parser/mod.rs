//! Line parsing and the structured record type.

pub mod parser;
pub mod record;
