//! Input/output helpers.
//!
//! - CSV ingest into in-memory datasets (`ingest`)
//! - result emission (JSON/CSV) (`export`)

pub mod export;
pub mod ingest;

pub use export::*;
pub use ingest::*;
