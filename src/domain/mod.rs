//! Domain types used throughout the pipeline.
//!
//! This module defines:
//!
//! - coordinate value types (`GridCoordinate`, `GeoCoordinate`)
//! - schema vocabulary (`ColumnRole`, `DatasetKind`)
//! - pipeline outputs (`EnrichedEntity`, `RunOutput`, etc.)

pub mod types;

pub use types::*;
