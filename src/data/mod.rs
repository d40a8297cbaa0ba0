//! Dataset sources.

pub mod fetch;

pub use fetch::{DatasetFetcher, PRIMARY_SOURCE_ENV, SECONDARY_SOURCE_ENV, source_from_env};
