//! `school-atlas` library crate.
//!
//! Builds an enriched list of schools from two public registries: a location
//! registry (British National Grid coordinates, status, phase) and an outcome
//! registry (inspection ratings and dates), joined on the school identifier.
//!
//! The binary (`atlas`) is a thin wrapper around this library so that:
//!
//! - core logic is testable without spawning processes
//! - the coordinate transform and the merge can be reused on their own

pub mod app;
pub mod cli;
pub mod data;
pub mod domain;
pub mod error;
pub mod geo;
pub mod io;
pub mod merge;
pub mod normalize;
pub mod report;
pub mod schema;
