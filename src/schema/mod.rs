//! Runtime schema resolution for header-driven datasets.

pub mod resolver;

pub use resolver::*;
