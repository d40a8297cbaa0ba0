//! Coordinate conversion: National Grid inverse projection and the optional
//! OSGB36 -> WGS84 datum shift.

pub mod helmert;
pub mod national_grid;

pub use helmert::{osgb36_to_wgs84, transform_with_datum};
pub use national_grid::{footpoint_latitude, transform};
