//! Optional OSGB36 -> WGS84 datum shift.
//!
//! The National Grid inverse projection yields latitude/longitude on the
//! OSGB36 datum (Airy 1830). To move to WGS84 we:
//!
//! 1. convert to Earth-centred cartesian coordinates on Airy 1830 (`h = 0`)
//! 2. apply the published 7-parameter Helmert transform
//!    `X' = T + (1 + s) · R · X` (small-angle rotation matrix)
//! 3. convert back to latitude/longitude on the WGS84 ellipsoid
//!
//! The published parameters are accurate to a few meters, which is well inside
//! the ~100 m shift they remove. Output from this module intentionally differs
//! from the ellipsoid-only reference outputs.

use nalgebra::{Matrix3, Vector3};

use crate::domain::{DatumMode, GeoCoordinate};
use crate::geo::national_grid::{self, AIRY_A, AIRY_B};

/// WGS84 semi-major axis (m).
pub const WGS84_A: f64 = 6_378_137.0;
/// WGS84 semi-minor axis (m).
pub const WGS84_B: f64 = 6_356_752.314_245;

/// Translation OSGB36 -> WGS84 (m).
const TX: f64 = 446.448;
const TY: f64 = -125.157;
const TZ: f64 = 542.060;
/// Rotations (arc-seconds).
const RX_SEC: f64 = 0.1502;
const RY_SEC: f64 = 0.2470;
const RZ_SEC: f64 = 0.8421;
/// Scale (ppm).
const S_PPM: f64 = -20.4894;

const LATITUDE_TOLERANCE_RAD: f64 = 1e-12;
const MAX_LATITUDE_ITERATIONS: usize = 50;

/// Grid -> lat/lon in the requested datum.
pub fn transform_with_datum(easting: f64, northing: f64, datum: DatumMode) -> GeoCoordinate {
    let osgb = national_grid::transform(easting, northing);
    match datum {
        DatumMode::Airy => osgb,
        DatumMode::Wgs84 => osgb36_to_wgs84(osgb),
    }
}

/// Shift an OSGB36 position onto WGS84. The sentinel passes through unchanged.
pub fn osgb36_to_wgs84(osgb: GeoCoordinate) -> GeoCoordinate {
    if !osgb.is_fix() {
        return GeoCoordinate::SENTINEL;
    }

    let cartesian = to_cartesian(osgb, AIRY_A, AIRY_B);
    let shifted = helmert_matrix() * cartesian + Vector3::new(TX, TY, TZ);
    let out = from_cartesian(shifted, WGS84_A, WGS84_B);

    if out.is_fix() { out } else { GeoCoordinate::SENTINEL }
}

fn helmert_matrix() -> Matrix3<f64> {
    let rx = (RX_SEC / 3600.0).to_radians();
    let ry = (RY_SEC / 3600.0).to_radians();
    let rz = (RZ_SEC / 3600.0).to_radians();
    let scale = 1.0 + S_PPM * 1e-6;

    Matrix3::new(
        scale, -rz, ry, //
        rz, scale, -rx, //
        -ry, rx, scale,
    )
}

fn to_cartesian(coord: GeoCoordinate, a: f64, b: f64) -> Vector3<f64> {
    let e2 = 1.0 - (b * b) / (a * a);
    let phi = coord.latitude.to_radians();
    let lambda = coord.longitude.to_radians();

    let sin_phi = phi.sin();
    let nu = a / (1.0 - e2 * sin_phi * sin_phi).sqrt();

    Vector3::new(
        nu * phi.cos() * lambda.cos(),
        nu * phi.cos() * lambda.sin(),
        (1.0 - e2) * nu * sin_phi,
    )
}

fn from_cartesian(v: Vector3<f64>, a: f64, b: f64) -> GeoCoordinate {
    let e2 = 1.0 - (b * b) / (a * a);
    let p = (v.x * v.x + v.y * v.y).sqrt();

    let mut phi = v.z.atan2(p * (1.0 - e2));
    for _ in 0..MAX_LATITUDE_ITERATIONS {
        let sin_phi = phi.sin();
        let nu = a / (1.0 - e2 * sin_phi * sin_phi).sqrt();
        let next = (v.z + e2 * nu * sin_phi).atan2(p);
        let delta = (next - phi).abs();
        phi = next;
        if delta < LATITUDE_TOLERANCE_RAD {
            break;
        }
    }

    let lambda = v.y.atan2(v.x);
    GeoCoordinate::new(phi.to_degrees(), lambda.to_degrees())
}
