//! Inverse Transverse Mercator for the British National Grid.
//!
//! Converts an Ordnance Survey easting/northing into latitude/longitude on the
//! Airy 1830 ellipsoid, following the series in the OS "Guide to coordinate
//! systems in Great Britain":
//!
//! 1. solve the meridional arc equation `N - N0 - M(φ') = 0` for the footpoint
//!    latitude `φ'` by fixed-point iteration
//! 2. evaluate the radii of curvature `ν`, `ρ` and `η² = ν/ρ - 1` at `φ'`
//! 3. apply the even-power latitude corrections and odd-power longitude terms
//!    in `ΔE = E - E0`
//!
//! No datum shift is applied: the output is OSGB36 latitude/longitude, which
//! sits within ~100 m of WGS84 across Great Britain. `geo::helmert` provides
//! the optional shift.

use tracing::debug;

use crate::domain::{GeoCoordinate, GridCoordinate};

/// Airy 1830 semi-major axis (m).
pub const AIRY_A: f64 = 6_377_563.396;
/// Airy 1830 semi-minor axis (m).
pub const AIRY_B: f64 = 6_356_256.909;
/// Central meridian scale factor.
pub const F0: f64 = 0.999_601_271_7;
/// True origin latitude (degrees north).
pub const LAT0_DEG: f64 = 49.0;
/// True origin longitude (degrees east; 2°W).
pub const LON0_DEG: f64 = -2.0;
/// False easting of the true origin (m).
pub const E0: f64 = 400_000.0;
/// False northing of the true origin (m).
pub const N0: f64 = -100_000.0;

/// Residual on the meridional arc equation at which iteration stops (m).
pub const ARC_TOLERANCE_M: f64 = 1e-5;
/// Hard cap on footpoint iterations.
pub const MAX_FOOTPOINT_ITERATIONS: usize = 50;

/// Footpoint latitude solution.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Footpoint {
    /// Latitude in radians.
    pub phi: f64,
    pub iterations: usize,
    /// `false` when the iteration cap was hit before the tolerance.
    pub converged: bool,
}

/// Convert a grid coordinate to latitude/longitude on Airy 1830.
///
/// Returns [`GeoCoordinate::SENTINEL`] if either component is non-finite or
/// not strictly positive.
pub fn transform(easting: f64, northing: f64) -> GeoCoordinate {
    let grid = GridCoordinate::new(easting, northing);
    if !grid.is_valid() {
        return GeoCoordinate::SENTINEL;
    }

    let footpoint = footpoint_latitude(northing);
    if !footpoint.converged {
        debug!(
            easting,
            northing,
            iterations = footpoint.iterations,
            "footpoint latitude did not converge; using last estimate"
        );
    }

    let out = series_expansion(footpoint.phi, easting);
    if !out.is_fix() {
        // Far outside the projection's domain the series can blow up.
        return GeoCoordinate::SENTINEL;
    }
    out
}

/// Solve `N - N0 - M(φ) = 0` for `φ` (radians).
pub fn footpoint_latitude(northing: f64) -> Footpoint {
    let lat0 = LAT0_DEG.to_radians();

    let mut phi = lat0;
    let mut m = 0.0;
    let mut iterations = 0;

    loop {
        phi += (northing - N0 - m) / (AIRY_A * F0);
        m = meridional_arc(phi);
        iterations += 1;

        if (northing - N0 - m).abs() < ARC_TOLERANCE_M {
            return Footpoint {
                phi,
                iterations,
                converged: true,
            };
        }
        if iterations >= MAX_FOOTPOINT_ITERATIONS {
            return Footpoint {
                phi,
                iterations,
                converged: false,
            };
        }
    }
}

/// Third flattening `n = (a - b) / (a + b)`.
fn third_flattening() -> f64 {
    (AIRY_A - AIRY_B) / (AIRY_A + AIRY_B)
}

/// First eccentricity squared `e² = 1 - b²/a²`.
fn eccentricity_sq() -> f64 {
    1.0 - (AIRY_B * AIRY_B) / (AIRY_A * AIRY_A)
}

/// Developed meridional arc from the true origin latitude to `phi` (m).
fn meridional_arc(phi: f64) -> f64 {
    let lat0 = LAT0_DEG.to_radians();
    let n = third_flattening();
    let n2 = n * n;
    let n3 = n2 * n;

    let d = phi - lat0;
    let s = phi + lat0;

    let ma = (1.0 + n + 1.25 * n2 + 1.25 * n3) * d;
    let mb = (3.0 * n + 3.0 * n2 + 21.0 / 8.0 * n3) * d.sin() * s.cos();
    let mc = (15.0 / 8.0 * n2 + 15.0 / 8.0 * n3) * (2.0 * d).sin() * (2.0 * s).cos();
    let md = 35.0 / 24.0 * n3 * (3.0 * d).sin() * (3.0 * s).cos();

    AIRY_B * F0 * (ma - mb + mc - md)
}

fn series_expansion(phi: f64, easting: f64) -> GeoCoordinate {
    let e2 = eccentricity_sq();
    let lon0 = LON0_DEG.to_radians();

    let sin_phi = phi.sin();
    let cos_phi = phi.cos();
    let denom = 1.0 - e2 * sin_phi * sin_phi;

    // Transverse and meridional radii of curvature, scaled by F0.
    let nu = AIRY_A * F0 / denom.sqrt();
    let rho = AIRY_A * F0 * (1.0 - e2) / denom.powf(1.5);
    let eta2 = nu / rho - 1.0;

    let tan_phi = phi.tan();
    let tan2 = tan_phi * tan_phi;
    let tan4 = tan2 * tan2;
    let tan6 = tan4 * tan2;
    let sec_phi = 1.0 / cos_phi;

    let nu3 = nu.powi(3);
    let nu5 = nu.powi(5);
    let nu7 = nu.powi(7);

    let vii = tan_phi / (2.0 * rho * nu);
    let viii = tan_phi / (24.0 * rho * nu3) * (5.0 + 3.0 * tan2 + eta2 - 9.0 * tan2 * eta2);
    let ix = tan_phi / (720.0 * rho * nu5) * (61.0 + 90.0 * tan2 + 45.0 * tan4);
    let x = sec_phi / nu;
    let xi = sec_phi / (6.0 * nu3) * (nu / rho + 2.0 * tan2);
    let xii = sec_phi / (120.0 * nu5) * (5.0 + 28.0 * tan2 + 24.0 * tan4);
    let xiia = sec_phi / (5040.0 * nu7) * (61.0 + 662.0 * tan2 + 1320.0 * tan4 + 720.0 * tan6);

    let de = easting - E0;
    let de2 = de * de;
    let de3 = de2 * de;
    let de4 = de3 * de;
    let de5 = de4 * de;
    let de6 = de5 * de;
    let de7 = de6 * de;

    let lat = phi - vii * de2 + viii * de4 - ix * de6;
    let lon = lon0 + x * de - xi * de3 + xii * de5 - xiia * de7;

    GeoCoordinate::new(lat.to_degrees(), lon.to_degrees())
}
