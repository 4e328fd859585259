//! Spatial and temporal math for waypoint pairs.
//!
//! All functions are pure. Distances use a spherical earth model and the
//! spherical law of cosines rather than haversine, so results are identical
//! on every node given the same inputs.

use chrono::{DateTime, NaiveDateTime, Utc};

use crate::error::{PelotonError, Result};
use crate::models::Waypoint;

/// Sphere radius used for all distance computations, in meters.
pub const EARTH_RADIUS_M: f64 = 6_378_100.0;

/// Default GPS error tolerance for waypoint matching, in meters.
pub const GPS_TOLERANCE_M: f64 = 10.0;

/// Fixed timestamp format carried by every waypoint.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// Cartesian position of a waypoint on the sphere, in meters.
fn to_cartesian(wp: &Waypoint) -> (f64, f64, f64) {
    let phi = wp.lat.to_radians();
    let lambda = wp.lon.to_radians();
    (
        EARTH_RADIUS_M * phi.cos() * lambda.cos(),
        EARTH_RADIUS_M * phi.cos() * lambda.sin(),
        EARTH_RADIUS_M * phi.sin(),
    )
}

/// Great-circle distance between two waypoints in kilometers.
///
/// Computes the central angle as `acos((a·b) / R²)`. The cosine is clamped to
/// `[-1, 1]` so rounding near identical points never yields NaN.
pub fn distance_km(a: &Waypoint, b: &Waypoint) -> f64 {
    // acos loses precision near 1; coincident fixes must be exactly zero.
    if a.lat == b.lat && a.lon == b.lon {
        return 0.0;
    }
    let (ax, ay, az) = to_cartesian(a);
    let (bx, by, bz) = to_cartesian(b);
    let dot = ax * bx + ay * by + az * bz;
    let cos_theta = (dot / (EARTH_RADIUS_M * EARTH_RADIUS_M)).clamp(-1.0, 1.0);
    EARTH_RADIUS_M * cos_theta.acos() / 1000.0
}

/// Signed minutes elapsed from `a` to `b`.
pub fn elapsed_minutes(a: &Waypoint, b: &Waypoint) -> Result<f64> {
    let start = parse_timestamp(&a.timestamp)?;
    let end = parse_timestamp(&b.timestamp)?;
    Ok((end - start).num_seconds() as f64 / 60.0)
}

/// Climb from `a` to `b` in meters. Descents count as zero.
pub fn elevation_gain(a: &Waypoint, b: &Waypoint) -> f64 {
    (b.elevation_m - a.elevation_m).max(0.0)
}

/// GPS-tolerant comparison: true when the two fixes are at most
/// `tolerance_m` meters apart.
///
/// Not an equivalence relation (a≈b and b≈c does not imply a≈c), which is
/// why it is never used as `PartialEq`.
pub fn within_tolerance(a: &Waypoint, b: &Waypoint, tolerance_m: f64) -> bool {
    distance_km(a, b) * 1000.0 <= tolerance_m
}

pub fn parse_timestamp(value: &str) -> Result<NaiveDateTime> {
    NaiveDateTime::parse_from_str(value, TIMESTAMP_FORMAT)
        .map_err(|_| PelotonError::Timestamp(value.to_string()))
}

pub fn format_timestamp(value: DateTime<Utc>) -> String {
    value.format(TIMESTAMP_FORMAT).to_string()
}
