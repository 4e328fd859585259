//! Synthetic rides for exercising a master without real recordings.

use chrono::{DateTime, Duration, Utc};
use peloton_core::spatial::format_timestamp;
use peloton_core::Waypoint;
use std::f64::consts::PI;

const METERS_PER_DEG_LAT: f64 = 111_320.0;

/// A ride: position and elevation as a function of seconds since start.
pub trait RidePath: Send + Sync {
    /// (lat, lon, elevation_m) at `t` seconds.
    fn position(&self, t: f64) -> (f64, f64, f64);

    /// Seconds needed to complete the ride once.
    fn duration_s(&self) -> f64;
}

/// A closed loop around a center with one climb and one descent per lap.
pub struct LoopRide {
    pub center_lat: f64,
    pub center_lon: f64,
    pub radius_m: f64,
    pub base_elevation_m: f64,
    pub climb_m: f64,
    pub speed_mps: f64,
}

impl RidePath for LoopRide {
    fn position(&self, t: f64) -> (f64, f64, f64) {
        let angle = 2.0 * PI * t / self.duration_s();
        let lat = self.center_lat + (self.radius_m / METERS_PER_DEG_LAT) * angle.cos();
        let lon = self.center_lon
            + (self.radius_m / (METERS_PER_DEG_LAT * self.center_lat.to_radians().cos()))
                * angle.sin();
        let elevation = self.base_elevation_m + self.climb_m * (1.0 - angle.cos()) / 2.0;
        (lat, lon, elevation)
    }

    fn duration_s(&self) -> f64 {
        2.0 * PI * self.radius_m / self.speed_mps
    }
}

/// A straight ride from start to end on a constant gradient.
pub struct LineRide {
    pub start_lat: f64,
    pub start_lon: f64,
    pub end_lat: f64,
    pub end_lon: f64,
    pub start_elevation_m: f64,
    pub end_elevation_m: f64,
    pub speed_mps: f64,
}

impl LineRide {
    fn length_m(&self) -> f64 {
        let dlat = (self.end_lat - self.start_lat) * METERS_PER_DEG_LAT;
        let dlon = (self.end_lon - self.start_lon)
            * METERS_PER_DEG_LAT
            * self.start_lat.to_radians().cos();
        (dlat * dlat + dlon * dlon).sqrt()
    }
}

impl RidePath for LineRide {
    fn position(&self, t: f64) -> (f64, f64, f64) {
        let progress = (t / self.duration_s()).clamp(0.0, 1.0);
        (
            self.start_lat + (self.end_lat - self.start_lat) * progress,
            self.start_lon + (self.end_lon - self.start_lon) * progress,
            self.start_elevation_m + (self.end_elevation_m - self.start_elevation_m) * progress,
        )
    }

    fn duration_s(&self) -> f64 {
        self.length_m() / self.speed_mps
    }
}

/// Parse a riding speed in m/s; only finite values above zero describe a
/// ride that ends.
pub fn parse_speed(value: &str) -> Result<f64, String> {
    let speed: f64 = value
        .parse()
        .map_err(|e| format!("invalid speed {value:?}: {e}"))?;
    if speed.is_finite() && speed > 0.0 {
        Ok(speed)
    } else {
        Err(format!("speed must be a positive number of m/s, got {value}"))
    }
}

/// Sample `path` every `interval_s` seconds, including both ends.
///
/// A path without a finite duration yields no points.
pub fn sample(path: &dyn RidePath, start: DateTime<Utc>, interval_s: u32) -> Vec<Waypoint> {
    let duration = path.duration_s();
    if !duration.is_finite() {
        return Vec::new();
    }
    let interval_s = interval_s.max(1);
    let total = duration.max(0.0).ceil() as i64;
    let mut points = Vec::new();
    let mut t = 0;
    loop {
        let clamped = t.min(total);
        let (lat, lon, ele) = path.position(clamped as f64);
        let at = start + Duration::seconds(clamped);
        points.push(Waypoint::new(lat, lon, ele, format_timestamp(at)));
        if clamped >= total {
            break;
        }
        t += interval_s as i64;
    }
    points
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use peloton_core::{distance_km, elevation_gain};

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 7, 0, 0).unwrap()
    }

    #[test]
    fn loop_returns_to_start() {
        let ride = LoopRide {
            center_lat: 37.98,
            center_lon: 23.72,
            radius_m: 500.0,
            base_elevation_m: 50.0,
            climb_m: 40.0,
            speed_mps: 8.0,
        };
        let points = sample(&ride, start(), 10);
        let first = points.first().unwrap();
        let last = points.last().unwrap();
        assert!(distance_km(first, last) < 0.01);

        let gain: f64 = points.windows(2).map(|w| elevation_gain(&w[0], &w[1])).sum();
        assert!((gain - 40.0).abs() < 1.0);
    }

    #[test]
    fn zero_speed_yields_no_points() {
        let ride = LineRide {
            start_lat: 38.0,
            start_lon: 23.0,
            end_lat: 38.01,
            end_lon: 23.0,
            start_elevation_m: 10.0,
            end_elevation_m: 60.0,
            speed_mps: 0.0,
        };
        assert!(sample(&ride, start(), 10).is_empty());

        let ride = LoopRide {
            center_lat: 37.98,
            center_lon: 23.72,
            radius_m: 500.0,
            base_elevation_m: 50.0,
            climb_m: 40.0,
            speed_mps: -3.0,
        };
        assert_eq!(sample(&ride, start(), 10).len(), 1);
    }

    #[test]
    fn speed_must_be_positive_and_finite() {
        assert_eq!(parse_speed("7.5"), Ok(7.5));
        assert!(parse_speed("0").is_err());
        assert!(parse_speed("-2").is_err());
        assert!(parse_speed("inf").is_err());
        assert!(parse_speed("NaN").is_err());
        assert!(parse_speed("fast").is_err());
    }

    #[test]
    fn line_has_expected_length_and_timestamps() {
        let ride = LineRide {
            start_lat: 38.0,
            start_lon: 23.0,
            end_lat: 38.01,
            end_lon: 23.0,
            start_elevation_m: 10.0,
            end_elevation_m: 60.0,
            speed_mps: 5.0,
        };
        let points = sample(&ride, start(), 30);
        assert_eq!(points[0].timestamp, "2024-05-01T07:00:00Z");
        assert_eq!(points[1].timestamp, "2024-05-01T07:00:30Z");
        let km = distance_km(&points[0], points.last().unwrap());
        assert!((km - 1.113).abs() < 0.01);
        assert_eq!(points.last().unwrap().elevation_m, 60.0);
    }
}
