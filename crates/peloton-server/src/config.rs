//! Server configuration from environment.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use peloton_core::spatial::GPS_TOLERANCE_M;

#[derive(Debug, Clone)]
pub struct Config {
    pub server_port: u16,
    /// Directory scanned for `*.gpx` segment files at startup.
    pub segments_dir: PathBuf,
    pub database_path: String,
    pub database_max_connections: u32,
    /// Maximum distance in meters at which two waypoints still match.
    pub gps_tolerance_m: f64,
    /// Incomplete routes untouched for this long are abandoned.
    pub route_timeout_secs: u64,
    pub prune_interval_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_port: 3000,
            segments_dir: PathBuf::from("segments"),
            database_path: "data/peloton.db".to_string(),
            database_max_connections: 5,
            gps_tolerance_m: GPS_TOLERANCE_M,
            route_timeout_secs: 300,
            prune_interval_secs: 30,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            server_port: parse_env("PELOTON_PORT").unwrap_or(defaults.server_port),
            segments_dir: env::var("PELOTON_SEGMENTS_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.segments_dir),
            database_path: env::var("PELOTON_DATABASE_PATH").unwrap_or(defaults.database_path),
            database_max_connections: parse_env("PELOTON_DATABASE_MAX_CONNECTIONS")
                .unwrap_or(defaults.database_max_connections),
            gps_tolerance_m: parse_env("PELOTON_GPS_TOLERANCE_M").unwrap_or(defaults.gps_tolerance_m),
            route_timeout_secs: parse_env("PELOTON_ROUTE_TIMEOUT_SECS")
                .unwrap_or(defaults.route_timeout_secs),
            prune_interval_secs: parse_env("PELOTON_PRUNE_INTERVAL_SECS")
                .unwrap_or(defaults.prune_interval_secs),
        }
    }

    pub fn route_timeout(&self) -> Duration {
        Duration::from_secs(self.route_timeout_secs)
    }

    pub fn prune_interval(&self) -> Duration {
        Duration::from_secs(self.prune_interval_secs.max(1))
    }
}

fn parse_env<T: std::str::FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|s| s.parse().ok())
}
