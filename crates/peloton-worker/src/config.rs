//! Worker configuration from environment.

use std::env;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// WebSocket endpoint of the master's worker route.
    pub master_url: String,
    pub connect_backoff_base_ms: u64,
    pub connect_backoff_max_ms: u64,
    /// Connection attempts before giving up. Zero retries forever.
    pub connect_attempts: u32,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            master_url: "ws://localhost:3000/v1/workers".to_string(),
            connect_backoff_base_ms: 500,
            connect_backoff_max_ms: 10_000,
            connect_attempts: 0,
        }
    }
}

impl WorkerConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            master_url: env::var("PELOTON_MASTER_URL").unwrap_or(defaults.master_url),
            connect_backoff_base_ms: parse_env("PELOTON_CONNECT_BACKOFF_BASE_MS")
                .unwrap_or(defaults.connect_backoff_base_ms),
            connect_backoff_max_ms: parse_env("PELOTON_CONNECT_BACKOFF_MAX_MS")
                .unwrap_or(defaults.connect_backoff_max_ms),
            connect_attempts: parse_env("PELOTON_CONNECT_ATTEMPTS")
                .unwrap_or(defaults.connect_attempts),
        }
    }

    pub fn backoff_base(&self) -> Duration {
        Duration::from_millis(self.connect_backoff_base_ms)
    }

    pub fn backoff_max(&self) -> Duration {
        Duration::from_millis(self.connect_backoff_max_ms)
    }
}

fn parse_env<T: std::str::FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|s| s.parse().ok())
}
