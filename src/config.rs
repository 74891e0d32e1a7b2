// src/config.rs
use std::env;
use std::time::Duration;

/// Default port the sidecar listens on.
pub const DEFAULT_SIDECAR_PORT: &str = "9358";
/// Default matchmaking service base address.
pub const DEFAULT_MATCH_ADDRESS: &str = "https://m.unity.cn";

/// Valid range for the health ping interval.
pub const MIN_HEALTH_INTERVAL: Duration = Duration::from_millis(10);
pub const MAX_HEALTH_INTERVAL: Duration = Duration::from_secs(5);

#[derive(Debug, Clone)]
pub struct Config {
    /// Base address of the local sidecar, e.g. `http://localhost:9358`.
    pub sidecar_address: String,
    /// Base address of the remote matchmaking service.
    pub match_address: String,

    /// Whether the background health ping runs at all.
    pub health_enabled: bool,
    /// Interval between health pings. Clamped to [10ms, 5s].
    pub health_interval: Duration,

    /// Total timeout for unary requests. Must stay finite so teardown never
    /// blocks on a hung call.
    pub request_timeout: Duration,

    /// Number of `connect` attempts against the sidecar.
    pub connect_attempts: u32,
    /// Delay between `connect` attempts.
    pub retry_delay: Duration,
    /// Cadence of the backfill polling loop.
    pub poll_interval: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            sidecar_address: format!("http://localhost:{}", DEFAULT_SIDECAR_PORT),
            match_address: DEFAULT_MATCH_ADDRESS.to_string(),
            health_enabled: true,
            health_interval: Duration::from_secs(5),
            request_timeout: Duration::from_secs(30),
            connect_attempts: 30,
            retry_delay: Duration::from_secs(1),
            poll_interval: Duration::from_secs(1),
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let port = env::var("SIDECAR_HTTP_PORT")
            .ok()
            .filter(|p| !p.is_empty())
            .unwrap_or_else(|| DEFAULT_SIDECAR_PORT.to_string());

        Self {
            sidecar_address: format!("http://localhost:{}", port),
            match_address: env::var("MATCHMAKING_ENDPOINT")
                .ok()
                .filter(|a| !a.is_empty())
                .unwrap_or_else(|| DEFAULT_MATCH_ADDRESS.to_string()),
            ..Self::default()
        }
    }

    /// Sets the health ping interval, clamped into the valid range.
    pub fn with_health_interval(mut self, interval: Duration) -> Self {
        self.health_interval = interval.clamp(MIN_HEALTH_INTERVAL, MAX_HEALTH_INTERVAL);
        self
    }
}
