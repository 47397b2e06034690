//! Binance-specific configuration.

use std::time::Duration;

use serde::Deserialize;

/// Binance spot endpoints and timings.
#[derive(Debug, Clone, Deserialize)]
pub struct BinanceConfig {
    #[serde(default = "default_rest_url")]
    pub rest_url: String,

    /// Raw-stream endpoint; `SUBSCRIBE` messages are sent after connecting.
    #[serde(default = "default_ws_url")]
    pub ws_url: String,

    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Client ping period on push connections (0 disables).
    #[serde(default = "default_ping_interval_secs")]
    pub ping_interval_secs: u64,
}

impl Default for BinanceConfig {
    fn default() -> Self {
        Self {
            rest_url: default_rest_url(),
            ws_url: default_ws_url(),
            request_timeout_secs: default_request_timeout_secs(),
            ping_interval_secs: default_ping_interval_secs(),
        }
    }
}

impl BinanceConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }

    pub fn ping_interval(&self) -> Option<Duration> {
        (self.ping_interval_secs > 0).then(|| Duration::from_secs(self.ping_interval_secs))
    }

    /// Absolute REST URL for `path` (which starts with `/`).
    pub fn endpoint(&self, path: &str) -> String {
        format!("{}{path}", self.rest_url.trim_end_matches('/'))
    }
}

fn default_rest_url() -> String {
    "https://api.binance.com".into()
}

fn default_ws_url() -> String {
    "wss://stream.binance.com:9443/ws".into()
}

fn default_request_timeout_secs() -> u64 {
    10
}

fn default_ping_interval_secs() -> u64 {
    180
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_object_uses_defaults() {
        let cfg: BinanceConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(cfg.rest_url, "https://api.binance.com");
        assert_eq!(cfg.ws_url, "wss://stream.binance.com:9443/ws");
        assert_eq!(cfg.request_timeout(), Duration::from_secs(10));
        assert_eq!(cfg.ping_interval(), Some(Duration::from_secs(180)));
    }

    #[test]
    fn endpoint_joins_without_double_slash() {
        let cfg = BinanceConfig { rest_url: "http://localhost:8080/".into(), ping_interval_secs: 0, ..Default::default() };
        assert_eq!(cfg.endpoint("/api/v3/ping"), "http://localhost:8080/api/v3/ping");
        assert_eq!(cfg.ping_interval(), None);
    }
}
