use std::time::Duration;

use serde::Deserialize;

/// Alpha Vantage REST settings.
#[derive(Debug, Clone, Deserialize)]
pub struct AlphaVantageConfig {
    pub api_key: String,

    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Period of `quotes` / `news` subscription polls.
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,

    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl AlphaVantageConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: default_base_url(),
            poll_interval_secs: default_poll_interval_secs(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs.max(1))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }

    pub fn query_url(&self) -> String {
        format!("{}/query", self.base_url.trim_end_matches('/'))
    }
}

fn default_base_url() -> String {
    "https://www.alphavantage.co".into()
}

fn default_poll_interval_secs() -> u64 {
    60
}

fn default_request_timeout_secs() -> u64 {
    15
}
