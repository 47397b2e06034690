//! Configuration parsing for the chartfeed system.
//!
//! All components read their settings from a single JSON config file. The
//! top-level structure contains logging metadata, manager tuning, an
//! `adapters` array where each entry describes one data source instance, and
//! the subscriptions the runner should open at startup.
//!
//! # Example config
//!
//! ```json
//! {
//!   "app": { "module_name": "chartfeed", "log_path": "/tmp/log" },
//!   "manager": { "adapter_timeout_ms": 10000 },
//!   "adapters": [
//!     { "name": "binance", "type": "binance", "priority": 10, "config": {} },
//!     { "name": "av", "type": "alpha_vantage", "priority": 5,
//!       "config": { "api_key": "demo" } }
//!   ],
//!   "subscriptions": [{ "symbol": "BTCUSDT", "data_type": "quotes" }]
//! }
//! ```
//!
//! Per-adapter `config` blobs stay raw JSON here; the adapter crate resolves
//! them into typed configs when the adapter is added.

use serde::Deserialize;

use crate::error::FeedError;
use crate::types::DataType;

/// Top-level application config, deserialized from a JSON file.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    /// Module metadata (name, log path).
    #[serde(default)]
    pub app: Option<ModuleMeta>,

    /// Data manager tuning.
    #[serde(default)]
    pub manager: ManagerSettings,

    /// Adapter instances to register, in registration order.
    #[serde(default)]
    pub adapters: Vec<AdapterSettings>,

    /// Subscriptions opened by the runner's `run` command.
    #[serde(default)]
    pub subscriptions: Vec<SubscriptionSpec>,
}

impl AppConfig {
    /// Returns the module name, defaulting to `"chartfeed"`.
    pub fn module_name(&self) -> String {
        self.app
            .as_ref()
            .and_then(|m| m.module_name.clone())
            .unwrap_or_else(|| "chartfeed".to_string())
    }

    /// Returns the log path.
    pub fn log_path(&self) -> Option<String> {
        self.app.as_ref().and_then(|m| m.log_path.clone())
    }

    /// Reject configs that would register two adapters under the same name.
    pub fn validate(&self) -> Result<(), FeedError> {
        let mut names = ahash::AHashSet::new();
        for adapter in &self.adapters {
            if adapter.name.trim().is_empty() {
                return Err(FeedError::Config("adapter name must not be empty".into()));
            }
            if !names.insert(adapter.name.as_str()) {
                return Err(FeedError::Config(format!("duplicate adapter name: {}", adapter.name)));
            }
        }
        Ok(())
    }
}

/// Module metadata block.
#[derive(Debug, Clone, Deserialize)]
pub struct ModuleMeta {
    pub module_name: Option<String>,
    pub log_path: Option<String>,
}

/// Tuning for the data manager.
#[derive(Debug, Clone, Deserialize)]
pub struct ManagerSettings {
    /// Budget for a single adapter call in milliseconds; expiry counts as
    /// that adapter failing (default: 10_000).
    #[serde(default = "default_adapter_timeout_ms")]
    pub adapter_timeout_ms: u64,

    /// Register the built-in dummy adapter at priority 0 (default: true).
    #[serde(default = "default_true")]
    pub register_dummy: bool,

    /// Raw config for the built-in dummy adapter.
    #[serde(default)]
    pub dummy: Option<serde_json::Value>,
}

impl Default for ManagerSettings {
    fn default() -> Self {
        Self {
            adapter_timeout_ms: default_adapter_timeout_ms(),
            register_dummy: true,
            dummy: None,
        }
    }
}

/// A single adapter registration.
#[derive(Debug, Clone, Deserialize)]
pub struct AdapterSettings {
    /// Registry name (unique).
    pub name: String,

    /// Adapter type: `"alpha_vantage"`, `"binance"`, `"csv"`, `"dummy"`.
    #[serde(rename = "type")]
    pub kind: String,

    /// Higher priorities are tried first (default: 0).
    #[serde(default)]
    pub priority: i32,

    /// Type-specific settings, passed to the adapter's config parser.
    #[serde(default = "empty_object")]
    pub config: serde_json::Value,
}

impl AdapterSettings {
    pub fn new(name: impl Into<String>, kind: impl Into<String>, priority: i32, config: serde_json::Value) -> Self {
        Self { name: name.into(), kind: kind.into(), priority, config }
    }
}

/// A subscription the runner opens at startup.
#[derive(Debug, Clone, Deserialize)]
pub struct SubscriptionSpec {
    pub symbol: String,
    pub data_type: DataType,
}

fn default_adapter_timeout_ms() -> u64 {
    10_000
}

fn default_true() -> bool {
    true
}

fn empty_object() -> serde_json::Value {
    serde_json::Value::Object(Default::default())
}

/// Load and parse a JSON config file.
pub fn load_config(path: &std::path::Path) -> anyhow::Result<AppConfig> {
    let content = std::fs::read_to_string(path)?;
    let config: AppConfig = serde_json::from_str(&content)?;
    config.validate()?;
    Ok(config)
}
