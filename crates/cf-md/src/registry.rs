//! Adapter registry: factory for creating adapters from config.

use std::sync::Arc;

use anyhow::Result;
use cf_core::error::FeedError;
use cf_core::types::AdapterKind;
use serde::de::DeserializeOwned;

use crate::DataAdapter;
use crate::alpha_vantage::{AlphaVantageAdapter, config::AlphaVantageConfig};
use crate::binance::{BinanceAdapter, config::BinanceConfig};
use crate::csv::{CsvAdapter, config::CsvConfig};
use crate::dummy::{DummyAdapter, DummyConfig};

/// A validated, strongly-typed adapter configuration.
#[derive(Debug, Clone)]
pub enum AdapterConfig {
    AlphaVantage(AlphaVantageConfig),
    Binance(BinanceConfig),
    Csv(CsvConfig),
    Dummy(DummyConfig),
}

impl AdapterConfig {
    /// Check a `(type, config)` pair from the outside world.
    ///
    /// Unknown type → [`FeedError::UnsupportedAdapterType`]; a config that
    /// does not fit the type → [`FeedError::Config`].
    pub fn resolve(type_name: &str, raw: &serde_json::Value) -> Result<Self> {
        let kind: AdapterKind = type_name.parse()?;
        Ok(match kind {
            AdapterKind::AlphaVantage => Self::AlphaVantage(typed(kind, raw)?),
            AdapterKind::Binance => Self::Binance(typed(kind, raw)?),
            AdapterKind::Csv => Self::Csv(typed(kind, raw)?),
            AdapterKind::Dummy => Self::Dummy(typed(kind, raw)?),
        })
    }

    pub fn kind(&self) -> AdapterKind {
        match self {
            Self::AlphaVantage(_) => AdapterKind::AlphaVantage,
            Self::Binance(_) => AdapterKind::Binance,
            Self::Csv(_) => AdapterKind::Csv,
            Self::Dummy(_) => AdapterKind::Dummy,
        }
    }
}

fn typed<T: DeserializeOwned>(kind: AdapterKind, raw: &serde_json::Value) -> Result<T, FeedError> {
    // a missing config block means "all defaults"
    let raw = if raw.is_null() { serde_json::Value::Object(Default::default()) } else { raw.clone() };
    serde_json::from_value(raw).map_err(|e| FeedError::Config(format!("invalid {kind} config: {e}")))
}

/// Construct the adapter for a resolved config. The adapter is not yet
/// connected.
pub fn create_adapter(config: &AdapterConfig) -> Result<Arc<dyn DataAdapter>> {
    Ok(match config {
        AdapterConfig::AlphaVantage(c) => Arc::new(AlphaVantageAdapter::new(c.clone())?),
        AdapterConfig::Binance(c) => Arc::new(BinanceAdapter::new(c.clone())?),
        AdapterConfig::Csv(c) => Arc::new(CsvAdapter::new(c.clone())),
        AdapterConfig::Dummy(c) => Arc::new(DummyAdapter::new(c.clone())),
    })
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn unknown_type_is_unsupported() {
        let err = AdapterConfig::resolve("bloomberg", &json!({})).unwrap_err();
        assert!(matches!(err.downcast_ref::<FeedError>(), Some(FeedError::UnsupportedAdapterType(_))));
    }

    #[test]
    fn shape_mismatch_is_config_error() {
        let err = AdapterConfig::resolve("alpha_vantage", &json!({"base_url": "x"})).unwrap_err();
        assert!(matches!(err.downcast_ref::<FeedError>(), Some(FeedError::Config(_))));

        let err = AdapterConfig::resolve("csv", &json!({"file_path": 12})).unwrap_err();
        assert!(matches!(err.downcast_ref::<FeedError>(), Some(FeedError::Config(_))));
    }

    #[test]
    fn resolves_every_kind() {
        let av = AdapterConfig::resolve("alpha_vantage", &json!({"api_key": "demo"})).unwrap();
        assert_eq!(av.kind(), AdapterKind::AlphaVantage);
        assert_eq!(AdapterConfig::resolve("binance", &json!({})).unwrap().kind(), AdapterKind::Binance);
        assert_eq!(AdapterConfig::resolve("csv", &json!({"file_path": "a.csv"})).unwrap().kind(), AdapterKind::Csv);
        assert_eq!(AdapterConfig::resolve("dummy", &serde_json::Value::Null).unwrap().kind(), AdapterKind::Dummy);
    }

    #[tokio::test]
    async fn created_adapter_reports_its_kind() {
        let adapter = create_adapter(&AdapterConfig::Dummy(DummyConfig::default())).unwrap();
        assert_eq!(adapter.kind(), AdapterKind::Dummy);
        assert!(adapter.is_connected());

        let adapter = create_adapter(&AdapterConfig::Binance(BinanceConfig::default())).unwrap();
        assert_eq!(adapter.name(), "binance");
        assert!(!adapter.is_connected());
    }
}
