//! # cf-md
//!
//! Market data adapters and the aggregation layer that fronts them.
//!
//! ## Architecture
//!
//! Each data source implements [`DataAdapter`]. The [`registry`] turns a
//! typed [`registry::AdapterConfig`] into a boxed adapter, and the
//! [`manager::DataManager`] owns the named, prioritized set of adapters and
//! applies the fallback / merge / fan-out policies on top of them.
//!
//! ```text
//! caller ──► DataManager ──► ordered adapters ──► AlphaVantage | Binance | Csv | Dummy
//!                        └─► synthetic bars (last resort)
//! ```
//!
//! ## Shared infrastructure
//!
//! - [`feeds`]: per-adapter subscription bookkeeping (poll tasks, sockets)
//! - [`json_util`]: JSON parsing helpers
//! - [`synthetic`]: random-walk OHLCV generator

pub mod alpha_vantage;
pub mod binance;
pub mod csv;
pub mod dummy;
pub mod feeds;
pub mod json_util;
pub mod manager;
pub mod registry;
pub mod synthetic;

use anyhow::Result;
use async_trait::async_trait;
use cf_core::subscription::DataSubscription;
use cf_core::types::*;

pub use manager::{
    AdapterFailure, AdapterInfo, DataManager, HistoricalOutcome, HistoricalRequest, ManagerConfig, SymbolValidation,
};

/// Trait implemented by every market data source.
///
/// # Lifecycle
///
/// 1. Construct via the source-specific `new(config)`.
/// 2. Call [`connect`](DataAdapter::connect); queries before a successful
///    connect fail with [`FeedError::NotConnected`](cf_core::error::FeedError).
/// 3. Query and subscribe.
/// 4. Call [`disconnect`](DataAdapter::disconnect) to halt every feed.
///
/// All operations take `&self` so one adapter can be shared behind an `Arc`
/// and queried from many tasks at once.
#[async_trait]
pub trait DataAdapter: Send + Sync {
    /// Which implementation this is; also the `source` tag on its data.
    fn kind(&self) -> AdapterKind;

    fn name(&self) -> &'static str {
        self.kind().as_str()
    }

    fn is_connected(&self) -> bool;

    /// Establish readiness. Fails when the source is unreachable or the
    /// credentials are rejected.
    async fn connect(&self) -> Result<()>;

    /// Halt every subscription and clear the connected flag. Idempotent.
    async fn disconnect(&self) -> Result<()>;

    /// Bars within `[start_ms, end_ms]`, ascending. Empty when the source has
    /// nothing for this symbol/timeframe.
    async fn get_historical_data(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        start_ms: u64,
        end_ms: u64,
    ) -> Result<Vec<MarketDataPoint>>;

    /// Latest quote, or `None` if the symbol is unknown to this source.
    async fn get_realtime_quote(&self, symbol: &str) -> Result<Option<MarketDataPoint>>;

    /// Start delivering updates for `subscription` until unsubscribed.
    ///
    /// Data types the source cannot produce are accepted and ignored.
    async fn subscribe(&self, subscription: DataSubscription) -> Result<()>;

    /// Stop delivering updates. After this returns the callback never fires
    /// again for this `(symbol, data_type)`.
    async fn unsubscribe(&self, symbol: &str, data_type: DataType) -> Result<()>;

    async fn get_corporate_actions(&self, _symbol: &str, _start_ms: u64, _end_ms: u64) -> Result<Vec<CorporateAction>> {
        Ok(Vec::new())
    }

    async fn get_news(&self, _symbol: &str, _limit: usize) -> Result<Vec<NewsEvent>> {
        Ok(Vec::new())
    }

    /// A symbol is valid for this source if it can produce a quote for it.
    async fn validate_symbol(&self, symbol: &str) -> Result<bool> {
        Ok(self.get_realtime_quote(symbol).await?.is_some())
    }
}
