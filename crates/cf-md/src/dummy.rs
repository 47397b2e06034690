//! In-memory synthetic adapter.
//!
//! Ready from construction until `disconnect`. Serves random-walk bars for any symbol, never produces a
//! quote (so it never vouches for a symbol in validation), and drives
//! `quotes` / `trades` subscriptions from a timer.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use cf_core::error::FeedError;
use cf_core::subscription::{DataSubscription, SubscriptionGate};
use cf_core::time_util;
use cf_core::types::*;
use rand::Rng;
use serde::Deserialize;
use tracing::debug;

use crate::DataAdapter;
use crate::feeds::{FeedHandle, FeedSet, spawn_poll_loop};
use crate::synthetic;

/// Settings for the dummy adapter.
#[derive(Debug, Clone, Deserialize)]
pub struct DummyConfig {
    /// Interval between synthetic push updates (default: 1000 ms).
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,

    /// Per-step volatility as a fraction of price (default: 0.01).
    #[serde(default = "default_volatility")]
    pub volatility: f64,
}

impl Default for DummyConfig {
    fn default() -> Self {
        Self { tick_interval_ms: default_tick_interval_ms(), volatility: default_volatility() }
    }
}

fn default_tick_interval_ms() -> u64 {
    1_000
}

fn default_volatility() -> f64 {
    synthetic::DEFAULT_VOLATILITY
}

/// Synthetic data source.
pub struct DummyAdapter {
    config: DummyConfig,
    connected: AtomicBool,
    feeds: FeedSet,
}

impl DummyAdapter {
    pub fn new(config: DummyConfig) -> Self {
        Self { config, connected: AtomicBool::new(true), feeds: FeedSet::new("dummy") }
    }

    fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.config.tick_interval_ms.max(1))
    }

    fn ensure_connected(&self) -> Result<()> {
        if self.is_connected() { Ok(()) } else { Err(FeedError::NotConnected(self.name().into()).into()) }
    }
}

impl Default for DummyAdapter {
    fn default() -> Self {
        Self::new(DummyConfig::default())
    }
}

#[async_trait]
impl DataAdapter for DummyAdapter {
    fn kind(&self) -> AdapterKind {
        AdapterKind::Dummy
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    async fn connect(&self) -> Result<()> {
        self.connected.store(true, Ordering::Release);
        Ok(())
    }

    async fn disconnect(&self) -> Result<()> {
        self.feeds.clear().await;
        self.connected.store(false, Ordering::Release);
        Ok(())
    }

    async fn get_historical_data(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        start_ms: u64,
        end_ms: u64,
    ) -> Result<Vec<MarketDataPoint>> {
        self.ensure_connected()?;
        Ok(synthetic::generate_bars_with(&mut rand::rng(), symbol, timeframe, start_ms, end_ms, self.config.volatility))
    }

    async fn get_realtime_quote(&self, _symbol: &str) -> Result<Option<MarketDataPoint>> {
        Ok(None)
    }

    async fn subscribe(&self, subscription: DataSubscription) -> Result<()> {
        self.ensure_connected()?;
        let DataSubscription { symbol, data_type, callback } = subscription;
        let gate = SubscriptionGate::new(callback);
        let volatility = self.config.volatility;

        let handle = match data_type {
            DataType::Quotes => {
                let sym = symbol.clone();
                let mut price = synthetic::base_price(&symbol);
                spawn_poll_loop(self.tick_interval(), gate.clone(), move || {
                    let bar = synthetic::next_bar(&mut rand::rng(), &sym, time_util::now_ms(), price, volatility);
                    price = bar.close;
                    std::future::ready(vec![DataUpdate::Quote(bar)])
                })
            }
            DataType::Trades => {
                let sym = symbol.clone();
                let mut price = synthetic::base_price(&symbol);
                spawn_poll_loop(self.tick_interval(), gate.clone(), move || {
                    let mut rng = rand::rng();
                    price = (price * (1.0 + volatility * rng.random_range(-0.5..=0.5))).max(0.01);
                    let trade = TradeData {
                        symbol: sym.clone(),
                        timestamp_ms: time_util::now_ms(),
                        price,
                        size: rng.random_range(1.0..500.0_f64).round(),
                        side: if rng.random::<bool>() { TradeSide::Buy } else { TradeSide::Sell },
                        trade_id: None,
                        source: DUMMY_SOURCE.to_string(),
                    };
                    std::future::ready(vec![DataUpdate::Trade(trade)])
                })
            }
            DataType::News | DataType::CorporateActions => {
                debug!("[dummy] {data_type} not synthesized for {symbol}");
                FeedHandle::Passive
            }
        };

        self.feeds.insert(&symbol, data_type, gate, handle).await;
        Ok(())
    }

    async fn unsubscribe(&self, symbol: &str, data_type: DataType) -> Result<()> {
        self.feeds.remove(symbol, data_type).await;
        Ok(())
    }
}
