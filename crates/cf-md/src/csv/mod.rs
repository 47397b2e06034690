//! OHLCV file replay.
//!
//! The whole file is loaded on `connect`. History and quotes are served from
//! memory; a `quotes` subscription replays the symbol's rows in order on a
//! timer and starts over at the end.

pub mod config;
pub mod parser;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use ahash::AHashMap;
use anyhow::Result;
use async_trait::async_trait;
use cf_core::error::FeedError;
use cf_core::subscription::{DataSubscription, SubscriptionGate};
use cf_core::types::*;
use parking_lot::RwLock;
use tracing::{debug, info, warn};

use self::config::CsvConfig;
use crate::DataAdapter;
use crate::feeds::{FeedHandle, FeedSet, spawn_poll_loop};

pub struct CsvAdapter {
    config: CsvConfig,
    rows: RwLock<AHashMap<String, Arc<Vec<MarketDataPoint>>>>,
    connected: AtomicBool,
    feeds: FeedSet,
}

impl CsvAdapter {
    pub fn new(config: CsvConfig) -> Self {
        Self { config, rows: RwLock::new(AHashMap::new()), connected: AtomicBool::new(false), feeds: FeedSet::new("csv") }
    }

    fn ensure_connected(&self) -> Result<()> {
        if self.is_connected() { Ok(()) } else { Err(FeedError::NotConnected(self.name().into()).into()) }
    }

    fn rows_for(&self, symbol: &str) -> Option<Arc<Vec<MarketDataPoint>>> {
        self.rows.read().get(symbol).cloned()
    }
}

#[async_trait]
impl DataAdapter for CsvAdapter {
    fn kind(&self) -> AdapterKind {
        AdapterKind::Csv
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    async fn connect(&self) -> Result<()> {
        let path = &self.config.file_path;
        let text = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| FeedError::Connection(format!("cannot read {}: {e}", path.display())))?;

        let parsed = parser::parse(&text, self.config.delimiter, self.config.has_header, self.config.symbol.as_deref());
        if !parsed.skipped.is_empty() {
            warn!("[csv] {}: skipped {} malformed rows (lines {:?})", path.display(), parsed.skipped.len(), parsed.skipped);
        }
        info!("[csv] loaded {} rows for {} symbols from {}", parsed.row_count(), parsed.by_symbol.len(), path.display());

        *self.rows.write() = parsed.by_symbol.into_iter().map(|(sym, bars)| (sym, Arc::new(bars))).collect();
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
        _timeframe: Timeframe,
        start_ms: u64,
        end_ms: u64,
    ) -> Result<Vec<MarketDataPoint>> {
        self.ensure_connected()?;
        let Some(rows) = self.rows_for(symbol) else {
            return Ok(Vec::new());
        };
        Ok(rows.iter().filter(|b| b.timestamp_ms >= start_ms && b.timestamp_ms <= end_ms).cloned().collect())
    }

    async fn get_realtime_quote(&self, symbol: &str) -> Result<Option<MarketDataPoint>> {
        self.ensure_connected()?;
        Ok(self.rows_for(symbol).and_then(|rows| rows.last().cloned()))
    }

    async fn subscribe(&self, subscription: DataSubscription) -> Result<()> {
        let DataSubscription { symbol, data_type, callback } = subscription;
        let gate = SubscriptionGate::new(callback);

        let handle = match (data_type, self.rows_for(&symbol)) {
            (DataType::Quotes, Some(rows)) if !rows.is_empty() => {
                let mut cursor = 0usize;
                spawn_poll_loop(self.config.replay_interval(), gate.clone(), move || {
                    let bar = rows[cursor].clone();
                    cursor = (cursor + 1) % rows.len();
                    std::future::ready(vec![DataUpdate::Quote(bar)])
                })
            }
            _ => {
                debug!("[csv] nothing to replay for {symbol} {data_type}");
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
