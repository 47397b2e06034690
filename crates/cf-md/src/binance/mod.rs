//! Binance spot market data.
//!
//! REST for history and snapshot quotes, one raw-stream WebSocket per push
//! subscription:
//! - `quotes` → `<sym>@ticker` (rolling 24h ticker as an OHLCV point)
//! - `trades` → `<sym>@trade`
//!
//! Symbols are passed through as given (`BTCUSDT`); stream names are
//! lower-cased.

pub mod config;
pub mod json_parser;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::{Context, Result};
use async_trait::async_trait;
use cf_core::error::FeedError;
use cf_core::subscription::{DataSubscription, SubscriptionGate};
use cf_core::types::*;
use cf_core::ws::{WsConnConfig, WsConnection};
use reqwest::StatusCode;
use tracing::{debug, info};

use self::config::BinanceConfig;
use crate::DataAdapter;
use crate::feeds::{FeedHandle, FeedSet};

/// Max rows Binance returns per klines request.
const KLINE_PAGE_LIMIT: usize = 1_000;

/// Stop paginating after this many pages even if `end` is not reached.
const MAX_KLINE_PAGES: usize = 50;

pub struct BinanceAdapter {
    config: BinanceConfig,
    http: reqwest::Client,
    connected: AtomicBool,
    feeds: FeedSet,
}

impl BinanceAdapter {
    pub fn new(config: BinanceConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()
            .context("building binance http client")?;
        Ok(Self { config, http, connected: AtomicBool::new(false), feeds: FeedSet::new("binance") })
    }

    fn ensure_connected(&self) -> Result<()> {
        if self.is_connected() { Ok(()) } else { Err(FeedError::NotConnected(self.name().into()).into()) }
    }

    async fn get(&self, path: &str, query: &[(&str, String)]) -> Result<reqwest::Response> {
        self.http
            .get(self.config.endpoint(path))
            .query(query)
            .send()
            .await
            .map_err(|e| FeedError::Http(format!("GET {path}: {e}")).into())
    }

    async fn read_json(path: &str, resp: reqwest::Response) -> Result<serde_json::Value> {
        let status = resp.status();
        if status == StatusCode::TOO_MANY_REQUESTS || status == StatusCode::IM_A_TEAPOT {
            return Err(FeedError::RateLimited(format!("GET {path}: {status}")).into());
        }
        if !status.is_success() {
            return Err(FeedError::Http(format!("GET {path}: {status}")).into());
        }
        resp.json().await.map_err(|e| FeedError::Parse(format!("GET {path}: {e}")).into())
    }
}

#[async_trait]
impl DataAdapter for BinanceAdapter {
    fn kind(&self) -> AdapterKind {
        AdapterKind::Binance
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    async fn connect(&self) -> Result<()> {
        let resp = self
            .get("/api/v3/ping", &[])
            .await
            .map_err(|e| FeedError::Connection(format!("binance unreachable: {e}")))?;
        if !resp.status().is_success() {
            return Err(FeedError::Connection(format!("binance ping returned {}", resp.status())).into());
        }
        self.connected.store(true, Ordering::Release);
        info!("[binance] connected to {}", self.config.rest_url);
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
        let path = "/api/v3/klines";
        let mut bars = Vec::new();
        let mut cursor = start_ms;

        for _ in 0..MAX_KLINE_PAGES {
            if cursor > end_ms {
                break;
            }
            let query = [
                ("symbol", symbol.to_string()),
                ("interval", timeframe.label().to_string()),
                ("startTime", cursor.to_string()),
                ("endTime", end_ms.to_string()),
                ("limit", KLINE_PAGE_LIMIT.to_string()),
            ];
            let resp = self.get(path, &query).await?;
            if resp.status() == StatusCode::BAD_REQUEST {
                debug!("[binance] klines rejected for {symbol}");
                return Ok(Vec::new());
            }
            let page = json_parser::parse_klines(symbol, &Self::read_json(path, resp).await?);
            let page_len = page.len();
            let Some(last_open) = page.last().map(|b| b.timestamp_ms) else {
                break;
            };
            bars.extend(page.into_iter().filter(|b| b.timestamp_ms >= start_ms && b.timestamp_ms <= end_ms));
            if page_len < KLINE_PAGE_LIMIT {
                break;
            }
            cursor = last_open + timeframe.duration_ms();
        }

        debug!("[binance] {} {timeframe} bars for {symbol}", bars.len());
        Ok(bars)
    }

    async fn get_realtime_quote(&self, symbol: &str) -> Result<Option<MarketDataPoint>> {
        self.ensure_connected()?;
        let path = "/api/v3/ticker/24hr";
        let resp = self.get(path, &[("symbol", symbol.to_string())]).await?;
        if resp.status() == StatusCode::BAD_REQUEST {
            return Ok(None);
        }
        let v = Self::read_json(path, resp).await?;
        Ok(json_parser::parse_ticker_24hr(symbol, &v))
    }

    async fn subscribe(&self, subscription: DataSubscription) -> Result<()> {
        let DataSubscription { symbol, data_type, callback } = subscription;
        let gate = SubscriptionGate::new(callback);

        let Some(stream) = json_parser::stream_name(&symbol, data_type) else {
            debug!("[binance] no push stream for {data_type}, {symbol} ignored");
            self.feeds.insert(&symbol, data_type, gate, FeedHandle::Passive).await;
            return Ok(());
        };

        let mut conn = WsConnection::new(WsConnConfig {
            url: self.config.ws_url.clone(),
            subscribe_msg: Some(json_parser::build_subscribe(std::slice::from_ref(&stream))),
            ping_interval: self.config.ping_interval(),
            label: format!("binance:{stream}"),
        });
        let sym = symbol.clone();
        let on_frame = gate.clone();
        conn.start(Arc::new(move |text: &str| {
            if let Some(update) = json_parser::parse_stream_message(&sym, text) {
                on_frame.fire(&update);
            }
        }));

        info!("[binance] streaming {stream}");
        self.feeds.insert(&symbol, data_type, gate, FeedHandle::Socket(conn)).await;
        Ok(())
    }

    async fn unsubscribe(&self, symbol: &str, data_type: DataType) -> Result<()> {
        self.feeds.remove(symbol, data_type).await;
        Ok(())
    }
}
