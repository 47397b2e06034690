//! Alpha Vantage (REST polling).
//!
//! All traffic goes through `GET {base_url}/query?function=...`. Push
//! subscriptions are emulated with poll loops:
//! - `quotes` → `GLOBAL_QUOTE` every `poll_interval_secs`
//! - `news` → `NEWS_SENTIMENT`, emitting only items newer than the last one
//!   delivered

pub mod config;
pub mod json_parser;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use anyhow::{Context, Result};
use async_trait::async_trait;
use cf_core::dedup::merge_corporate_actions;
use cf_core::error::FeedError;
use cf_core::subscription::{DataSubscription, SubscriptionGate};
use cf_core::time_util;
use cf_core::types::*;
use serde_json::Value;
use tracing::{debug, info, warn};

use self::config::AlphaVantageConfig;
use self::json_parser::{ApiStatus, SeriesFunction};
use crate::DataAdapter;
use crate::feeds::{FeedHandle, FeedSet, spawn_poll_loop};

/// Symbol used to probe the key on connect.
const PROBE_SYMBOL: &str = "IBM";

/// Items fetched per news poll.
const NEWS_POLL_LIMIT: usize = 50;

/// HTTP half of the adapter, shared with poll tasks.
struct AvClient {
    config: AlphaVantageConfig,
    http: reqwest::Client,
}

impl AvClient {
    /// Issue a query and classify the body. `Rejected` comes back as `Ok`
    /// so callers can decide what an unknown symbol means for them.
    async fn query(&self, params: &[(&str, String)]) -> Result<(ApiStatus, Value)> {
        let function = params.iter().find(|(k, _)| *k == "function").map_or("?", |(_, v)| v.as_str());
        let resp = self
            .http
            .get(self.config.query_url())
            .query(params)
            .query(&[("apikey", self.config.api_key.as_str())])
            .send()
            .await
            .map_err(|e| FeedError::Http(format!("{function}: {e}")))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(FeedError::Http(format!("{function}: {status}")).into());
        }
        let body: Value = resp.json().await.map_err(|e| FeedError::Parse(format!("{function}: {e}")))?;

        match json_parser::api_status(&body) {
            ApiStatus::Throttled(msg) => Err(FeedError::RateLimited(msg).into()),
            status => Ok((status, body)),
        }
    }

    async fn global_quote(&self, symbol: &str) -> Result<Option<MarketDataPoint>> {
        let params = [("function", "GLOBAL_QUOTE".to_string()), ("symbol", symbol.to_string())];
        match self.query(&params).await? {
            (ApiStatus::Ok, body) => Ok(json_parser::parse_global_quote(symbol, &body, time_util::now_ms())),
            _ => Ok(None),
        }
    }

    async fn news(&self, symbol: &str, limit: usize) -> Result<Vec<NewsEvent>> {
        let params = [
            ("function", "NEWS_SENTIMENT".to_string()),
            ("tickers", symbol.to_string()),
            ("limit", limit.to_string()),
        ];
        match self.query(&params).await? {
            (ApiStatus::Ok, body) => {
                let mut news = json_parser::parse_news(symbol, &body);
                news.truncate(limit);
                Ok(news)
            }
            _ => Ok(Vec::new()),
        }
    }

    async fn actions(&self, function: &str, symbol: &str) -> Result<Value> {
        let params = [("function", function.to_string()), ("symbol", symbol.to_string())];
        Ok(self.query(&params).await?.1)
    }
}

pub struct AlphaVantageAdapter {
    client: Arc<AvClient>,
    connected: AtomicBool,
    feeds: FeedSet,
}

impl AlphaVantageAdapter {
    pub fn new(config: AlphaVantageConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()
            .context("building alpha vantage http client")?;
        Ok(Self {
            client: Arc::new(AvClient { config, http }),
            connected: AtomicBool::new(false),
            feeds: FeedSet::new("alpha_vantage"),
        })
    }

    fn ensure_connected(&self) -> Result<()> {
        if self.is_connected() { Ok(()) } else { Err(FeedError::NotConnected(self.name().into()).into()) }
    }

    fn spawn_quote_poll(&self, symbol: String, gate: SubscriptionGate) -> FeedHandle {
        let client = Arc::clone(&self.client);
        spawn_poll_loop(self.client.config.poll_interval(), gate, move || {
            let client = Arc::clone(&client);
            let symbol = symbol.clone();
            async move {
                match client.global_quote(&symbol).await {
                    Ok(Some(q)) => vec![DataUpdate::Quote(q)],
                    Ok(None) => Vec::new(),
                    Err(e) => {
                        warn!("[alpha_vantage] quote poll for {symbol} failed: {e}");
                        Vec::new()
                    }
                }
            }
        })
    }

    fn spawn_news_poll(&self, symbol: String, gate: SubscriptionGate) -> FeedHandle {
        let client = Arc::clone(&self.client);
        let last_seen = Arc::new(AtomicU64::new(0));
        spawn_poll_loop(self.client.config.poll_interval(), gate, move || {
            let client = Arc::clone(&client);
            let symbol = symbol.clone();
            let last_seen = Arc::clone(&last_seen);
            async move {
                let news = match client.news(&symbol, NEWS_POLL_LIMIT).await {
                    Ok(news) => news,
                    Err(e) => {
                        warn!("[alpha_vantage] news poll for {symbol} failed: {e}");
                        return Vec::new();
                    }
                };
                let mut fresh = fresh_news(news, last_seen.load(Ordering::Acquire));
                if let Some(newest) = fresh.iter().map(|n| n.timestamp_ms).max() {
                    last_seen.store(newest, Ordering::Release);
                }
                fresh.sort_by_key(|n| n.timestamp_ms);
                fresh.into_iter().map(DataUpdate::News).collect()
            }
        })
    }
}

/// Items strictly newer than `last_seen`.
fn fresh_news(news: Vec<NewsEvent>, last_seen: u64) -> Vec<NewsEvent> {
    news.into_iter().filter(|n| n.timestamp_ms > last_seen).collect()
}

#[async_trait]
impl DataAdapter for AlphaVantageAdapter {
    fn kind(&self) -> AdapterKind {
        AdapterKind::AlphaVantage
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    async fn connect(&self) -> Result<()> {
        if self.client.config.api_key.trim().is_empty() {
            return Err(FeedError::Connection("alpha vantage api key is empty".into()).into());
        }
        let params = [("function", "GLOBAL_QUOTE".to_string()), ("symbol", PROBE_SYMBOL.to_string())];
        match self.client.query(&params).await {
            Ok((ApiStatus::Rejected(msg), _)) => {
                return Err(FeedError::Connection(format!("alpha vantage rejected the api key: {msg}")).into());
            }
            Ok(_) => {}
            Err(e) if matches!(e.downcast_ref::<FeedError>(), Some(FeedError::RateLimited(_))) => {
                warn!("[alpha_vantage] throttled during connect probe, key assumed valid");
            }
            Err(e) => return Err(FeedError::Connection(format!("alpha vantage unreachable: {e}")).into()),
        }
        self.connected.store(true, Ordering::Release);
        info!("[alpha_vantage] connected");
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
        let Some(function) = SeriesFunction::for_timeframe(timeframe) else {
            debug!("[alpha_vantage] no native {timeframe} series");
            return Ok(Vec::new());
        };

        let mut params = function.params();
        params.push(("symbol", symbol.to_string()));
        match self.client.query(&params).await? {
            (ApiStatus::Ok, body) => Ok(json_parser::parse_series(symbol, &body, start_ms, end_ms)),
            (_, _) => {
                debug!("[alpha_vantage] {symbol} unknown");
                Ok(Vec::new())
            }
        }
    }

    async fn get_realtime_quote(&self, symbol: &str) -> Result<Option<MarketDataPoint>> {
        self.ensure_connected()?;
        self.client.global_quote(symbol).await
    }

    async fn subscribe(&self, subscription: DataSubscription) -> Result<()> {
        let DataSubscription { symbol, data_type, callback } = subscription;
        let gate = SubscriptionGate::new(callback);

        let handle = match data_type {
            DataType::Quotes => self.spawn_quote_poll(symbol.clone(), gate.clone()),
            DataType::News => self.spawn_news_poll(symbol.clone(), gate.clone()),
            DataType::Trades | DataType::CorporateActions => {
                debug!("[alpha_vantage] {data_type} not polled for {symbol}");
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

    async fn get_corporate_actions(&self, symbol: &str, start_ms: u64, end_ms: u64) -> Result<Vec<CorporateAction>> {
        self.ensure_connected()?;
        let (dividends, splits) =
            tokio::join!(self.client.actions("DIVIDENDS", symbol), self.client.actions("SPLITS", symbol));

        let mut actions = json_parser::parse_dividends(symbol, &dividends?);
        actions.extend(json_parser::parse_splits(symbol, &splits?));
        actions.retain(|a| a.date_ms >= start_ms && a.date_ms <= end_ms);
        Ok(merge_corporate_actions(actions))
    }

    async fn get_news(&self, symbol: &str, limit: usize) -> Result<Vec<NewsEvent>> {
        self.ensure_connected()?;
        self.client.news(symbol, limit).await
    }
}
