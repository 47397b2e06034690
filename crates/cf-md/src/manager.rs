//! Data manager: the single entry point callers use.
//!
//! Owns a named, prioritized set of adapters and layers three policies on
//! top of them:
//!
//! - **Fallback** (history, quotes): adapters are tried one at a time in
//!   priority order (a preferred source jumps the queue); the first
//!   non-empty answer wins. History that nobody can serve is synthesized.
//! - **Merge** (corporate actions, news, validation): every adapter is asked
//!   concurrently and the answers are combined and deduplicated.
//! - **Fan-out** (subscriptions): one subscription is forwarded to every
//!   adapter behind a manager-level gate, so a single `unsubscribe` silences
//!   all sources at once.
//!
//! Per-adapter failures are logged and skipped; each adapter call runs under
//! `adapter_timeout_ms`. Only adding an adapter reports errors to the caller.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use ahash::AHashMap;
use anyhow::Result;
use cf_core::config::{AdapterSettings, ManagerSettings};
use cf_core::dedup::{merge_corporate_actions, merge_news};
use cf_core::error::FeedError;
use cf_core::subscription::{DataCallback, DataSubscription, SubscriptionGate, subscription_key};
use cf_core::types::*;
use futures_util::future::join_all;
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::DataAdapter;
use crate::dummy::{DummyAdapter, DummyConfig};
use crate::registry::{AdapterConfig, create_adapter};
use crate::synthetic;

/// Name the built-in dummy adapter is registered under.
pub const DUMMY_ADAPTER_NAME: &str = "dummy";

/// Manager tuning.
#[derive(Debug, Clone)]
pub struct ManagerConfig {
    /// Budget for one adapter call.
    pub adapter_timeout_ms: u64,
    /// Register a [`DummyAdapter`] at priority 0 on construction.
    pub register_dummy: bool,
    /// Settings for the built-in dummy adapter and synthetic fallback.
    pub dummy: DummyConfig,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self { adapter_timeout_ms: 10_000, register_dummy: true, dummy: DummyConfig::default() }
    }
}

impl ManagerConfig {
    pub fn from_settings(settings: &ManagerSettings) -> Result<Self> {
        let dummy = match &settings.dummy {
            Some(raw) => serde_json::from_value(raw.clone())
                .map_err(|e| FeedError::Config(format!("invalid manager.dummy config: {e}")))?,
            None => DummyConfig::default(),
        };
        Ok(Self { adapter_timeout_ms: settings.adapter_timeout_ms, register_dummy: settings.register_dummy, dummy })
    }

    pub fn adapter_timeout(&self) -> Duration {
        Duration::from_millis(self.adapter_timeout_ms.max(1))
    }
}

/// A history query.
#[derive(Debug, Clone)]
pub struct HistoricalRequest {
    pub symbol: String,
    pub timeframe: Timeframe,
    pub start_ms: u64,
    pub end_ms: u64,
    /// Adapter name to try before all others.
    pub preferred_source: Option<String>,
}

impl HistoricalRequest {
    pub fn new(symbol: impl Into<String>, timeframe: Timeframe, start_ms: u64, end_ms: u64) -> Self {
        Self { symbol: symbol.into(), timeframe, start_ms, end_ms, preferred_source: None }
    }

    pub fn prefer(mut self, source: impl Into<String>) -> Self {
        self.preferred_source = Some(source.into());
        self
    }
}

/// One adapter that failed while serving a request.
#[derive(Debug, Clone, Serialize)]
pub struct AdapterFailure {
    pub adapter: String,
    pub error: String,
}

/// History plus where it came from.
#[derive(Debug, Clone, Serialize)]
pub struct HistoricalOutcome {
    pub points: Vec<MarketDataPoint>,
    /// Registered name of the adapter that answered, or `"dummy"` for
    /// manager-level synthesis.
    pub source: String,
    /// `true` when the points are synthetic filler rather than market data.
    pub synthesized: bool,
    pub failures: Vec<AdapterFailure>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SymbolValidation {
    pub is_valid: bool,
    /// Adapters that recognize the symbol, in priority order.
    pub sources: Vec<String>,
}

/// Registry listing entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AdapterInfo {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: AdapterKind,
    pub priority: i32,
}

struct Registered {
    name: String,
    priority: i32,
    adapter: Arc<dyn DataAdapter>,
}

type Named = (String, Arc<dyn DataAdapter>);

pub struct DataManager {
    config: ManagerConfig,
    /// Registration order.
    adapters: RwLock<Vec<Registered>>,
    subscriptions: Mutex<AHashMap<String, SubscriptionGate>>,
}

impl DataManager {
    pub fn new(config: ManagerConfig) -> Self {
        let mut adapters = Vec::new();
        if config.register_dummy {
            adapters.push(Registered {
                name: DUMMY_ADAPTER_NAME.to_string(),
                priority: 0,
                adapter: Arc::new(DummyAdapter::new(config.dummy.clone())),
            });
        }
        Self { config, adapters: RwLock::new(adapters), subscriptions: Mutex::new(AHashMap::new()) }
    }

    pub fn config(&self) -> &ManagerConfig {
        &self.config
    }

    // -----------------------------------------------------------------------
    // Registry
    // -----------------------------------------------------------------------

    /// Resolve, construct, connect and register an adapter.
    pub async fn add_adapter(&self, settings: &AdapterSettings) -> Result<()> {
        let config = AdapterConfig::resolve(&settings.kind, &settings.config)?;
        let adapter = create_adapter(&config)?;
        self.add_adapter_instance(&settings.name, adapter, settings.priority).await
    }

    /// Connect `adapter` and register it under `name`.
    ///
    /// Nothing is registered if the connect fails. An existing adapter with
    /// the same name is disconnected and replaced at its position.
    pub async fn add_adapter_instance(&self, name: &str, adapter: Arc<dyn DataAdapter>, priority: i32) -> Result<()> {
        self.call(adapter.connect()).await.map_err(|e| {
            warn!("[manager] adapter '{name}' ({}) failed to connect: {e}", adapter.kind());
            e
        })?;

        let replaced = {
            let mut adapters = self.adapters.write();
            let entry = Registered { name: name.to_string(), priority, adapter: Arc::clone(&adapter) };
            match adapters.iter().position(|r| r.name == name) {
                Some(pos) => Some(std::mem::replace(&mut adapters[pos], entry).adapter),
                None => {
                    adapters.push(entry);
                    None
                }
            }
        };

        if let Some(old) = replaced {
            info!("[manager] replacing adapter '{name}'");
            if let Err(e) = self.call(old.disconnect()).await {
                warn!("[manager] disconnecting replaced adapter '{name}' failed: {e}");
            }
        }
        info!("[manager] adapter '{name}' ({}) registered at priority {priority}", adapter.kind());
        Ok(())
    }

    /// Disconnect and forget an adapter. Returns `false` for unknown names.
    pub async fn remove_adapter(&self, name: &str) -> bool {
        let removed = {
            let mut adapters = self.adapters.write();
            adapters.iter().position(|r| r.name == name).map(|pos| adapters.remove(pos))
        };
        let Some(entry) = removed else {
            return false;
        };
        if let Err(e) = self.call(entry.adapter.disconnect()).await {
            warn!("[manager] disconnecting '{name}' failed: {e}");
        }
        info!("[manager] adapter '{name}' removed");
        true
    }

    /// Registered adapters in registration order.
    pub fn get_available_adapters(&self) -> Vec<AdapterInfo> {
        self.adapters
            .read()
            .iter()
            .map(|r| AdapterInfo { name: r.name.clone(), kind: r.adapter.kind(), priority: r.priority })
            .collect()
    }

    /// Adapters by descending priority (ties keep registration order), with
    /// `preferred` moved to the front when registered.
    fn ordered(&self, preferred: Option<&str>) -> Vec<Named> {
        let adapters = self.adapters.read();
        let mut list: Vec<&Registered> = adapters.iter().collect();
        list.sort_by_key(|r| std::cmp::Reverse(r.priority));
        if let Some(pos) = preferred.and_then(|p| list.iter().position(|r| r.name == p)) {
            let first = list.remove(pos);
            list.insert(0, first);
        }
        list.into_iter().map(|r| (r.name.clone(), Arc::clone(&r.adapter))).collect()
    }

    async fn call<T>(&self, fut: impl Future<Output = Result<T>>) -> Result<T> {
        match tokio::time::timeout(self.config.adapter_timeout(), fut).await {
            Ok(result) => result,
            Err(_) => Err(FeedError::Timeout(self.config.adapter_timeout_ms).into()),
        }
    }

    // -----------------------------------------------------------------------
    // Fallback queries
    // -----------------------------------------------------------------------

    /// Bars for the request. Never empty: synthesized when no adapter answers.
    pub async fn get_historical_data(&self, request: &HistoricalRequest) -> Vec<MarketDataPoint> {
        self.get_historical_data_detailed(request).await.points
    }

    pub async fn get_historical_data_detailed(&self, request: &HistoricalRequest) -> HistoricalOutcome {
        let HistoricalRequest { symbol, timeframe, start_ms, end_ms, .. } = request;
        let mut failures = Vec::new();

        for (name, adapter) in self.ordered(request.preferred_source.as_deref()) {
            match self.call(adapter.get_historical_data(symbol, *timeframe, *start_ms, *end_ms)).await {
                Ok(points) if !points.is_empty() => {
                    debug!("[manager] {} {timeframe} bars for {symbol} from '{name}'", points.len());
                    return HistoricalOutcome {
                        points,
                        synthesized: adapter.kind() == AdapterKind::Dummy,
                        source: name,
                        failures,
                    };
                }
                Ok(_) => debug!("[manager] '{name}' has no {timeframe} history for {symbol}"),
                Err(e) => {
                    warn!("[manager] history for {symbol} from '{name}' failed: {e}");
                    failures.push(AdapterFailure { adapter: name, error: e.to_string() });
                }
            }
        }

        warn!("[manager] no adapter served {symbol} {timeframe}, synthesizing");
        let points = synthetic::generate_bars_with(
            &mut rand::rng(),
            symbol,
            *timeframe,
            *start_ms,
            *end_ms,
            self.config.dummy.volatility,
        );
        HistoricalOutcome { points, source: DUMMY_SOURCE.to_string(), synthesized: true, failures }
    }

    /// First quote any adapter produces, in priority order.
    pub async fn get_realtime_quote(&self, symbol: &str, preferred_source: Option<&str>) -> Option<MarketDataPoint> {
        for (name, adapter) in self.ordered(preferred_source) {
            match self.call(adapter.get_realtime_quote(symbol)).await {
                Ok(Some(quote)) => return Some(quote),
                Ok(None) => {}
                Err(e) => warn!("[manager] quote for {symbol} from '{name}' failed: {e}"),
            }
        }
        None
    }

    // -----------------------------------------------------------------------
    // Fan-out subscriptions
    // -----------------------------------------------------------------------

    /// Forward a subscription to every adapter; returns how many accepted.
    ///
    /// Several adapters may deliver the same update, so `callback` must be
    /// idempotent. It must also not call [`unsubscribe`](Self::unsubscribe)
    /// for its own key synchronously.
    pub async fn subscribe(&self, symbol: &str, data_type: DataType, callback: DataCallback) -> usize {
        let key = subscription_key(symbol, data_type);
        let gate = SubscriptionGate::new(callback);
        let previous = self.subscriptions.lock().insert(key.clone(), gate.clone());
        if let Some(previous) = previous {
            debug!("[manager] replacing subscription {key}");
            previous.close();
        }

        let forwarded = gate.as_callback();
        let adapters = self.ordered(None);
        let results = join_all(adapters.iter().map(|(_, adapter)| {
            let sub = DataSubscription::new(symbol, data_type, Arc::clone(&forwarded));
            self.call(adapter.subscribe(sub))
        }))
        .await;

        let mut accepted = 0;
        for ((name, _), result) in adapters.iter().zip(results) {
            match result {
                Ok(()) => accepted += 1,
                Err(e) => warn!("[manager] '{name}' rejected subscription {key}: {e}"),
            }
        }

        // An unsubscribe that ran while adapters were still subscribing may
        // have reached them first; tear down whatever they started since.
        let withdrawn = !self.subscriptions.lock().contains_key(&key);
        if withdrawn {
            debug!("[manager] {key} was unsubscribed while subscribing, releasing adapter feeds");
            self.release_feeds(&adapters, symbol, data_type).await;
            return 0;
        }

        info!("[manager] subscribed {key} on {accepted}/{} adapters", adapters.len());
        accepted
    }

    /// Stop a subscription. Once this returns the callback never fires again.
    pub async fn unsubscribe(&self, symbol: &str, data_type: DataType) {
        let key = subscription_key(symbol, data_type);
        let removed = self.subscriptions.lock().remove(&key);
        let Some(gate) = removed else {
            debug!("[manager] unsubscribe for unknown {key}");
            return;
        };
        gate.close();

        let adapters = self.ordered(None);
        self.release_feeds(&adapters, symbol, data_type).await;
        info!("[manager] unsubscribed {key}");
    }

    async fn release_feeds(&self, adapters: &[Named], symbol: &str, data_type: DataType) {
        let results = join_all(adapters.iter().map(|(_, adapter)| self.call(adapter.unsubscribe(symbol, data_type)))).await;
        for ((name, _), result) in adapters.iter().zip(results) {
            if let Err(e) = result {
                warn!("[manager] '{name}' failed to unsubscribe {symbol}_{data_type}: {e}");
            }
        }
    }

    pub fn subscription_count(&self) -> usize {
        self.subscriptions.lock().len()
    }

    // -----------------------------------------------------------------------
    // Merged queries
    // -----------------------------------------------------------------------

    /// Actions from every adapter, deduplicated and sorted by date.
    pub async fn get_corporate_actions(&self, symbol: &str, start_ms: u64, end_ms: u64) -> Vec<CorporateAction> {
        let gathered = self
            .gather("corporate actions", |adapter| async move {
                adapter.get_corporate_actions(symbol, start_ms, end_ms).await
            })
            .await;
        merge_corporate_actions(gathered.into_iter().flat_map(|(_, actions)| actions).collect())
    }

    /// Newest-first news from every adapter, deduplicated, at most `limit`.
    pub async fn get_news(&self, symbol: &str, limit: usize) -> Vec<NewsEvent> {
        let gathered = self.gather("news", |adapter| async move { adapter.get_news(symbol, limit).await }).await;
        merge_news(gathered.into_iter().flat_map(|(_, news)| news).collect(), limit)
    }

    /// Which adapters recognize `symbol`.
    pub async fn validate_symbol(&self, symbol: &str) -> SymbolValidation {
        let gathered = self.gather("validation", |adapter| async move { adapter.validate_symbol(symbol).await }).await;
        let sources: Vec<String> = gathered.into_iter().filter(|(_, ok)| *ok).map(|(name, _)| name).collect();
        SymbolValidation { is_valid: !sources.is_empty(), sources }
    }

    /// Run `query` on every adapter concurrently, keeping the successes in
    /// priority order.
    async fn gather<T, F, Fut>(&self, what: &str, query: F) -> Vec<(String, T)>
    where
        F: Fn(Arc<dyn DataAdapter>) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let adapters = self.ordered(None);
        let results = join_all(adapters.iter().map(|(_, adapter)| self.call(query(Arc::clone(adapter))))).await;

        adapters
            .into_iter()
            .zip(results)
            .filter_map(|((name, _), result)| match result {
                Ok(value) => Some((name, value)),
                Err(e) => {
                    warn!("[manager] {what} from '{name}' failed: {e}");
                    None
                }
            })
            .collect()
    }

    // -----------------------------------------------------------------------
    // Lifecycle
    // -----------------------------------------------------------------------

    /// Close every subscription and disconnect every adapter.
    pub async fn shutdown(&self) {
        let gates: Vec<SubscriptionGate> = self.subscriptions.lock().drain().map(|(_, g)| g).collect();
        for gate in &gates {
            gate.close();
        }

        let adapters: Vec<Registered> = std::mem::take(&mut *self.adapters.write());
        let results = join_all(adapters.iter().map(|r| self.call(r.adapter.disconnect()))).await;
        for (entry, result) in adapters.iter().zip(results) {
            if let Err(e) = result {
                warn!("[manager] disconnecting '{}' failed: {e}", entry.name);
            }
        }
        info!("[manager] shut down ({} subscriptions, {} adapters)", gates.len(), adapters.len());
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    use async_trait::async_trait;
    use cf_core::time_util::{DAY_MS, HOUR_MS};

    use super::*;

    const T0: u64 = 1_700_000_000_000;

    #[derive(Default)]
    struct MockAdapter {
        bars: Vec<MarketDataPoint>,
        quote: Option<MarketDataPoint>,
        news: Vec<NewsEvent>,
        actions: Vec<CorporateAction>,
        fail: bool,
        fail_connect: bool,
        delay: Option<Duration>,
        subscribe_delay: Option<Duration>,
        known: bool,
        connected: AtomicBool,
        history_calls: Arc<Mutex<Vec<String>>>,
        label: String,
        callbacks: Mutex<AHashMap<String, DataCallback>>,
        disconnects: AtomicUsize,
        unsubscribes: AtomicUsize,
    }

    impl MockAdapter {
        fn named(label: &str, log: &Arc<Mutex<Vec<String>>>) -> Self {
            Self { label: label.into(), history_calls: Arc::clone(log), ..Default::default() }
        }

        /// Push an update as if it arrived from the source, bypassing any
        /// unsubscribe the adapter has seen.
        fn emit(&self, update: &DataUpdate) {
            let callbacks: Vec<DataCallback> = self.callbacks.lock().values().cloned().collect();
            for cb in callbacks {
                cb(update);
            }
        }

        fn check(&self) -> Result<()> {
            if self.fail { Err(FeedError::Http(format!("{} is down", self.label)).into()) } else { Ok(()) }
        }
    }

    #[async_trait]
    impl DataAdapter for MockAdapter {
        fn kind(&self) -> AdapterKind {
            AdapterKind::Csv
        }

        fn is_connected(&self) -> bool {
            self.connected.load(Ordering::SeqCst)
        }

        async fn connect(&self) -> Result<()> {
            if self.fail_connect {
                return Err(FeedError::Connection("refused".into()).into());
            }
            self.connected.store(true, Ordering::SeqCst);
            Ok(())
        }

        async fn disconnect(&self) -> Result<()> {
            self.disconnects.fetch_add(1, Ordering::SeqCst);
            self.connected.store(false, Ordering::SeqCst);
            Ok(())
        }

        async fn get_historical_data(&self, _: &str, _: Timeframe, _: u64, _: u64) -> Result<Vec<MarketDataPoint>> {
            self.history_calls.lock().push(self.label.clone());
            if let Some(d) = self.delay {
                tokio::time::sleep(d).await;
            }
            self.check()?;
            Ok(self.bars.clone())
        }

        async fn get_realtime_quote(&self, _: &str) -> Result<Option<MarketDataPoint>> {
            self.check()?;
            Ok(self.quote.clone())
        }

        async fn subscribe(&self, sub: DataSubscription) -> Result<()> {
            if let Some(d) = self.subscribe_delay {
                tokio::time::sleep(d).await;
            }
            self.check()?;
            self.callbacks.lock().insert(sub.key(), sub.callback);
            Ok(())
        }

        async fn unsubscribe(&self, _: &str, _: DataType) -> Result<()> {
            // keeps the callback to model a frame already in flight
            self.unsubscribes.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn get_corporate_actions(&self, _: &str, _: u64, _: u64) -> Result<Vec<CorporateAction>> {
            self.check()?;
            Ok(self.actions.clone())
        }

        async fn get_news(&self, _: &str, _: usize) -> Result<Vec<NewsEvent>> {
            self.check()?;
            Ok(self.news.clone())
        }

        async fn validate_symbol(&self, _: &str) -> Result<bool> {
            self.check()?;
            Ok(self.known)
        }
    }

    fn bar(ts: u64, source: &str) -> MarketDataPoint {
        MarketDataPoint {
            symbol: "AAPL".into(),
            timestamp_ms: ts,
            open: 1.0,
            high: 2.0,
            low: 0.5,
            close: 1.5,
            volume: 10.0,
            source: source.into(),
        }
    }

    fn bars(n: u64, source: &str) -> Vec<MarketDataPoint> {
        (0..n).map(|i| bar(T0 + i * HOUR_MS, source)).collect()
    }

    fn bare_manager() -> DataManager {
        DataManager::new(ManagerConfig { register_dummy: false, ..Default::default() })
    }

    fn request() -> HistoricalRequest {
        HistoricalRequest::new("AAPL", Timeframe::H1, T0, T0 + DAY_MS)
    }

    #[tokio::test]
    async fn history_tries_priorities_in_descending_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mgr = bare_manager();
        for (name, prio) in [("p2", 2), ("p1", 3), ("p3", 1)] {
            mgr.add_adapter_instance(name, Arc::new(MockAdapter::named(name, &log)), prio).await.unwrap();
        }

        let outcome = mgr.get_historical_data_detailed(&request()).await;
        assert_eq!(*log.lock(), vec!["p1", "p2", "p3"]);
        assert!(outcome.synthesized);

        log.lock().clear();
        mgr.get_historical_data(&request().prefer("p3")).await;
        assert_eq!(*log.lock(), vec!["p3", "p1", "p2"]);
    }

    #[tokio::test]
    async fn failing_higher_priority_falls_back() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mgr = bare_manager();
        let a = MockAdapter { bars: bars(3, "a"), ..MockAdapter::named("a", &log) };
        let b = MockAdapter { fail: true, ..MockAdapter::named("b", &log) };
        mgr.add_adapter_instance("a", Arc::new(a), 5).await.unwrap();
        mgr.add_adapter_instance("b", Arc::new(b), 10).await.unwrap();

        let outcome = mgr.get_historical_data_detailed(&request()).await;
        assert_eq!(*log.lock(), vec!["b", "a"]);
        assert_eq!(outcome.points, bars(3, "a"));
        assert_eq!(outcome.source, "a");
        assert!(!outcome.synthesized);
        assert_eq!(outcome.failures.len(), 1);
        assert_eq!(outcome.failures[0].adapter, "b");
    }

    #[tokio::test]
    async fn slow_adapter_counts_as_failure() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mgr = DataManager::new(ManagerConfig { adapter_timeout_ms: 20, register_dummy: false, ..Default::default() });
        let slow = MockAdapter { delay: Some(Duration::from_secs(5)), bars: bars(1, "slow"), ..MockAdapter::named("slow", &log) };
        let fast = MockAdapter { bars: bars(2, "fast"), ..MockAdapter::named("fast", &log) };
        mgr.add_adapter_instance("slow", Arc::new(slow), 10).await.unwrap();
        mgr.add_adapter_instance("fast", Arc::new(fast), 1).await.unwrap();

        let outcome = mgr.get_historical_data_detailed(&request()).await;
        assert_eq!(outcome.source, "fast");
        assert!(outcome.failures[0].error.contains("timed out"));
    }

    #[tokio::test]
    async fn history_is_never_empty() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mgr = bare_manager();
        mgr.add_adapter_instance("down", Arc::new(MockAdapter { fail: true, ..MockAdapter::named("down", &log) }), 1)
            .await
            .unwrap();

        let outcome = mgr.get_historical_data_detailed(&request()).await;
        assert!(!outcome.points.is_empty());
        assert!(outcome.synthesized);
        assert_eq!(outcome.source, DUMMY_SOURCE);

        let empty = bare_manager();
        assert!(!empty.get_historical_data(&request()).await.is_empty());
    }

    #[tokio::test]
    async fn dummy_only_day_of_hourly_bars() {
        let mgr = DataManager::new(ManagerConfig::default());
        let outcome = mgr.get_historical_data_detailed(&request()).await;
        assert_eq!(outcome.source, DUMMY_ADAPTER_NAME);
        assert!(outcome.synthesized);

        let points = outcome.points;
        assert!(!points.is_empty());
        assert!(points.windows(2).all(|w| w[0].timestamp_ms < w[1].timestamp_ms));
        for p in &points {
            assert_eq!(p.source, DUMMY_SOURCE);
            assert!(p.high >= p.open.max(p.close));
            assert!(p.low <= p.open.min(p.close));
        }
    }

    #[tokio::test]
    async fn quote_first_answer_wins() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mgr = DataManager::new(ManagerConfig::default());
        let none = MockAdapter::named("none", &log);
        let broken = MockAdapter { fail: true, ..MockAdapter::named("broken", &log) };
        let live = MockAdapter { quote: Some(bar(T0, "live")), ..MockAdapter::named("live", &log) };
        mgr.add_adapter_instance("none", Arc::new(none), 9).await.unwrap();
        mgr.add_adapter_instance("broken", Arc::new(broken), 8).await.unwrap();
        mgr.add_adapter_instance("live", Arc::new(live), 1).await.unwrap();

        assert_eq!(mgr.get_realtime_quote("AAPL", None).await.unwrap().source, "live");
        assert!(bare_manager().get_realtime_quote("AAPL", None).await.is_none());
    }

    #[tokio::test]
    async fn corporate_actions_deduplicate_across_sources() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let action = |date_ms: u64, source: &str| CorporateAction {
            symbol: "AAPL".into(),
            action_type: CorporateActionType::Dividend,
            date_ms,
            data: serde_json::json!({"amount": 0.24}),
            source: source.into(),
        };
        let mgr = bare_manager();
        let a = MockAdapter { actions: vec![action(2 * DAY_MS, "a"), action(DAY_MS, "a")], ..MockAdapter::named("a", &log) };
        let b = MockAdapter { actions: vec![action(DAY_MS, "b")], ..MockAdapter::named("b", &log) };
        let c = MockAdapter { fail: true, ..MockAdapter::named("c", &log) };
        mgr.add_adapter_instance("a", Arc::new(a), 2).await.unwrap();
        mgr.add_adapter_instance("b", Arc::new(b), 1).await.unwrap();
        mgr.add_adapter_instance("c", Arc::new(c), 3).await.unwrap();

        let merged = mgr.get_corporate_actions("AAPL", 0, u64::MAX).await;
        assert_eq!(merged.iter().map(|a| a.date_ms).collect::<Vec<_>>(), vec![DAY_MS, 2 * DAY_MS]);
    }

    #[tokio::test]
    async fn news_collapses_within_window_only() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let item = |title: &str, ts: u64| NewsEvent {
            symbol: "AAPL".into(),
            title: title.into(),
            summary: String::new(),
            url: None,
            timestamp_ms: ts,
            sentiment: Sentiment::Neutral,
            source: "mock".into(),
        };
        let mgr = bare_manager();
        let a = MockAdapter { news: vec![item("Earnings beat", T0), item("Guidance", T0)], ..MockAdapter::named("a", &log) };
        let b = MockAdapter {
            news: vec![item("Earnings beat", T0 + 59_999), item("Guidance", T0 + 60_000)],
            ..MockAdapter::named("b", &log)
        };
        mgr.add_adapter_instance("a", Arc::new(a), 1).await.unwrap();
        mgr.add_adapter_instance("b", Arc::new(b), 1).await.unwrap();

        let news = mgr.get_news("AAPL", 10).await;
        assert_eq!(news.iter().filter(|n| n.title == "Earnings beat").count(), 1);
        assert_eq!(news.iter().filter(|n| n.title == "Guidance").count(), 2);
        assert!(news.windows(2).all(|w| w[0].timestamp_ms >= w[1].timestamp_ms));

        assert_eq!(mgr.get_news("AAPL", 1).await.len(), 1);
    }

    #[tokio::test]
    async fn validation_lists_recognizing_sources() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mgr = DataManager::new(ManagerConfig::default());
        mgr.add_adapter_instance("nobody", Arc::new(MockAdapter::named("nobody", &log)), 1).await.unwrap();
        assert_eq!(mgr.validate_symbol("ZZZZ").await, SymbolValidation { is_valid: false, sources: vec![] });

        mgr.add_adapter_instance("x", Arc::new(MockAdapter { known: true, ..MockAdapter::named("x", &log) }), 2)
            .await
            .unwrap();
        mgr.add_adapter_instance("y", Arc::new(MockAdapter { known: true, ..MockAdapter::named("y", &log) }), 3)
            .await
            .unwrap();
        mgr.add_adapter_instance("z", Arc::new(MockAdapter { fail: true, ..MockAdapter::named("z", &log) }), 4)
            .await
            .unwrap();
        let v = mgr.validate_symbol("AAPL").await;
        assert!(v.is_valid);
        assert_eq!(v.sources, vec!["y", "x"]);
    }

    #[tokio::test]
    async fn no_callback_after_unsubscribe() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mgr = bare_manager();
        let source = Arc::new(MockAdapter::named("src", &log));
        let broken = Arc::new(MockAdapter { fail: true, ..MockAdapter::named("broken", &log) });
        mgr.add_adapter_instance("src", source.clone(), 1).await.unwrap();
        mgr.add_adapter_instance("broken", broken, 2).await.unwrap();

        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);
        let accepted = mgr
            .subscribe(
                "AAPL",
                DataType::Quotes,
                Arc::new(move |_: &DataUpdate| {
                    counter.fetch_add(1, Ordering::SeqCst);
                }),
            )
            .await;
        assert_eq!(accepted, 1);
        assert_eq!(mgr.subscription_count(), 1);

        let update = DataUpdate::Quote(bar(T0, "src"));
        source.emit(&update);
        assert_eq!(hits.load(Ordering::SeqCst), 1);

        mgr.unsubscribe("AAPL", DataType::Quotes).await;
        source.emit(&update);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert_eq!(mgr.subscription_count(), 0);
    }

    #[tokio::test]
    async fn unsubscribe_during_slow_subscribe_releases_feeds() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mgr = bare_manager();
        let slow = Arc::new(MockAdapter {
            subscribe_delay: Some(Duration::from_millis(40)),
            ..MockAdapter::named("slow", &log)
        });
        mgr.add_adapter_instance("slow", slow.clone(), 1).await.unwrap();

        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);
        let subscribing = mgr.subscribe(
            "AAPL",
            DataType::Quotes,
            Arc::new(move |_: &DataUpdate| {
                counter.fetch_add(1, Ordering::SeqCst);
            }),
        );
        let unsubscribing = async {
            tokio::time::sleep(Duration::from_millis(5)).await;
            mgr.unsubscribe("AAPL", DataType::Quotes).await;
        };
        let (accepted, ()) = tokio::join!(subscribing, unsubscribing);

        assert_eq!(accepted, 0);
        assert_eq!(mgr.subscription_count(), 0);
        // once from unsubscribe, once more after the late subscribe landed
        assert_eq!(slow.unsubscribes.load(Ordering::SeqCst), 2);
        slow.emit(&DataUpdate::Quote(bar(T0, "slow")));
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn resubscribe_replaces_previous_callback() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mgr = bare_manager();
        let source = Arc::new(MockAdapter::named("src", &log));
        mgr.add_adapter_instance("src", source.clone(), 1).await.unwrap();

        let first = Arc::new(AtomicUsize::new(0));
        let second = Arc::new(AtomicUsize::new(0));
        let (f, s) = (Arc::clone(&first), Arc::clone(&second));
        mgr.subscribe("AAPL", DataType::Trades, Arc::new(move |_: &DataUpdate| {
            f.fetch_add(1, Ordering::SeqCst);
        }))
        .await;
        mgr.subscribe("AAPL", DataType::Trades, Arc::new(move |_: &DataUpdate| {
            s.fetch_add(1, Ordering::SeqCst);
        }))
        .await;

        source.emit(&DataUpdate::Quote(bar(T0, "src")));
        assert_eq!(first.load(Ordering::SeqCst), 0);
        assert_eq!(second.load(Ordering::SeqCst), 1);
        assert_eq!(mgr.subscription_count(), 1);
    }

    #[tokio::test]
    async fn registry_lifecycle() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mgr = DataManager::new(ManagerConfig::default());

        let refused = MockAdapter { fail_connect: true, ..MockAdapter::named("refused", &log) };
        assert!(mgr.add_adapter_instance("refused", Arc::new(refused), 5).await.is_err());

        let first = Arc::new(MockAdapter::named("a", &log));
        mgr.add_adapter_instance("a", first.clone(), 5).await.unwrap();
        mgr.add_adapter_instance("b", Arc::new(MockAdapter::named("b", &log)), 7).await.unwrap();
        mgr.add_adapter_instance("a", Arc::new(MockAdapter::named("a2", &log)), 9).await.unwrap();
        assert_eq!(first.disconnects.load(Ordering::SeqCst), 1);

        let names: Vec<(String, i32)> = mgr.get_available_adapters().into_iter().map(|i| (i.name, i.priority)).collect();
        assert_eq!(names, vec![("dummy".to_string(), 0), ("a".to_string(), 9), ("b".to_string(), 7)]);

        assert!(mgr.remove_adapter("b").await);
        assert!(!mgr.remove_adapter("b").await);
        assert_eq!(mgr.get_available_adapters().len(), 2);
    }

    #[tokio::test]
    async fn add_adapter_rejects_unknown_type() {
        let mgr = DataManager::new(ManagerConfig::default());
        let settings = AdapterSettings::new("x", "bloomberg", 1, serde_json::json!({}));
        let err = mgr.add_adapter(&settings).await.unwrap_err();
        assert!(matches!(err.downcast_ref::<FeedError>(), Some(FeedError::UnsupportedAdapterType(_))));

        let settings = AdapterSettings::new("extra", "dummy", 3, serde_json::json!({"tick_interval_ms": 50}));
        mgr.add_adapter(&settings).await.unwrap();
        assert_eq!(mgr.get_available_adapters().len(), 2);
    }

    #[tokio::test]
    async fn shutdown_disconnects_everything() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mgr = bare_manager();
        let source = Arc::new(MockAdapter::named("src", &log));
        mgr.add_adapter_instance("src", source.clone(), 1).await.unwrap();

        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);
        mgr.subscribe("AAPL", DataType::News, Arc::new(move |_: &DataUpdate| {
            counter.fetch_add(1, Ordering::SeqCst);
        }))
        .await;
        mgr.shutdown().await;

        source.emit(&DataUpdate::Quote(bar(T0, "src")));
        assert_eq!(hits.load(Ordering::SeqCst), 0);
        assert!(!source.is_connected());
        assert!(mgr.get_available_adapters().is_empty());
    }

    #[tokio::test]
    async fn open_ended_history_is_synthesized() {
        let mgr = DataManager::new(ManagerConfig::default());
        for tf in Timeframe::ALL {
            let outcome = mgr.get_historical_data_detailed(&HistoricalRequest::new("AAPL", tf, 0, u64::MAX)).await;
            assert!(!outcome.points.is_empty(), "{tf}");
            assert!(outcome.synthesized);
        }
    }

    #[test]
    fn adapter_listing_serializes_type() {
        let info = AdapterInfo { name: "local".into(), kind: AdapterKind::Csv, priority: 1 };
        let v = serde_json::to_value(&info).unwrap();
        assert_eq!(v, serde_json::json!({"name": "local", "type": "csv", "priority": 1}));
    }

    #[test]
    fn manager_config_from_settings() {
        let settings: ManagerSettings =
            serde_json::from_str(r#"{"adapter_timeout_ms": 500, "dummy": {"volatility": 0.05}}"#).unwrap();
        let cfg = ManagerConfig::from_settings(&settings).unwrap();
        assert_eq!(cfg.adapter_timeout(), Duration::from_millis(500));
        assert!(cfg.register_dummy);
        assert_eq!(cfg.dummy.volatility, 0.05);

        let bad: ManagerSettings = serde_json::from_str(r#"{"dummy": {"volatility": "high"}}"#).unwrap();
        assert!(ManagerConfig::from_settings(&bad).is_err());
    }
}
