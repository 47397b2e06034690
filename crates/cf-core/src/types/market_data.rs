//! Market data structures: the values adapters produce and callers consume.
//!
//! Every struct carries a `source` tag naming the adapter type that produced
//! it, so a caller can tell real data from synthesized filler after the fact.
//!
//! # Timestamp convention
//!
//! All timestamps are **milliseconds since Unix epoch** (ms), the unit both
//! Binance and the JSON config use.

use serde::{Deserialize, Serialize};

use super::enums::{CorporateActionType, DataType, Sentiment, TradeSide};

/// Source tag used for synthesized data.
pub const DUMMY_SOURCE: &str = "dummy";

// ---------------------------------------------------------------------------
// MarketDataPoint (OHLCV bar)
// ---------------------------------------------------------------------------

/// One OHLCV bar for a symbol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketDataPoint {
    pub symbol: String,
    pub timestamp_ms: u64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
    pub source: String,
}

impl MarketDataPoint {
    /// `true` when `high`/`low` bracket both `open` and `close`.
    pub fn is_consistent(&self) -> bool {
        self.high >= self.open.max(self.close) && self.low <= self.open.min(self.close)
    }
}

// ---------------------------------------------------------------------------
// TradeData
// ---------------------------------------------------------------------------

/// A single executed trade.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeData {
    pub symbol: String,
    pub timestamp_ms: u64,
    pub price: f64,
    pub size: f64,
    pub side: TradeSide,
    pub trade_id: Option<u64>,
    pub source: String,
}

// ---------------------------------------------------------------------------
// CorporateAction
// ---------------------------------------------------------------------------

/// A dated structural event with a free-form payload.
///
/// `date_ms` is midnight UTC of the event day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorporateAction {
    pub symbol: String,
    pub action_type: CorporateActionType,
    pub date_ms: u64,
    pub data: serde_json::Value,
    pub source: String,
}

// ---------------------------------------------------------------------------
// NewsEvent
// ---------------------------------------------------------------------------

/// A timestamped headline with a derived sentiment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewsEvent {
    pub symbol: String,
    pub title: String,
    pub summary: String,
    pub url: Option<String>,
    pub timestamp_ms: u64,
    pub sentiment: Sentiment,
    pub source: String,
}

// ---------------------------------------------------------------------------
// DataUpdate: tagged union delivered to subscription callbacks
// ---------------------------------------------------------------------------

/// A tagged union of every push update type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum DataUpdate {
    Quote(MarketDataPoint),
    Trade(TradeData),
    News(NewsEvent),
    CorporateAction(CorporateAction),
}

impl DataUpdate {
    /// The subscription data type this update satisfies.
    pub fn data_type(&self) -> DataType {
        match self {
            Self::Quote(_) => DataType::Quotes,
            Self::Trade(_) => DataType::Trades,
            Self::News(_) => DataType::News,
            Self::CorporateAction(_) => DataType::CorporateActions,
        }
    }

    pub fn symbol(&self) -> &str {
        match self {
            Self::Quote(p) => &p.symbol,
            Self::Trade(t) => &t.symbol,
            Self::News(n) => &n.symbol,
            Self::CorporateAction(a) => &a.symbol,
        }
    }

    pub fn source(&self) -> &str {
        match self {
            Self::Quote(p) => &p.source,
            Self::Trade(t) => &t.source,
            Self::News(n) => &n.source,
            Self::CorporateAction(a) => &a.source,
        }
    }
}

// ---------------------------------------------------------------------------
// Display impls
// ---------------------------------------------------------------------------

impl std::fmt::Display for MarketDataPoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Bar({} t={} o={:.4} h={:.4} l={:.4} c={:.4} v={:.2} src={})",
            self.symbol, self.timestamp_ms, self.open, self.high, self.low, self.close, self.volume, self.source
        )
    }
}

impl std::fmt::Display for TradeData {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let side = match self.side {
            TradeSide::Buy => "BUY",
            TradeSide::Sell => "SELL",
        };
        write!(f, "Trade({} {side} {:.8}x{:.4} src={})", self.symbol, self.price, self.size, self.source)
    }
}

impl std::fmt::Display for CorporateAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Action({} {} date={} src={})", self.symbol, self.action_type, self.date_ms, self.source)
    }
}

impl std::fmt::Display for NewsEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "News({} {:?} t={} \"{}\" src={})", self.symbol, self.sentiment, self.timestamp_ms, self.title, self.source)
    }
}

impl std::fmt::Display for DataUpdate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Quote(p) => p.fmt(f),
            Self::Trade(t) => t.fmt(f),
            Self::News(n) => n.fmt(f),
            Self::CorporateAction(a) => a.fmt(f),
        }
    }
}
