//! Enumerations used throughout the chartfeed system.
//!
//! Every enum serializes as a lowercase / snake_case tag so it round-trips
//! cleanly through the JSON config file and the runner's JSON output.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::FeedError;

// ---------------------------------------------------------------------------
// Adapter kinds
// ---------------------------------------------------------------------------

/// Concrete data source implementations known to the adapter factory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdapterKind {
    AlphaVantage,
    Binance,
    Csv,
    Dummy,
}

impl AdapterKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::AlphaVantage => "alpha_vantage",
            Self::Binance => "binance",
            Self::Csv => "csv",
            Self::Dummy => "dummy",
        }
    }
}

impl std::fmt::Display for AdapterKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AdapterKind {
    type Err = FeedError;

    /// Accepts the snake_case tag plus the camel-case spelling used by older
    /// config files (`alphavantage`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "alpha_vantage" | "alphavantage" => Ok(Self::AlphaVantage),
            "binance" => Ok(Self::Binance),
            "csv" => Ok(Self::Csv),
            "dummy" => Ok(Self::Dummy),
            other => Err(FeedError::UnsupportedAdapterType(other.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// Subscription data types
// ---------------------------------------------------------------------------

/// Kind of push data a subscription is interested in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataType {
    Quotes,
    Trades,
    News,
    CorporateActions,
}

impl DataType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Quotes => "quotes",
            Self::Trades => "trades",
            Self::News => "news",
            Self::CorporateActions => "corporate_actions",
        }
    }
}

impl std::fmt::Display for DataType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DataType {
    type Err = FeedError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "quotes" => Ok(Self::Quotes),
            "trades" => Ok(Self::Trades),
            "news" => Ok(Self::News),
            "corporate_actions" => Ok(Self::CorporateActions),
            other => Err(FeedError::Config(format!("unknown data type: {other}"))),
        }
    }
}

// ---------------------------------------------------------------------------
// Bar timeframes
// ---------------------------------------------------------------------------

/// Bar granularity for historical queries.
///
/// The labels (`"1m"`, `"1h"`, ...) match Binance kline intervals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Timeframe {
    #[serde(rename = "1m")]
    M1,
    #[serde(rename = "5m")]
    M5,
    #[serde(rename = "15m")]
    M15,
    #[serde(rename = "30m")]
    M30,
    #[serde(rename = "1h")]
    H1,
    #[serde(rename = "4h")]
    H4,
    #[serde(rename = "1d")]
    D1,
    #[serde(rename = "1w")]
    W1,
}

impl Timeframe {
    pub const ALL: [Timeframe; 8] = [
        Self::M1,
        Self::M5,
        Self::M15,
        Self::M30,
        Self::H1,
        Self::H4,
        Self::D1,
        Self::W1,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Self::M1 => "1m",
            Self::M5 => "5m",
            Self::M15 => "15m",
            Self::M30 => "30m",
            Self::H1 => "1h",
            Self::H4 => "4h",
            Self::D1 => "1d",
            Self::W1 => "1w",
        }
    }

    /// Length of one bar in milliseconds.
    pub fn duration_ms(self) -> u64 {
        const MIN: u64 = 60_000;
        match self {
            Self::M1 => MIN,
            Self::M5 => 5 * MIN,
            Self::M15 => 15 * MIN,
            Self::M30 => 30 * MIN,
            Self::H1 => 60 * MIN,
            Self::H4 => 240 * MIN,
            Self::D1 => 1_440 * MIN,
            Self::W1 => 10_080 * MIN,
        }
    }
}

impl std::fmt::Display for Timeframe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Timeframe {
    type Err = FeedError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|tf| tf.label() == s)
            .ok_or_else(|| FeedError::Config(format!("unknown timeframe: {s}")))
    }
}

// ---------------------------------------------------------------------------
// Event metadata
// ---------------------------------------------------------------------------

/// Aggressor side of an executed trade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TradeSide {
    Buy,
    Sell,
}

/// Structural event affecting an instrument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CorporateActionType {
    Dividend,
    Split,
    Earnings,
    Merger,
    Spinoff,
}

impl std::fmt::Display for CorporateActionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Dividend => "dividend",
            Self::Split => "split",
            Self::Earnings => "earnings",
            Self::Merger => "merger",
            Self::Spinoff => "spinoff",
        };
        f.write_str(s)
    }
}

/// Coarse sentiment classification attached to a news event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Sentiment {
    Positive,
    Negative,
    #[default]
    Neutral,
}

impl Sentiment {
    /// Score at or beyond which a sentiment is no longer neutral.
    pub const THRESHOLD: f64 = 0.15;

    /// Classify a score in `[-1, 1]`.
    pub fn from_score(score: f64) -> Self {
        if score >= Self::THRESHOLD {
            Self::Positive
        } else if score <= -Self::THRESHOLD {
            Self::Negative
        } else {
            Self::Neutral
        }
    }
}
