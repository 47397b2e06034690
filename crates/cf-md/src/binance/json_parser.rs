//! Binance JSON parsers.
//!
//! Covers the REST payloads (`/api/v3/klines`, `/api/v3/ticker/24hr`) and the
//! raw-stream push events (`24hrTicker`, `trade`). Prices arrive as JSON
//! strings and go through `fast-float2`.

use cf_core::types::*;

use crate::json_util::{parse_f64_field, parse_str_f64, parse_str_u64, str_field};

const SOURCE: &str = "binance";

/// Parse one `/api/v3/klines` page.
///
/// Each row is `[openTime, open, high, low, close, volume, closeTime, ...]`.
/// Malformed rows are dropped.
pub fn parse_klines(symbol: &str, v: &serde_json::Value) -> Vec<MarketDataPoint> {
    let Some(rows) = v.as_array() else {
        return Vec::new();
    };
    rows.iter().filter_map(|row| parse_kline_row(symbol, row)).collect()
}

fn parse_kline_row(symbol: &str, row: &serde_json::Value) -> Option<MarketDataPoint> {
    let cols = row.as_array()?;
    Some(MarketDataPoint {
        symbol: symbol.to_string(),
        timestamp_ms: parse_str_u64(cols.first())?,
        open: parse_str_f64(cols.get(1))?,
        high: parse_str_f64(cols.get(2))?,
        low: parse_str_f64(cols.get(3))?,
        close: parse_str_f64(cols.get(4))?,
        volume: parse_str_f64(cols.get(5))?,
        source: SOURCE.to_string(),
    })
}

/// Parse a `/api/v3/ticker/24hr` object into a quote stamped at `closeTime`.
pub fn parse_ticker_24hr(symbol: &str, v: &serde_json::Value) -> Option<MarketDataPoint> {
    Some(MarketDataPoint {
        symbol: symbol.to_string(),
        timestamp_ms: v.get("closeTime")?.as_u64()?,
        open: parse_f64_field(v, "openPrice")?,
        high: parse_f64_field(v, "highPrice")?,
        low: parse_f64_field(v, "lowPrice")?,
        close: parse_f64_field(v, "lastPrice")?,
        volume: parse_f64_field(v, "volume")?,
        source: SOURCE.to_string(),
    })
}

/// Parse a raw-stream push frame.
///
/// `symbol` is the caller's spelling and is used on the emitted update.
/// Returns `None` for acks (`{"result":null,"id":1}`) and unknown events.
pub fn parse_stream_message(symbol: &str, text: &str) -> Option<DataUpdate> {
    let v: serde_json::Value = serde_json::from_str(text).ok()?;

    match str_field(&v, "e")? {
        "24hrTicker" => parse_ticker_event(symbol, &v).map(DataUpdate::Quote),
        "trade" => parse_trade_event(symbol, &v).map(DataUpdate::Trade),
        _ => None,
    }
}

fn parse_ticker_event(symbol: &str, v: &serde_json::Value) -> Option<MarketDataPoint> {
    Some(MarketDataPoint {
        symbol: symbol.to_string(),
        timestamp_ms: v.get("E")?.as_u64()?,
        open: parse_f64_field(v, "o")?,
        high: parse_f64_field(v, "h")?,
        low: parse_f64_field(v, "l")?,
        close: parse_f64_field(v, "c")?,
        volume: parse_f64_field(v, "v")?,
        source: SOURCE.to_string(),
    })
}

fn parse_trade_event(symbol: &str, v: &serde_json::Value) -> Option<TradeData> {
    // buyer is maker => the aggressor sold
    let side = if v.get("m")?.as_bool()? { TradeSide::Sell } else { TradeSide::Buy };
    Some(TradeData {
        symbol: symbol.to_string(),
        timestamp_ms: v.get("T").or_else(|| v.get("E"))?.as_u64()?,
        price: parse_f64_field(v, "p")?,
        size: parse_f64_field(v, "q")?,
        side,
        trade_id: v.get("t").and_then(|t| t.as_u64()),
        source: SOURCE.to_string(),
    })
}

/// Stream name for a subscription, or `None` when Binance has no push
/// stream for that data type.
pub fn stream_name(symbol: &str, data_type: DataType) -> Option<String> {
    let lower = symbol.to_lowercase();
    match data_type {
        DataType::Quotes => Some(format!("{lower}@ticker")),
        DataType::Trades => Some(format!("{lower}@trade")),
        DataType::News | DataType::CorporateActions => None,
    }
}

/// Build a `SUBSCRIBE` request for the given streams.
pub fn build_subscribe(streams: &[String]) -> String {
    serde_json::json!({
        "method": "SUBSCRIBE",
        "params": streams,
        "id": 1
    })
    .to_string()
}
