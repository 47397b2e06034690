//! Alpha Vantage response parsing.
//!
//! Every `/query` response is a JSON object. Failures come back with HTTP 200
//! and one of three marker keys:
//! - `Error Message`: unknown symbol or invalid key
//! - `Note` / `Information`: throttled
//!
//! Timestamps carry no zone; they are read as UTC.

use chrono::{NaiveDate, NaiveDateTime};
use serde_json::Value;

use cf_core::types::*;

use crate::json_util::{parse_f64_field, str_field};

const SOURCE: &str = "alpha_vantage";

/// Classification of a `/query` response body.
#[derive(Debug, Clone, PartialEq)]
pub enum ApiStatus {
    Ok,
    /// `Error Message` present.
    Rejected(String),
    /// `Note` or `Information` present.
    Throttled(String),
}

pub fn api_status(v: &Value) -> ApiStatus {
    if let Some(msg) = str_field(v, "Error Message") {
        return ApiStatus::Rejected(msg.to_string());
    }
    if let Some(msg) = str_field(v, "Note").or_else(|| str_field(v, "Information")) {
        return ApiStatus::Throttled(msg.to_string());
    }
    ApiStatus::Ok
}

/// Which series endpoint serves a timeframe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeriesFunction {
    Intraday(&'static str),
    Daily,
    Weekly,
}

impl SeriesFunction {
    /// `None` when Alpha Vantage has no native series (4h).
    pub fn for_timeframe(tf: Timeframe) -> Option<Self> {
        match tf {
            Timeframe::M1 => Some(Self::Intraday("1min")),
            Timeframe::M5 => Some(Self::Intraday("5min")),
            Timeframe::M15 => Some(Self::Intraday("15min")),
            Timeframe::M30 => Some(Self::Intraday("30min")),
            Timeframe::H1 => Some(Self::Intraday("60min")),
            Timeframe::H4 => None,
            Timeframe::D1 => Some(Self::Daily),
            Timeframe::W1 => Some(Self::Weekly),
        }
    }

    /// Query parameters (besides `symbol` / `apikey`).
    pub fn params(self) -> Vec<(&'static str, String)> {
        match self {
            Self::Intraday(interval) => vec![
                ("function", "TIME_SERIES_INTRADAY".into()),
                ("interval", interval.into()),
                ("outputsize", "full".into()),
            ],
            Self::Daily => vec![("function", "TIME_SERIES_DAILY".into()), ("outputsize", "full".into())],
            Self::Weekly => vec![("function", "TIME_SERIES_WEEKLY".into())],
        }
    }
}

/// `YYYY-MM-DD HH:MM:SS` or `YYYY-MM-DD` (midnight) as epoch ms.
pub fn parse_timestamp(s: &str) -> Option<u64> {
    let dt = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
        .ok()
        .or_else(|| NaiveDate::parse_from_str(s, "%Y-%m-%d").ok()?.and_hms_opt(0, 0, 0))?;
    u64::try_from(dt.and_utc().timestamp_millis()).ok()
}

/// News `time_published`, e.g. `20240105T193000`.
pub fn parse_news_time(s: &str) -> Option<u64> {
    let dt = NaiveDateTime::parse_from_str(s, "%Y%m%dT%H%M%S")
        .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y%m%dT%H%M"))
        .ok()?;
    u64::try_from(dt.and_utc().timestamp_millis()).ok()
}

fn find_series_key(v: &Value) -> Option<&str> {
    v.as_object()?.keys().find(|k| k.contains("Time Series")).map(String::as_str)
}

/// Bars within `[start_ms, end_ms]`, ascending. Missing series → empty.
pub fn parse_series(symbol: &str, v: &Value, start_ms: u64, end_ms: u64) -> Vec<MarketDataPoint> {
    let Some(series) = find_series_key(v).and_then(|k| v.get(k)).and_then(Value::as_object) else {
        return Vec::new();
    };

    let mut bars: Vec<MarketDataPoint> = series
        .iter()
        .filter_map(|(ts, row)| {
            let timestamp_ms = parse_timestamp(ts)?;
            if timestamp_ms < start_ms || timestamp_ms > end_ms {
                return None;
            }
            Some(MarketDataPoint {
                symbol: symbol.to_string(),
                timestamp_ms,
                open: parse_f64_field(row, "1. open")?,
                high: parse_f64_field(row, "2. high")?,
                low: parse_f64_field(row, "3. low")?,
                close: parse_f64_field(row, "4. close")?,
                volume: parse_f64_field(row, "5. volume").unwrap_or(0.0),
                source: SOURCE.to_string(),
            })
        })
        .collect();
    bars.sort_by_key(|b| b.timestamp_ms);
    bars
}

/// `GLOBAL_QUOTE` payload. An empty `Global Quote` object means the symbol
/// is unknown.
pub fn parse_global_quote(symbol: &str, v: &Value, timestamp_ms: u64) -> Option<MarketDataPoint> {
    let q = v.get("Global Quote")?;
    if q.as_object().is_none_or(|o| o.is_empty()) {
        return None;
    }
    let close = parse_f64_field(q, "05. price")?;
    Some(MarketDataPoint {
        symbol: symbol.to_string(),
        timestamp_ms,
        open: parse_f64_field(q, "02. open").unwrap_or(close),
        high: parse_f64_field(q, "03. high").unwrap_or(close),
        low: parse_f64_field(q, "04. low").unwrap_or(close),
        close,
        volume: parse_f64_field(q, "06. volume").unwrap_or(0.0),
        source: SOURCE.to_string(),
    })
}

/// `NEWS_SENTIMENT` feed, in payload order.
pub fn parse_news(symbol: &str, v: &Value) -> Vec<NewsEvent> {
    let Some(feed) = v.get("feed").and_then(Value::as_array) else {
        return Vec::new();
    };
    feed.iter()
        .filter_map(|item| {
            let title = str_field(item, "title")?.to_string();
            let timestamp_ms = parse_news_time(str_field(item, "time_published")?)?;
            let score = parse_f64_field(item, "overall_sentiment_score").unwrap_or(0.0);
            Some(NewsEvent {
                symbol: symbol.to_string(),
                title,
                summary: str_field(item, "summary").unwrap_or_default().to_string(),
                url: str_field(item, "url").map(str::to_string),
                timestamp_ms,
                sentiment: Sentiment::from_score(score),
                source: SOURCE.to_string(),
            })
        })
        .collect()
}

/// `DIVIDENDS` rows, dated by ex-dividend date.
pub fn parse_dividends(symbol: &str, v: &Value) -> Vec<CorporateAction> {
    rows(v)
        .filter_map(|row| {
            let date_ms = parse_timestamp(str_field(row, "ex_dividend_date")?)?;
            Some(CorporateAction {
                symbol: symbol.to_string(),
                action_type: CorporateActionType::Dividend,
                date_ms,
                data: serde_json::json!({
                    "amount": parse_f64_field(row, "amount"),
                    "declaration_date": str_field(row, "declaration_date"),
                    "record_date": str_field(row, "record_date"),
                    "payment_date": str_field(row, "payment_date"),
                }),
                source: SOURCE.to_string(),
            })
        })
        .collect()
}

/// `SPLITS` rows, dated by effective date.
pub fn parse_splits(symbol: &str, v: &Value) -> Vec<CorporateAction> {
    rows(v)
        .filter_map(|row| {
            let date_ms = parse_timestamp(str_field(row, "effective_date")?)?;
            Some(CorporateAction {
                symbol: symbol.to_string(),
                action_type: CorporateActionType::Split,
                date_ms,
                data: serde_json::json!({ "split_factor": parse_f64_field(row, "split_factor") }),
                source: SOURCE.to_string(),
            })
        })
        .collect()
}

fn rows(v: &Value) -> impl Iterator<Item = &Value> {
    v.get("data").and_then(Value::as_array).into_iter().flatten()
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn status_markers() {
        assert_eq!(api_status(&json!({"Global Quote": {}})), ApiStatus::Ok);
        assert!(matches!(api_status(&json!({"Error Message": "Invalid API call"})), ApiStatus::Rejected(_)));
        assert!(matches!(api_status(&json!({"Note": "Thank you for using"})), ApiStatus::Throttled(_)));
        assert!(matches!(api_status(&json!({"Information": "rate limit"})), ApiStatus::Throttled(_)));
    }

    #[test]
    fn timeframe_mapping() {
        assert_eq!(SeriesFunction::for_timeframe(Timeframe::H1), Some(SeriesFunction::Intraday("60min")));
        assert_eq!(SeriesFunction::for_timeframe(Timeframe::H4), None);
        assert_eq!(SeriesFunction::for_timeframe(Timeframe::W1), Some(SeriesFunction::Weekly));
        assert!(SeriesFunction::Daily.params().contains(&("function", "TIME_SERIES_DAILY".to_string())));
    }

    #[test]
    fn timestamps_are_utc() {
        assert_eq!(parse_timestamp("1970-01-02"), Some(86_400_000));
        assert_eq!(parse_timestamp("1970-01-01 00:01:00"), Some(60_000));
        assert_eq!(parse_news_time("19700101T000130"), Some(90_000));
        assert_eq!(parse_timestamp("yesterday"), None);
    }

    #[test]
    fn intraday_series_filtered_and_ascending() {
        let v = json!({
            "Meta Data": {"2. Symbol": "IBM"},
            "Time Series (5min)": {
                "2024-01-05 19:55:00": {"1. open": "160.0", "2. high": "161.0", "3. low": "159.5", "4. close": "160.5", "5. volume": "1200"},
                "2024-01-05 19:50:00": {"1. open": "159.0", "2. high": "160.2", "3. low": "158.9", "4. close": "160.0", "5. volume": "900"},
                "2024-01-04 10:00:00": {"1. open": "150.0", "2. high": "151.0", "3. low": "149.0", "4. close": "150.5", "5. volume": "100"}
            }
        });
        let start = parse_timestamp("2024-01-05 00:00:00").unwrap();
        let end = parse_timestamp("2024-01-06").unwrap();
        let bars = parse_series("IBM", &v, start, end);
        assert_eq!(bars.len(), 2);
        assert!(bars[0].timestamp_ms < bars[1].timestamp_ms);
        assert_eq!(bars[1].close, 160.5);
        assert_eq!(bars[0].source, "alpha_vantage");
    }

    #[test]
    fn weekly_series_key_is_found() {
        let v = json!({"Weekly Time Series": {"2024-01-05": {"1. open": "1", "2. high": "2", "3. low": "0.5", "4. close": "1.5", "5. volume": "10"}}});
        assert_eq!(parse_series("IBM", &v, 0, u64::MAX).len(), 1);
        assert!(parse_series("IBM", &json!({"Error Message": "x"}), 0, u64::MAX).is_empty());
    }

    #[test]
    fn global_quote_empty_is_none() {
        assert!(parse_global_quote("NOPE", &json!({"Global Quote": {}}), 1).is_none());
        let v = json!({"Global Quote": {"01. symbol": "IBM", "02. open": "160", "03. high": "162", "04. low": "159", "05. price": "161.5", "06. volume": "3000"}});
        let q = parse_global_quote("IBM", &v, 42).unwrap();
        assert_eq!(q.close, 161.5);
        assert_eq!(q.timestamp_ms, 42);
    }

    #[test]
    fn news_sentiment_thresholds() {
        let v = json!({"feed": [
            {"title": "Up", "summary": "s", "url": "https://x", "time_published": "20240105T193000", "overall_sentiment_score": 0.15},
            {"title": "Down", "summary": "s", "time_published": "20240105T193000", "overall_sentiment_score": -0.2},
            {"title": "Flat", "summary": "s", "time_published": "20240105T193000", "overall_sentiment_score": 0.1},
            {"summary": "no title", "time_published": "20240105T193000"}
        ]});
        let news = parse_news("IBM", &v);
        assert_eq!(news.len(), 3);
        assert_eq!(news[0].sentiment, Sentiment::Positive);
        assert_eq!(news[0].url.as_deref(), Some("https://x"));
        assert_eq!(news[1].sentiment, Sentiment::Negative);
        assert_eq!(news[2].sentiment, Sentiment::Neutral);
    }

    #[test]
    fn dividends_and_splits() {
        let div = json!({"symbol": "IBM", "data": [{"ex_dividend_date": "2024-02-08", "amount": "1.66", "payment_date": "2024-03-09"}]});
        let actions = parse_dividends("IBM", &div);
        assert_eq!(actions.len(), 1);
        assert_eq!(actions[0].action_type, CorporateActionType::Dividend);
        assert_eq!(actions[0].data["amount"], 1.66);

        let splits = json!({"symbol": "IBM", "data": [{"effective_date": "1999-05-27", "split_factor": "2.0000"}, {"effective_date": "bad"}]});
        let actions = parse_splits("IBM", &splits);
        assert_eq!(actions.len(), 1);
        assert_eq!(actions[0].data["split_factor"], 2.0);
    }
}
