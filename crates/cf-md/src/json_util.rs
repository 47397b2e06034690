//! Shared JSON parsing helpers used by the REST/WebSocket adapters.
//!
//! Both Binance and Alpha Vantage encode prices as JSON strings
//! (`"30000.5"`) in some payloads and as native numbers in others.

/// Parse a JSON value (string or number) as `f64`.
#[inline]
pub fn parse_str_f64(v: Option<&serde_json::Value>) -> Option<f64> {
    let v = v?;
    if let Some(s) = v.as_str() {
        fast_float2::parse(s.trim()).ok()
    } else {
        v.as_f64()
    }
}

/// Parse a JSON value (string or number) as `u64`.
#[inline]
pub fn parse_str_u64(v: Option<&serde_json::Value>) -> Option<u64> {
    let v = v?;
    if let Some(s) = v.as_str() {
        s.trim().parse().ok()
    } else {
        v.as_u64()
    }
}

/// Parse a named field on a JSON object as `f64` (string or number).
#[inline]
pub fn parse_f64_field(v: &serde_json::Value, key: &str) -> Option<f64> {
    parse_str_f64(v.get(key))
}

/// Parse a named field on a JSON object as `u64` (string or number).
#[inline]
pub fn parse_u64_field(v: &serde_json::Value, key: &str) -> Option<u64> {
    parse_str_u64(v.get(key))
}

/// Read a named string field.
#[inline]
pub fn str_field<'a>(v: &'a serde_json::Value, key: &str) -> Option<&'a str> {
    v.get(key)?.as_str()
}
