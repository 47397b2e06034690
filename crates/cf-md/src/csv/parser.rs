//! Row parsing for OHLCV files.
//!
//! Layout is `symbol,timestamp,open,high,low,close,volume`, or
//! `timestamp,open,high,low,close,volume` when a fixed symbol is configured.
//! Timestamps are epoch milliseconds.

use ahash::AHashMap;
use cf_core::types::MarketDataPoint;

const SOURCE: &str = "csv";

/// Parsed file contents, grouped by symbol and sorted ascending.
#[derive(Debug, Default)]
pub struct ParsedFile {
    pub by_symbol: AHashMap<String, Vec<MarketDataPoint>>,
    /// 1-based line numbers of rows that could not be parsed.
    pub skipped: Vec<usize>,
}

impl ParsedFile {
    pub fn row_count(&self) -> usize {
        self.by_symbol.values().map(Vec::len).sum()
    }
}

pub fn parse(text: &str, delimiter: char, has_header: bool, fixed_symbol: Option<&str>) -> ParsedFile {
    let mut out = ParsedFile::default();

    for (idx, line) in text.lines().enumerate() {
        if idx == 0 && has_header {
            continue;
        }
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match parse_row(line, delimiter, fixed_symbol) {
            Some(bar) => out.by_symbol.entry(bar.symbol.clone()).or_default().push(bar),
            None => out.skipped.push(idx + 1),
        }
    }

    for bars in out.by_symbol.values_mut() {
        bars.sort_by_key(|b| b.timestamp_ms);
    }
    out
}

fn parse_row(line: &str, delimiter: char, fixed_symbol: Option<&str>) -> Option<MarketDataPoint> {
    let mut cols = line.split(delimiter).map(str::trim);
    let symbol = match fixed_symbol {
        Some(s) => s.to_string(),
        None => cols.next().filter(|s| !s.is_empty())?.to_string(),
    };
    let timestamp_ms = cols.next()?.parse().ok()?;
    let mut num = || -> Option<f64> { fast_float2::parse(cols.next()?).ok() };
    let (open, high, low, close, volume) = (num()?, num()?, num()?, num()?, num()?);

    Some(MarketDataPoint { symbol, timestamp_ms, open, high, low, close, volume, source: SOURCE.to_string() })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn multi_symbol_with_header() {
        let text = "symbol,timestamp,open,high,low,close,volume\n\
                    AAPL,2000,2,3,1,2.5,100\n\
                    AAPL,1000,1,2,0.5,1.5,50\n\
                    MSFT,1000,10,11,9,10.5,7\n\
                    AAPL,notatime,1,1,1,1,1\n\
                    \n\
                    MSFT,3000,10,11\n";
        let parsed = parse(text, ',', true, None);
        assert_eq!(parsed.row_count(), 3);
        assert_eq!(parsed.skipped, vec![5, 7]);

        let aapl = &parsed.by_symbol["AAPL"];
        assert_eq!(aapl.iter().map(|b| b.timestamp_ms).collect::<Vec<_>>(), vec![1000, 2000]);
        assert_eq!(aapl[1].close, 2.5);
        assert_eq!(aapl[0].source, "csv");
    }

    #[test]
    fn fixed_symbol_without_header() {
        let text = "1000;1;2;0.5;1.5;50\n2000;2;3;1;2.5;100\n";
        let parsed = parse(text, ';', false, Some("BTCUSDT"));
        assert!(parsed.skipped.is_empty());
        assert_eq!(parsed.by_symbol["BTCUSDT"].len(), 2);
    }
}
