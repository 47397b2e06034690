//! Random-walk OHLCV synthesis.
//!
//! Used by the dummy adapter and as the data manager's last resort. Bars are
//! aligned to timeframe boundaries, ascending, tagged `source: "dummy"`, and
//! always internally consistent (`high ≥ max(open, close)`,
//! `low ≤ min(open, close)`, positive volume). The starting price is derived
//! from the symbol so repeated requests for one symbol land in the same
//! price region.

use cf_core::time_util::{ceil_to, floor_to};
use cf_core::types::{DUMMY_SOURCE, MarketDataPoint, Timeframe};
use rand::Rng;

/// Upper bound on bars per request; the most recent bars are kept.
pub const MAX_SYNTHETIC_BARS: u64 = 5_000;

/// Default per-bar volatility (fraction of price).
pub const DEFAULT_VOLATILITY: f64 = 0.01;

/// Deterministic starting price in `[20, 520)` for a symbol.
pub fn base_price(symbol: &str) -> f64 {
    let h = xxhash_rust::xxh64::xxh64(symbol.as_bytes(), 0);
    20.0 + (h % 50_000) as f64 / 100.0
}

/// Synthesize bars covering `[start_ms, end_ms]` with the thread-local RNG.
pub fn generate_bars(symbol: &str, timeframe: Timeframe, start_ms: u64, end_ms: u64) -> Vec<MarketDataPoint> {
    generate_bars_with(&mut rand::rng(), symbol, timeframe, start_ms, end_ms, DEFAULT_VOLATILITY)
}

/// Synthesize bars covering `[start_ms, end_ms]`.
///
/// If no timeframe boundary falls inside the range, a single bar stamped
/// `start_ms` is returned so the result is never empty. A reversed range is
/// treated as the single instant `start_ms`.
pub fn generate_bars_with<R: Rng + ?Sized>(
    rng: &mut R,
    symbol: &str,
    timeframe: Timeframe,
    start_ms: u64,
    end_ms: u64,
    volatility: f64,
) -> Vec<MarketDataPoint> {
    let step = timeframe.duration_ms();
    let end_ms = end_ms.max(start_ms);

    let mut first = ceil_to(start_ms, step);
    let last = floor_to(end_ms, step);

    if first > last {
        return vec![next_bar(rng, symbol, start_ms, base_price(symbol), volatility)];
    }

    let mut count = (last - first) / step + 1;
    if count > MAX_SYNTHETIC_BARS {
        count = MAX_SYNTHETIC_BARS;
        first = last - (count - 1) * step;
    }

    // `first + (count - 1) * step == last`, so no timestamp can overflow
    let mut bars = Vec::with_capacity(count as usize);
    let mut price = base_price(symbol);
    for i in 0..count {
        let bar = next_bar(rng, symbol, first + i * step, price, volatility);
        price = bar.close;
        bars.push(bar);
    }
    bars
}

/// One bar opening at `open`, moving by up to `volatility` of the price.
pub fn next_bar<R: Rng + ?Sized>(rng: &mut R, symbol: &str, timestamp_ms: u64, open: f64, volatility: f64) -> MarketDataPoint {
    let change = open * volatility * rng.random_range(-1.0..=1.0);
    // keep the walk strictly positive
    let close = (open + change).max(0.01);
    let wick_up = open * volatility * 0.5 * rng.random::<f64>();
    let wick_down = open * volatility * 0.5 * rng.random::<f64>();
    let high = open.max(close) + wick_up;
    let low = (open.min(close) - wick_down).max(0.001);

    MarketDataPoint {
        symbol: symbol.to_string(),
        timestamp_ms,
        open,
        high,
        low: low.min(open.min(close)),
        close,
        volume: rng.random_range(1_000.0..100_000.0_f64).round(),
        source: DUMMY_SOURCE.to_string(),
    }
}
