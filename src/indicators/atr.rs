/// Average True Range, normalized by price
///
/// True Range is the greatest of:
/// - Current High - Current Low
/// - Abs(Current High - Previous Close)
/// - Abs(Current Low - Previous Close)
use crate::models::Candle;

pub fn true_range(candle: &Candle, prev_close: f64) -> f64 {
    (candle.high - candle.low)
        .max((candle.high - prev_close).abs())
        .max((candle.low - prev_close).abs())
}

/// ATR over the full slice as a fraction of the latest close
///
/// The true-range sum is divided by the candle count (not the pair count), so a
/// short history reads slightly calmer than it is.
/// Returns None for fewer than two candles or a non-positive last close.
pub fn atr_percent(candles: &[Candle]) -> Option<f64> {
    if candles.len() < 2 {
        return None;
    }

    let tr_sum: f64 = candles
        .windows(2)
        .map(|pair| true_range(&pair[1], pair[0].close))
        .sum();

    let last_close = candles.last()?.close;
    if last_close <= 0.0 {
        return None;
    }

    Some((tr_sum / candles.len() as f64) / last_close)
}
