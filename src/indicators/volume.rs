use crate::models::Candle;

/// Mean volume of the last `lookback` candles (fewer if the history is shorter)
pub fn average_volume(candles: &[Candle], lookback: usize) -> Option<f64> {
    let start = candles.len().saturating_sub(lookback);
    let window = &candles[start..];
    if window.is_empty() {
        return None;
    }

    Some(window.iter().map(|c| c.volume).sum::<f64>() / window.len() as f64)
}
