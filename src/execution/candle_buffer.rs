use crate::models::Candle;
use std::collections::{HashMap, VecDeque};

/// Rolling per-symbol candle history
///
/// Holds at most `max_candles` per symbol; the oldest candle is evicted first.
/// Owned by the signal pipeline and never persisted.
#[derive(Debug, Clone)]
pub struct CandleBuffer {
    data: HashMap<String, VecDeque<Candle>>,
    max_candles: usize,
}

impl CandleBuffer {
    /// # Arguments
    /// * `max_candles` - Maximum number of candles to keep per symbol
    pub fn new(max_candles: usize) -> Self {
        Self {
            data: HashMap::new(),
            max_candles: max_candles.max(1),
        }
    }

    /// Append a candle and return that symbol's history, oldest first
    pub fn push(&mut self, candle: Candle) -> &[Candle] {
        let history = self.data.entry(candle.symbol.clone()).or_default();

        history.push_back(candle);
        while history.len() > self.max_candles {
            history.pop_front();
        }

        history.make_contiguous()
    }

    /// Count of retained candles for a symbol
    pub fn candle_count(&self, symbol: &str) -> usize {
        self.data.get(symbol).map(VecDeque::len).unwrap_or(0)
    }

    /// Copy of the retained history for a symbol
    pub fn candles(&self, symbol: &str) -> Vec<Candle> {
        self.data
            .get(symbol)
            .map(|history| history.iter().cloned().collect())
            .unwrap_or_default()
    }
}
