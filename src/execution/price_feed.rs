use crate::models::Candle;
use anyhow::Result;
use chrono::NaiveDateTime;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::HashMap;

/// Source of the next candle for a symbol
pub trait CandleSource: Send {
    fn next_candle(&mut self, symbol: &str, now: NaiveDateTime) -> Result<Candle>;
}

/// Seeded random-walk candle generator standing in for a market feed
///
/// Each call moves the symbol's price by up to ±0.3%, adds up to 10 points of
/// wick on each side and draws a volume in 1000..=10000.
pub struct SyntheticFeed {
    rng: StdRng,
    last_prices: HashMap<String, f64>,
}

impl SyntheticFeed {
    /// Create a feed for the given symbols
    ///
    /// # Arguments
    /// * `seed` - Fixed seed for reproducible runs; `None` draws one from the OS
    pub fn new(symbols: &[String], seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        let mut feed = Self {
            rng,
            last_prices: HashMap::new(),
        };
        for symbol in symbols {
            let price = feed.starting_price(symbol);
            feed.last_prices.insert(symbol.clone(), price);
        }
        feed
    }

    pub fn last_price(&self, symbol: &str) -> Option<f64> {
        self.last_prices.get(symbol).copied()
    }

    fn starting_price(&mut self, symbol: &str) -> f64 {
        if symbol.contains("NIFTY") {
            self.rng.gen_range(20_000.0..25_000.0)
        } else {
            self.rng.gen_range(40_000.0..60_000.0)
        }
    }
}

impl CandleSource for SyntheticFeed {
    fn next_candle(&mut self, symbol: &str, now: NaiveDateTime) -> Result<Candle> {
        let base_price = match self.last_prices.get(symbol) {
            Some(&price) => price,
            None => self.starting_price(symbol),
        };

        let change = self.rng.gen_range(-0.003..0.003) * base_price;
        let new_price = base_price + change;
        self.last_prices.insert(symbol.to_string(), new_price);

        let high = base_price.max(new_price) + self.rng.gen_range(0.0..10.0);
        let low = base_price.min(new_price) - self.rng.gen_range(0.0..10.0);
        let volume = self.rng.gen_range(1_000..=10_000) as f64;

        Ok(Candle {
            symbol: symbol.to_string(),
            open: base_price,
            high,
            low,
            close: new_price,
            volume,
            timestamp: now,
        })
    }
}
