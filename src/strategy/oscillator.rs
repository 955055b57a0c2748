use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::indicators::calculate_rsi;
use crate::models::{Candle, Direction};

/// Score when the oscillator agrees with the trade direction
const ALIGNED_SCORE: u32 = 100;
const MISALIGNED_SCORE: u32 = 40;

/// Momentum oscillator feeding the confidence score
///
/// Implementations only provide a 0-100 reading; the alignment rule is shared.
pub trait MomentumOscillator: Send {
    fn name(&self) -> &str;

    /// Oscillator reading (0-100) for the latest candle in `candles`
    fn value(&mut self, candles: &[Candle]) -> f64;

    /// 0-100 score of how well the reading supports `direction`
    fn alignment_score(&mut self, candles: &[Candle], direction: Direction) -> u32 {
        let value = self.value(candles);
        let aligned = match direction {
            Direction::Buy => value < 60.0,
            Direction::Sell => value > 40.0,
        };

        if aligned {
            ALIGNED_SCORE
        } else {
            MISALIGNED_SCORE
        }
    }
}

/// Placeholder reading drawn uniformly from 30..=70 each call.
/// Stands in until a real indicator is wired up (see `RsiOscillator`).
pub struct RandomOscillator {
    rng: StdRng,
}

impl RandomOscillator {
    pub fn new(seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self { rng }
    }
}

impl MomentumOscillator for RandomOscillator {
    fn name(&self) -> &str {
        "random"
    }

    fn value(&mut self, _candles: &[Candle]) -> f64 {
        self.rng.gen_range(30..=70) as f64
    }
}

/// RSI over closing prices; reads neutral (50) until enough history exists
pub struct RsiOscillator {
    period: usize,
}

impl RsiOscillator {
    pub fn new(period: usize) -> Self {
        Self { period }
    }
}

impl MomentumOscillator for RsiOscillator {
    fn name(&self) -> &str {
        "rsi"
    }

    fn value(&mut self, candles: &[Candle]) -> f64 {
        let closes: Vec<f64> = candles.iter().map(|c| c.close).collect();
        calculate_rsi(&closes, self.period).unwrap_or(50.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    struct Fixed(f64);

    impl MomentumOscillator for Fixed {
        fn name(&self) -> &str {
            "fixed"
        }

        fn value(&mut self, _candles: &[Candle]) -> f64 {
            self.0
        }
    }

    fn closes(prices: &[f64]) -> Vec<Candle> {
        let ts = NaiveDate::from_ymd_opt(2026, 10, 16)
            .unwrap()
            .and_hms_opt(10, 0, 0)
            .unwrap();
        prices
            .iter()
            .map(|&p| Candle {
                symbol: "TEST".to_string(),
                open: p,
                high: p,
                low: p,
                close: p,
                volume: 1000.0,
                timestamp: ts,
            })
            .collect()
    }

    #[test]
    fn test_alignment_rule() {
        assert_eq!(Fixed(55.0).alignment_score(&[], Direction::Buy), 100);
        assert_eq!(Fixed(65.0).alignment_score(&[], Direction::Buy), 40);
        assert_eq!(Fixed(45.0).alignment_score(&[], Direction::Sell), 100);
        assert_eq!(Fixed(35.0).alignment_score(&[], Direction::Sell), 40);
    }

    #[test]
    fn test_random_oscillator_range() {
        let mut osc = RandomOscillator::new(Some(3));
        for _ in 0..200 {
            let v = osc.value(&[]);
            assert!((30.0..=70.0).contains(&v));
        }
    }

    #[test]
    fn test_rsi_oscillator_neutral_without_history() {
        let mut osc = RsiOscillator::new(14);
        assert_eq!(osc.value(&closes(&[100.0, 101.0])), 50.0);
    }

    #[test]
    fn test_rsi_oscillator_overbought_blocks_buy() {
        let rising: Vec<f64> = (0..20).map(|i| 100.0 + i as f64).collect();
        let mut osc = RsiOscillator::new(14);

        assert_eq!(osc.alignment_score(&closes(&rising), Direction::Buy), 40);
        assert_eq!(osc.alignment_score(&closes(&rising), Direction::Sell), 100);
    }
}
