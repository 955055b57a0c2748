use chrono::{NaiveDateTime, NaiveTime};

use super::oscillator::MomentumOscillator;
use crate::indicators::average_volume;
use crate::models::{Candle, Direction, Regime};
use crate::persistence::ConfidenceBreakdown;
use crate::settings::StrategySettings;

/// Sub-score weights in percent: trend, volume, oscillator, volatility, time of day
const TREND_WEIGHT: u32 = 35;
const VOLUME_WEIGHT: u32 = 20;
const OSCILLATOR_WEIGHT: u32 = 20;
const VOLATILITY_WEIGHT: u32 = 15;
const TIME_WEIGHT: u32 = 10;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConfidenceScore {
    /// 0-100
    pub total: u32,
    pub breakdown: Option<ConfidenceBreakdown>,
}

impl ConfidenceScore {
    fn zero() -> Self {
        Self {
            total: 0,
            breakdown: None,
        }
    }

    /// Confidence as a fraction in [0, 1]
    pub fn fraction(&self) -> f64 {
        self.total as f64 / 100.0
    }
}

/// Weighted five-factor confidence score for a directional proposal
pub struct ConfidenceScorer {
    oscillator: Box<dyn MomentumOscillator>,
    min_candles: usize,
    trend_lookback: usize,
    volume_lookback: usize,
    volume_multiplier: f64,
    opening_start: NaiveTime,
    opening_end: NaiveTime,
    afternoon_cutoff: NaiveTime,
}

impl ConfidenceScorer {
    pub fn new(settings: &StrategySettings, oscillator: Box<dyn MomentumOscillator>) -> Self {
        Self {
            oscillator,
            min_candles: settings.min_confidence_candles,
            trend_lookback: settings.trend_lookback,
            volume_lookback: settings.volume_lookback,
            volume_multiplier: settings.volume_multiplier,
            opening_start: settings.opening_start,
            opening_end: settings.opening_end,
            afternoon_cutoff: settings.afternoon_cutoff,
        }
    }

    pub fn oscillator_name(&self) -> &str {
        self.oscillator.name()
    }

    /// Score `direction` against the history (oldest first, latest candle last)
    pub fn score(
        &mut self,
        candles: &[Candle],
        direction: Direction,
        regime: Regime,
        now: NaiveDateTime,
    ) -> ConfidenceScore {
        if candles.len() < self.min_candles {
            return ConfidenceScore::zero();
        }
        let Some(latest) = candles.last() else {
            return ConfidenceScore::zero();
        };

        let breakdown = ConfidenceBreakdown {
            trend: self.trend_score(candles, direction),
            volume: self.volume_score(candles, latest),
            oscillator: self.oscillator.alignment_score(candles, direction),
            volatility: volatility_score(regime),
            time: self.time_score(now),
        };

        let weighted = breakdown.trend * TREND_WEIGHT
            + breakdown.volume * VOLUME_WEIGHT
            + breakdown.oscillator * OSCILLATOR_WEIGHT
            + breakdown.volatility * VOLATILITY_WEIGHT
            + breakdown.time * TIME_WEIGHT;

        ConfidenceScore {
            total: weighted / 100,
            breakdown: Some(breakdown),
        }
    }

    fn trend_score(&self, candles: &[Candle], direction: Direction) -> u32 {
        let start = candles.len().saturating_sub(self.trend_lookback);
        let window = &candles[start..];
        let (first, last) = match (window.first(), window.last()) {
            (Some(first), Some(last)) => (first.close, last.close),
            _ => return 30,
        };

        let aligned = match direction {
            Direction::Buy => last > first,
            Direction::Sell => last < first,
        };
        if aligned {
            100
        } else {
            30
        }
    }

    fn volume_score(&self, candles: &[Candle], latest: &Candle) -> u32 {
        match average_volume(candles, self.volume_lookback) {
            Some(avg) if latest.volume >= self.volume_multiplier * avg => 100,
            _ => 50,
        }
    }

    /// Zero inside the opening window and from the afternoon cutoff onwards
    pub fn time_score(&self, now: NaiveDateTime) -> u32 {
        let t = now.time();
        if t >= self.opening_start && t < self.opening_end {
            0
        } else if t >= self.afternoon_cutoff {
            0
        } else {
            100
        }
    }
}

fn volatility_score(regime: Regime) -> u32 {
    if regime == Regime::Volatile {
        40
    } else {
        100
    }
}
