/// Market Regime Detector using moving-average spread + ATR
///
/// Classifies the retained history for a symbol:
/// - Trending: |SMA(fast) - SMA(slow)| / SMA(slow) above the spread threshold
/// - Volatile: otherwise, ATR% above the volatility threshold
/// - Sideways: neither
/// - Unknown: not enough candles yet
use crate::indicators::{atr_percent, calculate_sma};
use crate::models::{Candle, Regime};
use crate::settings::StrategySettings;

/// Regime plus the ATR% it was computed with (0 when unknown)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RegimeReading {
    pub regime: Regime,
    pub atr_pct: f64,
}

impl RegimeReading {
    fn unknown() -> Self {
        Self {
            regime: Regime::Unknown,
            atr_pct: 0.0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RegimeDetector {
    min_candles: usize,
    fast_window: usize,
    slow_window: usize,
    trend_spread_threshold: f64,
    volatile_atr_threshold: f64,
}

impl Default for RegimeDetector {
    fn default() -> Self {
        Self::from_settings(&StrategySettings::default())
    }
}

impl RegimeDetector {
    pub fn from_settings(settings: &StrategySettings) -> Self {
        Self {
            min_candles: settings.min_regime_candles,
            fast_window: settings.fast_window,
            slow_window: settings.slow_window,
            trend_spread_threshold: settings.trend_spread_threshold,
            volatile_atr_threshold: settings.volatile_atr_threshold,
        }
    }

    /// Classify the full retained history (oldest first)
    pub fn detect(&self, candles: &[Candle]) -> RegimeReading {
        if candles.len() < self.min_candles {
            return RegimeReading::unknown();
        }

        let closes: Vec<f64> = candles.iter().map(|c| c.close).collect();
        let (fast, slow) = match (
            calculate_sma(&closes, self.fast_window),
            calculate_sma(&closes, self.slow_window),
        ) {
            (Some(fast), Some(slow)) if slow != 0.0 => (fast, slow),
            _ => return RegimeReading::unknown(),
        };

        let spread = (fast - slow).abs() / slow;
        let atr_pct = atr_percent(candles).unwrap_or(0.0);

        let regime = if spread > self.trend_spread_threshold {
            Regime::Trending
        } else if atr_pct > self.volatile_atr_threshold {
            Regime::Volatile
        } else {
            Regime::Sideways
        };

        tracing::debug!(
            spread = spread,
            atr_pct = atr_pct,
            regime = %regime,
            "Regime detected"
        );

        RegimeReading { regime, atr_pct }
    }
}
