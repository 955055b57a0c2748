use crate::models::{Direction, Regime, Trade};
use crate::settings::RiskSettings;

/// Stop-loss and partial-profit rules for open trades
#[derive(Debug, Clone)]
pub struct StopPolicy {
    pub trending_multiplier: f64,
    pub default_multiplier: f64,
    /// Partial target in multiples of the stop distance
    pub partial_target_r: f64,
    pub partial_fraction: f64,
}

impl Default for StopPolicy {
    fn default() -> Self {
        Self::from_settings(&RiskSettings::default())
    }
}

impl StopPolicy {
    pub fn from_settings(settings: &RiskSettings) -> Self {
        Self {
            trending_multiplier: settings.trending_sl_multiplier,
            default_multiplier: settings.default_sl_multiplier,
            partial_target_r: settings.partial_target_r,
            partial_fraction: settings.partial_fraction,
        }
    }

    /// Stops for `trade`, sized from its entry price, entry ATR and entry regime
    pub fn levels_for(&self, trade: &Trade) -> AdaptiveStop {
        let multiplier = if trade.regime_at_entry == Regime::Trending {
            self.trending_multiplier
        } else {
            self.default_multiplier
        };

        AdaptiveStop {
            direction: trade.direction,
            entry: trade.entry_price,
            distance: trade.entry_price * trade.atr_at_entry * multiplier,
            target_r: self.partial_target_r,
        }
    }

    /// Units closed by a partial exit (floored, may be 0). At least one unit
    /// is always left open as the runner.
    pub fn partial_quantity(&self, quantity: u64) -> u64 {
        let wanted = (quantity as f64 * self.partial_fraction.max(0.0)).floor() as u64;
        wanted.min(quantity.saturating_sub(1))
    }
}

/// Price levels for one trade
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AdaptiveStop {
    pub direction: Direction,
    pub entry: f64,
    /// Absolute price distance from entry to the stop
    pub distance: f64,
    pub target_r: f64,
}

impl AdaptiveStop {
    pub fn stop_price(&self) -> f64 {
        match self.direction {
            Direction::Buy => self.entry - self.distance,
            Direction::Sell => self.entry + self.distance,
        }
    }

    pub fn partial_target(&self) -> f64 {
        let offset = self.distance * self.target_r;
        match self.direction {
            Direction::Buy => self.entry + offset,
            Direction::Sell => self.entry - offset,
        }
    }

    /// Price moved against the entry by at least the stop distance
    pub fn stop_hit(&self, price: f64) -> bool {
        match self.direction {
            Direction::Buy => price <= self.stop_price(),
            Direction::Sell => price >= self.stop_price(),
        }
    }

    pub fn target_hit(&self, price: f64) -> bool {
        match self.direction {
            Direction::Buy => price >= self.partial_target(),
            Direction::Sell => price <= self.partial_target(),
        }
    }
}
