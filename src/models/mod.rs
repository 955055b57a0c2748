use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fmt;

/// OHLCV candle for one symbol. Immutable once produced.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Candle {
    pub symbol: String,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
    pub timestamp: NaiveDateTime,
}

/// Trade direction
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Direction {
    Buy,
    Sell,
}

impl Direction {
    /// Signed per-unit P&L of moving from `entry` to `exit`
    pub fn pnl_per_unit(self, entry: f64, exit: f64) -> f64 {
        match self {
            Direction::Buy => exit - entry,
            Direction::Sell => entry - exit,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Direction::Buy => "BUY",
            Direction::Sell => "SELL",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classification of recent price behaviour
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Regime {
    Trending,
    Volatile,
    Sideways,
    #[default]
    Unknown,
}

impl Regime {
    pub fn as_str(self) -> &'static str {
        match self {
            Regime::Trending => "TRENDING",
            Regime::Volatile => "VOLATILE",
            Regime::Sideways => "SIDEWAYS",
            Regime::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for Regime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Directional trade proposal emitted by the signal pipeline
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TradeProposal {
    pub symbol: String,
    pub direction: Direction,
    /// In [0, 1]
    pub confidence: f64,
    pub price: f64,
    pub regime: Regime,
    /// ATR as a fraction of price
    pub atr: f64,
    pub timestamp: NaiveDateTime,
}

/// One open position. Created by the gatekeeper, mutated only by the lifecycle manager.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Trade {
    pub trade_id: String,
    pub symbol: String,
    pub direction: Direction,
    pub quantity: u64,
    pub entry_price: f64,
    pub entry_time: NaiveDateTime,
    #[serde(rename = "regime")]
    pub regime_at_entry: Regime,
    #[serde(rename = "atr")]
    pub atr_at_entry: f64,
    #[serde(default)]
    pub partial_done: bool,
}

impl Trade {
    /// P&L of closing `quantity` units at `exit_price`
    pub fn pnl_at(&self, exit_price: f64, quantity: u64) -> f64 {
        self.direction.pnl_per_unit(self.entry_price, exit_price) * quantity as f64
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExitReason {
    PartialProfit,
    #[serde(rename = "ADAPTIVE_SL_HIT")]
    AdaptiveStopLoss,
    TimeForceExit,
}

impl ExitReason {
    pub fn as_str(self) -> &'static str {
        match self {
            ExitReason::PartialProfit => "PARTIAL_PROFIT",
            ExitReason::AdaptiveStopLoss => "ADAPTIVE_SL_HIT",
            ExitReason::TimeForceExit => "TIME_FORCE_EXIT",
        }
    }
}

impl fmt::Display for ExitReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A realized (partial or full) exit
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExitFill {
    pub trade_id: String,
    pub symbol: String,
    pub direction: Direction,
    /// Units closed by this fill
    pub quantity: u64,
    /// Units still open afterwards; 0 means the trade is closed
    pub remaining: u64,
    pub entry_price: f64,
    pub exit_price: f64,
    pub pnl: f64,
    pub reason: ExitReason,
    pub time: NaiveDateTime,
}

impl ExitFill {
    pub fn is_full_close(&self) -> bool {
        self.remaining == 0
    }
}
