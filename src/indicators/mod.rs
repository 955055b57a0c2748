// Technical indicators used by regime detection and confidence scoring

pub mod atr;
pub mod moving_average;
pub mod rsi;
pub mod volume;

pub use atr::{atr_percent, true_range};
pub use moving_average::calculate_sma;
pub use rsi::calculate_rsi;
pub use volume::average_volume;
