// Market regime detection
pub mod detector;

pub use detector::{RegimeDetector, RegimeReading};
