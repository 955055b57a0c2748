// Signal generation and confidence scoring
pub mod confidence;
pub mod oscillator;
pub mod signals;

pub use confidence::{ConfidenceScore, ConfidenceScorer};
pub use oscillator::{MomentumOscillator, RandomOscillator, RsiOscillator};
pub use signals::{SignalEngine, SignalEvaluation};
