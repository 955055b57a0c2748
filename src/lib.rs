// Core modules
pub mod engine;
pub mod events;
pub mod execution;
pub mod indicators;
pub mod models;
pub mod persistence;
pub mod regime;
pub mod report;
pub mod risk;
pub mod settings;
pub mod strategy;

// Re-export commonly used types
pub use engine::{TickSummary, TradingEngine};
pub use models::*;
pub use persistence::{Snapshot, StateStore, StoreError, SystemState};
pub use settings::Settings;

// Error handling
pub type Result<T> = anyhow::Result<T>;
