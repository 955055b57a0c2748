// Shared state document: the only channel between subsystems
pub mod state;
pub mod store;

pub use state::{
    Component, ComponentHealth, ConfidenceBreakdown, DailyLoss, KillSwitch, Reasoning,
    SystemMode, SystemState,
};
pub use store::{Snapshot, StateStore, StoreError};
