// Market data intake, entry gating and position lifecycle
pub mod candle_buffer;
pub mod gatekeeper;
pub mod position_manager;
pub mod price_feed;

pub use candle_buffer::CandleBuffer;
pub use gatekeeper::{EntryDecision, EntryGatekeeper};
pub use position_manager::{ExitPass, LifecycleManager};
pub use price_feed::{CandleSource, SyntheticFeed};
