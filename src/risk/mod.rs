// Exit risk rules: adaptive stop-loss and partial profit target
pub mod stops;

pub use stops::{AdaptiveStop, StopPolicy};
