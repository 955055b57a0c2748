//! Read-only views over the state document for the reporting surface
//!
//! A store read failure yields the default document's views rather than an error.

use serde::Serialize;
use std::collections::BTreeMap;

use crate::models::Trade;
use crate::persistence::{
    Component, ComponentHealth, KillSwitch, Reasoning, Snapshot, StateStore, SystemMode,
};

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct HealthView {
    pub ready: bool,
    pub status: String,
    pub health_data: BTreeMap<Component, ComponentHealth>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct StatusView {
    pub mode: SystemMode,
    pub daily_pnl: f64,
    pub daily_loss_limit: f64,
    pub kill_switch: KillSwitch,
    pub thinking: Reasoning,
    pub health: BTreeMap<Component, ComponentHealth>,
    pub active_trade_count: usize,
    /// False when the document could not be read and defaults are shown
    pub live: bool,
}

pub struct StatusReport {
    snapshot: Snapshot,
}

impl StatusReport {
    pub fn load(store: &StateStore) -> Self {
        Self {
            snapshot: store.read(),
        }
    }

    pub fn from_snapshot(snapshot: Snapshot) -> Self {
        Self { snapshot }
    }

    pub fn health(&self) -> HealthView {
        let state = self.snapshot.state();
        HealthView {
            ready: self.snapshot.is_live(),
            status: if self.snapshot.is_live() {
                "SYSTEM READY".to_string()
            } else {
                "STATE UNAVAILABLE".to_string()
            },
            health_data: state.health.clone(),
        }
    }

    pub fn status(&self) -> StatusView {
        let state = self.snapshot.state();
        StatusView {
            mode: state.system_mode,
            daily_pnl: state.daily_loss.current,
            daily_loss_limit: state.daily_loss.limit,
            kill_switch: state.kill_switch.clone(),
            thinking: state.reasoning.clone(),
            health: state.health.clone(),
            active_trade_count: state.active_trades.len(),
            live: self.snapshot.is_live(),
        }
    }

    /// Open trades, oldest first
    pub fn active_trades(&self) -> Vec<Trade> {
        let mut trades: Vec<Trade> = self
            .snapshot
            .state()
            .active_trades
            .values()
            .cloned()
            .collect();
        trades.sort_by(|a, b| {
            a.entry_time
                .cmp(&b.entry_time)
                .then_with(|| a.trade_id.cmp(&b.trade_id))
        });
        trades
    }
}
