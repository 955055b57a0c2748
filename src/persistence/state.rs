use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};

use crate::models::{Candle, Trade};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SystemMode {
    #[default]
    Paper,
    Live,
    Freeze,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct KillSwitch {
    pub stop_new_trades: bool,
    pub full_system_freeze: bool,
    #[serde(rename = "symbol_block")]
    pub blocked_symbols: BTreeSet<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DailyLoss {
    pub limit: f64,
    pub current: f64,
    pub breached: bool,
}

/// Components that report liveness into the document
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Component {
    MarketEngine,
    ExecutionEngine,
    RiskEngine,
    BrokerApi,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ComponentHealth {
    pub connected: bool,
    #[serde(default)]
    pub last_heartbeat: Option<NaiveDateTime>,
    pub status: String,
}

impl ComponentHealth {
    fn initializing() -> Self {
        Self {
            connected: false,
            last_heartbeat: None,
            status: "Initializing".to_string(),
        }
    }
}

/// Per-component scores behind a confidence value, each 0-100
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Default)]
pub struct ConfidenceBreakdown {
    pub trend: u32,
    pub volume: u32,
    #[serde(rename = "rsi")]
    pub oscillator: u32,
    pub volatility: u32,
    pub time: u32,
}

/// Latest diagnostic snapshot. Written for observability, never read back for decisions.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Reasoning {
    pub current_state: String,
    pub current_market: String,
    pub timeframe: String,
    pub data_source: String,
    pub indicators_used: Vec<String>,
    pub indicator_explanation: String,
    pub signal_type: String,
    pub signal_confidence: u32,
    pub trade_decision_reason: String,
    pub trade_rejection_reason: String,
    pub risk_score: u32,
    pub market_mode: String,
    pub breakdown: Option<ConfidenceBreakdown>,
}

impl Default for Reasoning {
    fn default() -> Self {
        Self {
            current_state: "WAITING".to_string(),
            current_market: "NONE".to_string(),
            timeframe: "1m".to_string(),
            data_source: "SYNTHETIC".to_string(),
            indicators_used: Vec::new(),
            indicator_explanation: "System initializing...".to_string(),
            signal_type: "NO_TRADE".to_string(),
            signal_confidence: 0,
            trade_decision_reason: "Waiting for market scan...".to_string(),
            trade_rejection_reason: "None".to_string(),
            risk_score: 0,
            market_mode: "UNKNOWN".to_string(),
            breakdown: None,
        }
    }
}

/// The whole persisted document. Field names are what the reporting surface reads.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SystemState {
    pub system_mode: SystemMode,
    pub kill_switch: KillSwitch,
    pub daily_loss: DailyLoss,
    pub active_trades: HashMap<String, Trade>,
    pub market_data: HashMap<String, Candle>,
    #[serde(rename = "date")]
    pub trading_date: NaiveDate,
    #[serde(rename = "bot_thinking")]
    pub reasoning: Reasoning,
    #[serde(rename = "system_health")]
    pub health: BTreeMap<Component, ComponentHealth>,
}

impl SystemState {
    /// Fresh start-of-day document
    pub fn fresh(trading_date: NaiveDate, daily_loss_limit: f64) -> Self {
        let mut health = BTreeMap::new();
        health.insert(Component::MarketEngine, ComponentHealth::initializing());
        health.insert(Component::ExecutionEngine, ComponentHealth::initializing());
        health.insert(Component::RiskEngine, ComponentHealth::initializing());
        health.insert(
            Component::BrokerApi,
            ComponentHealth {
                connected: false,
                last_heartbeat: None,
                status: "Disabled (Expected - Paper Mode)".to_string(),
            },
        );

        Self {
            system_mode: SystemMode::Paper,
            kill_switch: KillSwitch::default(),
            daily_loss: DailyLoss {
                limit: daily_loss_limit,
                current: 0.0,
                breached: false,
            },
            active_trades: HashMap::new(),
            market_data: HashMap::new(),
            trading_date,
            reasoning: Reasoning::default(),
            health,
        }
    }

    /// Add realized P&L and trip the kill switch once the daily limit is reached
    pub fn realize_pnl(&mut self, pnl: f64) {
        self.daily_loss.current += pnl;
        if self.daily_loss.current <= -self.daily_loss.limit {
            if !self.daily_loss.breached {
                tracing::warn!(
                    current = self.daily_loss.current,
                    limit = self.daily_loss.limit,
                    "Daily loss limit breached, blocking new trades"
                );
            }
            self.daily_loss.breached = true;
            self.kill_switch.stop_new_trades = true;
        }
        self.enforce_invariants();
    }

    /// `breached` always implies `stop_new_trades`
    pub fn enforce_invariants(&mut self) {
        if self.daily_loss.breached {
            self.kill_switch.stop_new_trades = true;
        }
    }

    /// Mark a known component alive. Unknown components are ignored.
    pub fn heartbeat(&mut self, component: Component, status: &str, now: NaiveDateTime) {
        if let Some(entry) = self.health.get_mut(&component) {
            entry.connected = true;
            entry.last_heartbeat = Some(now);
            entry.status = status.to_string();
        }
    }

    /// Reason new entries are currently blocked, if any
    pub fn entry_block_reason(&self, symbol: &str) -> Option<String> {
        if self.system_mode == SystemMode::Freeze {
            return Some("System mode FREEZE".to_string());
        }
        if self.kill_switch.full_system_freeze {
            return Some("Kill switch: full system freeze".to_string());
        }
        if self.daily_loss.breached {
            return Some(format!(
                "Daily loss limit breached ({:.2} <= -{:.2})",
                self.daily_loss.current, self.daily_loss.limit
            ));
        }
        if self.kill_switch.stop_new_trades {
            return Some("Kill switch: new trades stopped".to_string());
        }
        if self.kill_switch.blocked_symbols.contains(symbol) {
            return Some(format!("Symbol {} is blocked", symbol));
        }
        None
    }

    pub fn can_trade_new(&self) -> bool {
        self.system_mode != SystemMode::Freeze
            && !self.kill_switch.stop_new_trades
            && !self.kill_switch.full_system_freeze
            && !self.daily_loss.breached
    }
}
