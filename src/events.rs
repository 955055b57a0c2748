//! Write-only diagnostic/event sink
//!
//! Signals, rejections, entries, partial exits, full exits and errors are all
//! reported here. The trading core never reads events back.

use chrono::{Local, NaiveDateTime};
use serde::Serialize;
use std::collections::VecDeque;
use std::fmt;
use std::sync::Mutex;

use crate::models::{ExitFill, TradeProposal};

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Severity {
    Info,
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Severity::Info => "INFO",
            Severity::Warning => "WARNING",
            Severity::Error => "ERROR",
        })
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct EventRecord {
    pub timestamp: NaiveDateTime,
    pub severity: Severity,
    pub component: String,
    pub message: String,
}

pub trait EventSink: Send + Sync {
    fn log_system_event(&self, severity: Severity, component: &str, message: &str);

    fn log_signal(&self, proposal: &TradeProposal) {
        self.log_system_event(
            Severity::Info,
            "SignalEngine",
            &format!(
                "SIGNAL: {} {} @ {:.2} (confidence {:.0}%, regime {})",
                proposal.direction,
                proposal.symbol,
                proposal.price,
                proposal.confidence * 100.0,
                proposal.regime
            ),
        );
    }

    fn log_exit(&self, fill: &ExitFill) {
        let message = if fill.is_full_close() {
            format!(
                "CLOSED: {} {} x{} @ {:.2} ({}). PnL: {:.2}",
                fill.direction, fill.symbol, fill.quantity, fill.exit_price, fill.reason, fill.pnl
            )
        } else {
            format!(
                "PARTIAL EXIT: {} {} x{} @ {:.2}, {} remaining. PnL: {:.2}",
                fill.direction, fill.symbol, fill.quantity, fill.exit_price, fill.remaining, fill.pnl
            )
        };
        self.log_system_event(Severity::Info, "RiskEngine", &message);
    }
}

/// Emits every event as a structured tracing event
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingEventSink;

impl EventSink for TracingEventSink {
    fn log_system_event(&self, severity: Severity, component: &str, message: &str) {
        match severity {
            Severity::Info => tracing::info!(target: "paperbot::events", component, "{}", message),
            Severity::Warning => {
                tracing::warn!(target: "paperbot::events", component, "{}", message)
            }
            Severity::Error => {
                tracing::error!(target: "paperbot::events", component, "{}", message)
            }
        }
    }
}

/// Keeps the most recent events in memory
#[derive(Debug)]
pub struct MemoryEventSink {
    records: Mutex<VecDeque<EventRecord>>,
    capacity: usize,
}

impl MemoryEventSink {
    pub fn new(capacity: usize) -> Self {
        Self {
            records: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity: capacity.max(1),
        }
    }

    /// Up to `n` most recent records, newest first
    pub fn recent(&self, n: usize) -> Vec<EventRecord> {
        match self.records.lock() {
            Ok(records) => records.iter().rev().take(n).cloned().collect(),
            Err(_) => Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.records.lock().map(|r| r.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl EventSink for MemoryEventSink {
    fn log_system_event(&self, severity: Severity, component: &str, message: &str) {
        let record = EventRecord {
            timestamp: Local::now().naive_local(),
            severity,
            component: component.to_string(),
            message: message.to_string(),
        };

        if let Ok(mut records) = self.records.lock() {
            records.push_back(record);
            while records.len() > self.capacity {
                records.pop_front();
            }
        }
    }
}
