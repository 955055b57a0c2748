use chrono::{Local, NaiveDateTime};
use std::sync::Arc;
use uuid::Uuid;

use crate::events::{EventSink, Severity};
use crate::models::{Trade, TradeProposal};
use crate::persistence::{Component, StateStore, SystemState};
use crate::settings::EntrySettings;

#[derive(Debug, Clone, PartialEq)]
pub enum EntryDecision {
    Accepted(Trade),
    Rejected { reason: String },
}

impl EntryDecision {
    pub fn is_accepted(&self) -> bool {
        matches!(self, EntryDecision::Accepted(_))
    }

    fn rejected(reason: impl Into<String>) -> Self {
        EntryDecision::Rejected {
            reason: reason.into(),
        }
    }
}

/// Filters trade proposals and turns the survivors into registered trades
pub struct EntryGatekeeper {
    store: StateStore,
    events: Arc<dyn EventSink>,
    min_confidence: f64,
    max_active_trades: usize,
    capital_budget: f64,
}

impl EntryGatekeeper {
    pub fn new(store: StateStore, events: Arc<dyn EventSink>, settings: &EntrySettings) -> Self {
        Self {
            store,
            events,
            min_confidence: settings.min_confidence,
            max_active_trades: settings.max_active_trades,
            capital_budget: settings.capital_budget,
        }
    }

    /// Gate one proposal. The filters and the registration run under a single
    /// store write, so the position cap is checked against the locked document.
    pub fn process_proposal(&self, proposal: &TradeProposal, now: NaiveDateTime) -> EntryDecision {
        let decision = match self.store.update(|state| self.admit(state, proposal, now)) {
            Ok(decision) => decision,
            Err(e) => EntryDecision::rejected(format!("State write dropped: {}", e)),
        };

        match &decision {
            EntryDecision::Accepted(trade) => {
                tracing::info!(
                    trade_id = %trade.trade_id,
                    symbol = %trade.symbol,
                    quantity = trade.quantity,
                    "Entered {} @ {:.2}",
                    trade.direction,
                    trade.entry_price
                );
                self.events.log_system_event(
                    Severity::Info,
                    "ExecutionEngine",
                    &format!(
                        "ENTRY: {} {} x{} @ {:.2} (confidence {:.0}%)",
                        trade.direction,
                        trade.symbol,
                        trade.quantity,
                        trade.entry_price,
                        proposal.confidence * 100.0
                    ),
                );
            }
            EntryDecision::Rejected { reason } => {
                tracing::info!(symbol = %proposal.symbol, "Entry rejected: {}", reason);
                self.events.log_system_event(
                    Severity::Info,
                    "ExecutionEngine",
                    &format!("REJECTED: {} {} - {}", proposal.direction, proposal.symbol, reason),
                );
            }
        }

        decision
    }

    /// Apply the entry filters to `state` and register the trade if they all pass
    ///
    /// Filters, first failure wins:
    /// 1. confidence below the minimum
    /// 2. position cap reached
    /// 3. entries blocked by mode, kill switch or daily loss
    pub fn admit(
        &self,
        state: &mut SystemState,
        proposal: &TradeProposal,
        now: NaiveDateTime,
    ) -> EntryDecision {
        state.heartbeat(Component::ExecutionEngine, "Evaluating entries", now);

        let rejection = if proposal.confidence < self.min_confidence {
            Some(format!(
                "Confidence {:.0}% < {:.0}%",
                proposal.confidence * 100.0,
                self.min_confidence * 100.0
            ))
        } else if state.active_trades.len() >= self.max_active_trades {
            Some("Max active trades reached".to_string())
        } else {
            state.entry_block_reason(&proposal.symbol)
        };

        if let Some(reason) = rejection {
            state.reasoning.trade_rejection_reason = reason.clone();
            return EntryDecision::rejected(reason);
        }

        let trade = Trade {
            trade_id: trade_id(&proposal.symbol, now),
            symbol: proposal.symbol.clone(),
            direction: proposal.direction,
            quantity: self.position_size(proposal.price),
            entry_price: proposal.price,
            entry_time: now,
            regime_at_entry: proposal.regime,
            atr_at_entry: proposal.atr,
            partial_done: false,
        };

        state.reasoning.current_state = "IN_TRADE".to_string();
        state.reasoning.trade_rejection_reason = "None".to_string();
        state.reasoning.trade_decision_reason = format!(
            "{} {}: confidence {:.0}% >= {:.0}% in {} regime, {} of {} slots used",
            trade.direction,
            trade.symbol,
            proposal.confidence * 100.0,
            self.min_confidence * 100.0,
            trade.regime_at_entry,
            state.active_trades.len() + 1,
            self.max_active_trades
        );
        state
            .active_trades
            .insert(trade.trade_id.clone(), trade.clone());

        EntryDecision::Accepted(trade)
    }

    /// Whole units affordable with the capital budget, never less than one
    pub fn position_size(&self, price: f64) -> u64 {
        if price <= 0.0 || !price.is_finite() {
            return 1;
        }
        ((self.capital_budget / price).floor() as u64).max(1)
    }
}

/// `{millis}_{symbol}_{8 hex}`: time-ordered and unique across processes
fn trade_id(symbol: &str, now: NaiveDateTime) -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!("{}_{}_{}", epoch_millis(now), symbol, &suffix[..8])
}

/// Epoch milliseconds of a local wall-clock time. Times skipped by a DST
/// jump fall back to reading the wall clock as UTC.
fn epoch_millis(local: NaiveDateTime) -> i64 {
    match local.and_local_timezone(Local).earliest() {
        Some(at) => at.timestamp_millis(),
        None => local.and_utc().timestamp_millis(),
    }
}
