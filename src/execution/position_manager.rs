use chrono::{Local, NaiveDateTime, NaiveTime};
use std::sync::Arc;

use crate::events::{EventSink, Severity};
use crate::models::{ExitFill, ExitReason, Trade};
use crate::persistence::{Component, StateStore, SystemState};
use crate::risk::StopPolicy;
use crate::settings::RiskSettings;

/// Result of one exit pass over the active trades
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExitPass {
    pub fills: Vec<ExitFill>,
    /// The daily loss limit was crossed during this pass
    pub breached: bool,
}

/// Drives every active trade through OPEN -> PARTIAL -> CLOSED
///
/// Evaluated once per tick, in priority order:
/// 1. forced exit of everything at/after the cutoff time
/// 2. partial profit at the target (at most once per trade)
/// 3. adaptive stop-loss on the remaining quantity
///
/// A trade whose symbol has no market price yet is left alone.
pub struct LifecycleManager {
    store: StateStore,
    events: Arc<dyn EventSink>,
    policy: StopPolicy,
    force_exit_time: NaiveTime,
}

impl LifecycleManager {
    pub fn new(store: StateStore, events: Arc<dyn EventSink>, settings: &RiskSettings) -> Self {
        Self {
            store,
            events,
            policy: StopPolicy::from_settings(settings),
            force_exit_time: settings.force_exit_time,
        }
    }

    pub fn check_exits(&self) -> Vec<ExitFill> {
        self.check_exits_at(Local::now().naive_local())
    }

    /// Run one exit pass against the store and report the fills
    pub fn check_exits_at(&self, now: NaiveDateTime) -> Vec<ExitFill> {
        let pass = match self.store.update(|state| self.apply_exits(state, now)) {
            Ok(pass) => pass,
            Err(e) => {
                tracing::warn!(error = %e, "Exit pass dropped");
                return Vec::new();
            }
        };

        for fill in &pass.fills {
            tracing::info!(
                trade_id = %fill.trade_id,
                symbol = %fill.symbol,
                reason = %fill.reason,
                pnl = fill.pnl,
                "Exit {}x @ {:.2}",
                fill.quantity,
                fill.exit_price
            );
            self.events.log_exit(fill);
        }

        if pass.breached {
            self.events.log_system_event(
                Severity::Warning,
                "RiskEngine",
                "Daily loss limit breached. New trades stopped for the day",
            );
        }

        pass.fills
    }

    /// Apply exit rules to the document in place
    pub fn apply_exits(&self, state: &mut SystemState, now: NaiveDateTime) -> ExitPass {
        let status = format!("Monitoring {} positions", state.active_trades.len());
        state.heartbeat(Component::RiskEngine, &status, now);

        let was_breached = state.daily_loss.breached;
        let mut trade_ids: Vec<String> = state.active_trades.keys().cloned().collect();
        trade_ids.sort();

        let fills = if now.time() >= self.force_exit_time {
            self.force_exit_all(state, &trade_ids, now)
        } else {
            trade_ids
                .iter()
                .filter_map(|id| self.evaluate_trade(state, id, now))
                .collect()
        };

        ExitPass {
            fills,
            breached: !was_breached && state.daily_loss.breached,
        }
    }

    fn force_exit_all(
        &self,
        state: &mut SystemState,
        trade_ids: &[String],
        now: NaiveDateTime,
    ) -> Vec<ExitFill> {
        let mut fills = Vec::with_capacity(trade_ids.len());
        for id in trade_ids {
            let Some(trade) = state.active_trades.remove(id) else {
                continue;
            };
            let price = state
                .market_data
                .get(&trade.symbol)
                .map(|c| c.close)
                .unwrap_or(trade.entry_price);

            let fill = close_fill(&trade, trade.quantity, price, ExitReason::TimeForceExit, now);
            state.realize_pnl(fill.pnl);
            fills.push(fill);
        }
        fills
    }

    /// At most one transition for one trade
    fn evaluate_trade(
        &self,
        state: &mut SystemState,
        trade_id: &str,
        now: NaiveDateTime,
    ) -> Option<ExitFill> {
        let trade = state.active_trades.get(trade_id)?.clone();
        let price = state.market_data.get(&trade.symbol)?.close;
        let levels = self.policy.levels_for(&trade);

        if !trade.partial_done && levels.target_hit(price) {
            let quantity = self.policy.partial_quantity(trade.quantity);
            if quantity == 0 {
                return None;
            }

            let mut fill = close_fill(&trade, quantity, price, ExitReason::PartialProfit, now);
            fill.remaining = trade.quantity.saturating_sub(quantity);
            state.realize_pnl(fill.pnl);
            if let Some(open) = state.active_trades.get_mut(trade_id) {
                open.quantity = fill.remaining;
                open.partial_done = true;
            }
            return Some(fill);
        }

        if levels.stop_hit(price) {
            state.active_trades.remove(trade_id);
            let fill = close_fill(&trade, trade.quantity, price, ExitReason::AdaptiveStopLoss, now);
            state.realize_pnl(fill.pnl);
            return Some(fill);
        }

        None
    }
}

fn close_fill(
    trade: &Trade,
    quantity: u64,
    price: f64,
    reason: ExitReason,
    now: NaiveDateTime,
) -> ExitFill {
    ExitFill {
        trade_id: trade.trade_id.clone(),
        symbol: trade.symbol.clone(),
        direction: trade.direction,
        quantity,
        remaining: 0,
        entry_price: trade.entry_price,
        exit_price: price,
        pnl: trade.pnl_at(price, quantity),
        reason,
        time: now,
    }
}
