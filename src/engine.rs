//! Control loop tying the signal pipeline, entry gatekeeper and lifecycle manager together
//!
//! One tick runs strictly in sequence: rollover check, freeze check, market scan,
//! entry gating for each proposal, exit pass. The state store is the only thing
//! the stages share.

use anyhow::Context;
use chrono::{Local, NaiveDateTime};
use std::sync::Arc;
use std::time::Duration;

use crate::events::{EventSink, Severity};
use crate::execution::{CandleSource, EntryDecision, EntryGatekeeper, LifecycleManager, SyntheticFeed};
use crate::models::{ExitFill, Trade};
use crate::persistence::{Snapshot, StateStore};
use crate::settings::{OscillatorKind, Settings};
use crate::strategy::{
    ConfidenceScorer, MomentumOscillator, RandomOscillator, RsiOscillator, SignalEngine,
};

/// What one tick did
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TickSummary {
    pub rolled_over: bool,
    /// Full system freeze was set; no decisions were made
    pub frozen: bool,
    pub proposals: usize,
    pub entries: Vec<Trade>,
    pub rejections: Vec<String>,
    pub exits: Vec<ExitFill>,
}

pub struct TradingEngine {
    store: StateStore,
    events: Arc<dyn EventSink>,
    signals: SignalEngine,
    gatekeeper: EntryGatekeeper,
    lifecycle: LifecycleManager,
    tick_interval: Duration,
    error_backoff: Duration,
}

impl TradingEngine {
    pub fn new(
        store: StateStore,
        events: Arc<dyn EventSink>,
        feed: Box<dyn CandleSource>,
        settings: &Settings,
    ) -> Self {
        let scorer = ConfidenceScorer::new(&settings.strategy, build_oscillator(settings));
        let signals = SignalEngine::new(
            store.clone(),
            feed,
            scorer,
            settings.symbols.clone(),
            &settings.strategy,
        );

        Self {
            gatekeeper: EntryGatekeeper::new(store.clone(), events.clone(), &settings.entry),
            lifecycle: LifecycleManager::new(store.clone(), events.clone(), &settings.risk),
            signals,
            store,
            events,
            tick_interval: settings.engine.tick_interval(),
            error_backoff: settings.engine.error_backoff(),
        }
    }

    /// Open the configured state document and wire up the synthetic feed
    pub fn from_settings(settings: &Settings, events: Arc<dyn EventSink>) -> anyhow::Result<Self> {
        let store = StateStore::open(&settings.state_file, settings.risk.daily_loss_limit)
            .with_context(|| {
                format!("Failed to open state file {}", settings.state_file.display())
            })?;
        let feed = SyntheticFeed::new(&settings.symbols, settings.seed);

        Ok(Self::new(store, events, Box::new(feed), settings))
    }

    pub fn store(&self) -> &StateStore {
        &self.store
    }

    pub fn tick(&mut self) -> anyhow::Result<TickSummary> {
        self.tick_at(Local::now().naive_local())
    }

    /// Run one full decision cycle as of `now`
    ///
    /// Store I/O failures are logged and absorbed by the stages; an error here
    /// means the tick itself faulted (e.g. the candle source failed).
    pub fn tick_at(&mut self, now: NaiveDateTime) -> anyhow::Result<TickSummary> {
        tracing::info!("🔄 Tick at {}", now.format("%H:%M:%S"));
        let mut summary = TickSummary::default();

        match self.store.day_rollover_check_at(now.date()) {
            Ok(reset) => summary.rolled_over = reset,
            Err(e) => tracing::warn!(error = %e, "Rollover check dropped"),
        }
        if summary.rolled_over {
            self.events.log_system_event(
                Severity::Info,
                "StateManager",
                &format!("New trading day {}, state reset", now.date()),
            );
        }

        match self.store.read() {
            Snapshot::Live(state) if state.kill_switch.full_system_freeze => {
                tracing::warn!("Full system freeze active, skipping tick");
                summary.frozen = true;
                return Ok(summary);
            }
            Snapshot::Live(_) => {}
            Snapshot::Fallback { cause, .. } => {
                tracing::warn!(error = %cause, "Tick running against default state");
            }
        }

        let proposals = self
            .signals
            .scan_market_at(now)
            .context("Market scan failed")?;
        summary.proposals = proposals.len();

        for proposal in &proposals {
            self.events.log_signal(proposal);
            match self.gatekeeper.process_proposal(proposal, now) {
                EntryDecision::Accepted(trade) => summary.entries.push(trade),
                EntryDecision::Rejected { reason } => summary.rejections.push(reason),
            }
        }

        summary.exits = self.lifecycle.check_exits_at(now);

        tracing::debug!(
            proposals = summary.proposals,
            entries = summary.entries.len(),
            rejections = summary.rejections.len(),
            exits = summary.exits.len(),
            "Tick complete"
        );
        Ok(summary)
    }

    /// Tick forever. A failed tick is logged and retried after the longer backoff.
    pub async fn run(&mut self) {
        tracing::info!(
            interval = ?self.tick_interval,
            backoff = ?self.error_backoff,
            "💹 Paper trading loop starting"
        );

        loop {
            let pause = match self.tick() {
                Ok(_) => self.tick_interval,
                Err(e) => {
                    tracing::error!("Loop error: {:#}", e);
                    self.events.log_system_event(
                        Severity::Error,
                        "Orchestrator",
                        &format!("Loop error: {:#}", e),
                    );
                    self.error_backoff
                }
            };
            tokio::time::sleep(pause).await;
        }
    }
}

fn build_oscillator(settings: &Settings) -> Box<dyn MomentumOscillator> {
    match settings.strategy.oscillator {
        // Offset the seed so the oscillator does not replay the feed's draws
        OscillatorKind::Random => Box::new(RandomOscillator::new(
            settings.seed.map(|seed| seed.wrapping_add(1)),
        )),
        OscillatorKind::Rsi => Box::new(RsiOscillator::new(settings.strategy.rsi_period)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::MemoryEventSink;
    use crate::models::Candle;
    use chrono::NaiveDate;
    use tempfile::TempDir;

    struct FailingFeed;

    impl CandleSource for FailingFeed {
        fn next_candle(&mut self, symbol: &str, _now: NaiveDateTime) -> anyhow::Result<Candle> {
            anyhow::bail!("no data for {}", symbol)
        }
    }

    /// Fails every call and records when it was asked
    #[derive(Default)]
    struct TimedFailingFeed {
        calls: Arc<std::sync::Mutex<Vec<tokio::time::Instant>>>,
    }

    impl CandleSource for TimedFailingFeed {
        fn next_candle(&mut self, symbol: &str, _now: NaiveDateTime) -> anyhow::Result<Candle> {
            self.calls.lock().unwrap().push(tokio::time::Instant::now());
            anyhow::bail!("no data for {}", symbol)
        }
    }

    fn at(day: u32, hour: u32, minute: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 10, day)
            .unwrap()
            .and_hms_opt(hour, minute, 0)
            .unwrap()
    }

    fn settings(dir: &TempDir) -> Settings {
        Settings {
            state_file: dir.path().join("state.json"),
            symbols: vec!["NIFTY".to_string()],
            seed: Some(11),
            ..Settings::default()
        }
    }

    fn engine(dir: &TempDir, feed: Box<dyn CandleSource>) -> (TradingEngine, Arc<MemoryEventSink>) {
        let settings = settings(dir);
        let store = StateStore::open_at(&settings.state_file, 150.0, at(16, 9, 0).date()).unwrap();
        let events = Arc::new(MemoryEventSink::new(100));
        (TradingEngine::new(store, events.clone(), feed, &settings), events)
    }

    #[test]
    fn test_synthetic_ticks_populate_market_data() {
        let dir = TempDir::new().unwrap();
        let settings = settings(&dir);
        let feed = SyntheticFeed::new(&settings.symbols, settings.seed);
        let (mut engine, _) = engine(&dir, Box::new(feed));

        for second in 0..5 {
            let now = at(16, 10, 0) + chrono::Duration::seconds(second * 2);
            let summary = engine.tick_at(now).unwrap();
            assert!(!summary.frozen);
        }

        let state = engine.store().read().into_state();
        assert!(state.market_data.contains_key("NIFTY"));
        assert_eq!(state.reasoning.current_market, "NIFTY");
    }

    #[test]
    fn test_feed_failure_surfaces_as_tick_error() {
        let dir = TempDir::new().unwrap();
        let (mut engine, _) = engine(&dir, Box::new(FailingFeed));

        let err = engine.tick_at(at(16, 10, 0)).unwrap_err();
        assert!(format!("{:#}", err).contains("no data for NIFTY"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_backs_off_after_failed_tick() {
        let dir = TempDir::new().unwrap();
        let settings = settings(&dir);
        let store = StateStore::open(&settings.state_file, 150.0).unwrap();
        let events = Arc::new(MemoryEventSink::new(100));
        let feed = TimedFailingFeed::default();
        let calls = feed.calls.clone();
        let mut engine = TradingEngine::new(store, events.clone(), Box::new(feed), &settings);
        let error_count = || {
            events
                .recent(100)
                .into_iter()
                .filter(|e| e.severity == Severity::Error && e.component == "Orchestrator")
                .count()
        };

        let mut run = tokio_test::task::spawn(engine.run());
        tokio_test::assert_pending!(run.poll());
        assert_eq!(calls.lock().unwrap().len(), 1);
        assert_eq!(error_count(), 1);

        // Still inside the 5s backoff, longer than the 2s tick interval
        tokio::time::advance(Duration::from_secs(4)).await;
        tokio_test::assert_pending!(run.poll());
        assert_eq!(calls.lock().unwrap().len(), 1);

        tokio::time::advance(Duration::from_secs(1)).await;
        tokio_test::assert_pending!(run.poll());
        let calls = calls.lock().unwrap().clone();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[1] - calls[0], Duration::from_secs(5));
        assert_eq!(error_count(), 2);
    }

    #[test]
    fn test_full_freeze_skips_tick() {
        let dir = TempDir::new().unwrap();
        let (mut engine, _) = engine(&dir, Box::new(FailingFeed));
        engine
            .store()
            .update(|state| state.kill_switch.full_system_freeze = true)
            .unwrap();

        let summary = engine.tick_at(at(16, 10, 0)).unwrap();

        assert!(summary.frozen);
        assert_eq!(summary.proposals, 0);
    }

    #[test]
    fn test_new_day_resets_state() {
        let dir = TempDir::new().unwrap();
        let (mut engine, events) = engine(&dir, Box::new(FailingFeed));
        engine
            .store()
            .update(|state| state.kill_switch.full_system_freeze = true)
            .unwrap();

        // Rollover clears the freeze, so the tick reaches the failing feed
        let err = engine.tick_at(at(17, 9, 15)).unwrap_err();
        assert!(format!("{:#}", err).contains("Market scan failed"));

        let state = engine.store().read().into_state();
        assert_eq!(state.trading_date, at(17, 0, 0).date());
        assert!(!state.kill_switch.full_system_freeze);
        assert!(events
            .recent(10)
            .iter()
            .any(|e| e.message.contains("New trading day 2026-10-17")));
    }
}
