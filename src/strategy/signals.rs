use chrono::NaiveDateTime;

use super::confidence::{ConfidenceScore, ConfidenceScorer};
use crate::execution::{CandleBuffer, CandleSource};
use crate::indicators::average_volume;
use crate::models::{Candle, Direction, Regime, TradeProposal};
use crate::persistence::{Component, Reasoning, StateStore};
use crate::regime::RegimeDetector;
use crate::settings::StrategySettings;

/// What the pipeline concluded for one symbol on one tick
#[derive(Debug, Clone, PartialEq)]
pub struct SignalEvaluation {
    pub symbol: String,
    pub regime: Regime,
    pub atr_pct: f64,
    /// None means HOLD
    pub direction: Option<Direction>,
    pub confidence: ConfidenceScore,
    pub rejection: Option<String>,
    pub price: f64,
    pub timestamp: NaiveDateTime,
}

impl SignalEvaluation {
    pub fn proposal(&self) -> Option<TradeProposal> {
        let direction = self.direction?;
        Some(TradeProposal {
            symbol: self.symbol.clone(),
            direction,
            confidence: self.confidence.fraction(),
            price: self.price,
            regime: self.regime,
            atr: self.atr_pct,
            timestamp: self.timestamp,
        })
    }

    /// Copy this evaluation into the observability snapshot
    pub fn write_reasoning(&self, reasoning: &mut Reasoning, oscillator: &str) {
        reasoning.current_state = "ANALYZING".to_string();
        reasoning.current_market = self.symbol.clone();
        reasoning.market_mode = self.regime.to_string();
        reasoning.signal_type = self
            .direction
            .map(|d| d.to_string())
            .unwrap_or_else(|| "NO_TRADE".to_string());
        reasoning.signal_confidence = self.confidence.total;
        reasoning.breakdown = self.confidence.breakdown;
        reasoning.indicators_used = vec![
            "SMA".to_string(),
            "ATR".to_string(),
            "VOLUME".to_string(),
            oscillator.to_uppercase(),
        ];
        reasoning.indicator_explanation = format!(
            "Regime {} (ATR {:.4}%), close {:.2}",
            self.regime,
            self.atr_pct * 100.0,
            self.price
        );
        reasoning.trade_rejection_reason = self
            .rejection
            .clone()
            .unwrap_or_else(|| "None".to_string());
    }
}

/// Breakout-with-volume signal pipeline
///
/// Pulls one candle per symbol per scan, keeps a rolling history, classifies
/// the regime and scores any breakout. Every candle lands in the store's
/// market data; every evaluation lands in the reasoning snapshot.
pub struct SignalEngine {
    store: StateStore,
    feed: Box<dyn CandleSource>,
    buffer: CandleBuffer,
    detector: RegimeDetector,
    scorer: ConfidenceScorer,
    symbols: Vec<String>,
    volume_multiplier: f64,
    volume_lookback: usize,
}

impl SignalEngine {
    pub fn new(
        store: StateStore,
        feed: Box<dyn CandleSource>,
        scorer: ConfidenceScorer,
        symbols: Vec<String>,
        settings: &StrategySettings,
    ) -> Self {
        Self {
            store,
            feed,
            buffer: CandleBuffer::new(settings.history_capacity),
            detector: RegimeDetector::from_settings(settings),
            scorer,
            symbols,
            volume_multiplier: settings.volume_multiplier,
            volume_lookback: settings.volume_lookback,
        }
    }

    pub fn buffer(&self) -> &CandleBuffer {
        &self.buffer
    }

    /// Scan every symbol once and return the directional proposals
    pub fn scan_market_at(&mut self, now: NaiveDateTime) -> anyhow::Result<Vec<TradeProposal>> {
        let status = format!("Scanning {}", now.format("%H:%M:%S"));
        if let Err(e) = self.store.heartbeat_at(Component::MarketEngine, &status, now) {
            tracing::warn!(error = %e, "Market engine heartbeat dropped");
        }

        let mut proposals = Vec::new();
        for symbol in self.symbols.clone() {
            if let Some(proposal) = self.generate_signal_at(&symbol, now)? {
                proposals.push(proposal);
            }
        }
        Ok(proposals)
    }

    /// Fetch the next candle for `symbol`, evaluate it and publish the result
    pub fn generate_signal_at(
        &mut self,
        symbol: &str,
        now: NaiveDateTime,
    ) -> anyhow::Result<Option<TradeProposal>> {
        let candle = self.feed.next_candle(symbol, now)?;
        let evaluation = self.evaluate(candle.clone(), now);
        let oscillator = self.scorer.oscillator_name().to_string();

        let written = self.store.update(|state| {
            state.market_data.insert(candle.symbol.clone(), candle);
            if let Some(evaluation) = &evaluation {
                evaluation.write_reasoning(&mut state.reasoning, &oscillator);
            }
        });
        if let Err(e) = written {
            tracing::warn!(symbol = %symbol, error = %e, "Signal state update dropped");
        }

        let Some(evaluation) = evaluation else {
            return Ok(None);
        };

        match &evaluation.rejection {
            Some(reason) => tracing::debug!(symbol = %symbol, regime = %evaluation.regime, "HOLD: {}", reason),
            None => tracing::info!(
                symbol = %symbol,
                regime = %evaluation.regime,
                confidence = evaluation.confidence.total,
                "Signal: {:?}",
                evaluation.direction
            ),
        }

        Ok(evaluation.proposal())
    }

    /// Push the candle into history and classify it.
    /// None until the symbol has a previous candle to break out of.
    pub fn evaluate(&mut self, candle: Candle, now: NaiveDateTime) -> Option<SignalEvaluation> {
        let history = self.buffer.push(candle);
        let (latest, previous) = match history {
            [.., previous, latest] => (latest, previous),
            _ => return None,
        };

        let reading = self.detector.detect(history);

        let breaks_up = latest.close > previous.high;
        let breaks_down = latest.close < previous.low;
        let volume_confirmed = average_volume(history, self.volume_lookback)
            .map(|avg| latest.volume >= self.volume_multiplier * avg)
            .unwrap_or(false);

        let (direction, rejection) = match (breaks_up, breaks_down, volume_confirmed) {
            (true, _, true) => (Some(Direction::Buy), None),
            (_, true, true) => (Some(Direction::Sell), None),
            (_, _, false) => (
                None,
                Some(format!("Volume spike < {}x average", self.volume_multiplier)),
            ),
            _ => (
                None,
                Some("Price did not break previous candle extremes".to_string()),
            ),
        };

        let confidence = match direction {
            Some(direction) => self.scorer.score(history, direction, reading.regime, now),
            None => ConfidenceScore {
                total: 0,
                breakdown: None,
            },
        };

        Some(SignalEvaluation {
            symbol: latest.symbol.clone(),
            regime: reading.regime,
            atr_pct: reading.atr_pct,
            direction,
            confidence,
            rejection,
            price: latest.close,
            timestamp: latest.timestamp,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategy::oscillator::MomentumOscillator;
    use chrono::NaiveDate;
    use std::collections::VecDeque;
    use tempfile::TempDir;

    struct ScriptedFeed(VecDeque<Candle>);

    impl CandleSource for ScriptedFeed {
        fn next_candle(&mut self, _symbol: &str, _now: NaiveDateTime) -> anyhow::Result<Candle> {
            self.0
                .pop_front()
                .ok_or_else(|| anyhow::anyhow!("feed exhausted"))
        }
    }

    struct Fixed(f64);

    impl MomentumOscillator for Fixed {
        fn name(&self) -> &str {
            "fixed"
        }

        fn value(&mut self, _candles: &[Candle]) -> f64 {
            self.0
        }
    }

    fn now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 10, 16)
            .unwrap()
            .and_hms_opt(11, 0, 0)
            .unwrap()
    }

    fn bar(high: f64, low: f64, close: f64, volume: f64) -> Candle {
        Candle {
            symbol: "NIFTY".to_string(),
            open: close,
            high,
            low,
            close,
            volume,
            timestamp: now(),
        }
    }

    fn engine(dir: &TempDir, candles: Vec<Candle>) -> SignalEngine {
        let store = StateStore::open_at(dir.path().join("state.json"), 150.0, now().date()).unwrap();
        let settings = StrategySettings::default();
        SignalEngine::new(
            store,
            Box::new(ScriptedFeed(candles.into())),
            ConfidenceScorer::new(&settings, Box::new(Fixed(50.0))),
            vec!["NIFTY".to_string()],
            &settings,
        )
    }

    /// Nine quiet rising bars, then whatever the test appends
    fn base_history() -> Vec<Candle> {
        (0..9)
            .map(|i| {
                let close = 100.0 + i as f64;
                bar(close + 0.5, close - 0.5, close, 1000.0)
            })
            .collect()
    }

    #[test]
    fn test_buy_on_breakout_with_volume() {
        let dir = TempDir::new().unwrap();
        let mut history = base_history();
        history.push(bar(111.0, 109.0, 110.0, 5000.0));
        let mut engine = engine(&dir, history);

        let mut last = None;
        for _ in 0..10 {
            last = engine.generate_signal_at("NIFTY", now()).unwrap();
        }

        let proposal = last.expect("breakout should propose");
        assert_eq!(proposal.direction, Direction::Buy);
        assert_eq!(proposal.price, 110.0);
        assert_eq!(proposal.regime, Regime::Unknown);
        // trend 100, volume 100, oscillator 100, volatility 100, time 100
        assert_eq!(proposal.confidence, 1.0);

        let state = engine.store.read().into_state();
        assert_eq!(state.market_data["NIFTY"].close, 110.0);
        assert_eq!(state.reasoning.signal_type, "BUY");
        assert_eq!(state.reasoning.trade_rejection_reason, "None");
        assert_eq!(state.reasoning.signal_confidence, 100);
    }

    #[test]
    fn test_sell_on_breakdown_with_volume() {
        let dir = TempDir::new().unwrap();
        let mut history = base_history();
        history.push(bar(100.0, 98.0, 99.0, 5000.0));
        let mut engine = engine(&dir, history);

        let mut last = None;
        for _ in 0..10 {
            last = engine.generate_signal_at("NIFTY", now()).unwrap();
        }

        let proposal = last.expect("breakdown should propose");
        assert_eq!(proposal.direction, Direction::Sell);
        // close 99 < first close 100: trend aligned
        assert_eq!(proposal.confidence, 1.0);
    }

    #[test]
    fn test_hold_when_volume_not_confirmed() {
        let dir = TempDir::new().unwrap();
        let mut history = base_history();
        history.push(bar(111.0, 109.0, 110.0, 1000.0));
        let mut engine = engine(&dir, history);

        for _ in 0..10 {
            assert!(engine.generate_signal_at("NIFTY", now()).unwrap().is_none());
        }

        let state = engine.store.read().into_state();
        assert_eq!(state.reasoning.signal_type, "NO_TRADE");
        assert_eq!(state.reasoning.trade_rejection_reason, "Volume spike < 1.2x average");
        assert_eq!(state.reasoning.signal_confidence, 0);
    }

    #[test]
    fn test_hold_when_no_breakout() {
        let dir = TempDir::new().unwrap();
        let mut history = base_history();
        // Inside the previous bar (107.5-108.5) on heavy volume
        history.push(bar(108.4, 107.6, 108.0, 5000.0));
        let mut engine = engine(&dir, history);

        for _ in 0..10 {
            assert!(engine.generate_signal_at("NIFTY", now()).unwrap().is_none());
        }

        let state = engine.store.read().into_state();
        assert_eq!(
            state.reasoning.trade_rejection_reason,
            "Price did not break previous candle extremes"
        );
    }

    #[test]
    fn test_first_candle_only_registers_market_data() {
        let dir = TempDir::new().unwrap();
        let mut engine = engine(&dir, vec![bar(101.0, 99.0, 100.0, 1000.0)]);

        assert!(engine.generate_signal_at("NIFTY", now()).unwrap().is_none());

        let state = engine.store.read().into_state();
        assert_eq!(state.market_data["NIFTY"].close, 100.0);
        assert_eq!(state.reasoning.current_state, "WAITING");
    }

    #[test]
    fn test_scan_heartbeats_and_propagates_feed_errors() {
        let dir = TempDir::new().unwrap();
        let mut engine = engine(&dir, Vec::new());

        assert!(engine.scan_market_at(now()).is_err());

        let state = engine.store.read().into_state();
        assert!(state.health[&Component::MarketEngine].connected);
    }

    #[test]
    fn test_history_is_bounded() {
        let dir = TempDir::new().unwrap();
        let candles: Vec<Candle> = (0..60).map(|i| bar(101.0, 99.0, 100.0 + i as f64 * 0.01, 1000.0)).collect();
        let mut engine = engine(&dir, candles);

        for _ in 0..60 {
            engine.generate_signal_at("NIFTY", now()).unwrap();
        }

        assert_eq!(engine.buffer().candle_count("NIFTY"), 50);
    }
}
