//! Runtime configuration
//!
//! Layered as: built-in defaults, then an optional TOML file, then `PAPERBOT__*`
//! environment variables (e.g. `PAPERBOT__ENTRY__MIN_CONFIDENCE=0.7`).

use anyhow::{Context, Result};
use chrono::NaiveTime;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub state_file: PathBuf,
    pub symbols: Vec<String>,
    /// Seed for the synthetic feed and oscillator stand-in; random when unset
    pub seed: Option<u64>,
    pub engine: EngineSettings,
    pub strategy: StrategySettings,
    pub entry: EntrySettings,
    pub risk: RiskSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            state_file: PathBuf::from("bot_state.json"),
            symbols: vec![
                "NIFTY".to_string(),
                "BANKNIFTY".to_string(),
                "BTCUSDT".to_string(),
            ],
            seed: None,
            engine: EngineSettings::default(),
            strategy: StrategySettings::default(),
            entry: EntrySettings::default(),
            risk: RiskSettings::default(),
        }
    }
}

impl Settings {
    /// Load settings from an optional file plus the environment
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = ::config::Config::builder();

        builder = match path {
            Some(path) => builder.add_source(::config::File::from(path).required(true)),
            None => builder.add_source(::config::File::with_name("paperbot").required(false)),
        };

        let settings = builder
            .add_source(
                ::config::Environment::with_prefix("PAPERBOT")
                    .prefix_separator("__")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("symbols")
                    .try_parsing(true),
            )
            .build()
            .context("Failed to assemble configuration")?
            .try_deserialize::<Settings>()
            .context("Invalid configuration")?;

        settings.validate()?;
        Ok(settings)
    }

    /// Reject values the trading rules cannot work with
    pub fn validate(&self) -> Result<()> {
        let fraction = self.risk.partial_fraction;
        if !(fraction > 0.0 && fraction < 1.0) {
            anyhow::bail!("risk.partial_fraction must be in (0, 1), got {}", fraction);
        }
        if self.entry.max_active_trades == 0 {
            anyhow::bail!("entry.max_active_trades must be at least 1");
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    pub tick_interval_secs: u64,
    pub error_backoff_secs: u64,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            tick_interval_secs: 2,
            error_backoff_secs: 5,
        }
    }
}

impl EngineSettings {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_secs(self.tick_interval_secs)
    }

    pub fn error_backoff(&self) -> Duration {
        Duration::from_secs(self.error_backoff_secs)
    }
}

/// Which implementation backs the momentum-oscillator sub-score
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum OscillatorKind {
    #[default]
    Random,
    Rsi,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StrategySettings {
    pub history_capacity: usize,
    pub min_regime_candles: usize,
    pub fast_window: usize,
    pub slow_window: usize,
    pub trend_spread_threshold: f64,
    pub volatile_atr_threshold: f64,
    pub volume_multiplier: f64,
    pub volume_lookback: usize,
    pub trend_lookback: usize,
    pub min_confidence_candles: usize,
    pub opening_start: NaiveTime,
    pub opening_end: NaiveTime,
    pub afternoon_cutoff: NaiveTime,
    pub oscillator: OscillatorKind,
    pub rsi_period: usize,
}

impl Default for StrategySettings {
    fn default() -> Self {
        Self {
            history_capacity: 50,
            min_regime_candles: 20,
            fast_window: 5,
            slow_window: 20,
            trend_spread_threshold: 0.002,
            volatile_atr_threshold: 0.0015,
            volume_multiplier: 1.2,
            volume_lookback: 10,
            trend_lookback: 10,
            min_confidence_candles: 5,
            opening_start: hm(9, 0),
            opening_end: hm(9, 30),
            afternoon_cutoff: hm(14, 30),
            oscillator: OscillatorKind::Random,
            rsi_period: 14,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EntrySettings {
    pub min_confidence: f64,
    pub max_active_trades: usize,
    pub capital_budget: f64,
}

impl Default for EntrySettings {
    fn default() -> Self {
        Self {
            min_confidence: 0.65,
            max_active_trades: 2,
            capital_budget: 1000.0,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RiskSettings {
    pub daily_loss_limit: f64,
    pub force_exit_time: NaiveTime,
    pub trending_sl_multiplier: f64,
    pub default_sl_multiplier: f64,
    /// Partial target expressed in multiples of the stop distance
    pub partial_target_r: f64,
    pub partial_fraction: f64,
}

impl Default for RiskSettings {
    fn default() -> Self {
        Self {
            daily_loss_limit: 150.0,
            force_exit_time: hm(14, 30),
            trending_sl_multiplier: 2.0,
            default_sl_multiplier: 1.2,
            partial_target_r: 1.5,
            partial_fraction: 0.5,
        }
    }
}

fn hm(hour: u32, minute: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(hour, minute, 0).unwrap_or(NaiveTime::MIN)
}
