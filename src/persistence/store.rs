use chrono::{Local, NaiveDate, NaiveDateTime};
use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use thiserror::Error;

use super::state::{Component, Reasoning, SystemState};
use crate::models::{Candle, Trade};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("state file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("state document is not valid JSON: {0}")]
    Parse(#[source] serde_json::Error),
    #[error("failed to serialize state document: {0}")]
    Serialize(#[source] serde_json::Error),
    #[error("in-process state lock poisoned")]
    Poisoned,
}

/// Result of a read: either the persisted document or the in-memory default
/// that replaced it because the document could not be read.
#[derive(Debug)]
pub enum Snapshot {
    Live(SystemState),
    Fallback { state: SystemState, cause: StoreError },
}

impl Snapshot {
    pub fn is_live(&self) -> bool {
        matches!(self, Snapshot::Live(_))
    }

    pub fn state(&self) -> &SystemState {
        match self {
            Snapshot::Live(state) => state,
            Snapshot::Fallback { state, .. } => state,
        }
    }

    pub fn into_state(self) -> SystemState {
        match self {
            Snapshot::Live(state) => state,
            Snapshot::Fallback { state, .. } => state,
        }
    }
}

/// File-backed store for the single state document
///
/// Reads take a shared `flock`, writes an exclusive one held across the whole
/// read-modify-write. An in-process mutex serializes handles cloned across tasks.
#[derive(Debug, Clone)]
pub struct StateStore {
    path: PathBuf,
    daily_loss_limit: f64,
    guard: Arc<Mutex<()>>,
}

impl StateStore {
    /// Open the store, creating a default document if none exists, then run the
    /// day rollover check against today's local date.
    ///
    /// # Arguments
    /// * `path` - Location of the JSON state document
    /// * `daily_loss_limit` - Limit written into freshly created documents
    pub fn open(path: impl AsRef<Path>, daily_loss_limit: f64) -> Result<Self, StoreError> {
        Self::open_at(path, daily_loss_limit, local_today())
    }

    /// Open the store with an explicit "today" (for tests and replays)
    pub fn open_at(
        path: impl AsRef<Path>,
        daily_loss_limit: f64,
        today: NaiveDate,
    ) -> Result<Self, StoreError> {
        let store = Self {
            path: path.as_ref().to_path_buf(),
            daily_loss_limit,
            guard: Arc::new(Mutex::new(())),
        };

        if let Some(parent) = store.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| store.io_err(e))?;
        }

        let reset = store.day_rollover_check_at(today)?;
        tracing::info!(
            path = %store.path.display(),
            reset,
            "State store ready"
        );

        Ok(store)
    }

    /// Handle on an existing document without creating or resetting it.
    /// Used by read-only consumers; a missing document reads as a fallback.
    pub fn attach(path: impl AsRef<Path>, daily_loss_limit: f64) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            daily_loss_limit,
            guard: Arc::new(Mutex::new(())),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Default document for the given trading day
    pub fn default_state_at(&self, date: NaiveDate) -> SystemState {
        SystemState::fresh(date, self.daily_loss_limit)
    }

    /// Read the current document, falling back to an in-memory default on failure
    pub fn read(&self) -> Snapshot {
        match self.try_read() {
            Ok(state) => Snapshot::Live(state),
            Err(cause) => {
                tracing::warn!(
                    path = %self.path.display(),
                    error = %cause,
                    "State read failed, using defaults"
                );
                Snapshot::Fallback {
                    state: self.default_state_at(local_today()),
                    cause,
                }
            }
        }
    }

    /// Read-modify-write under an exclusive lock
    ///
    /// The mutator's return value is handed back once the document is persisted.
    /// An unreadable document is replaced by the default before the mutator runs.
    pub fn update<T>(&self, mutator: impl FnOnce(&mut SystemState) -> T) -> Result<T, StoreError> {
        self.update_at(local_today(), mutator)
    }

    /// Reset the document to a fresh default if its date is not today
    ///
    /// Returns true when a reset happened.
    pub fn day_rollover_check(&self) -> Result<bool, StoreError> {
        self.day_rollover_check_at(local_today())
    }

    pub fn day_rollover_check_at(&self, today: NaiveDate) -> Result<bool, StoreError> {
        let fresh = self.default_state_at(today);
        let reset = self.update_at(today, move |state| {
            if state.trading_date != today {
                tracing::info!(
                    previous = %state.trading_date,
                    today = %today,
                    "Day rollover, resetting state"
                );
                *state = fresh;
                true
            } else {
                false
            }
        })?;
        Ok(reset)
    }

    pub fn heartbeat(&self, component: Component, status: &str) -> Result<(), StoreError> {
        self.heartbeat_at(component, status, Local::now().naive_local())
    }

    pub fn heartbeat_at(
        &self,
        component: Component,
        status: &str,
        now: NaiveDateTime,
    ) -> Result<(), StoreError> {
        self.update(|state| state.heartbeat(component, status, now))
    }

    pub fn register_market_data(&self, candle: Candle) -> Result<(), StoreError> {
        self.update(|state| {
            state.market_data.insert(candle.symbol.clone(), candle);
        })
    }

    pub fn register_trade(&self, trade: Trade) -> Result<(), StoreError> {
        self.update(|state| {
            state.active_trades.insert(trade.trade_id.clone(), trade);
        })
    }

    /// Remove a trade, returning it if it was active
    pub fn close_trade(&self, trade_id: &str) -> Result<Option<Trade>, StoreError> {
        self.update(|state| state.active_trades.remove(trade_id))
    }

    pub fn realize_pnl(&self, pnl: f64) -> Result<(), StoreError> {
        self.update(|state| state.realize_pnl(pnl))
    }

    pub fn update_reasoning(
        &self,
        apply: impl FnOnce(&mut Reasoning),
    ) -> Result<(), StoreError> {
        self.update(|state| apply(&mut state.reasoning))
    }

    /// Whether new entries are allowed. A failed read answers from defaults.
    pub fn can_trade_new(&self) -> bool {
        self.read().state().can_trade_new()
    }

    fn try_read(&self) -> Result<SystemState, StoreError> {
        let _guard = self.guard.lock().map_err(|_| StoreError::Poisoned)?;
        let mut file = File::open(&self.path).map_err(|e| self.io_err(e))?;

        FileExt::lock_shared(&file).map_err(|e| self.io_err(e))?;
        let result = self
            .read_document(&mut file)
            .and_then(|doc| doc.ok_or_else(|| StoreError::Parse(empty_document())));
        let _ = FileExt::unlock(&file);

        result
    }

    fn update_at<T>(
        &self,
        fallback_date: NaiveDate,
        mutator: impl FnOnce(&mut SystemState) -> T,
    ) -> Result<T, StoreError> {
        let _guard = self.guard.lock().map_err(|_| StoreError::Poisoned)?;
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&self.path)
            .map_err(|e| self.io_err(e))?;

        FileExt::lock_exclusive(&file).map_err(|e| self.io_err(e))?;
        let result = self.modify_locked(&mut file, fallback_date, mutator);
        let _ = FileExt::unlock(&file);

        if let Err(e) = &result {
            tracing::warn!(path = %self.path.display(), error = %e, "State write dropped");
        }
        result
    }

    fn modify_locked<T>(
        &self,
        file: &mut File,
        fallback_date: NaiveDate,
        mutator: impl FnOnce(&mut SystemState) -> T,
    ) -> Result<T, StoreError> {
        let mut state = match self.read_document(file) {
            Ok(Some(state)) => state,
            Ok(None) => self.default_state_at(fallback_date),
            Err(StoreError::Parse(e)) => {
                tracing::warn!(error = %e, "Corrupt state document, rewriting from defaults");
                self.default_state_at(fallback_date)
            }
            Err(e) => return Err(e),
        };

        let output = mutator(&mut state);
        state.enforce_invariants();
        self.write_document(file, &state)?;

        Ok(output)
    }

    /// `Ok(None)` for an empty (freshly created) file
    fn read_document(&self, file: &mut File) -> Result<Option<SystemState>, StoreError> {
        let mut contents = String::new();
        file.seek(SeekFrom::Start(0)).map_err(|e| self.io_err(e))?;
        file.read_to_string(&mut contents)
            .map_err(|e| self.io_err(e))?;

        if contents.trim().is_empty() {
            return Ok(None);
        }

        serde_json::from_str(&contents)
            .map(Some)
            .map_err(StoreError::Parse)
    }

    fn write_document(&self, file: &mut File, state: &SystemState) -> Result<(), StoreError> {
        let mut bytes = serde_json::to_vec_pretty(state).map_err(StoreError::Serialize)?;
        bytes.push(b'\n');

        file.seek(SeekFrom::Start(0)).map_err(|e| self.io_err(e))?;
        file.set_len(0).map_err(|e| self.io_err(e))?;
        file.write_all(&bytes).map_err(|e| self.io_err(e))?;
        file.sync_data().map_err(|e| self.io_err(e))?;

        Ok(())
    }

    fn io_err(&self, source: std::io::Error) -> StoreError {
        StoreError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

fn local_today() -> NaiveDate {
    Local::now().date_naive()
}

fn empty_document() -> serde_json::Error {
    serde::de::Error::custom("state document is empty")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Direction, Regime};
    use crate::persistence::state::SystemMode;
    use tempfile::TempDir;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, d).unwrap()
    }

    fn create_test_trade(id: &str) -> Trade {
        Trade {
            trade_id: id.to_string(),
            symbol: "NIFTY".to_string(),
            direction: Direction::Buy,
            quantity: 10,
            entry_price: 100.0,
            entry_time: day(16).and_hms_opt(10, 0, 0).unwrap(),
            regime_at_entry: Regime::Trending,
            atr_at_entry: 0.01,
            partial_done: false,
        }
    }

    fn open_store(dir: &TempDir) -> StateStore {
        StateStore::open_at(dir.path().join("bot_state.json"), 150.0, local_today()).unwrap()
    }

    #[test]
    fn test_open_creates_default_document() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir);

        assert!(store.path().exists());
        let snapshot = store.read();
        assert!(snapshot.is_live());
        assert_eq!(snapshot.state(), &store.default_state_at(local_today()));
    }

    #[test]
    fn test_write_then_read_round_trip() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir);

        let written = store
            .update(|state| {
                state.active_trades.insert("T1".to_string(), create_test_trade("T1"));
                state.reasoning.current_market = "NIFTY".to_string();
                state.kill_switch.blocked_symbols.insert("BTCUSDT".to_string());
                state.clone()
            })
            .unwrap();

        let read = store.read().into_state();
        assert_eq!(read, written);
    }

    #[test]
    fn test_synthetic_prices_survive_round_trip() {
        use crate::execution::{CandleSource, SyntheticFeed};

        let dir = TempDir::new().unwrap();
        let store = open_store(&dir);
        let symbols = vec!["NIFTY".to_string(), "BTCUSDT".to_string()];
        let mut feed = SyntheticFeed::new(&symbols, Some(1));
        let now = day(16).and_hms_opt(10, 0, 0).unwrap();

        for i in 0..500 {
            let symbol = &symbols[i % 2];
            let candle = feed.next_candle(symbol, now).unwrap();
            let written = store
                .update(|state| {
                    let mut trade = create_test_trade(symbol);
                    trade.entry_price = candle.close;
                    trade.atr_at_entry = (candle.high - candle.low) / candle.close;
                    state.active_trades.insert(symbol.clone(), trade);
                    state.market_data.insert(symbol.clone(), candle.clone());
                    state.clone()
                })
                .unwrap();

            let read = store.read().into_state();
            assert_eq!(read.market_data[symbol], candle, "candle {} drifted", i);
            assert_eq!(read, written);
        }
    }

    #[test]
    fn test_read_falls_back_on_corrupt_document() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir);
        std::fs::write(store.path(), "{ not json").unwrap();

        let snapshot = store.read();

        assert!(!snapshot.is_live());
        assert!(matches!(
            snapshot,
            Snapshot::Fallback { cause: StoreError::Parse(_), .. }
        ));
        assert!(snapshot.state().active_trades.is_empty());
    }

    #[test]
    fn test_read_falls_back_on_missing_document() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir);
        std::fs::remove_file(store.path()).unwrap();

        let snapshot = store.read();

        assert!(matches!(
            snapshot,
            Snapshot::Fallback { cause: StoreError::Io { .. }, .. }
        ));
        assert_eq!(snapshot.state().system_mode, SystemMode::Paper);
    }

    #[test]
    fn test_attach_does_not_create_document() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("absent.json");

        let store = StateStore::attach(&path, 150.0);

        assert!(!store.read().is_live());
        assert!(!path.exists());
    }

    #[test]
    fn test_attach_sees_writes_from_another_handle() {
        let dir = TempDir::new().unwrap();
        let writer = open_store(&dir);
        writer.register_trade(create_test_trade("T1")).unwrap();

        let reader = StateStore::attach(writer.path(), 150.0);
        let snapshot = reader.read();

        assert!(snapshot.is_live());
        assert!(snapshot.state().active_trades.contains_key("T1"));
    }

    #[test]
    fn test_update_rewrites_corrupt_document() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir);
        std::fs::write(store.path(), "garbage").unwrap();

        store.register_trade(create_test_trade("T1")).unwrap();

        let state = store.read().into_state();
        assert_eq!(state.active_trades.len(), 1);
    }

    #[test]
    fn test_update_enforces_breach_invariant() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir);

        store
            .update(|state| {
                state.daily_loss.breached = true;
                state.kill_switch.stop_new_trades = false;
            })
            .unwrap();

        let state = store.read().into_state();
        assert!(state.daily_loss.breached);
        assert!(state.kill_switch.stop_new_trades);
    }

    #[test]
    fn test_day_rollover_resets_everything() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bot_state.json");
        let store = StateStore::open_at(&path, 150.0, day(15)).unwrap();

        store.register_trade(create_test_trade("T1")).unwrap();
        store
            .heartbeat_at(Component::RiskEngine, "Monitoring", day(15).and_hms_opt(14, 0, 0).unwrap())
            .unwrap();
        store.realize_pnl(-200.0).unwrap();
        store
            .update_reasoning(|r| r.current_state = "ANALYZING".to_string())
            .unwrap();

        // Same day: nothing happens
        assert!(!store.day_rollover_check_at(day(15)).unwrap());
        assert!(store.read().state().daily_loss.breached);

        assert!(store.day_rollover_check_at(day(16)).unwrap());
        let state = store.read().into_state();
        assert_eq!(state, store.default_state_at(day(16)));
        assert_eq!(state.trading_date, day(16));
        assert!(!state.kill_switch.stop_new_trades);
    }

    #[test]
    fn test_reopen_next_day_resets() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bot_state.json");

        let store = StateStore::open_at(&path, 150.0, day(15)).unwrap();
        store.register_trade(create_test_trade("T1")).unwrap();

        let reopened = StateStore::open_at(&path, 150.0, day(16)).unwrap();
        let state = reopened.read().into_state();
        assert!(state.active_trades.is_empty());
        assert_eq!(state.trading_date, day(16));
    }

    #[test]
    fn test_close_trade_returns_removed() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir);
        store.register_trade(create_test_trade("T1")).unwrap();

        let closed = store.close_trade("T1").unwrap();
        assert_eq!(closed.map(|t| t.trade_id), Some("T1".to_string()));
        assert!(store.close_trade("T1").unwrap().is_none());
    }

    #[test]
    fn test_register_market_data_keeps_latest_candle() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir);
        let ts = day(16).and_hms_opt(10, 0, 0).unwrap();

        for close in [100.0, 101.0] {
            store
                .register_market_data(Candle {
                    symbol: "NIFTY".to_string(),
                    open: 99.0,
                    high: 102.0,
                    low: 98.0,
                    close,
                    volume: 1000.0,
                    timestamp: ts,
                })
                .unwrap();
        }

        let state = store.read().into_state();
        assert_eq!(state.market_data.len(), 1);
        assert_eq!(state.market_data["NIFTY"].close, 101.0);
    }

    #[test]
    fn test_concurrent_updates_are_serialized() {
        use std::thread;

        let dir = TempDir::new().unwrap();
        let store = open_store(&dir);

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let store = store.clone();
                thread::spawn(move || {
                    for _ in 0..25 {
                        store.update(|state| state.daily_loss.current += 1.0).unwrap();
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(store.read().state().daily_loss.current, 100.0);
    }

    #[test]
    fn test_can_trade_new_reflects_kill_switch() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir);
        assert!(store.can_trade_new());

        store.realize_pnl(-150.0).unwrap();
        assert!(!store.can_trade_new());
    }
}
