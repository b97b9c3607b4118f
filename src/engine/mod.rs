//! Sensor state engine: calibration, storm classification, bounded
//! time-series, and the bridge to durable history.
//!
//! One producer (the sampler) mutates state through [`SensorEngine::ingest`]
//! and [`SensorEngine::reset`]; any number of readers call
//! [`SensorEngine::status`] and [`SensorEngine::history`] concurrently. Every
//! mutation completes inside a single write-lock scope, so readers only ever
//! observe whole ingest cycles.

pub mod ring;
pub mod snapshot;

pub use ring::RingBuffer;
pub use snapshot::StatusSnapshot;

use std::{
    path::PathBuf,
    sync::{Arc, RwLock},
};

use log::info;

use crate::{
    config::StationConfig,
    models::{DisplayMode, Reading, WeatherLevel},
    store::HistoryStore,
};

// Cap on rows returned by a single durable history query.
const HISTORY_QUERY_LIMIT: usize = 5000;

struct EngineCore {
    temperature: f64,
    temperature_f: f64,
    raw_temperature: f64,
    pressure: f64,
    storm_level: WeatherLevel,
    pressure_delta: Option<f64>,
    display_mode: DisplayMode,
    pressure_window: RingBuffer<(f64, f64)>,
    session_log: RingBuffer<Reading>,
}

impl EngineCore {
    fn new(config: &StationConfig) -> Self {
        Self {
            temperature: 0.0,
            temperature_f: 32.0,
            raw_temperature: 0.0,
            pressure: 0.0,
            storm_level: WeatherLevel::Fair,
            pressure_delta: None,
            display_mode: DisplayMode::default(),
            pressure_window: RingBuffer::new(config.window_capacity()),
            session_log: RingBuffer::new(config.session_log_capacity.max(1)),
        }
    }

    fn ingest_sample(
        &mut self,
        config: &StationConfig,
        raw_temperature: f64,
        cpu_temperature: f64,
        raw_pressure: f64,
        now: f64,
    ) -> Reading {
        self.raw_temperature = raw_temperature;
        // The sensor sits next to the SoC and reads high; the bias scales
        // with the CPU-to-ambient gap.
        self.temperature =
            raw_temperature - (cpu_temperature - raw_temperature) / config.heat_factor;
        self.temperature_f = self.temperature * 9.0 / 5.0 + 32.0;
        self.pressure = raw_pressure;

        self.pressure_window.push((now, raw_pressure));
        self.update_storm_level(config);

        let reading = Reading {
            timestamp: now,
            temperature: self.temperature,
            temperature_f: self.temperature_f,
            raw_temperature,
            pressure: raw_pressure,
            storm_level: self.storm_level,
        };
        self.session_log.push(reading.clone());
        reading
    }

    /// Classify the weather trend from the pressure change across the window.
    ///
    /// Thresholds are checked most severe first and are inclusive on the
    /// severe side, so a delta exactly on a threshold takes that tier.
    fn update_storm_level(&mut self, config: &StationConfig) {
        let oldest_pressure = if self.pressure_window.len() >= 2 {
            self.pressure_window.front().map(|&(_, pressure)| pressure)
        } else {
            None
        };

        let Some(oldest_pressure) = oldest_pressure else {
            self.pressure_delta = None;
            self.storm_level = WeatherLevel::Fair;
            return;
        };

        let delta = self.pressure - oldest_pressure;
        self.pressure_delta = Some(delta);
        self.storm_level = if delta <= config.severe_threshold {
            WeatherLevel::Stormy
        } else if delta <= config.warning_threshold {
            WeatherLevel::Rain
        } else if delta <= config.watch_threshold {
            WeatherLevel::Change
        } else if delta >= config.dry_threshold {
            WeatherLevel::Dry
        } else {
            WeatherLevel::Fair
        };
    }

    fn snapshot(&self) -> StatusSnapshot {
        StatusSnapshot {
            temperature: self.temperature,
            temperature_f: self.temperature_f,
            raw_temperature: self.raw_temperature,
            pressure: self.pressure,
            storm_level: self.storm_level,
            storm_label: self.storm_level.label(),
            samples_collected: self.pressure_window.len(),
            window_full: self.pressure_window.is_full(),
            display_mode: self.display_mode.label(),
            pressure_delta: self.pressure_delta,
        }
    }

    fn reset(&mut self) {
        self.pressure_window.clear();
        self.session_log.clear();
        self.storm_level = WeatherLevel::Fair;
        self.pressure_delta = None;
        self.temperature = 0.0;
        self.temperature_f = 32.0;
        self.raw_temperature = 0.0;
        self.pressure = 0.0;
    }

    /// Rehydrate from persisted rows (oldest-first). Returns the number of
    /// samples that landed in the pressure window.
    fn seed(&mut self, config: &StationConfig, rows: &[Reading]) -> usize {
        for row in rows {
            self.session_log.push(row.clone());
        }

        let window_tail = rows.len().saturating_sub(self.pressure_window.capacity());
        for row in &rows[window_tail..] {
            self.pressure_window.push((row.timestamp, row.pressure));
        }

        if let Some(latest) = rows.last() {
            self.temperature = latest.temperature;
            self.temperature_f = latest.temperature_f;
            self.raw_temperature = latest.raw_temperature;
            self.pressure = latest.pressure;
            self.storm_level = latest.storm_level;
            self.update_storm_level(config);
        }

        self.pressure_window.len()
    }
}

/// Handle to the station's live state. Cheap to clone; constructed once at
/// process start and shared between the sampler and the query layer.
#[derive(Clone)]
pub struct SensorEngine {
    core: Arc<RwLock<EngineCore>>,
    store: HistoryStore,
    config: StationConfig,
}

impl SensorEngine {
    pub fn new(config: StationConfig, db_path: impl Into<PathBuf>) -> Self {
        let store = HistoryStore::open(db_path, config.prune_cooldown());
        Self::with_store(config, store)
    }

    pub fn with_store(config: StationConfig, store: HistoryStore) -> Self {
        Self {
            core: Arc::new(RwLock::new(EngineCore::new(&config))),
            store,
            config,
        }
    }

    pub fn config(&self) -> &StationConfig {
        &self.config
    }

    pub fn store(&self) -> &HistoryStore {
        &self.store
    }

    /// Consume one raw sample: calibrate, classify, log, persist.
    ///
    /// `cpu_temperature` is the heat-calibration reference; `now` is epoch
    /// seconds. Persistence failure never aborts ingestion — the store
    /// degrades and in-memory state stays authoritative.
    pub async fn ingest(
        &self,
        raw_temperature: f64,
        cpu_temperature: f64,
        raw_pressure: f64,
        now: f64,
    ) {
        let reading = {
            let mut core = self.core.write().unwrap();
            core.ingest_sample(&self.config, raw_temperature, cpu_temperature, raw_pressure, now)
        };

        self.store.add(&reading).await;
        self.store
            .prune_if_due(now, self.config.retention_max_age_secs)
            .await;
    }

    /// Consistent point-in-time snapshot of the engine state.
    pub fn status(&self) -> StatusSnapshot {
        self.core.read().unwrap().snapshot()
    }

    /// Readings with `timestamp > since`, ascending.
    ///
    /// Served from the durable store when it is available (full multi-day
    /// history); otherwise from the capped in-memory session log with the
    /// same `> since` semantics.
    pub async fn history(&self, since: f64) -> Vec<Reading> {
        if self.store.is_available() {
            return self.store.query(since, HISTORY_QUERY_LIMIT).await;
        }

        let core = self.core.read().unwrap();
        core.session_log
            .iter()
            .filter(|reading| reading.timestamp > since)
            .cloned()
            .collect()
    }

    /// Clear all history (in-memory and persisted) and reset storm state.
    ///
    /// The in-memory transition happens inside one write-lock scope, so
    /// concurrent readers see either the full pre-reset or full post-reset
    /// state.
    pub async fn reset(&self) {
        {
            let mut core = self.core.write().unwrap();
            core.reset();
        }
        self.store.clear().await;
        info!("History reset; storm level back to FAIR");
    }

    /// Rehydrate in-memory state from the durable store on startup, so
    /// `status()` is meaningful before the first live ingest.
    pub async fn seed_from_store(&self) {
        if !self.store.is_available() {
            return;
        }

        let rows = self.store.latest(self.config.session_log_capacity).await;
        if rows.is_empty() {
            return;
        }

        let seeded = {
            let mut core = self.core.write().unwrap();
            core.seed(&self.config, &rows)
        };
        info!(
            "Seeded {} readings from the history store ({seeded} for storm detection)",
            rows.len()
        );
    }

    pub fn display_mode(&self) -> DisplayMode {
        self.core.read().unwrap().display_mode
    }

    pub fn set_display_mode(&self, mode: DisplayMode) {
        self.core.write().unwrap().display_mode = mode;
    }

    /// Shut down the history store cleanly. Idempotent.
    pub fn close(&self) {
        self.store.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn core_with(config: &StationConfig) -> EngineCore {
        EngineCore::new(config)
    }

    fn ingest_pressures(core: &mut EngineCore, config: &StationConfig, pressures: &[f64]) {
        for (i, &pressure) in pressures.iter().enumerate() {
            core.ingest_sample(config, 20.0, 40.0, pressure, 1000.0 + i as f64 * 30.0);
        }
    }

    #[test]
    fn single_sample_has_no_delta() {
        let config = StationConfig::default();
        let mut core = core_with(&config);
        ingest_pressures(&mut core, &config, &[1013.0]);
        assert_eq!(core.pressure_delta, None);
        assert_eq!(core.storm_level, WeatherLevel::Fair);
    }

    #[test]
    fn threshold_boundaries_take_the_severe_tier() {
        let config = StationConfig::default();
        let cases = [
            (-3.0, WeatherLevel::Change),
            (-6.0, WeatherLevel::Rain),
            (-10.0, WeatherLevel::Stormy),
            (2.0, WeatherLevel::Dry),
            (-2.9, WeatherLevel::Fair),
            (1.9, WeatherLevel::Fair),
            (-10.5, WeatherLevel::Stormy),
        ];

        for (delta, expected) in cases {
            let mut core = core_with(&config);
            ingest_pressures(&mut core, &config, &[1000.0, 1000.0 + delta]);
            assert_eq!(core.pressure_delta, Some(delta), "delta {delta}");
            assert_eq!(core.storm_level, expected, "delta {delta}");
        }
    }

    #[test]
    fn delta_spans_the_whole_window() {
        let config = StationConfig {
            sample_interval_secs: 30,
            window_duration_secs: 90,
            ..StationConfig::default()
        };
        assert_eq!(config.window_capacity(), 3);

        let mut core = core_with(&config);
        // Five samples through a capacity-3 window: only the last three count.
        ingest_pressures(&mut core, &config, &[1020.0, 1015.0, 1010.0, 1008.0, 1006.0]);
        assert_eq!(core.pressure_window.len(), 3);
        assert_eq!(core.pressure_delta, Some(1006.0 - 1010.0));
        assert_eq!(core.storm_level, WeatherLevel::Change);
    }

    #[test]
    fn calibration_subtracts_proportional_heat_bias() {
        let config = StationConfig::default();
        let mut core = core_with(&config);
        core.ingest_sample(&config, 28.0, 45.0, 1013.0, 0.0);
        let expected = 28.0 - (45.0 - 28.0) / 1.2;
        assert!((core.temperature - expected).abs() < 1e-9);
        assert!((core.temperature - 13.8333).abs() < 1e-4);
        assert!((core.temperature_f - (expected * 9.0 / 5.0 + 32.0)).abs() < 1e-9);
    }

    #[test]
    fn reset_returns_to_neutral_state() {
        let config = StationConfig::default();
        let mut core = core_with(&config);
        ingest_pressures(&mut core, &config, &[1013.0, 1002.5]);
        assert_eq!(core.storm_level, WeatherLevel::Stormy);

        core.reset();
        assert_eq!(core.storm_level, WeatherLevel::Fair);
        assert_eq!(core.pressure_delta, None);
        assert!(core.pressure_window.is_empty());
        assert!(core.session_log.is_empty());
    }

    #[test]
    fn seed_restores_latest_values_and_reclassifies() {
        let config = StationConfig {
            sample_interval_secs: 30,
            window_duration_secs: 90,
            session_log_capacity: 10,
            ..StationConfig::default()
        };

        let rows: Vec<Reading> = [1013.0, 1010.0, 1006.0, 1002.0]
            .iter()
            .enumerate()
            .map(|(i, &pressure)| Reading {
                timestamp: 100.0 + i as f64 * 30.0,
                temperature: 15.0,
                temperature_f: 59.0,
                raw_temperature: 20.0,
                pressure,
                storm_level: WeatherLevel::Fair,
            })
            .collect();

        let mut core = core_with(&config);
        let seeded = core.seed(&config, &rows);

        assert_eq!(seeded, 3);
        assert_eq!(core.session_log.len(), 4);
        assert_eq!(core.pressure, 1002.0);
        // Window holds the last three rows: 1010, 1006, 1002.
        assert_eq!(core.pressure_delta, Some(1002.0 - 1010.0));
        assert_eq!(core.storm_level, WeatherLevel::Rain);
    }
}
