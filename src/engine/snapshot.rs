use serde::Serialize;

use crate::models::WeatherLevel;

/// Consistent point-in-time copy of the engine state.
///
/// Built in one pass under the state lock, so the window count, delta and
/// classification always belong to the same ingest cycle.
#[derive(Debug, Clone, Serialize)]
pub struct StatusSnapshot {
    pub temperature: f64,
    pub temperature_f: f64,
    pub raw_temperature: f64,
    pub pressure: f64,
    pub storm_level: WeatherLevel,
    pub storm_label: &'static str,
    /// Samples currently in the rolling pressure window.
    pub samples_collected: usize,
    pub window_full: bool,
    /// Echo of the display layer's active mode.
    pub display_mode: &'static str,
    /// Pressure change across the window; `None` until two samples exist.
    pub pressure_delta: Option<f64>,
}
