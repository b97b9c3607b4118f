use serde::{Deserialize, Serialize};

use super::weather::WeatherLevel;

/// One calibrated sensor sample.
///
/// Immutable once built by the engine; shared between the in-memory session
/// log and the durable history store, and returned as-is from history
/// queries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    /// Wall-clock time of the sample, epoch seconds.
    pub timestamp: f64,
    /// Heat-calibrated temperature, °C.
    pub temperature: f64,
    /// Heat-calibrated temperature, °F.
    pub temperature_f: f64,
    /// Uncorrected sensor temperature, °C.
    pub raw_temperature: f64,
    /// Barometric pressure, hPa.
    pub pressure: f64,
    /// Classification at the time of the sample.
    pub storm_level: WeatherLevel,
}
