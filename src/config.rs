use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Station tuning parameters.
///
/// Owned by the startup layer and handed to the engine at construction; the
/// engine itself never mutates it. All intervals are whole seconds, pressure
/// thresholds are hPa of change across the rolling window.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StationConfig {
    /// Seconds between sensor samples.
    pub sample_interval_secs: u64,

    /// Span of the rolling pressure window used for trend detection.
    pub window_duration_secs: u64,

    /// In-memory session log capacity (readings).
    pub session_log_capacity: usize,

    /// Pressure drop that signals changing weather.
    pub watch_threshold: f64,
    /// Pressure drop that signals rain.
    pub warning_threshold: f64,
    /// Pressure drop that signals a storm.
    pub severe_threshold: f64,
    /// Pressure rise that signals dry weather.
    pub dry_threshold: f64,

    /// Divisor for the CPU-heat correction applied to raw temperature.
    pub heat_factor: f64,

    /// Maximum age of persisted readings before pruning.
    pub retention_max_age_secs: u64,
    /// Minimum spacing between prune attempts.
    pub prune_cooldown_secs: u64,
}

impl Default for StationConfig {
    fn default() -> Self {
        Self {
            sample_interval_secs: 30,
            window_duration_secs: 3 * 60 * 60,
            session_log_capacity: 2880,
            watch_threshold: -3.0,
            warning_threshold: -6.0,
            severe_threshold: -10.0,
            dry_threshold: 2.0,
            heat_factor: 1.2,
            retention_max_age_secs: 7 * 24 * 3600,
            prune_cooldown_secs: 3600,
        }
    }
}

impl StationConfig {
    /// Number of samples the rolling pressure window holds.
    pub fn window_capacity(&self) -> usize {
        ((self.window_duration_secs / self.sample_interval_secs.max(1)) as usize).max(1)
    }

    pub fn sample_interval(&self) -> Duration {
        Duration::from_secs(self.sample_interval_secs)
    }

    pub fn prune_cooldown(&self) -> Duration {
        Duration::from_secs(self.prune_cooldown_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_window_capacity_is_three_hours_of_samples() {
        let config = StationConfig::default();
        assert_eq!(config.window_capacity(), 360);
    }

    #[test]
    fn window_capacity_never_collapses_to_zero() {
        let config = StationConfig {
            sample_interval_secs: 60,
            window_duration_secs: 10,
            ..StationConfig::default()
        };
        assert_eq!(config.window_capacity(), 1);
    }
}
