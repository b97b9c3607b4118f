use std::{fs, path::PathBuf};

use anyhow::Result;

/// Narrow boundary to whatever barometer/thermometer feeds the station.
///
/// The engine never touches hardware itself; a driver (or a mock on dev
/// machines) implements this and the sampler pushes the values in.
pub trait SensorSource: Send {
    /// Ambient temperature, °C.
    fn temperature(&mut self) -> Result<f64>;
    /// Barometric pressure, hPa.
    fn pressure(&mut self) -> Result<f64>;
}

pub const CPU_TEMP_PATH: &str = "/sys/class/thermal/thermal_zone0/temp";

/// Reference temperature assumed when the sysfs node is unreadable
/// (non-Linux dev machines, containers without the thermal zone).
pub const CPU_TEMP_FALLBACK: f64 = 45.0;

/// SoC temperature used as the heat-calibration reference.
///
/// Reads the kernel thermal zone (millidegrees C). A missing or garbled node
/// is a transient local condition, recovered with [`CPU_TEMP_FALLBACK`] and
/// never surfaced to the caller.
#[derive(Debug, Clone)]
pub struct CpuTemperature {
    path: PathBuf,
}

impl Default for CpuTemperature {
    fn default() -> Self {
        Self {
            path: CPU_TEMP_PATH.into(),
        }
    }
}

impl CpuTemperature {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn read(&self) -> f64 {
        match fs::read_to_string(&self.path) {
            Ok(raw) => raw
                .trim()
                .parse::<f64>()
                .map(|millidegrees| millidegrees / 1000.0)
                .unwrap_or(CPU_TEMP_FALLBACK),
            Err(_) => CPU_TEMP_FALLBACK,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use tempfile::NamedTempFile;

    use super::*;

    #[test]
    fn reads_millidegrees_from_sysfs_format() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "48250").unwrap();
        file.flush().unwrap();

        let cpu = CpuTemperature::with_path(file.path());
        assert!((cpu.read() - 48.25).abs() < 1e-9);
    }

    #[test]
    fn falls_back_when_node_is_missing_or_garbled() {
        let cpu = CpuTemperature::with_path("/nonexistent/thermal_zone0/temp");
        assert_eq!(cpu.read(), CPU_TEMP_FALLBACK);

        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "not-a-number").unwrap();
        file.flush().unwrap();
        let cpu = CpuTemperature::with_path(file.path());
        assert_eq!(cpu.read(), CPU_TEMP_FALLBACK);
    }
}
