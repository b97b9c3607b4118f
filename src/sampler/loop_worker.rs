use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Utc;
use log::{error, info, warn};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::{engine::SensorEngine, models::WeatherLevel};

use super::source::{CpuTemperature, SensorSource};

/// The station's single producer: sample, calibrate, classify on a fixed
/// cadence until cancelled.
///
/// A failed sensor read logs and skips that tick; the loop itself only exits
/// through the cancellation token.
pub async fn sampling_loop(
    engine: SensorEngine,
    mut source: Box<dyn SensorSource>,
    cpu: CpuTemperature,
    sample_interval: Duration,
    cancel_token: CancellationToken,
) {
    let mut ticker = tokio::time::interval(sample_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    info!(
        "Sampling loop started (interval: {}s)",
        sample_interval.as_secs()
    );

    let mut previous_level = WeatherLevel::Fair;

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if let Err(err) =
                    perform_sample(&engine, source.as_mut(), &cpu, &mut previous_level).await
                {
                    error!("Sensor sample failed: {err:#}");
                }
            }
            _ = cancel_token.cancelled() => {
                info!("Sampling loop shutting down");
                break;
            }
        }
    }
}

async fn perform_sample(
    engine: &SensorEngine,
    source: &mut dyn SensorSource,
    cpu: &CpuTemperature,
    previous_level: &mut WeatherLevel,
) -> Result<()> {
    let raw_temperature = source
        .temperature()
        .context("temperature read failed")?;
    let raw_pressure = source.pressure().context("pressure read failed")?;
    let cpu_temperature = cpu.read();
    let now = Utc::now().timestamp_millis() as f64 / 1000.0;

    engine
        .ingest(raw_temperature, cpu_temperature, raw_pressure, now)
        .await;

    let status = engine.status();
    if status.storm_level.escalated_from(*previous_level) {
        warn!(
            "Storm escalation: {} -> {}",
            previous_level.label(),
            status.storm_label
        );
    }
    *previous_level = status.storm_level;

    info!(
        "Reading: {:.1}°C, {:.1} hPa, {}",
        status.temperature, status.pressure, status.storm_label
    );

    Ok(())
}
