//! Background producer that feeds the engine on a fixed cadence.

pub mod loop_worker;
pub mod source;

pub use loop_worker::sampling_loop;
pub use source::{CpuTemperature, SensorSource, CPU_TEMP_FALLBACK, CPU_TEMP_PATH};

use std::time::Duration;

use anyhow::{bail, Context, Result};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::engine::SensorEngine;

/// Starts and stops the sampling loop task.
pub struct SamplerController {
    handle: Option<JoinHandle<()>>,
    cancel_token: Option<CancellationToken>,
}

impl Default for SamplerController {
    fn default() -> Self {
        Self::new()
    }
}

impl SamplerController {
    pub fn new() -> Self {
        Self {
            handle: None,
            cancel_token: None,
        }
    }

    pub fn start(
        &mut self,
        engine: SensorEngine,
        source: Box<dyn SensorSource>,
        cpu: CpuTemperature,
        sample_interval: Duration,
    ) -> Result<()> {
        if self.handle.is_some() {
            bail!("sampler already active");
        }

        let cancel_token = CancellationToken::new();
        let token_clone = cancel_token.clone();

        let handle = tokio::spawn(sampling_loop(
            engine,
            source,
            cpu,
            sample_interval,
            token_clone,
        ));

        self.handle = Some(handle);
        self.cancel_token = Some(cancel_token);
        Ok(())
    }

    pub fn is_running(&self) -> bool {
        self.handle.is_some()
    }

    pub async fn stop(&mut self) -> Result<()> {
        if let Some(token) = self.cancel_token.take() {
            token.cancel();
        }

        if let Some(handle) = self.handle.take() {
            handle
                .await
                .context("sampling loop task failed to join")
        } else {
            Ok(())
        }
    }
}
