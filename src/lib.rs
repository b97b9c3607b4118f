//! StormSense core — pressure-trend weather classification with durable
//! history.
//!
//! The [`SensorEngine`] owns the live station state: the latest calibrated
//! reading, a rolling pressure window, the in-memory session log and the
//! current storm classification. A [`SamplerController`] drives it from a
//! [`SensorSource`] on a fixed cadence, and every reading is forwarded to the
//! SQLite-backed [`HistoryStore`], which degrades to a no-op when the
//! database is unusable rather than ever failing the station.
//!
//! The HTTP layer, display hardware and process wiring live outside this
//! crate; they hold a cloned engine handle and consume
//! [`StatusSnapshot`]/[`Reading`] values.

pub mod config;
pub mod engine;
pub mod models;
pub mod sampler;
pub mod store;

pub use config::StationConfig;
pub use engine::{SensorEngine, StatusSnapshot};
pub use models::{DisplayMode, Reading, WeatherLevel};
pub use sampler::{CpuTemperature, SamplerController, SensorSource};
pub use store::HistoryStore;
