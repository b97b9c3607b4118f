//! SQLite-backed history of sensor readings.
//!
//! The store runs on a dedicated worker thread that owns the connection;
//! callers hand it closures over a channel and await the reply. It is never
//! allowed to destabilize the engine: if the database cannot be opened,
//! written or read, the store degrades to a permanently-unavailable state for
//! the rest of the process lifetime and every operation becomes a safe
//! no-op/empty result. The in-memory engine state stays authoritative, so a
//! database failure never takes the station down.

use std::{
    path::{Path, PathBuf},
    sync::{
        atomic::{AtomicBool, Ordering},
        mpsc, Arc, Mutex,
    },
    thread::{self, JoinHandle},
    time::{Duration, Instant},
};

use anyhow::{anyhow, Context, Result};
use log::{error, info, warn};
use rusqlite::{params, Connection, Row};
use tokio::sync::oneshot;

mod migrations;

use migrations::run_migrations;

use crate::models::{Reading, WeatherLevel};

type StoreTask = Box<dyn FnOnce(&mut Connection) + Send + 'static>;

enum StoreCommand {
    Execute(StoreTask),
    Shutdown,
}

struct StoreInner {
    sender: mpsc::Sender<StoreCommand>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl StoreInner {
    fn shutdown(&self) {
        let mut guard = match self.worker.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        if let Some(handle) = guard.take() {
            if let Err(err) = self.sender.send(StoreCommand::Shutdown) {
                error!("Failed to send shutdown to store thread: {err}");
            }
            if let Err(join_err) = handle.join() {
                error!("Failed to join store thread: {join_err:?}");
            }
        }
    }
}

impl Drop for StoreInner {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Durable, queryable, self-pruning record of readings.
#[derive(Clone)]
pub struct HistoryStore {
    inner: Option<Arc<StoreInner>>,
    available: Arc<AtomicBool>,
    prune_cooldown: Duration,
    last_prune: Arc<Mutex<Option<Instant>>>,
    db_path: Arc<PathBuf>,
}

impl HistoryStore {
    /// Open the database at `path`, creating the file and schema as needed.
    ///
    /// Never fails: any open or schema error leaves the store in memory-only
    /// mode, where every operation is a safe no-op.
    pub fn open(path: impl Into<PathBuf>, prune_cooldown: Duration) -> Self {
        let db_path = path.into();

        let inner = match Self::spawn_worker(&db_path) {
            Ok(inner) => Some(Arc::new(inner)),
            Err(err) => {
                warn!(
                    "Could not open history database at {} — running in memory-only mode: {err:#}",
                    db_path.display()
                );
                None
            }
        };

        let available = inner.is_some();
        Self {
            inner,
            available: Arc::new(AtomicBool::new(available)),
            prune_cooldown,
            last_prune: Arc::new(Mutex::new(None)),
            db_path: Arc::new(db_path),
        }
    }

    pub fn path(&self) -> &Path {
        self.db_path.as_path()
    }

    /// True while the connection is live. Once this turns false it stays
    /// false until a fresh process reopens the store.
    pub fn is_available(&self) -> bool {
        self.available.load(Ordering::SeqCst)
    }

    /// Persist one reading. Failures are logged and degrade the store.
    pub async fn add(&self, reading: &Reading) {
        if !self.is_available() {
            return;
        }

        let record = reading.clone();
        let result = self
            .execute(move |conn| {
                conn.execute(
                    "INSERT INTO readings
                        (timestamp, temperature, temperature_f,
                         raw_temperature, pressure, storm_level)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                    params![
                        record.timestamp,
                        record.temperature,
                        record.temperature_f,
                        record.raw_temperature,
                        record.pressure,
                        record.storm_level.ordinal(),
                    ],
                )
                .context("failed to insert reading")?;
                Ok(())
            })
            .await;

        if let Err(err) = result {
            self.degrade("write", &err);
        }
    }

    /// Readings with `timestamp > since`, ascending, capped at `limit`.
    /// Empty when unavailable or on storage error.
    pub async fn query(&self, since: f64, limit: usize) -> Vec<Reading> {
        if !self.is_available() {
            return Vec::new();
        }

        let result = self
            .execute(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT timestamp, temperature, temperature_f,
                            raw_temperature, pressure, storm_level
                     FROM readings
                     WHERE timestamp > ?1
                     ORDER BY timestamp ASC
                     LIMIT ?2",
                )?;
                let rows = stmt.query_map(params![since, limit as i64], row_to_reading)?;
                rows.collect::<rusqlite::Result<Vec<_>>>()
                    .context("failed to read history rows")
            })
            .await;

        match result {
            Ok(rows) => rows,
            Err(err) => {
                self.degrade("history query", &err);
                Vec::new()
            }
        }
    }

    /// The newest `limit` readings, returned oldest-first. Used to rehydrate
    /// the engine on startup.
    pub async fn latest(&self, limit: usize) -> Vec<Reading> {
        if !self.is_available() {
            return Vec::new();
        }

        let result = self
            .execute(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT timestamp, temperature, temperature_f,
                            raw_temperature, pressure, storm_level
                     FROM readings
                     ORDER BY timestamp DESC
                     LIMIT ?1",
                )?;
                let rows = stmt.query_map(params![limit as i64], row_to_reading)?;
                let mut readings = rows
                    .collect::<rusqlite::Result<Vec<_>>>()
                    .context("failed to read latest rows")?;
                readings.reverse();
                Ok(readings)
            })
            .await;

        match result {
            Ok(rows) => rows,
            Err(err) => {
                self.degrade("seed query", &err);
                Vec::new()
            }
        }
    }

    /// Delete readings older than `now - max_age_secs`, at most once per
    /// cooldown. The cooldown is measured from the last attempt, not the last
    /// deletion, so a busy ingest cadence never turns into a full-table
    /// delete on every cycle. Returns rows deleted, 0 if skipped.
    pub async fn prune_if_due(&self, now: f64, max_age_secs: u64) -> usize {
        if !self.is_available() {
            return 0;
        }

        {
            let mut last = match self.last_prune.lock() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            if let Some(at) = *last {
                if at.elapsed() < self.prune_cooldown {
                    return 0;
                }
            }
            *last = Some(Instant::now());
        }

        let cutoff = now - max_age_secs as f64;
        let result = self
            .execute(move |conn| {
                conn.execute("DELETE FROM readings WHERE timestamp < ?1", params![cutoff])
                    .context("failed to prune old readings")
            })
            .await;

        match result {
            Ok(deleted) => {
                if deleted > 0 {
                    info!("Pruned {deleted} readings older than {max_age_secs}s");
                }
                deleted
            }
            Err(err) => {
                self.degrade("prune", &err);
                0
            }
        }
    }

    /// Total stored readings; 0 when unavailable.
    pub async fn count(&self) -> u64 {
        if !self.is_available() {
            return 0;
        }

        let result = self
            .execute(|conn| {
                conn.query_row("SELECT COUNT(*) FROM readings", [], |row| {
                    row.get::<_, i64>(0)
                })
                .context("failed to count readings")
            })
            .await;

        match result {
            Ok(count) => count.max(0) as u64,
            Err(err) => {
                self.degrade("count", &err);
                0
            }
        }
    }

    /// Delete every stored reading (history reset).
    pub async fn clear(&self) {
        if !self.is_available() {
            return;
        }

        let result = self
            .execute(|conn| {
                conn.execute("DELETE FROM readings", [])
                    .context("failed to clear readings")
            })
            .await;

        match result {
            Ok(deleted) => info!("Cleared {deleted} persisted readings"),
            Err(err) => self.degrade("clear", &err),
        }
    }

    /// Shut the worker down and mark the store unavailable. Idempotent; every
    /// operation after close behaves as unavailable.
    pub fn close(&self) {
        self.available.store(false, Ordering::SeqCst);
        if let Some(inner) = &self.inner {
            inner.shutdown();
        }
    }

    fn spawn_worker(db_path: &Path) -> Result<StoreInner> {
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).with_context(|| {
                    format!("failed to create database directory {}", parent.display())
                })?;
            }
        }

        let (command_tx, command_rx) = mpsc::channel::<StoreCommand>();
        let (ready_tx, ready_rx) = mpsc::channel();
        let path_for_thread = db_path.to_path_buf();

        let worker = thread::Builder::new()
            .name("stormsense-store".into())
            .spawn(move || {
                let mut conn = match Connection::open(&path_for_thread) {
                    Ok(connection) => connection,
                    Err(err) => {
                        let _ = ready_tx.send(Err(anyhow::Error::new(err)
                            .context("failed to open SQLite database")));
                        return;
                    }
                };

                if let Err(err) = conn.pragma_update(None, "journal_mode", "WAL") {
                    error!("Failed to enable WAL mode: {err}");
                }

                let init_result =
                    run_migrations(&mut conn).context("failed to run store migrations");
                let init_failed = init_result.is_err();
                if ready_tx.send(init_result).is_err() {
                    error!("Store initialization receiver dropped before ready signal");
                    return;
                }
                if init_failed {
                    return;
                }

                let existing: i64 = conn
                    .query_row("SELECT COUNT(*) FROM readings", [], |row| row.get(0))
                    .unwrap_or(0);
                info!(
                    "History store opened: {} ({existing} existing readings)",
                    path_for_thread.display()
                );

                while let Ok(command) = command_rx.recv() {
                    match command {
                        StoreCommand::Execute(task) => {
                            task(&mut conn);
                        }
                        StoreCommand::Shutdown => break,
                    }
                }

                info!("History store thread shutting down");
            })
            .context("failed to spawn store worker thread")?;

        ready_rx
            .recv()
            .context("store worker exited before signaling readiness")??;

        Ok(StoreInner {
            sender: command_tx,
            worker: Mutex::new(Some(worker)),
        })
    }

    async fn execute<F, T>(&self, task: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let inner = self
            .inner
            .as_ref()
            .ok_or_else(|| anyhow!("history store is not open"))?;

        let (reply_tx, reply_rx) = oneshot::channel();
        let command = StoreCommand::Execute(Box::new(move |conn| {
            let result = task(conn);
            if reply_tx.send(result).is_err() {
                error!("Store caller dropped before receiving result");
            }
        }));

        inner
            .sender
            .send(command)
            .map_err(|err| anyhow!("failed to send command to store thread: {err}"))?;

        reply_rx
            .await
            .map_err(|_| anyhow!("store thread terminated unexpectedly"))?
    }

    fn degrade(&self, what: &str, err: &anyhow::Error) {
        if self.available.swap(false, Ordering::SeqCst) {
            warn!("History store degraded to memory-only after failed {what}: {err:#}");
        }
    }
}

fn row_to_reading(row: &Row<'_>) -> rusqlite::Result<Reading> {
    let ordinal: i64 = row.get(5)?;
    Ok(Reading {
        timestamp: row.get(0)?,
        temperature: row.get(1)?,
        temperature_f: row.get(2)?,
        raw_temperature: row.get(3)?,
        pressure: row.get(4)?,
        storm_level: WeatherLevel::from_ordinal(ordinal).unwrap_or_default(),
    })
}
