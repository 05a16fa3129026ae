use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::sync::Notify;
use tokio::time::sleep;

use crate::sensors::registry::{series_key, SensorRegistry};
use crate::storage::DataStore;
use crate::utils::error::ModbusError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CollectorState {
    Idle,
    Running,
}

#[derive(Debug, Clone, Serialize)]
pub struct CollectorStatus {
    pub state: CollectorState,
    pub started_at: Option<DateTime<Utc>>,
    pub iterations: u64,
    pub last_cycle_failures: usize,
    pub interval_ms: u64,
}

/// Periodically reads every channel of every registered sensor into the store.
pub struct Collector {
    registry: Arc<SensorRegistry>,
    store: Arc<DataStore>,
    interval: Duration,
    running: AtomicBool,
    stop_requested: AtomicBool,
    wake: Notify,
    iterations: AtomicU64,
    last_cycle_failures: AtomicUsize,
    started_at: Mutex<Option<DateTime<Utc>>>,
}

impl Collector {
    pub fn new(registry: Arc<SensorRegistry>, store: Arc<DataStore>, interval: Duration) -> Self {
        Self {
            registry,
            store,
            interval,
            running: AtomicBool::new(false),
            stop_requested: AtomicBool::new(false),
            wake: Notify::new(),
            iterations: AtomicU64::new(0),
            last_cycle_failures: AtomicUsize::new(0),
            started_at: Mutex::new(None),
        }
    }

    pub fn state(&self) -> CollectorState {
        if self.running.load(Ordering::SeqCst) {
            CollectorState::Running
        } else {
            CollectorState::Idle
        }
    }

    /// Runs the polling loop on the caller's task until [`Collector::stop`].
    ///
    /// Fails with `CollectorRunning` if a loop is already active. A stop
    /// requested before the loop got going is honoured; the request is
    /// consumed when the loop exits.
    pub async fn start(&self) -> Result<(), ModbusError> {
        if self
            .running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            warn!("⚠️  Collector start requested while already running");
            return Err(ModbusError::CollectorRunning);
        }

        if let Ok(mut started_at) = self.started_at.lock() {
            *started_at = Some(Utc::now());
        }
        info!(
            "🚀 Collector started: {} sensors, {} ms interval",
            self.registry.len(),
            self.interval.as_millis()
        );

        let origin = Instant::now();
        loop {
            if self.stop_requested.load(Ordering::SeqCst) {
                break;
            }

            let timestamp = origin.elapsed().as_secs_f64();
            self.run_once(timestamp).await;

            if self.stop_requested.load(Ordering::SeqCst) {
                break;
            }
            tokio::select! {
                _ = sleep(self.interval) => {}
                _ = self.wake.notified() => {
                    debug!("Collector sleep interrupted");
                }
            }
        }

        self.stop_requested.store(false, Ordering::SeqCst);
        self.running.store(false, Ordering::SeqCst);
        info!(
            "🛑 Collector stopped after {} iterations",
            self.iterations.load(Ordering::SeqCst)
        );
        Ok(())
    }

    /// Prevents the next iteration; an in-flight read completes.
    pub fn stop(&self) {
        info!("🛑 Collector stop requested");
        self.stop_requested.store(true, Ordering::SeqCst);
        self.wake.notify_waiters();
    }

    /// One polling cycle over the current registry contents. Returns the
    /// number of failed reads, each stored as the fallback value.
    pub async fn run_once(&self, timestamp: f64) -> usize {
        let mut failures = 0;

        for (name, sensor) in self.registry.snapshot() {
            let channel_count = sensor.channel_count();
            for channel in 0..channel_count {
                let value = match sensor.read(self.registry.transport(), channel).await {
                    Ok(value) => value,
                    Err(e) => {
                        failures += 1;
                        self.registry.record_failure(&name, channel, &e)
                    }
                };
                self.store.append(&series_key(&name, channel, channel_count), timestamp, value);
            }
        }

        self.iterations.fetch_add(1, Ordering::SeqCst);
        self.last_cycle_failures.store(failures, Ordering::SeqCst);
        if failures > 0 {
            warn!("📊 Polling cycle at {:.1}s finished with {} failed reads", timestamp, failures);
        } else {
            debug!("📊 Polling cycle at {:.1}s complete", timestamp);
        }
        failures
    }

    pub fn status(&self) -> CollectorStatus {
        CollectorStatus {
            state: self.state(),
            started_at: self.started_at.lock().ok().and_then(|started_at| *started_at),
            iterations: self.iterations.load(Ordering::SeqCst),
            last_cycle_failures: self.last_cycle_failures.load(Ordering::SeqCst),
            interval_ms: self.interval.as_millis() as u64,
        }
    }
}
