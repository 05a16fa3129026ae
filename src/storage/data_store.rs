use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard, PoisonError};

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Reading {
    /// Seconds since collection started.
    pub timestamp: f64,
    pub value: f64,
}

/// Column layout of one series as served at `/data`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Series {
    pub times: Vec<f64>,
    pub values: Vec<f64>,
}

/// Append-only in-memory time series keyed by series key.
///
/// A reading is pushed as one value under the lock, so a dump never sees a
/// timestamp without its value.
#[derive(Debug, Default)]
pub struct DataStore {
    series: Mutex<HashMap<String, Vec<Reading>>>,
}

impl DataStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&self, key: &str, timestamp: f64, value: f64) {
        let mut series = self.lock();
        series
            .entry(key.to_string())
            .or_default()
            .push(Reading { timestamp, value });
    }

    pub fn dump(&self) -> BTreeMap<String, Series> {
        let series = self.lock();
        series
            .iter()
            .map(|(key, readings)| {
                let column = Series {
                    times: readings.iter().map(|r| r.timestamp).collect(),
                    values: readings.iter().map(|r| r.value).collect(),
                };
                (key.clone(), column)
            })
            .collect()
    }

    pub fn readings(&self, key: &str) -> Vec<Reading> {
        self.lock().get(key).cloned().unwrap_or_default()
    }

    pub fn len(&self, key: &str) -> usize {
        self.lock().get(key).map(Vec::len).unwrap_or(0)
    }

    pub fn total_readings(&self) -> usize {
        self.lock().values().map(Vec::len).sum()
    }

    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.lock().keys().cloned().collect();
        keys.sort();
        keys
    }

    // Readings are complete values once pushed, so a poisoned map is still consistent.
    fn lock(&self) -> MutexGuard<'_, HashMap<String, Vec<Reading>>> {
        self.series.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
