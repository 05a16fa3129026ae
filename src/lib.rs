//! Environmental sensor master for a shared Modbus RTU bus
//!
//! Polls LMT84LP, NSL19M51, SGP30 and DHT22 slaves with read-input-registers
//! requests over one half-duplex serial line, keeps the readings as in-memory
//! time series and serves them over a small JSON HTTP API.

pub mod config;
pub mod modbus;
pub mod sensors;
pub mod services;
pub mod storage;
pub mod utils;
pub mod cli;

#[cfg(test)]
pub(crate) mod test_support;

// Re-export commonly used types
pub use config::Config;
pub use modbus::{crc16_modbus, Transport};
pub use sensors::{Sensor, SensorFactory, SensorRegistry};
pub use services::{Collector, CollectorState};
pub use storage::DataStore;
pub use utils::error::ModbusError;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
