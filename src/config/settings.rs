use clap::ArgMatches;
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::utils::error::ModbusError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    // Connection settings
    pub serial_port: String,
    pub baud_rate: u32,
    pub timeout_ms: u64,

    // Collector settings
    pub poll_interval_ms: u64,

    // Sensors registered at startup
    pub sensors: Vec<SensorConfig>,

    pub api: ApiConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorConfig {
    pub sensor_type: String,
    pub name: String,
    /// Decimal ("5") or hex ("0x05").
    pub address: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub enabled: bool,
    pub bind_address: String,
    pub port: u16,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            bind_address: "127.0.0.1".to_string(),
            port: 5000,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            serial_port: "/dev/ttyUSB0".to_string(),
            baud_rate: 9600,
            timeout_ms: 100,
            poll_interval_ms: 10_000,
            sensors: vec![
                SensorConfig {
                    sensor_type: "SGP30".to_string(),
                    name: "air1".to_string(),
                    address: "0x05".to_string(),
                },
                SensorConfig {
                    sensor_type: "DHT22".to_string(),
                    name: "climate1".to_string(),
                    address: "0x06".to_string(),
                },
            ],
            api: ApiConfig::default(),
        }
    }
}

impl Config {
    /// File (when `--config` is given) or defaults, then CLI overrides.
    pub fn from_matches(matches: &ArgMatches) -> Result<Self, ModbusError> {
        let mut config = match matches.get_one::<String>("config") {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };

        if let Some(port) = matches.get_one::<String>("port") {
            config.serial_port = port.clone();
        }
        if let Some(baud) = matches.get_one::<String>("baud") {
            config.baud_rate = parse_flag("baud", baud)?;
        }
        if let Some(interval) = matches.get_one::<String>("interval-ms") {
            config.poll_interval_ms = parse_flag("interval-ms", interval)?;
        }
        if let Some(timeout) = matches.get_one::<String>("timeout-ms") {
            config.timeout_ms = parse_flag("timeout-ms", timeout)?;
        }

        config.validate()?;
        debug!("Effective configuration: {:?}", config);
        Ok(config)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ModbusError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| ModbusError::ConfigError(format!("Cannot read {}: {}", path.display(), e)))?;
        let config: Config = toml::from_str(&content)?;
        info!("📄 Loaded configuration from {}", path.display());
        Ok(config)
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ModbusError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| ModbusError::ConfigError(format!("Cannot create {}: {}", parent.display(), e)))?;
            }
        }

        let content =
            toml::to_string_pretty(self).map_err(|e| ModbusError::SerializationError(format!("TOML error: {}", e)))?;
        std::fs::write(path, content)
            .map_err(|e| ModbusError::ConfigError(format!("Cannot write {}: {}", path.display(), e)))?;
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ModbusError> {
        if self.baud_rate == 0 {
            return Err(ModbusError::ConfigError("baud_rate must be greater than 0".to_string()));
        }
        if self.timeout_ms == 0 {
            return Err(ModbusError::ConfigError("timeout_ms must be greater than 0".to_string()));
        }
        if self.poll_interval_ms == 0 {
            return Err(ModbusError::ConfigError("poll_interval_ms must be greater than 0".to_string()));
        }
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

fn parse_flag<T: std::str::FromStr>(flag: &str, value: &str) -> Result<T, ModbusError> {
    value
        .parse()
        .map_err(|_| ModbusError::ConfigError(format!("Invalid value for --{}: {}", flag, value)))
}
