use log::{info, warn};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use super::factory::{parse_address, SensorFactory};
use super::traits::Sensor;
use crate::modbus::transport::Transport;
use crate::utils::error::ModbusError;

/// Value reported by [`SensorRegistry::read`] when a read fails.
pub const FALLBACK_VALUE: f64 = 0.0;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChannelMetadata {
    pub index: usize,
    pub name: String,
    pub unit: String,
    pub series_key: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SensorMetadata {
    pub name: String,
    pub sensor_type: String,
    pub address: u8,
    pub channel_count: usize,
    pub channels: Vec<ChannelMetadata>,
}

/// Store key of a channel: the bare sensor name for single-channel sensors,
/// `name_channel` otherwise.
pub fn series_key(name: &str, channel: usize, channel_count: usize) -> String {
    if channel_count > 1 {
        format!("{}_{}", name, channel)
    } else {
        name.to_string()
    }
}

/// Named sensors sharing one transport.
pub struct SensorRegistry {
    transport: Arc<Transport>,
    factory: SensorFactory,
    sensors: RwLock<BTreeMap<String, Arc<dyn Sensor>>>,
    failed_reads: AtomicU64,
}

impl SensorRegistry {
    pub fn new(transport: Arc<Transport>) -> Self {
        Self::with_factory(transport, SensorFactory::default())
    }

    pub fn with_factory(transport: Arc<Transport>, factory: SensorFactory) -> Self {
        Self {
            transport,
            factory,
            sensors: RwLock::new(BTreeMap::new()),
            failed_reads: AtomicU64::new(0),
        }
    }

    pub fn transport(&self) -> &Arc<Transport> {
        &self.transport
    }

    pub fn factory(&self) -> &SensorFactory {
        &self.factory
    }

    /// Fails with `DuplicateName` without touching the existing entry.
    pub fn register(&self, name: &str, sensor: Box<dyn Sensor>) -> Result<(), ModbusError> {
        let mut sensors = self.sensors.write().map_err(|_| ModbusError::LockError)?;
        if sensors.contains_key(name) {
            warn!("⚠️  Sensor name '{}' is already registered", name);
            return Err(ModbusError::DuplicateName(name.to_string()));
        }

        info!(
            "📋 Registered sensor '{}' [{}] at address 0x{:02X}",
            name,
            sensor.sensor_type(),
            sensor.address()
        );
        sensors.insert(name.to_string(), Arc::from(sensor));
        Ok(())
    }

    /// Factory lookup, address parsing and registration in one step.
    pub fn add_sensor(&self, sensor_type: &str, name: &str, address: &str) -> Result<SensorMetadata, ModbusError> {
        let address = parse_address(address)?;
        let sensor = self.factory.create(sensor_type, address)?;
        let metadata = describe(name, sensor.as_ref());
        self.register(name, sensor)?;
        Ok(metadata)
    }

    pub fn get(&self, name: &str) -> Result<Arc<dyn Sensor>, ModbusError> {
        let sensors = self.sensors.read().map_err(|_| ModbusError::LockError)?;
        sensors
            .get(name)
            .cloned()
            .ok_or_else(|| ModbusError::UnknownSensor(name.to_string()))
    }

    pub async fn try_read(&self, name: &str, channel: usize) -> Result<f64, ModbusError> {
        let sensor = self.get(name)?;
        if channel >= sensor.channel_count() {
            return Err(ModbusError::InvalidChannel {
                sensor: name.to_string(),
                channel,
            });
        }
        sensor.read(&self.transport, channel).await
    }

    /// Best-effort read: failures are logged and counted, and the value
    /// defaults to [`FALLBACK_VALUE`] so polling keeps moving.
    pub async fn read(&self, name: &str, channel: usize) -> f64 {
        match self.try_read(name, channel).await {
            Ok(value) => value,
            Err(e) => self.record_failure(name, channel, &e),
        }
    }

    /// Logs and counts a failed read, returning the fallback value.
    pub fn record_failure(&self, name: &str, channel: usize, error: &ModbusError) -> f64 {
        self.failed_reads.fetch_add(1, Ordering::Relaxed);
        warn!(
            "⚠️  Read of '{}' channel {} failed ({}), reporting {}",
            name, channel, error, FALLBACK_VALUE
        );
        FALLBACK_VALUE
    }

    pub fn failed_reads(&self) -> u64 {
        self.failed_reads.load(Ordering::Relaxed)
    }

    /// Point-in-time list of registered sensors, in name order.
    pub fn snapshot(&self) -> Vec<(String, Arc<dyn Sensor>)> {
        match self.sensors.read() {
            Ok(sensors) => sensors
                .iter()
                .map(|(name, sensor)| (name.clone(), Arc::clone(sensor)))
                .collect(),
            Err(_) => Vec::new(),
        }
    }

    pub fn metadata(&self) -> Vec<SensorMetadata> {
        self.snapshot()
            .iter()
            .map(|(name, sensor)| describe(name, sensor.as_ref()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.sensors.read().map(|sensors| sensors.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn describe(name: &str, sensor: &dyn Sensor) -> SensorMetadata {
    let channel_count = sensor.channel_count();
    let channels = sensor
        .channels()
        .iter()
        .enumerate()
        .map(|(index, spec)| ChannelMetadata {
            index,
            name: spec.name.to_string(),
            unit: spec.unit.to_string(),
            series_key: series_key(name, index, channel_count),
        })
        .collect();

    SensorMetadata {
        name: name.to_string(),
        sensor_type: sensor.sensor_type().to_string(),
        address: sensor.address(),
        channel_count,
        channels,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sensors::sgp30::Sgp30;
    use crate::test_support::FakeBus;

    fn registry_on(bus: &FakeBus) -> SensorRegistry {
        SensorRegistry::new(bus.transport())
    }

    #[test]
    fn test_duplicate_name_leaves_first_registration() {
        let bus = FakeBus::new();
        let registry = registry_on(&bus);

        registry.register("air1", Box::new(Sgp30::new(5))).unwrap();
        let second = registry.add_sensor("DHT22", "air1", "0x06");
        assert!(matches!(second, Err(ModbusError::DuplicateName(ref name)) if name == "air1"));

        let sensor = registry.get("air1").unwrap();
        assert_eq!(sensor.sensor_type(), "SGP30");
        assert_eq!(sensor.address(), 5);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_add_sensor_validation_errors_are_distinct() {
        let bus = FakeBus::new();
        let registry = registry_on(&bus);

        assert!(matches!(
            registry.add_sensor("BME280", "x", "5"),
            Err(ModbusError::UnknownSensorType(_))
        ));
        assert!(matches!(
            registry.add_sensor("SGP30", "x", "0x1FF"),
            Err(ModbusError::InvalidAddress(_))
        ));
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn test_read_builds_frame_and_decodes_co2() {
        let bus = FakeBus::new();
        bus.set_register(5, 0x0001, 612);
        let registry = registry_on(&bus);
        registry.add_sensor("SGP30", "air1", "5").unwrap();

        assert_eq!(registry.try_read("air1", 0).await.unwrap(), 612.0);
        assert_eq!(bus.requests(), vec![vec![0x05, 0x04, 0x00, 0x01, 0x00, 0x01, 0x61, 0x8E]]);
    }

    #[tokio::test]
    async fn test_unknown_sensor() {
        let bus = FakeBus::new();
        let registry = registry_on(&bus);
        assert!(matches!(
            registry.try_read("ghost", 0).await,
            Err(ModbusError::UnknownSensor(_))
        ));
    }

    #[tokio::test]
    async fn test_best_effort_read_falls_back_and_counts() {
        let bus = FakeBus::new();
        bus.silence(5);
        let registry = registry_on(&bus);
        registry.add_sensor("SGP30", "air1", "0x05").unwrap();

        assert_eq!(registry.read("air1", 1).await, FALLBACK_VALUE);
        assert_eq!(registry.read("missing", 0).await, FALLBACK_VALUE);
        assert_eq!(registry.failed_reads(), 2);
    }

    #[test]
    fn test_metadata_and_series_keys() {
        let bus = FakeBus::new();
        let registry = registry_on(&bus);
        registry.add_sensor("SGP30", "air1", "0x05").unwrap();
        registry.add_sensor("LMT84LP", "temp1", "1").unwrap();

        let metadata = registry.metadata();
        assert_eq!(metadata.len(), 2);

        let air = &metadata[0];
        assert_eq!(air.name, "air1");
        assert_eq!(air.sensor_type, "SGP30");
        assert_eq!(air.channel_count, 2);
        assert_eq!(air.channels[1].unit, "ppb");
        assert_eq!(air.channels[1].series_key, "air1_1");

        let temp = &metadata[1];
        assert_eq!(temp.address, 1);
        assert_eq!(temp.channels[0].series_key, "temp1");
    }
}
