use async_trait::async_trait;
use log::debug;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

use super::traits::{read_register, ChannelSpec, Sensor};
use crate::modbus::transport::Transport;
use crate::utils::error::ModbusError;

pub const DHT22_DEFAULT_ADDRESS: u8 = 0x06;

/// The DHT22 cannot be sampled more often than every 0.5 s.
pub const DHT22_COOLDOWN: Duration = Duration::from_millis(500);

pub const TEMPERATURE_CHANNEL: usize = 0;
pub const HUMIDITY_CHANNEL: usize = 1;

const CHANNELS: [ChannelSpec; 2] = [
    ChannelSpec {
        name: "temperature",
        unit: "°C",
        register: 0x0001,
    },
    ChannelSpec {
        name: "humidity",
        unit: "%RH",
        register: 0x0002,
    },
];

/// Temperature and humidity sensor, both channels in tenths.
pub struct Dht22 {
    address: u8,
    // Held for the whole read so the cooldown also holds across concurrent callers.
    last_read: Mutex<Option<Instant>>,
}

impl Dht22 {
    pub fn new(address: u8) -> Self {
        Self {
            address,
            last_read: Mutex::new(None),
        }
    }

    pub fn raw_to_value(raw: u16) -> f64 {
        raw as f64 / 10.0
    }
}

#[async_trait]
impl Sensor for Dht22 {
    fn sensor_type(&self) -> &str {
        "DHT22"
    }

    fn address(&self) -> u8 {
        self.address
    }

    fn channels(&self) -> &[ChannelSpec] {
        &CHANNELS
    }

    fn convert(&self, _channel: usize, raw: u16) -> f64 {
        Self::raw_to_value(raw)
    }

    async fn read(&self, transport: &Arc<Transport>, channel: usize) -> Result<f64, ModbusError> {
        let spec = self.channel_spec(channel)?;
        let mut last_read = self.last_read.lock().await;

        if let Some(previous) = *last_read {
            let elapsed = previous.elapsed();
            if elapsed < DHT22_COOLDOWN {
                let remaining = DHT22_COOLDOWN - elapsed;
                debug!("⏳ DHT22@0x{:02X} cooling down for {} ms", self.address, remaining.as_millis());
                tokio::time::sleep(remaining).await;
            }
        }

        let result = read_register(transport, self.address, spec.register).await;
        // Any attempt counts, failed ones included.
        *last_read = Some(Instant::now());

        Ok(self.convert(channel, result?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::FakeBus;

    #[test]
    fn test_tenths_conversion() {
        assert_eq!(Dht22::raw_to_value(235), 23.5);
        assert_eq!(Dht22::raw_to_value(0), 0.0);
        assert_eq!(Dht22::raw_to_value(1000), 100.0);
    }

    #[tokio::test]
    async fn test_reads_temperature_and_humidity() {
        let bus = FakeBus::new();
        bus.set_register(DHT22_DEFAULT_ADDRESS, 0x0001, 215);
        bus.set_register(DHT22_DEFAULT_ADDRESS, 0x0002, 456);
        let transport = bus.transport();

        let sensor = Dht22::new(DHT22_DEFAULT_ADDRESS);
        assert_eq!(sensor.read(&transport, TEMPERATURE_CHANNEL).await.unwrap(), 21.5);
        assert_eq!(sensor.read(&transport, HUMIDITY_CHANNEL).await.unwrap(), 45.6);
    }

    #[tokio::test]
    async fn test_cooldown_delays_second_exchange() {
        let bus = FakeBus::new();
        bus.set_register(DHT22_DEFAULT_ADDRESS, 0x0001, 215);
        bus.set_register(DHT22_DEFAULT_ADDRESS, 0x0002, 456);
        let transport = bus.transport();

        let sensor = Dht22::new(DHT22_DEFAULT_ADDRESS);
        let started = Instant::now();
        sensor.read(&transport, TEMPERATURE_CHANNEL).await.unwrap();
        sensor.read(&transport, HUMIDITY_CHANNEL).await.unwrap();
        assert!(started.elapsed() >= DHT22_COOLDOWN);

        let times = bus.request_times();
        assert_eq!(times.len(), 2);
        assert!(times[1].duration_since(times[0]) >= DHT22_COOLDOWN);
    }

    #[tokio::test]
    async fn test_failed_read_still_starts_cooldown() {
        let bus = FakeBus::new();
        bus.set_register(DHT22_DEFAULT_ADDRESS, 0x0001, 215);
        bus.fail_next_write();
        let transport = bus.transport();

        let sensor = Dht22::new(DHT22_DEFAULT_ADDRESS);
        let started = Instant::now();
        assert!(matches!(
            sensor.read(&transport, TEMPERATURE_CHANNEL).await,
            Err(ModbusError::CommunicationError(_))
        ));
        assert_eq!(sensor.read(&transport, TEMPERATURE_CHANNEL).await.unwrap(), 21.5);
        assert!(started.elapsed() >= DHT22_COOLDOWN);
    }

    #[tokio::test]
    async fn test_invalid_channel_does_not_touch_bus() {
        let bus = FakeBus::new();
        let transport = bus.transport();

        let sensor = Dht22::new(DHT22_DEFAULT_ADDRESS);
        assert!(matches!(
            sensor.read(&transport, 2).await,
            Err(ModbusError::InvalidChannel { channel: 2, .. })
        ));
        assert!(bus.requests().is_empty());
    }
}
