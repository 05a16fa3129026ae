use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;

use crate::modbus::protocol::{build_read_request, decode_register, RESPONSE_LEN};
use crate::modbus::transport::Transport;
use crate::utils::error::ModbusError;

/// Static description of one measured quantity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ChannelSpec {
    pub name: &'static str,
    pub unit: &'static str,
    pub register: u16,
}

#[async_trait]
pub trait Sensor: Send + Sync {
    /// Factory type name, e.g. "SGP30".
    fn sensor_type(&self) -> &str;
    fn address(&self) -> u8;
    fn channels(&self) -> &[ChannelSpec];

    /// Raw register value to physical units.
    fn convert(&self, channel: usize, raw: u16) -> f64;

    fn channel_count(&self) -> usize {
        self.channels().len()
    }

    fn unit(&self, channel: usize) -> Option<&str> {
        self.channels().get(channel).map(|spec| spec.unit)
    }

    fn channel_name(&self, channel: usize) -> Option<&str> {
        self.channels().get(channel).map(|spec| spec.name)
    }

    fn channel_spec(&self, channel: usize) -> Result<ChannelSpec, ModbusError> {
        self.channels().get(channel).copied().ok_or_else(|| ModbusError::InvalidChannel {
            sensor: format!("{}@0x{:02X}", self.sensor_type(), self.address()),
            channel,
        })
    }

    async fn read(&self, transport: &Arc<Transport>, channel: usize) -> Result<f64, ModbusError> {
        let spec = self.channel_spec(channel)?;
        let raw = read_register(transport, self.address(), spec.register).await?;
        Ok(self.convert(channel, raw))
    }
}

/// One read-input-registers exchange for a single register.
///
/// The exchange blocks for up to the port timeout, so it runs on the
/// blocking pool instead of the async worker.
pub async fn read_register(transport: &Arc<Transport>, address: u8, register: u16) -> Result<u16, ModbusError> {
    let frame = build_read_request(address, register, 1)?;
    let transport = Arc::clone(transport);
    let response = tokio::task::spawn_blocking(move || transport.exchange(&frame, RESPONSE_LEN))
        .await
        .map_err(|e| ModbusError::CommunicationError(format!("Exchange task failed: {}", e)))??;
    decode_register(&response)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modbus::transport::TransportSettings;
    use std::time::{Duration, Instant};

    #[tokio::test]
    async fn test_slow_exchange_leaves_async_worker_free() {
        let transport = Arc::new(Transport::with_opener(
            TransportSettings::new("slow", 9600, Duration::from_millis(10)),
            |_| {
                std::thread::sleep(Duration::from_millis(300));
                Err(ModbusError::ConnectionError("unplugged".to_string()))
            },
        ));

        let reader = {
            let transport = Arc::clone(&transport);
            tokio::spawn(async move { read_register(&transport, 0x05, 0x0001).await })
        };

        let started = Instant::now();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(started.elapsed() < Duration::from_millis(200));
        assert!(!reader.is_finished());

        assert!(matches!(reader.await.unwrap(), Err(ModbusError::ConnectionError(_))));
    }
}
