use std::collections::BTreeMap;

use super::dht22::Dht22;
use super::lmt84lp::Lmt84lp;
use super::nsl19m51::Nsl19m51;
use super::sgp30::Sgp30;
use super::traits::Sensor;
use crate::modbus::protocol::{MAX_SLAVE_ADDRESS, MIN_SLAVE_ADDRESS};
use crate::utils::error::ModbusError;

pub type SensorConstructor = fn(u8) -> Box<dyn Sensor>;

/// Type name to driver constructor. Lookups are case-sensitive.
#[derive(Clone)]
pub struct SensorFactory {
    constructors: BTreeMap<&'static str, SensorConstructor>,
}

impl Default for SensorFactory {
    fn default() -> Self {
        let mut factory = Self::empty();
        factory.register_type("LMT84LP", |address| Box::new(Lmt84lp::new(address)));
        factory.register_type("NSL19M51", |address| Box::new(Nsl19m51::new(address)));
        factory.register_type("SGP30", |address| Box::new(Sgp30::new(address)));
        factory.register_type("DHT22", |address| Box::new(Dht22::new(address)));
        factory
    }
}

impl SensorFactory {
    pub fn empty() -> Self {
        Self {
            constructors: BTreeMap::new(),
        }
    }

    pub fn register_type(&mut self, type_name: &'static str, constructor: SensorConstructor) {
        self.constructors.insert(type_name, constructor);
    }

    pub fn create(&self, type_name: &str, address: u8) -> Result<Box<dyn Sensor>, ModbusError> {
        let constructor = self
            .constructors
            .get(type_name)
            .ok_or_else(|| ModbusError::UnknownSensorType(type_name.to_string()))?;
        Ok(constructor(address))
    }

    pub fn type_names(&self) -> Vec<&'static str> {
        self.constructors.keys().copied().collect()
    }
}

/// Parses a slave address given as decimal ("5") or hex ("0x05").
pub fn parse_address(text: &str) -> Result<u8, ModbusError> {
    let trimmed = text.trim();
    let parsed = match trimmed.strip_prefix("0x").or_else(|| trimmed.strip_prefix("0X")) {
        Some(hex_digits) => u32::from_str_radix(hex_digits, 16),
        None => trimmed.parse::<u32>(),
    };

    match parsed {
        Ok(value) if (MIN_SLAVE_ADDRESS as u32..=MAX_SLAVE_ADDRESS as u32).contains(&value) => Ok(value as u8),
        _ => Err(ModbusError::InvalidAddress(text.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_creates_known_types() {
        let factory = SensorFactory::default();
        let sensor = factory.create("SGP30", 5).unwrap();
        assert_eq!(sensor.sensor_type(), "SGP30");
        assert_eq!(sensor.address(), 5);
        assert_eq!(factory.type_names(), vec!["DHT22", "LMT84LP", "NSL19M51", "SGP30"]);
    }

    #[test]
    fn test_type_lookup_is_case_sensitive() {
        let factory = SensorFactory::default();
        assert!(matches!(factory.create("sgp30", 5), Err(ModbusError::UnknownSensorType(_))));
        assert!(matches!(factory.create("BME280", 5), Err(ModbusError::UnknownSensorType(_))));
    }

    #[test]
    fn test_parse_address_forms() {
        assert_eq!(parse_address("5").unwrap(), 5);
        assert_eq!(parse_address("0x05").unwrap(), 5);
        assert_eq!(parse_address("0XF7").unwrap(), 247);
        assert_eq!(parse_address(" 12 ").unwrap(), 12);
    }

    #[test]
    fn test_parse_address_rejects_garbage_and_range() {
        for text in ["", "0", "248", "0x00", "0xF8", "0x", "five", "-1", "0x1G", "99999999999"] {
            assert!(
                matches!(parse_address(text), Err(ModbusError::InvalidAddress(_))),
                "accepted {:?}",
                text
            );
        }
    }
}
