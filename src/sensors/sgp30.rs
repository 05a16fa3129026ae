use super::traits::{ChannelSpec, Sensor};

pub const SGP30_DEFAULT_ADDRESS: u8 = 0x05;

pub const CO2_CHANNEL: usize = 0;
pub const VOC_CHANNEL: usize = 1;

const CHANNELS: [ChannelSpec; 2] = [
    ChannelSpec {
        name: "co2",
        unit: "ppm",
        register: 0x0001,
    },
    ChannelSpec {
        name: "voc",
        unit: "ppb",
        register: 0x0002,
    },
];

/// Air quality sensor; the slave forwards the raw 16-bit readings unscaled.
#[derive(Debug, Clone)]
pub struct Sgp30 {
    address: u8,
}

impl Sgp30 {
    pub fn new(address: u8) -> Self {
        Self { address }
    }
}

impl Sensor for Sgp30 {
    fn sensor_type(&self) -> &str {
        "SGP30"
    }

    fn address(&self) -> u8 {
        self.address
    }

    fn channels(&self) -> &[ChannelSpec] {
        &CHANNELS
    }

    fn convert(&self, _channel: usize, raw: u16) -> f64 {
        raw as f64
    }
}
