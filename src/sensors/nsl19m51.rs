use super::lmt84lp::ADC_STEP_VOLTS;
use super::traits::{ChannelSpec, Sensor};

pub const NSL19M51_DEFAULT_ADDRESS: u8 = 0x04;

// Empirical fit of the photoresistor divider: lux = A * e^(B * V).
const LUX_SCALE: f64 = 1.9634;
const LUX_EXPONENT: f64 = 2.1281;

const CHANNELS: [ChannelSpec; 1] = [ChannelSpec {
    name: "illuminance",
    unit: "lux",
    register: 0x0001,
}];

#[derive(Debug, Clone)]
pub struct Nsl19m51 {
    address: u8,
}

impl Nsl19m51 {
    pub fn new(address: u8) -> Self {
        Self { address }
    }

    pub fn adc_to_lux(adc_result: u16) -> f64 {
        let voltage = ADC_STEP_VOLTS * adc_result as f64;
        LUX_SCALE * (LUX_EXPONENT * voltage).exp()
    }
}

impl Sensor for Nsl19m51 {
    fn sensor_type(&self) -> &str {
        "NSL19M51"
    }

    fn address(&self) -> u8 {
        self.address
    }

    fn channels(&self) -> &[ChannelSpec] {
        &CHANNELS
    }

    fn convert(&self, _channel: usize, raw: u16) -> f64 {
        Self::adc_to_lux(raw)
    }
}
