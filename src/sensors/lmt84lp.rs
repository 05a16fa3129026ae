use super::traits::{ChannelSpec, Sensor};

pub const LMT84LP_DEFAULT_ADDRESS: u8 = 0x01;

/// 12-bit ADC over a 3.3 V reference.
pub const ADC_STEP_VOLTS: f64 = 3.3 / 4095.0;

// Output voltage falls as temperature rises: 1.299 V at -50 °C, 0.183 V at 150 °C.
const T_MIN: f64 = -50.0;
const T_MAX: f64 = 150.0;
const U_AT_T_MIN: f64 = 1.299;
const U_AT_T_MAX: f64 = 0.183;

const CHANNELS: [ChannelSpec; 1] = [ChannelSpec {
    name: "temperature",
    unit: "°C",
    register: 0x0001,
}];

/// Analog temperature sensor sampled by the slave's ADC.
#[derive(Debug, Clone)]
pub struct Lmt84lp {
    address: u8,
}

impl Lmt84lp {
    pub fn new(address: u8) -> Self {
        Self { address }
    }

    pub fn adc_to_celsius(adc_result: u16) -> f64 {
        let voltage = ADC_STEP_VOLTS * adc_result as f64;
        let temperature = (voltage - U_AT_T_MIN) / (U_AT_T_MAX - U_AT_T_MIN) * (T_MAX - T_MIN) + T_MIN;
        (temperature * 10.0).round() / 10.0
    }
}

impl Sensor for Lmt84lp {
    fn sensor_type(&self) -> &str {
        "LMT84LP"
    }

    fn address(&self) -> u8 {
        self.address
    }

    fn channels(&self) -> &[ChannelSpec] {
        &CHANNELS
    }

    fn convert(&self, _channel: usize, raw: u16) -> f64 {
        Self::adc_to_celsius(raw)
    }
}
