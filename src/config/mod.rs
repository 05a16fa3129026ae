pub mod settings;

pub use settings::{ApiConfig, Config, SensorConfig};
