pub mod traits;
pub mod lmt84lp;
pub mod nsl19m51;
pub mod sgp30;
pub mod dht22;
pub mod factory;
pub mod registry;

pub use traits::{ChannelSpec, Sensor};
pub use lmt84lp::Lmt84lp;
pub use nsl19m51::Nsl19m51;
pub use sgp30::Sgp30;
pub use dht22::Dht22;
pub use factory::{parse_address, SensorFactory};
pub use registry::{series_key, SensorMetadata, SensorRegistry};
