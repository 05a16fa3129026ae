pub mod crc;
pub mod protocol;
pub mod transport;

pub use crc::crc16_modbus;
pub use protocol::{build_read_request, decode_register, ReadInputRequest};
pub use transport::{SerialLink, Transport, TransportSettings};
