use log::debug;

use super::crc::append_crc;
use crate::utils::error::ModbusError;

/// The only function code this master issues.
pub const READ_INPUT_REGISTERS: u8 = 0x04;

/// Single-register read responses: address, function, byte count, data hi/lo, CRC lo/hi.
pub const RESPONSE_LEN: usize = 7;

/// Enough bytes to reach both data bytes at offsets 3 and 4.
pub const MIN_USABLE_RESPONSE_LEN: usize = 5;

pub const MIN_SLAVE_ADDRESS: u8 = 1;
pub const MAX_SLAVE_ADDRESS: u8 = 247;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadInputRequest {
    pub address: u8,
    pub register: u16,
    pub count: u16,
}

impl ReadInputRequest {
    pub fn new(address: u8, register: u16, count: u16) -> Result<Self, ModbusError> {
        if !(MIN_SLAVE_ADDRESS..=MAX_SLAVE_ADDRESS).contains(&address) {
            return Err(ModbusError::InvalidFrame(format!(
                "slave address {} outside {}..={}",
                address, MIN_SLAVE_ADDRESS, MAX_SLAVE_ADDRESS
            )));
        }
        if count == 0 {
            return Err(ModbusError::InvalidFrame("register count must be at least 1".to_string()));
        }
        Ok(Self { address, register, count })
    }

    /// `[address, 0x04, reg_hi, reg_lo, count_hi, count_lo, crc_lo, crc_hi]`
    pub fn to_frame(&self) -> Vec<u8> {
        let mut frame = Vec::with_capacity(8);
        frame.push(self.address);
        frame.push(READ_INPUT_REGISTERS);
        frame.extend_from_slice(&self.register.to_be_bytes());
        frame.extend_from_slice(&self.count.to_be_bytes());
        append_crc(&mut frame);
        frame
    }
}

pub fn build_read_request(address: u8, register: u16, count: u16) -> Result<Vec<u8>, ModbusError> {
    Ok(ReadInputRequest::new(address, register, count)?.to_frame())
}

/// Extracts the big-endian register value at offsets 3..5.
///
/// The response CRC is not checked here; only the length is.
pub fn decode_register(response: &[u8]) -> Result<u16, ModbusError> {
    if response.len() < MIN_USABLE_RESPONSE_LEN {
        debug!("Short response: [{}]", hex::encode(response));
        return Err(ModbusError::IncompleteFrame {
            expected: RESPONSE_LEN,
            received: response.len(),
        });
    }
    Ok(u16::from_be_bytes([response[3], response[4]]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modbus::crc::crc16_modbus;

    #[test]
    fn test_build_sgp30_co2_request() {
        let frame = build_read_request(0x05, 0x0001, 1).unwrap();
        assert_eq!(frame, vec![0x05, 0x04, 0x00, 0x01, 0x00, 0x01, 0x61, 0x8E]);
    }

    #[test]
    fn test_frame_trailer_matches_crc_of_header() {
        for &address in &[1u8, 5, 6, 100, 247] {
            for &register in &[0u16, 1, 2, 0x00FF, 0x1234, 0xFFFF] {
                let frame = build_read_request(address, register, 1).unwrap();
                assert_eq!(frame.len(), 8);
                let crc = crc16_modbus(&frame[..6]);
                assert_eq!(frame[6], (crc & 0xFF) as u8);
                assert_eq!(frame[7], (crc >> 8) as u8);
            }
        }
    }

    #[test]
    fn test_larger_counts_are_encoded() {
        let frame = build_read_request(0x01, 0x0010, 0x0102).unwrap();
        assert_eq!(&frame[..6], &[0x01, 0x04, 0x00, 0x10, 0x01, 0x02]);
    }

    #[test]
    fn test_rejects_invalid_address_and_count() {
        assert!(matches!(build_read_request(0, 1, 1), Err(ModbusError::InvalidFrame(_))));
        assert!(matches!(build_read_request(248, 1, 1), Err(ModbusError::InvalidFrame(_))));
        assert!(matches!(build_read_request(1, 1, 0), Err(ModbusError::InvalidFrame(_))));
    }

    #[test]
    fn test_decode_register_value() {
        let response = [0x05, 0x04, 0x02, 0x01, 0xA4, 0x48, 0xDB];
        assert_eq!(decode_register(&response).unwrap(), 0x01A4);
        // Five bytes still reach the data.
        assert_eq!(decode_register(&response[..5]).unwrap(), 0x01A4);
    }

    #[test]
    fn test_decode_short_response_is_incomplete() {
        match decode_register(&[0x05, 0x04, 0x02, 0x01]) {
            Err(ModbusError::IncompleteFrame { expected, received }) => {
                assert_eq!(expected, RESPONSE_LEN);
                assert_eq!(received, 4);
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }
}
