use log::{debug, error, info, warn};
use serialport::{ClearBuffer, SerialPort};
use std::io::{self, ErrorKind, Read, Write};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use crate::utils::error::ModbusError;

/// Anything that can carry bytes to and from the bus.
pub trait SerialLink: Read + Write + Send {
    /// Drops bytes already received but not yet read, such as a reply
    /// that arrived after the previous exchange timed out.
    fn discard_input(&mut self) -> io::Result<()>;
}

/// `serialport` connection as a bus link.
pub struct SerialPortLink {
    port: Box<dyn SerialPort>,
}

impl SerialPortLink {
    pub fn new(port: Box<dyn SerialPort>) -> Self {
        Self { port }
    }
}

impl Read for SerialPortLink {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.port.read(buf)
    }
}

impl Write for SerialPortLink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.port.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.port.flush()
    }
}

impl SerialLink for SerialPortLink {
    fn discard_input(&mut self) -> io::Result<()> {
        self.port
            .clear(ClearBuffer::Input)
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e))
    }
}

#[derive(Debug, Clone)]
pub struct TransportSettings {
    pub port_name: String,
    pub baud_rate: u32,
    pub timeout: Duration,
}

impl TransportSettings {
    pub fn new(port_name: &str, baud_rate: u32, timeout: Duration) -> Self {
        Self {
            port_name: port_name.to_string(),
            baud_rate,
            timeout,
        }
    }
}

type PortOpener = Box<dyn Fn(&TransportSettings) -> Result<Box<dyn SerialLink>, ModbusError> + Send + Sync>;

/// Owner of the single half-duplex serial connection.
///
/// The connection is opened lazily by the first exchange. All exchanges are
/// serialized by one mutex held across write and read, so concurrent callers
/// never interleave bytes on the bus.
pub struct Transport {
    settings: TransportSettings,
    opener: PortOpener,
    port: Mutex<Option<Box<dyn SerialLink>>>,
}

impl Transport {
    /// Serial transport with 8N1 framing.
    pub fn new(port_name: &str, baud_rate: u32, timeout: Duration) -> Self {
        Self::with_opener(TransportSettings::new(port_name, baud_rate, timeout), open_serial_port)
    }

    pub fn with_opener<F>(settings: TransportSettings, opener: F) -> Self
    where
        F: Fn(&TransportSettings) -> Result<Box<dyn SerialLink>, ModbusError> + Send + Sync + 'static,
    {
        Self {
            settings,
            opener: Box::new(opener),
            port: Mutex::new(None),
        }
    }

    pub fn settings(&self) -> &TransportSettings {
        &self.settings
    }

    pub fn is_open(&self) -> bool {
        self.port.lock().map(|port| port.is_some()).unwrap_or(false)
    }

    pub fn open(&self) -> Result<(), ModbusError> {
        let mut port = self.port.lock().map_err(|_| ModbusError::LockError)?;
        if port.is_none() {
            *port = Some(self.connect()?);
        }
        Ok(())
    }

    pub fn close(&self) -> Result<(), ModbusError> {
        let mut port = self.port.lock().map_err(|_| ModbusError::LockError)?;
        if port.take().is_some() {
            info!("🔌 Closed serial port {}", self.settings.port_name);
        }
        Ok(())
    }

    /// Writes `frame` and reads back up to `expected_len` bytes.
    ///
    /// A short read is not an error here: the bytes that arrived before the
    /// timeout are returned and the caller decides whether they are usable.
    pub fn exchange(&self, frame: &[u8], expected_len: usize) -> Result<Vec<u8>, ModbusError> {
        let mut guard = self.port.lock().map_err(|_| ModbusError::LockError)?;

        if guard.is_none() {
            *guard = Some(self.connect()?);
        }
        let port = guard
            .as_mut()
            .ok_or_else(|| ModbusError::ConnectionError("serial port not open".to_string()))?;

        debug!("📤 TX [{}]", hex::encode(frame));
        let outcome = write_then_read(&mut **port, frame, expected_len, self.settings.timeout);

        match &outcome {
            Ok(response) => {
                debug!("📥 RX [{}] ({}/{} bytes)", hex::encode(response), response.len(), expected_len);
                if response.len() < expected_len {
                    warn!(
                        "⏰ Short response on {}: {} of {} bytes",
                        self.settings.port_name,
                        response.len(),
                        expected_len
                    );
                }
            }
            Err(e) => {
                error!("❌ Exchange failed on {}: {}", self.settings.port_name, e);
                // Reopen on the next exchange.
                *guard = None;
            }
        }

        outcome
    }

    fn connect(&self) -> Result<Box<dyn SerialLink>, ModbusError> {
        info!(
            "🔌 Opening {} ({} baud, 8N1, {} ms timeout)",
            self.settings.port_name,
            self.settings.baud_rate,
            self.settings.timeout.as_millis()
        );
        (self.opener)(&self.settings)
    }
}

fn write_then_read(
    port: &mut dyn SerialLink,
    frame: &[u8],
    expected_len: usize,
    timeout: Duration,
) -> Result<Vec<u8>, ModbusError> {
    port.discard_input()
        .map_err(|e| ModbusError::CommunicationError(format!("Input discard failed: {}", e)))?;
    port.write_all(frame)
        .map_err(|e| ModbusError::CommunicationError(format!("Write failed: {}", e)))?;
    port.flush()
        .map_err(|e| ModbusError::CommunicationError(format!("Flush failed: {}", e)))?;

    let mut response = vec![0u8; expected_len];
    let mut received = 0;
    let deadline = Instant::now() + timeout;

    while received < expected_len {
        match port.read(&mut response[received..]) {
            Ok(0) => break,
            Ok(n) => received += n,
            Err(ref e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(ref e) if e.kind() == ErrorKind::TimedOut || e.kind() == ErrorKind::WouldBlock => break,
            Err(e) => return Err(ModbusError::CommunicationError(format!("Read failed: {}", e))),
        }
        if Instant::now() >= deadline {
            break;
        }
    }

    response.truncate(received);
    Ok(response)
}

fn open_serial_port(settings: &TransportSettings) -> Result<Box<dyn SerialLink>, ModbusError> {
    let port = serialport::new(settings.port_name.as_str(), settings.baud_rate)
        .timeout(settings.timeout)
        .data_bits(serialport::DataBits::Eight)
        .parity(serialport::Parity::None)
        .stop_bits(serialport::StopBits::One)
        .open()
        .map_err(|e| {
            error!("❌ Failed to open serial port {}: {}", settings.port_name, e);
            ModbusError::ConnectionError(format!("Failed to open port {}: {}", settings.port_name, e))
        })?;

    info!("✅ Serial connection established on {}", settings.port_name);
    Ok(Box::new(SerialPortLink::new(port)))
}

/// Serial ports visible to the host.
pub fn available_ports() -> Result<Vec<String>, ModbusError> {
    let ports = serialport::available_ports()
        .map_err(|e| ModbusError::ConnectionError(format!("Port enumeration failed: {}", e)))?;
    Ok(ports.into_iter().map(|port| port.port_name).collect())
}
