//! In-memory stand-in for a bus of sensor slaves.

use std::collections::{HashMap, HashSet, VecDeque};
use std::io::{self, Read, Write};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use crate::modbus::crc::append_crc;
use crate::modbus::transport::{SerialLink, Transport, TransportSettings};

#[derive(Default)]
struct BusState {
    registers: HashMap<(u8, u16), u16>,
    truncated: HashMap<u8, usize>,
    request_buffer: Vec<u8>,
    pending: VecDeque<u8>,
    requests: Vec<Vec<u8>>,
    request_times: Vec<Instant>,
    fail_writes: usize,
    opens: usize,
    silent: HashSet<u8>,
    late: HashSet<u8>,
    // Reply held back until the reader has given up on it.
    delayed: Vec<u8>,
}

/// Answers 8-byte read requests from a register table with CRC-correct
/// 7-byte responses. Clones share the same bus.
#[derive(Clone, Default)]
pub struct FakeBus {
    state: Arc<Mutex<BusState>>,
}

impl FakeBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_register(&self, address: u8, register: u16, value: u16) {
        self.state.lock().unwrap().registers.insert((address, register), value);
    }

    /// Replies from `address` are cut to `len` bytes.
    pub fn truncate_replies(&self, address: u8, len: usize) {
        self.state.lock().unwrap().truncated.insert(address, len);
    }

    pub fn silence(&self, address: u8) {
        self.state.lock().unwrap().silent.insert(address);
    }

    /// Replies from `address` land only after the reader timed out.
    pub fn reply_late(&self, address: u8) {
        self.state.lock().unwrap().late.insert(address);
    }

    pub fn fail_next_write(&self) {
        self.state.lock().unwrap().fail_writes += 1;
    }

    pub fn requests(&self) -> Vec<Vec<u8>> {
        self.state.lock().unwrap().requests.clone()
    }

    pub fn request_times(&self) -> Vec<Instant> {
        self.state.lock().unwrap().request_times.clone()
    }

    pub fn open_count(&self) -> usize {
        self.state.lock().unwrap().opens
    }

    pub fn transport(&self) -> Arc<Transport> {
        let bus = self.clone();
        Arc::new(Transport::with_opener(
            TransportSettings::new("fake", 9600, Duration::from_millis(20)),
            move |_| {
                bus.state.lock().unwrap().opens += 1;
                Ok(Box::new(bus.clone()) as Box<dyn SerialLink>)
            },
        ))
    }
}

impl BusState {
    fn answer(&mut self, request: &[u8]) {
        let address = request[0];
        if self.silent.contains(&address) {
            return;
        }
        let register = u16::from_be_bytes([request[2], request[3]]);
        let value = match self.registers.get(&(address, register)) {
            Some(value) => *value,
            None => return,
        };

        let mut reply = vec![address, request[1], 0x02];
        reply.extend_from_slice(&value.to_be_bytes());
        append_crc(&mut reply);
        if let Some(len) = self.truncated.get(&address) {
            reply.truncate(*len);
        }
        if self.late.contains(&address) {
            self.delayed.extend(reply);
        } else {
            self.pending.extend(reply);
        }
    }
}

impl Write for FakeBus {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut state = self.state.lock().unwrap();
        if state.fail_writes > 0 {
            state.fail_writes -= 1;
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "bus unplugged"));
        }
        state.request_buffer.extend_from_slice(buf);
        while state.request_buffer.len() >= 8 {
            let request: Vec<u8> = state.request_buffer.drain(..8).collect();
            state.requests.push(request.clone());
            state.request_times.push(Instant::now());
            state.answer(&request);
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Read for FakeBus {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mut state = self.state.lock().unwrap();
        if state.pending.is_empty() {
            let delayed = std::mem::take(&mut state.delayed);
            state.pending.extend(delayed);
            return Err(io::Error::new(io::ErrorKind::TimedOut, "no reply"));
        }
        let n = buf.len().min(state.pending.len());
        for slot in buf.iter_mut().take(n) {
            // n is bounded by pending.len()
            *slot = state.pending.pop_front().unwrap_or_default();
        }
        Ok(n)
    }
}

impl SerialLink for FakeBus {
    fn discard_input(&mut self) -> io::Result<()> {
        self.state.lock().unwrap().pending.clear();
        Ok(())
    }
}
