#![allow(dead_code)]

pub use hoymiles_bridge::prelude::*;

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

pub fn common_setup() {
    let _ = env_logger::builder().is_test(true).try_init();
}

#[derive(Debug, Default)]
pub struct MockState {
    pub registers: HashMap<u16, u16>,
    pub coils: HashMap<u16, bool>,
    /// Reads starting at these addresses answer with a Modbus exception
    pub exceptions: HashSet<u16>,
    pub refuse_connections: bool,
    pub refuse_coil_writes: bool,
    pub connect_attempts: usize,
    pub reads: Vec<(u16, u16)>,
    pub coil_reads: usize,
    pub coil_writes: usize,
}

/// In-memory DTU. Clones share the same state, so a test can keep one handle
/// and give another to the session.
#[derive(Clone, Debug, Default)]
pub struct MockDtu(pub Arc<Mutex<MockState>>);

impl MockDtu {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> std::sync::MutexGuard<'_, MockState> {
        self.0.lock().unwrap()
    }

    pub fn set_register(&self, address: u16, value: u16) {
        self.state().registers.insert(address, value);
    }

    pub fn set_registers(&self, address: u16, values: &[u16]) {
        for (i, value) in values.iter().enumerate() {
            self.set_register(address + i as u16, *value);
        }
    }

    /// Stores `digits` as packed BCD in the 3 registers at `address`.
    pub fn set_bcd(&self, address: u16, digits: &str) {
        self.set_registers(address, &bcd_registers(digits));
    }

    /// Puts a device with serial number `serial` in discovery slot `slot`.
    pub fn set_slot(&self, slot: u16, serial: &str) {
        self.set_bcd(slot_address(slot) + 1, serial);
    }

    pub fn set_dtu_serial(&self, serial: &str) {
        self.set_bcd(0x2000, serial);
    }

    pub fn fail_at(&self, address: u16) {
        self.state().exceptions.insert(address);
    }

    pub fn clear_failures(&self) {
        self.state().exceptions.clear();
    }

    pub fn reads(&self) -> Vec<(u16, u16)> {
        self.state().reads.clone()
    }
}

pub fn slot_address(slot: u16) -> u16 {
    0x1000 + slot * 0x28
}

/// Packs decimal digits into 3 registers of BCD, zero padded on the left.
pub fn bcd_registers(digits: &str) -> [u16; 3] {
    let padded = format!("{:0>12}", digits);
    let nibbles: Vec<u16> = padded.bytes().map(|b| (b - b'0') as u16).collect();
    let mut registers = [0u16; 3];
    for (i, register) in registers.iter_mut().enumerate() {
        let n = &nibbles[i * 4..i * 4 + 4];
        *register = (n[0] << 12) | (n[1] << 8) | (n[2] << 4) | n[3];
    }
    registers
}

#[async_trait]
impl Connector for MockDtu {
    async fn connect(&self, host: &str, port: u16) -> Result<Box<dyn Link>, Error> {
        let mut state = self.state();
        state.connect_attempts += 1;
        if state.refuse_connections {
            return Err(Error::Connection {
                host: host.to_string(),
                port,
                reason: "connection refused".to_string(),
            });
        }
        Ok(Box::new(MockLink(self.clone())))
    }
}

pub struct MockLink(MockDtu);

#[async_trait]
impl Link for MockLink {
    async fn read_holding_registers(&mut self, address: u16, count: u16) -> Result<Vec<u16>, Error> {
        let mut state = self.0.state();
        state.reads.push((address, count));
        if state.exceptions.contains(&address) {
            return Err(Error::Protocol {
                address,
                reason: "IllegalDataAddress".to_string(),
            });
        }
        Ok((address..address + count)
            .map(|a| state.registers.get(&a).copied().unwrap_or(0))
            .collect())
    }

    async fn read_coils(&mut self, address: u16, count: u16) -> Result<Vec<bool>, Error> {
        let mut state = self.0.state();
        state.coil_reads += 1;
        Ok((address..address + count)
            .map(|a| state.coils.get(&a).copied().unwrap_or(false))
            .collect())
    }

    async fn write_coils(&mut self, address: u16, bits: &[bool]) -> Result<(), Error> {
        let mut state = self.0.state();
        state.coil_writes += 1;
        if state.refuse_coil_writes {
            return Err(Error::Protocol {
                address,
                reason: "IllegalFunction".to_string(),
            });
        }
        for (i, bit) in bits.iter().enumerate() {
            state.coils.insert(address + i as u16, *bit);
        }
        Ok(())
    }
}

pub struct Factory;

impl Factory {
    pub fn session(mock: &MockDtu) -> Session {
        Session::new("192.168.1.50", 502, Box::new(mock.clone()))
    }

    pub fn dtu(mock: &MockDtu) -> Dtu {
        Dtu::with_session(Self::session(mock))
    }

    /// Two microinverters: "116180218540" in slots 0 and 1 (two panels) and
    /// "116180218551" in slot 2. DTU serial "414012345678".
    pub fn populated_mock() -> MockDtu {
        let mock = MockDtu::new();
        mock.set_dtu_serial("414012345678");
        mock.set_slot(0, "116180218540");
        mock.set_slot(1, "116180218540");
        mock.set_slot(2, "116180218551");
        mock
    }

    pub fn config(yaml: &str) -> Config {
        Config::from_yaml(yaml).unwrap()
    }
}
