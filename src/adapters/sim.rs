//! In-memory I2C bus. Each attached device is a flat register file with an
//! auto-incrementing register pointer, which is how all three sensors behave
//! on the wire. Values can be pinned (reads ignore writes) or scripted (a
//! queue consumed one byte per read) to emulate status bits and changing
//! measurements.

use crate::domain::model::{Addressing, SensorKind};
use crate::domain::ports::I2cBus;
use crate::utils::error::{LidarError, Result};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transaction {
    Write { address: u8, bytes: Vec<u8> },
    Read { address: u8, len: usize },
}

#[derive(Debug)]
struct SimDevice {
    addressing: Addressing,
    registers: HashMap<u16, u8>,
    pinned: HashMap<u16, u8>,
    scripted: HashMap<u16, VecDeque<u8>>,
    history: HashMap<u16, Vec<u8>>,
    pointer: u16,
    address_register: Option<u16>,
}

impl SimDevice {
    fn new(addressing: Addressing) -> Self {
        Self {
            addressing,
            registers: HashMap::new(),
            pinned: HashMap::new(),
            scripted: HashMap::new(),
            history: HashMap::new(),
            pointer: 0,
            address_register: None,
        }
    }

    fn next_byte(&mut self) -> u8 {
        let reg = self.pointer;
        self.pointer = self.pointer.wrapping_add(1);
        if let Some(value) = self.scripted.get_mut(&reg).and_then(|q| q.pop_front()) {
            return value;
        }
        if let Some(value) = self.pinned.get(&reg) {
            return *value;
        }
        self.registers.get(&reg).copied().unwrap_or(0)
    }
}

#[derive(Debug, Default)]
struct SimState {
    devices: HashMap<u8, SimDevice>,
    log: Vec<Transaction>,
    failures: usize,
}

/// Cloning shares the underlying state, so a test can keep a handle while a
/// driver owns the bus.
#[derive(Debug, Clone, Default)]
pub struct SimulatedBus {
    state: Arc<Mutex<SimState>>,
}

impl SimulatedBus {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, SimState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn add_device(&self, address: u8, addressing: Addressing) {
        self.lock()
            .devices
            .insert(address, SimDevice::new(addressing));
    }

    pub fn remove_device(&self, address: u8) {
        self.lock().devices.remove(&address);
    }

    pub fn has_device(&self, address: u8) -> bool {
        self.lock().devices.contains_key(&address)
    }

    fn with_device<F>(&self, address: u8, f: F)
    where
        F: FnOnce(&mut SimDevice),
    {
        if let Some(device) = self.lock().devices.get_mut(&address) {
            f(device);
        }
    }

    pub fn set_register(&self, address: u8, reg: u16, value: u8) {
        self.with_device(address, |d| {
            d.registers.insert(reg, value);
        });
    }

    pub fn set_register16(&self, address: u8, reg: u16, value: u16) {
        let [hi, lo] = value.to_be_bytes();
        self.set_register(address, reg, hi);
        self.set_register(address, reg.wrapping_add(1), lo);
    }

    /// Last value written to (or preset in) `reg`, ignoring pins and scripts.
    pub fn register(&self, address: u8, reg: u16) -> Option<u8> {
        self.lock()
            .devices
            .get(&address)
            .and_then(|d| d.registers.get(&reg).copied())
    }

    pub fn register16(&self, address: u8, reg: u16) -> Option<u16> {
        let hi = self.register(address, reg)?;
        let lo = self.register(address, reg.wrapping_add(1))?;
        Some(u16::from_be_bytes([hi, lo]))
    }

    /// Every byte written to `reg`, in order.
    pub fn writes(&self, address: u8, reg: u16) -> Vec<u8> {
        self.lock()
            .devices
            .get(&address)
            .and_then(|d| d.history.get(&reg).cloned())
            .unwrap_or_default()
    }

    pub fn pin(&self, address: u8, reg: u16, value: u8) {
        self.with_device(address, |d| {
            d.pinned.insert(reg, value);
        });
    }

    pub fn unpin(&self, address: u8, reg: u16) {
        self.with_device(address, |d| {
            d.pinned.remove(&reg);
        });
    }

    pub fn script(&self, address: u8, reg: u16, values: &[u8]) {
        self.with_device(address, |d| {
            d.scripted
                .entry(reg)
                .or_default()
                .extend(values.iter().copied());
        });
    }

    pub fn script_u16(&self, address: u8, reg: u16, values: &[u16]) {
        let hi: Vec<u8> = values.iter().map(|v| v.to_be_bytes()[0]).collect();
        let lo: Vec<u8> = values.iter().map(|v| v.to_be_bytes()[1]).collect();
        self.script(address, reg, &hi);
        self.script(address, reg.wrapping_add(1), &lo);
    }

    /// Writes to `reg` move the device to the written 7-bit address.
    pub fn set_address_register(&self, address: u8, reg: u16) {
        self.with_device(address, |d| d.address_register = Some(reg));
    }

    /// The next `count` transactions fail as if the target did not acknowledge.
    pub fn fail_next(&self, count: usize) {
        self.lock().failures = count;
    }

    pub fn transactions(&self) -> Vec<Transaction> {
        self.lock().log.clone()
    }

    pub fn clear_transactions(&self) {
        self.lock().log.clear();
    }

    /// Attaches a device preloaded so the matching driver initializes and always
    /// has a measurement ready.
    pub fn attach_preset(&self, kind: SensorKind, address: u8) {
        self.add_device(address, kind.addressing());
        match kind {
            SensorKind::Vl53l1x => self.load_vl53l1x(address),
            SensorKind::Vl53l0x => self.load_vl53l0x(address),
            SensorKind::Vl6180x => self.load_vl6180x(address),
        }
    }

    pub fn with_preset(kind: SensorKind, address: u8) -> Self {
        let sim = Self::new();
        sim.attach_preset(kind, address);
        sim
    }

    fn load_vl53l1x(&self, address: u8) {
        self.set_address_register(address, 0x0001);
        self.set_register16(address, 0x010F, 0xEACC);
        self.set_register(address, 0x00E5, 0x01);
        self.set_register16(address, 0x0006, 0xBE00);
        self.set_register16(address, 0x00DE, 0x01F4);
        self.set_register(address, 0x0008, 0x09);
        self.set_register(address, 0x000B, 0x29);
        self.set_register(address, 0x00D8, 0x0B);
        self.pin(address, 0x0031, 0x02);
        // result block: status, report, stream count, then 16-bit fields
        let block: [u8; 17] = [
            0x09, 0x00, 0x01, 0x10, 0x00, 0x08, 0x00, 0x01, 0x00, 0x00, 0x20, 0x00, 0x00,
            0x01, 0xFD, 0x08, 0x00,
        ];
        for (offset, value) in block.iter().enumerate() {
            self.set_register(address, 0x0089 + offset as u16, *value);
        }
    }

    fn load_vl53l0x(&self, address: u8) {
        self.set_address_register(address, 0x8A);
        self.set_register(address, 0xC0, 0xEE);
        self.set_register(address, 0x91, 0x3C);
        self.pin(address, 0x83, 0x01);
        self.pin(address, 0x92, 0x85);
        for reg in 0xB0..=0xB5u16 {
            self.set_register(address, reg, 0xFF);
        }
        self.pin(address, 0x13, 0x04);
        self.pin(address, 0x00, 0x00);
        self.set_register16(address, 0xF8, 0x0100);
        self.set_register16(address, 0x1E, 500);
    }

    fn load_vl6180x(&self, address: u8) {
        self.set_address_register(address, 0x0212);
        self.set_register(address, 0x0000, 0xB4);
        self.set_register(address, 0x0016, 0x01);
        self.set_register(address, 0x0024, 0x0C);
        self.pin(address, 0x004F, 0x24);
        self.set_register(address, 0x0062, 100);
        self.set_register16(address, 0x0050, 0x0123);
    }

    /// Queues range results for a preset device, in millimetres at 1x scaling.
    pub fn script_ranges(&self, kind: SensorKind, address: u8, ranges_mm: &[u16]) {
        match kind {
            SensorKind::Vl53l1x => {
                // the driver scales the raw value by 2011/2048
                let raw: Vec<u16> = ranges_mm
                    .iter()
                    .map(|mm| ((u32::from(*mm) * 0x800 + 1005) / 2011) as u16)
                    .collect();
                self.script_u16(address, 0x0096, &raw);
            }
            SensorKind::Vl53l0x => self.script_u16(address, 0x1E, ranges_mm),
            SensorKind::Vl6180x => {
                let raw: Vec<u8> = ranges_mm.iter().map(|mm| (*mm).min(255) as u8).collect();
                self.script(address, 0x0062, &raw);
            }
        }
    }
}

impl I2cBus for SimulatedBus {
    fn write(&mut self, address: u8, bytes: &[u8]) -> Result<()> {
        let mut state = self.lock();
        state.log.push(Transaction::Write {
            address,
            bytes: bytes.to_vec(),
        });
        if state.failures > 0 {
            state.failures -= 1;
            return Err(LidarError::bus(format!(
                "injected failure writing to 0x{:02x}",
                address
            )));
        }

        let device = state.devices.get_mut(&address).ok_or_else(|| {
            LidarError::bus(format!("no device acknowledged address 0x{:02x}", address))
        })?;

        let index_len = device.addressing.index_len();
        if bytes.len() < index_len {
            return Err(LidarError::bus("write shorter than the register index"));
        }
        let reg = match device.addressing {
            Addressing::EightBit => u16::from(bytes[0]),
            Addressing::SixteenBit => u16::from_be_bytes([bytes[0], bytes[1]]),
        };

        device.pointer = reg;
        let mut relocate = None;
        for value in &bytes[index_len..] {
            let target = device.pointer;
            device.registers.insert(target, *value);
            device.history.entry(target).or_default().push(*value);
            if device.address_register == Some(target) {
                relocate = Some(*value & 0x7F);
            }
            device.pointer = device.pointer.wrapping_add(1);
        }

        if let Some(new_address) = relocate {
            if new_address != address {
                if let Some(moved) = state.devices.remove(&address) {
                    state.devices.insert(new_address, moved);
                }
            }
        }
        Ok(())
    }

    fn read(&mut self, address: u8, buffer: &mut [u8]) -> Result<()> {
        let mut state = self.lock();
        state.log.push(Transaction::Read {
            address,
            len: buffer.len(),
        });
        if state.failures > 0 {
            state.failures -= 1;
            return Err(LidarError::bus(format!(
                "injected failure reading from 0x{:02x}",
                address
            )));
        }

        let device = state.devices.get_mut(&address).ok_or_else(|| {
            LidarError::bus(format!("no device acknowledged address 0x{:02x}", address))
        })?;
        for slot in buffer.iter_mut() {
            *slot = device.next_byte();
        }
        Ok(())
    }
}
