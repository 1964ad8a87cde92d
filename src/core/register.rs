use crate::domain::model::Addressing;
use crate::domain::ports::I2cBus;
use crate::utils::error::{LidarError, Result};

/// Largest single transfer, register index included.
pub const BUFFER_LENGTH: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OpStatus {
    Unset,
    Success,
    Failure,
}

/// Register-level access to one I2C target: a register index (8 or 16 bits)
/// followed by a big-endian payload. Reads select the register in one write
/// transaction and fetch the value in a separate read transaction.
pub struct RegisterBus<B: I2cBus> {
    bus: B,
    addressing: Addressing,
    address: u8,
    last_status: OpStatus,
}

impl<B: I2cBus> RegisterBus<B> {
    pub fn new(bus: B, addressing: Addressing, address: u8) -> Result<Self> {
        check_address(address)?;
        Ok(Self {
            bus,
            addressing,
            address,
            last_status: OpStatus::Unset,
        })
    }

    pub fn address(&self) -> u8 {
        self.address
    }

    /// Retargets this helper only; the device keeps listening on its old address.
    pub fn set_address(&mut self, address: u8) -> Result<()> {
        check_address(address)?;
        self.address = address;
        Ok(())
    }

    pub fn addressing(&self) -> Addressing {
        self.addressing
    }

    pub fn last_op_successful(&self) -> Result<bool> {
        match self.last_status {
            OpStatus::Unset => Err(LidarError::invalid_state("No operation performed yet")),
            OpStatus::Success => Ok(true),
            OpStatus::Failure => Ok(false),
        }
    }

    pub fn bus_mut(&mut self) -> &mut B {
        &mut self.bus
    }

    pub fn into_inner(self) -> B {
        self.bus
    }

    fn record<T>(&mut self, result: Result<T>) -> Result<T> {
        self.last_status = if result.is_ok() {
            OpStatus::Success
        } else {
            OpStatus::Failure
        };
        result
    }

    fn transmit(&mut self, reg: u16, payload: &[u8]) -> Result<()> {
        let mut frame = Vec::with_capacity(self.addressing.index_len() + payload.len());
        self.addressing.encode(reg, &mut frame);
        frame.extend_from_slice(payload);
        if frame.len() > BUFFER_LENGTH {
            return Err(LidarError::invalid_argument(format!(
                "transfer of {} bytes exceeds the {} byte buffer",
                frame.len(),
                BUFFER_LENGTH
            )));
        }

        tracing::trace!(
            "i2c write 0x{:02x} reg=0x{:04x} payload={:02x?}",
            self.address,
            reg,
            payload
        );
        let result = self.bus.write(self.address, &frame);
        self.record(result)
    }

    fn request(&mut self, buffer: &mut [u8]) -> Result<()> {
        if buffer.len() > BUFFER_LENGTH {
            return Err(LidarError::invalid_argument(format!(
                "amount {} must be within buffer bounds",
                buffer.len()
            )));
        }
        let result = self.bus.read(self.address, buffer);
        tracing::trace!("i2c read 0x{:02x} -> {:02x?}", self.address, buffer);
        self.record(result)
    }

    pub fn write_reg(&mut self, reg: u16, value: u8) -> Result<()> {
        self.transmit(reg, &[value])
    }

    pub fn write_reg16(&mut self, reg: u16, value: u16) -> Result<()> {
        self.transmit(reg, &value.to_be_bytes())
    }

    pub fn write_reg32(&mut self, reg: u16, value: u32) -> Result<()> {
        self.transmit(reg, &value.to_be_bytes())
    }

    pub fn write_reg_multi(&mut self, reg: u16, values: &[u8]) -> Result<()> {
        self.transmit(reg, values)
    }

    /// Sends only the register index, leaving the device's pointer on `reg`.
    pub fn select(&mut self, reg: u16) -> Result<()> {
        self.transmit(reg, &[])
    }

    pub fn read_reg(&mut self, reg: u16) -> Result<u8> {
        let mut buf = [0u8; 1];
        self.read_reg_multi(reg, &mut buf)?;
        Ok(buf[0])
    }

    pub fn read_reg16(&mut self, reg: u16) -> Result<u16> {
        let mut buf = [0u8; 2];
        self.read_reg_multi(reg, &mut buf)?;
        Ok(u16::from_be_bytes(buf))
    }

    pub fn read_reg32(&mut self, reg: u16) -> Result<u32> {
        let mut buf = [0u8; 4];
        self.read_reg_multi(reg, &mut buf)?;
        Ok(u32::from_be_bytes(buf))
    }

    pub fn read_reg_multi(&mut self, reg: u16, out: &mut [u8]) -> Result<()> {
        self.select(reg)?;
        self.request(out)
    }

    /// Reads `len` consecutive bytes starting at `reg` for field-by-field decoding.
    pub fn request_block(&mut self, reg: u16, len: usize) -> Result<ResponseCursor> {
        let mut bytes = vec![0u8; len];
        self.read_reg_multi(reg, &mut bytes)?;
        Ok(ResponseCursor::new(bytes))
    }

    /// Read-modify-write of an 8-bit register.
    pub fn update_reg<F>(&mut self, reg: u16, f: F) -> Result<u8>
    where
        F: FnOnce(u8) -> u8,
    {
        let value = f(self.read_reg(reg)?);
        self.write_reg(reg, value)?;
        Ok(value)
    }
}

pub(crate) fn check_address(address: u8) -> Result<()> {
    if address > 0x7F {
        return Err(LidarError::invalid_argument(format!(
            "address 0x{:02x} does not fit in 7 bits",
            address
        )));
    }
    Ok(())
}

/// Sequential big-endian decoder over a block read.
#[derive(Debug, Clone)]
pub struct ResponseCursor {
    bytes: Vec<u8>,
    position: usize,
}

impl ResponseCursor {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self { bytes, position: 0 }
    }

    pub fn remaining(&self) -> usize {
        self.bytes.len() - self.position
    }

    fn take(&mut self, amount: usize) -> Result<&[u8]> {
        if self.remaining() < amount {
            return Err(LidarError::invalid_state("No more data available"));
        }
        let slice = &self.bytes[self.position..self.position + amount];
        self.position += amount;
        Ok(slice)
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    pub fn read_u16(&mut self) -> Result<u16> {
        let b = self.take(2)?;
        Ok(u16::from_be_bytes([b[0], b[1]]))
    }

    pub fn read_u32(&mut self) -> Result<u32> {
        let b = self.take(4)?;
        Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    pub fn skip(&mut self, amount: usize) -> Result<()> {
        self.take(amount).map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::sim::{SimulatedBus, Transaction};

    #[test]
    fn test_sixteen_bit_write_frames() {
        let sim = SimulatedBus::new();
        sim.add_device(0x29, Addressing::SixteenBit);
        let mut regs = RegisterBus::new(sim.clone(), Addressing::SixteenBit, 0x29).unwrap();

        regs.write_reg16(0x0024, 0x0A00).unwrap();
        regs.write_reg32(0x006C, 0x0102_0304).unwrap();

        assert_eq!(
            sim.transactions(),
            vec![
                Transaction::Write {
                    address: 0x29,
                    bytes: vec![0x00, 0x24, 0x0A, 0x00]
                },
                Transaction::Write {
                    address: 0x29,
                    bytes: vec![0x00, 0x6C, 0x01, 0x02, 0x03, 0x04]
                },
            ]
        );
        assert_eq!(sim.register(0x29, 0x006C), Some(0x01));
        assert_eq!(sim.register(0x29, 0x006F), Some(0x04));
    }

    #[test]
    fn test_read_selects_then_reads() {
        let sim = SimulatedBus::new();
        sim.add_device(0x29, Addressing::EightBit);
        sim.set_register(0x29, 0xC0, 0xEE);
        sim.set_register(0x29, 0x1E, 0x01);
        sim.set_register(0x29, 0x1F, 0xF4);
        let mut regs = RegisterBus::new(sim.clone(), Addressing::EightBit, 0x29).unwrap();

        assert_eq!(regs.read_reg(0xC0).unwrap(), 0xEE);
        assert_eq!(regs.read_reg16(0x1E).unwrap(), 500);
        assert_eq!(
            sim.transactions()[0],
            Transaction::Write {
                address: 0x29,
                bytes: vec![0xC0]
            }
        );
        assert_eq!(
            sim.transactions()[1],
            Transaction::Read {
                address: 0x29,
                len: 1
            }
        );
    }

    #[test]
    fn test_last_op_status_tracks_failures() {
        let sim = SimulatedBus::new();
        sim.add_device(0x29, Addressing::SixteenBit);
        let mut regs = RegisterBus::new(sim.clone(), Addressing::SixteenBit, 0x29).unwrap();

        assert!(regs.last_op_successful().is_err());
        regs.write_reg(0x0001, 0x10).unwrap();
        assert!(regs.last_op_successful().unwrap());

        sim.fail_next(1);
        assert!(regs.write_reg(0x0001, 0x10).is_err());
        assert!(!regs.last_op_successful().unwrap());
    }

    #[test]
    fn test_rejects_oversized_transfers() {
        let sim = SimulatedBus::new();
        sim.add_device(0x29, Addressing::SixteenBit);
        let mut regs = RegisterBus::new(sim, Addressing::SixteenBit, 0x29).unwrap();

        let payload = [0u8; 31];
        assert!(matches!(
            regs.write_reg_multi(0x0000, &payload),
            Err(LidarError::InvalidArgument { .. })
        ));
        assert!(regs.request_block(0x0000, 33).is_err());
    }

    #[test]
    fn test_rejects_eight_bit_addresses() {
        let sim = SimulatedBus::new();
        assert!(RegisterBus::new(sim.clone(), Addressing::EightBit, 0x80).is_err());
        let mut regs = RegisterBus::new(sim, Addressing::EightBit, 0x29).unwrap();
        assert!(regs.set_address(0xFF).is_err());
        assert_eq!(regs.address(), 0x29);
    }

    #[test]
    fn test_response_cursor_decodes_in_order() {
        let mut cursor = ResponseCursor::new(vec![0x09, 0x00, 0x01, 0x12, 0x34, 0xDE, 0xAD, 0xBE, 0xEF]);
        assert_eq!(cursor.read_u8().unwrap(), 0x09);
        cursor.skip(1).unwrap();
        assert_eq!(cursor.read_u8().unwrap(), 0x01);
        assert_eq!(cursor.read_u16().unwrap(), 0x1234);
        assert_eq!(cursor.read_u32().unwrap(), 0xDEAD_BEEF);
        assert!(cursor.read_u8().is_err());
    }
}
