use crate::domain::model::Reading;
use crate::utils::error::Result;
use std::time::Duration;

/// Master-mode access to an I2C bus. Each call is one complete transaction.
pub trait I2cBus: Send {
    fn write(&mut self, address: u8, bytes: &[u8]) -> Result<()>;
    fn read(&mut self, address: u8, buffer: &mut [u8]) -> Result<()>;
}

impl<B: I2cBus + ?Sized> I2cBus for Box<B> {
    fn write(&mut self, address: u8, bytes: &[u8]) -> Result<()> {
        (**self).write(address, bytes)
    }

    fn read(&mut self, address: u8, buffer: &mut [u8]) -> Result<()> {
        (**self).read(address, buffer)
    }
}

pub trait Delay: Send {
    fn delay(&mut self, duration: Duration);
}

/// Destination for sampled readings.
pub trait ReadingSink: Send {
    fn accept(&mut self, reading: &Reading) -> Result<()>;

    fn finish(&mut self) -> Result<()> {
        Ok(())
    }
}

impl<S: ReadingSink + ?Sized> ReadingSink for Box<S> {
    fn accept(&mut self, reading: &Reading) -> Result<()> {
        (**self).accept(reading)
    }

    fn finish(&mut self) -> Result<()> {
        (**self).finish()
    }
}
