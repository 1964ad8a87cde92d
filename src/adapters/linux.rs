use crate::domain::model::Port;
use crate::domain::ports::I2cBus;
use crate::utils::error::{LidarError, Result};
use std::fs::{File, OpenOptions};
use std::io::{Read, Write};
use std::os::unix::io::AsRawFd;
use std::path::{Path, PathBuf};

/// `I2C_SLAVE` from linux/i2c-dev.h.
const I2C_SLAVE: u16 = 0x0703;

/// Bus backed by the kernel's `i2c-dev` character device.
#[derive(Debug)]
pub struct LinuxI2cBus {
    file: File,
    path: PathBuf,
    selected: Option<u8>,
}

impl LinuxI2cBus {
    pub fn open(port: Port) -> Result<Self> {
        Self::open_path(port.device_path())
    }

    pub fn open_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(&path)
            .map_err(|e| LidarError::bus(format!("cannot open {}: {}", path.display(), e)))?;
        tracing::debug!("Opened I2C bus {}", path.display());
        Ok(Self {
            file,
            path,
            selected: None,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn select(&mut self, address: u8) -> Result<()> {
        if self.selected == Some(address) {
            return Ok(());
        }
        // SAFETY: the descriptor is owned by `self.file` and I2C_SLAVE takes the
        // target address by value.
        let rc = unsafe {
            libc::ioctl(
                self.file.as_raw_fd(),
                I2C_SLAVE as _,
                libc::c_ulong::from(address),
            )
        };
        if rc < 0 {
            self.selected = None;
            return Err(LidarError::bus(format!(
                "cannot select address 0x{:02x} on {}: {}",
                address,
                self.path.display(),
                std::io::Error::last_os_error()
            )));
        }
        self.selected = Some(address);
        Ok(())
    }
}

impl I2cBus for LinuxI2cBus {
    fn write(&mut self, address: u8, bytes: &[u8]) -> Result<()> {
        self.select(address)?;
        let written = self.file.write(bytes).map_err(|e| {
            LidarError::bus(format!("write to 0x{:02x} failed: {}", address, e))
        })?;
        if written != bytes.len() {
            return Err(LidarError::bus(format!(
                "short write to 0x{:02x}: {} of {} bytes",
                address,
                written,
                bytes.len()
            )));
        }
        Ok(())
    }

    fn read(&mut self, address: u8, buffer: &mut [u8]) -> Result<()> {
        self.select(address)?;
        let read = self.file.read(buffer).map_err(|e| {
            LidarError::bus(format!("read from 0x{:02x} failed: {}", address, e))
        })?;
        if read != buffer.len() {
            return Err(LidarError::bus(format!(
                "short read from 0x{:02x}: {} of {} bytes",
                address,
                read,
                buffer.len()
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_missing_device_is_bus_error() {
        let err = LinuxI2cBus::open_path("/dev/i2c-does-not-exist").unwrap_err();
        assert!(matches!(err, LidarError::Bus { .. }));
        assert_eq!(err.code(), "bus");
    }
}
