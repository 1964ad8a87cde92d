//! Turns configuration into live buses and drivers.

#[cfg(target_os = "linux")]
use crate::adapters::linux::LinuxI2cBus;
use crate::adapters::sim::SimulatedBus;
use crate::adapters::{NoDelay, StdDelay};
use crate::core::ranging::RigMember;
use crate::core::sensor::RangeSensor;
use crate::core::vl53l0x::Vl53l0x;
use crate::core::vl53l1x::Vl53l1x;
use crate::core::vl6180x::Vl6180x;
use crate::domain::model::{Port, SensorKind, DEFAULT_ADDRESS};
use crate::domain::ports::I2cBus;
use crate::utils::error::{LidarError, Result};
use std::path::PathBuf;
use std::time::Duration;

/// Where driver buses come from. Every driver gets its own handle.
#[derive(Debug, Clone)]
pub enum BusSource {
    Simulated(SimulatedBus),
    Device(PathBuf),
}

impl BusSource {
    pub fn new(port: Port, device: Option<PathBuf>, simulate: bool) -> Self {
        if simulate {
            BusSource::Simulated(SimulatedBus::new())
        } else {
            BusSource::Device(device.unwrap_or_else(|| PathBuf::from(port.device_path())))
        }
    }

    pub fn is_simulated(&self) -> bool {
        matches!(self, BusSource::Simulated(_))
    }

    /// Powers up a simulated `kind` at `address`. No-op on real hardware.
    pub fn attach_simulated(&self, kind: SensorKind, address: u8) {
        if let BusSource::Simulated(sim) = self {
            sim.attach_preset(kind, address);
        }
    }

    pub fn connect(&self) -> Result<Box<dyn I2cBus>> {
        match self {
            BusSource::Simulated(sim) => Ok(Box::new(sim.clone())),
            #[cfg(target_os = "linux")]
            BusSource::Device(path) => Ok(Box::new(LinuxI2cBus::open_path(path)?)),
            #[cfg(not(target_os = "linux"))]
            BusSource::Device(path) => Err(LidarError::bus(format!(
                "cannot open {}: i2c-dev is only available on Linux",
                path.display()
            ))),
        }
    }

    pub fn describe(&self) -> String {
        match self {
            BusSource::Simulated(_) => "simulated bus".to_string(),
            BusSource::Device(path) => path.display().to_string(),
        }
    }
}

/// Builds the driver for `kind`, talking to a device at `address`.
pub fn build_sensor(source: &BusSource, kind: SensorKind, address: u8) -> Result<Box<dyn RangeSensor>> {
    let bus = source.connect()?;
    let sensor: Box<dyn RangeSensor> = match kind {
        SensorKind::Vl53l1x if source.is_simulated() => {
            Box::new(Vl53l1x::at_address(bus, NoDelay, address)?)
        }
        SensorKind::Vl53l1x => Box::new(Vl53l1x::at_address(bus, StdDelay, address)?),
        SensorKind::Vl53l0x => Box::new(Vl53l0x::at_address(bus, address)?),
        SensorKind::Vl6180x => Box::new(Vl6180x::at_address(bus, address)?),
    };
    Ok(sensor)
}

/// Builds a driver for a sensor that has just powered up on the default
/// address, and moves it to `address` when that differs.
pub fn bring_up(source: &BusSource, kind: SensorKind, address: u8) -> Result<Box<dyn RangeSensor>> {
    source.attach_simulated(kind, DEFAULT_ADDRESS);
    let mut sensor = build_sensor(source, kind, DEFAULT_ADDRESS)?;
    if address != DEFAULT_ADDRESS {
        tracing::info!("Moving {} from 0x{:02x} to 0x{:02x}", kind, DEFAULT_ADDRESS, address);
        sensor.set_address(address)?;
    }
    Ok(sensor)
}

/// One rig entry, reduced to what bring-up needs.
#[derive(Debug, Clone)]
pub struct MemberSpec {
    pub name: String,
    pub kind: SensorKind,
    pub address: u8,
    pub timeout: Duration,
    pub period_ms: u32,
    /// Readings to take; 0 samples until sampling stops.
    pub samples: usize,
    pub max_consecutive_timeouts: u32,
    pub settings: crate::core::sensor::SensorSettings,
}

/// Brings every sensor up in turn, initializes it and starts continuous
/// ranging. Sensors that keep the default address come up last so they do
/// not shadow the ones still waiting to be moved. When one sensor fails, the
/// ones already started are stopped again.
pub fn bring_up_rig(source: &BusSource, specs: &[MemberSpec]) -> Result<Vec<RigMember>> {
    let mut ordered: Vec<&MemberSpec> = specs.iter().collect();
    ordered.sort_by_key(|entry| entry.address == DEFAULT_ADDRESS);

    if ordered
        .iter()
        .filter(|entry| entry.address == DEFAULT_ADDRESS)
        .count()
        > 1
    {
        return Err(LidarError::invalid_argument(
            "only one sensor can stay on the default address",
        ));
    }

    let mut members = Vec::with_capacity(specs.len());
    for entry in ordered {
        match bring_up_member(source, entry) {
            Ok(member) => members.push(member),
            Err(e) => {
                tracing::error!("Bringing up '{}' failed: {}", entry.name, e);
                shut_down_rig(&mut members);
                return Err(e);
            }
        }
    }
    Ok(members)
}

fn bring_up_member(source: &BusSource, entry: &MemberSpec) -> Result<RigMember> {
    tracing::info!("Bringing up '{}' ({})", entry.name, entry.kind);
    let mut sensor = bring_up(source, entry.kind, entry.address)?;
    sensor.set_timeout(entry.timeout);
    sensor.initialize()?;
    if !entry.settings.is_empty() {
        sensor.configure(&entry.settings)?;
    }
    sensor.start_continuous(entry.period_ms)?;

    let mut member = RigMember::new(entry.name.clone(), sensor);
    member.max_consecutive_timeouts = entry.max_consecutive_timeouts;
    member.samples = entry.samples;
    Ok(member)
}

/// Stops every member, logging instead of failing on errors.
pub fn shut_down_rig(members: &mut [RigMember]) {
    for member in members {
        if let Err(e) = member.sensor.stop_continuous() {
            tracing::warn!("Failed to stop '{}': {}", member.name, e);
        }
    }
}
