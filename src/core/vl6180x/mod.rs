//! VL6180X proximity and ambient light sensor, after Pololu's
//! vl6180x-arduino library.

pub mod registers;

use self::registers::*;
use crate::core::register::{check_address, RegisterBus};
use crate::core::sensor::{RangeSensor, SensorSettings};
use crate::core::timeout::TimeoutTimer;
use crate::domain::model::{Reading, Scaling, SensorKind, DEFAULT_ADDRESS};
use crate::domain::ports::I2cBus;
use crate::utils::error::{LidarError, Result};
use std::time::Duration;

/// Converts a continuous-mode period in milliseconds to the 10 ms register units.
fn period_register(period_ms: u32) -> u8 {
    (i64::from(period_ms) / 10 - 1).clamp(0, 254) as u8
}

pub struct Vl6180x<B: I2cBus> {
    regs: RegisterBus<B>,
    timer: TimeoutTimer,
    scaling: Scaling,
    ptp_offset: i16,
    interleaved: bool,
}

impl<B: I2cBus> Vl6180x<B> {
    pub fn new(bus: B) -> Result<Self> {
        Self::at_address(bus, DEFAULT_ADDRESS)
    }

    pub fn at_address(bus: B, address: u8) -> Result<Self> {
        Ok(Self {
            regs: RegisterBus::new(bus, SensorKind::Vl6180x.addressing(), address)?,
            timer: TimeoutTimer::default(),
            scaling: Scaling::One,
            ptp_offset: 0,
            interleaved: false,
        })
    }

    pub fn release(self) -> B {
        self.regs.into_inner()
    }

    pub fn scaling(&self) -> Scaling {
        self.scaling
    }

    pub fn init(&mut self) -> Result<()> {
        let model_id = self.regs.read_reg(IDENTIFICATION__MODEL_ID)?;
        if model_id != MODEL_ID {
            tracing::warn!(
                "VL6180X at 0x{:02x} reported model ID 0x{:02x}",
                self.regs.address(),
                model_id
            );
            return Err(LidarError::IncorrectModelId {
                part: "VL6180X",
                expected: u16::from(MODEL_ID),
                actual: u16::from(model_id),
            });
        }

        // stored as a signed byte
        self.ptp_offset = i16::from(self.regs.read_reg(SYSRANGE__PART_TO_PART_RANGE_OFFSET)? as i8);

        if self.regs.read_reg(SYSTEM__FRESH_OUT_OF_RESET)? == 1 {
            tracing::debug!("VL6180X fresh out of reset, loading private settings");
            self.scaling = Scaling::One;

            for (reg, value) in PRIVATE_SETTINGS {
                self.regs.write_reg(*reg, *value)?;
            }

            self.regs.write_reg(SYSTEM__FRESH_OUT_OF_RESET, 0)?;
        } else {
            // Already initialized: recover the scaling it was left in. At 2x and 3x
            // the recovered 1x offset loses precision until the sensor is reset.
            let scaler = self.regs.read_reg16(RANGE_SCALER)?;
            self.scaling = scaling_from_scaler(scaler).unwrap_or(Scaling::One);
            self.ptp_offset *= i16::from(self.scaling.amount());
            tracing::debug!("VL6180X already configured at {}x", self.scaling.amount());
        }

        Ok(())
    }

    /// Loads the recommended settings from ST's AN4545 and resets the rest to
    /// power-on defaults.
    pub fn configure_default(&mut self) -> Result<()> {
        self.regs.write_reg(READOUT__AVERAGING_SAMPLE_PERIOD, 0x30)?;
        // ALS gain 1.01
        self.regs.write_reg(SYSALS__ANALOGUE_GAIN, 0x46)?;
        // VHV recalibration every 255 range measurements
        self.regs.write_reg(SYSRANGE__VHV_REPEAT_RATE, 0xFF)?;
        // 100 ms; the 0x63 belongs in the low byte at 0x041
        self.regs.write_reg16(SYSALS__INTEGRATION_PERIOD, 0x0063)?;
        self.regs.write_reg(SYSRANGE__VHV_RECALIBRATE, 0x01)?;

        // 100 ms and 500 ms
        self.regs.write_reg(SYSRANGE__INTERMEASUREMENT_PERIOD, 0x09)?;
        self.regs.write_reg(SYSALS__INTERMEASUREMENT_PERIOD, 0x31)?;
        // new sample ready interrupts for both ALS and range
        self.regs.write_reg(SYSTEM__INTERRUPT_CONFIG_GPIO, 0x24)?;

        self.regs.write_reg(SYSRANGE__MAX_CONVERGENCE_TIME, 0x31)?;
        self.regs.write_reg(INTERLEAVED_MODE__ENABLE, 0)?;
        self.interleaved = false;

        self.set_scaling(Scaling::One)
    }

    /// Sets the range scaling factor. 2x and 3x report raw values in 2 mm or
    /// 3 mm units, trading resolution for range.
    pub fn set_scaling(&mut self, scaling: Scaling) -> Result<()> {
        let amount = scaling.amount();
        self.regs.write_reg16(RANGE_SCALER, scaler_value(scaling))?;

        self.regs.write_reg(
            SYSRANGE__PART_TO_PART_RANGE_OFFSET,
            (self.ptp_offset / i16::from(amount)) as i8 as u8,
        )?;
        self.regs.write_reg(
            SYSRANGE__CROSSTALK_VALID_HEIGHT,
            DEFAULT_CROSSTALK_VALID_HEIGHT / amount,
        )?;

        // RANGE_IGNORE_VALID_HEIGHT is left unscaled

        // early convergence estimate only at 1x
        let early_convergence = u8::from(scaling == Scaling::One);
        self.regs.update_reg(SYSRANGE__RANGE_CHECK_ENABLES, |rce| {
            (rce & 0xFE) | early_convergence
        })?;

        self.scaling = scaling;
        Ok(())
    }

    fn wait_range_ready(&mut self) -> Result<()> {
        let regs = &mut self.regs;
        self.timer.start();
        self.timer.poll_until("range data", || {
            Ok(regs.read_reg(RESULT__INTERRUPT_STATUS_GPIO)? & 0x04 != 0)
        })
    }

    fn wait_ambient_ready(&mut self) -> Result<()> {
        let regs = &mut self.regs;
        self.timer.start();
        self.timer.poll_until("ambient data", || {
            Ok(regs.read_reg(RESULT__INTERRUPT_STATUS_GPIO)? & 0x20 != 0)
        })
    }

    /// Raw range in scaling units.
    pub fn read_range_single(&mut self) -> Result<u8> {
        self.regs.write_reg(SYSRANGE__START, 0x01)?;
        self.wait_range_ready()?;
        self.read_range_continuous()
    }

    pub fn read_range_single_mm(&mut self) -> Result<u16> {
        Ok(u16::from(self.scaling.amount()) * u16::from(self.read_range_single()?))
    }

    pub fn read_ambient_single(&mut self) -> Result<u16> {
        self.regs.write_reg(SYSALS__START, 0x01)?;
        self.wait_ambient_ready()?;
        self.read_ambient_continuous()
    }

    pub fn start_range_continuous(&mut self, period_ms: u32) -> Result<()> {
        self.regs
            .write_reg(SYSRANGE__INTERMEASUREMENT_PERIOD, period_register(period_ms))?;
        self.regs.write_reg(SYSRANGE__START, 0x03)
    }

    pub fn start_ambient_continuous(&mut self, period_ms: u32) -> Result<()> {
        self.regs
            .write_reg(SYSALS__INTERMEASUREMENT_PERIOD, period_register(period_ms))?;
        self.regs.write_reg(SYSALS__START, 0x03)
    }

    /// Alternates ALS and range measurements, both paced by the ALS period.
    pub fn start_interleaved_continuous(&mut self, period_ms: u32) -> Result<()> {
        self.regs.write_reg(INTERLEAVED_MODE__ENABLE, 1)?;
        self.interleaved = true;
        self.regs
            .write_reg(SYSALS__INTERMEASUREMENT_PERIOD, period_register(period_ms))?;
        self.regs.write_reg(SYSALS__START, 0x03)
    }

    pub fn stop(&mut self) -> Result<()> {
        self.regs.write_reg(SYSRANGE__START, 0x01)?;
        self.regs.write_reg(SYSALS__START, 0x01)?;

        self.regs.write_reg(INTERLEAVED_MODE__ENABLE, 0)?;
        self.interleaved = false;
        Ok(())
    }

    pub fn data_ready_range(&mut self) -> Result<bool> {
        Ok(self.regs.read_reg(RESULT__INTERRUPT_STATUS_GPIO)? & 0x04 != 0)
    }

    pub fn data_ready_ambient(&mut self) -> Result<bool> {
        Ok(self.regs.read_reg(RESULT__INTERRUPT_STATUS_GPIO)? & 0x20 != 0)
    }

    pub fn read_range_continuous(&mut self) -> Result<u8> {
        if !self.data_ready_range()? {
            return Err(LidarError::not_ready("range data"));
        }
        let range = self.regs.read_reg(RESULT__RANGE_VAL)?;
        self.regs.write_reg(SYSTEM__INTERRUPT_CLEAR, 0x01)?;
        Ok(range)
    }

    pub fn read_range_continuous_mm(&mut self) -> Result<u16> {
        Ok(u16::from(self.scaling.amount()) * u16::from(self.read_range_continuous()?))
    }

    pub fn read_ambient_continuous(&mut self) -> Result<u16> {
        if !self.data_ready_ambient()? {
            return Err(LidarError::not_ready("ambient data"));
        }
        let ambient = self.regs.read_reg16(RESULT__ALS_VAL)?;
        self.regs.write_reg(SYSTEM__INTERRUPT_CLEAR, 0x02)?;
        Ok(ambient)
    }
}

impl<B: I2cBus> RangeSensor for Vl6180x<B> {
    fn kind(&self) -> SensorKind {
        SensorKind::Vl6180x
    }

    fn address(&self) -> u8 {
        self.regs.address()
    }

    fn set_address(&mut self, address: u8) -> Result<()> {
        if address == self.regs.address() {
            return Ok(());
        }
        check_address(address)?;
        self.regs
            .write_reg(I2C_SLAVE__DEVICE_ADDRESS, address & 0x7F)?;
        self.regs.set_address(address)
    }

    fn initialize(&mut self) -> Result<()> {
        self.init()?;
        self.configure_default()
    }

    fn configure(&mut self, settings: &SensorSettings) -> Result<()> {
        settings.check_supported(SensorKind::Vl6180x)?;
        if let Some(scaling) = settings.scaling {
            self.set_scaling(scaling)?;
        }
        Ok(())
    }

    fn start_continuous(&mut self, period_ms: u32) -> Result<()> {
        self.start_range_continuous(period_ms)
    }

    fn stop_continuous(&mut self) -> Result<()> {
        self.stop()
    }

    fn read_range_mm(&mut self) -> Result<u16> {
        self.wait_range_ready()?;
        self.read_range_continuous_mm()
    }

    fn read_reading(&mut self) -> Result<Reading> {
        let range_mm = self.read_range_mm()?;
        let mut reading = Reading::range(SensorKind::Vl6180x, range_mm);
        if self.interleaved && self.data_ready_ambient()? {
            reading.ambient = Some(self.read_ambient_continuous()?);
        }
        Ok(reading)
    }

    fn set_timeout(&mut self, timeout: Duration) {
        self.timer.set_timeout(timeout);
    }

    fn timeout(&self) -> Duration {
        self.timer.timeout()
    }

    fn timeout_occurred(&mut self) -> bool {
        self.timer.take_occurred()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::sim::SimulatedBus;

    fn initialized() -> (SimulatedBus, Vl6180x<SimulatedBus>) {
        let sim = SimulatedBus::with_preset(SensorKind::Vl6180x, DEFAULT_ADDRESS);
        let mut sensor = Vl6180x::new(sim.clone()).unwrap();
        sensor.initialize().unwrap();
        (sim, sensor)
    }

    #[test]
    fn test_fresh_sensor_gets_private_settings() {
        let (sim, sensor) = initialized();

        assert_eq!(sim.register(0x29, SYSTEM__FRESH_OUT_OF_RESET), Some(0));
        assert_eq!(sim.register(0x29, 0x1A7), Some(0x1F));
        assert_eq!(sim.register16(0x29, RANGE_SCALER), Some(253));
        assert_eq!(sim.register(0x29, SYSTEM__INTERRUPT_CONFIG_GPIO), Some(0x24));
        assert_eq!(sim.register16(0x29, SYSALS__INTEGRATION_PERIOD), Some(0x0063));
        assert_eq!(sensor.scaling(), Scaling::One);
    }

    #[test]
    fn test_reinitialized_sensor_recovers_scaling() {
        let sim = SimulatedBus::with_preset(SensorKind::Vl6180x, DEFAULT_ADDRESS);
        sim.set_register(0x29, SYSTEM__FRESH_OUT_OF_RESET, 0);
        sim.set_register16(0x29, RANGE_SCALER, 127);
        let mut sensor = Vl6180x::new(sim.clone()).unwrap();

        sensor.init().unwrap();
        assert_eq!(sensor.scaling(), Scaling::Two);
        assert!(sim.writes(0x29, 0x207).is_empty());

        // the 2x offset of 12 is 24 at 1x
        sensor.set_scaling(Scaling::One).unwrap();
        assert_eq!(sim.register(0x29, SYSRANGE__PART_TO_PART_RANGE_OFFSET), Some(24));
    }

    #[test]
    fn test_wrong_model_id_is_reported() {
        let sim = SimulatedBus::with_preset(SensorKind::Vl6180x, DEFAULT_ADDRESS);
        sim.set_register(0x29, IDENTIFICATION__MODEL_ID, 0xEE);
        let mut sensor = Vl6180x::new(sim).unwrap();

        let err = sensor.init().unwrap_err();
        assert_eq!(
            err.to_string(),
            "VL6180X expected to have model ID 0xb4, got 0xee"
        );
    }

    #[test]
    fn test_scaling_updates_dependent_registers() {
        let (sim, mut sensor) = initialized();
        sim.set_register(0x29, SYSRANGE__RANGE_CHECK_ENABLES, 0x11);

        sensor.set_scaling(Scaling::Three).unwrap();
        assert_eq!(sim.register16(0x29, RANGE_SCALER), Some(84));
        assert_eq!(sim.register(0x29, SYSRANGE__PART_TO_PART_RANGE_OFFSET), Some(4));
        assert_eq!(sim.register(0x29, SYSRANGE__CROSSTALK_VALID_HEIGHT), Some(6));
        assert_eq!(sim.register(0x29, SYSRANGE__RANGE_CHECK_ENABLES), Some(0x10));

        sensor.set_scaling(Scaling::One).unwrap();
        assert_eq!(sim.register(0x29, SYSRANGE__RANGE_CHECK_ENABLES), Some(0x11));
        assert_eq!(sim.register(0x29, SYSRANGE__PART_TO_PART_RANGE_OFFSET), Some(12));
    }

    #[test]
    fn test_negative_offset_survives_scaling() {
        let sim = SimulatedBus::with_preset(SensorKind::Vl6180x, DEFAULT_ADDRESS);
        sim.set_register(0x29, SYSRANGE__PART_TO_PART_RANGE_OFFSET, 0xFA);
        let mut sensor = Vl6180x::new(sim.clone()).unwrap();
        sensor.init().unwrap();

        sensor.set_scaling(Scaling::Two).unwrap();
        assert_eq!(sim.register(0x29, SYSRANGE__PART_TO_PART_RANGE_OFFSET), Some(0xFD));
    }

    #[test]
    fn test_single_reads_apply_scaling() {
        let (_sim, mut sensor) = initialized();
        assert_eq!(sensor.read_range_single().unwrap(), 100);
        assert_eq!(sensor.read_ambient_single().unwrap(), 0x0123);

        sensor.set_scaling(Scaling::Two).unwrap();
        assert_eq!(sensor.read_range_single_mm().unwrap(), 200);
    }

    #[test]
    fn test_single_ambient_times_out() {
        let (sim, mut sensor) = initialized();
        sim.pin(0x29, RESULT__INTERRUPT_STATUS_GPIO, 0x04);
        sensor.set_timeout(Duration::from_millis(5));

        let err = sensor.read_ambient_single().unwrap_err();
        assert!(matches!(err, LidarError::Timeout { .. }));
        assert!(sensor.timeout_occurred());
        assert!(!sensor.timeout_occurred());
    }

    #[test]
    fn test_continuous_period_is_clamped() {
        assert_eq!(period_register(100), 9);
        assert_eq!(period_register(5), 0);
        assert_eq!(period_register(5_000), 254);

        let (sim, mut sensor) = initialized();
        sensor.start_range_continuous(50).unwrap();
        assert_eq!(sim.register(0x29, SYSRANGE__INTERMEASUREMENT_PERIOD), Some(4));
        assert_eq!(sim.register(0x29, SYSRANGE__START), Some(0x03));
    }

    #[test]
    fn test_interleaved_reading_includes_ambient() {
        let (sim, mut sensor) = initialized();
        sensor.start_interleaved_continuous(200).unwrap();
        assert_eq!(sim.register(0x29, INTERLEAVED_MODE__ENABLE), Some(1));

        let reading = sensor.read_reading().unwrap();
        assert_eq!(reading.range_mm, 100);
        assert_eq!(reading.ambient, Some(0x0123));

        sensor.stop_continuous().unwrap();
        assert_eq!(sim.register(0x29, INTERLEAVED_MODE__ENABLE), Some(0));
        assert_eq!(sim.register(0x29, SYSALS__START), Some(0x01));
    }

    #[test]
    fn test_continuous_reads_require_ready_data() {
        let (sim, mut sensor) = initialized();
        sim.pin(0x29, RESULT__INTERRUPT_STATUS_GPIO, 0x00);

        assert!(matches!(
            sensor.read_range_continuous(),
            Err(LidarError::NotReady { .. })
        ));
        assert!(matches!(
            sensor.read_ambient_continuous(),
            Err(LidarError::NotReady { .. })
        ));
    }

    #[test]
    fn test_configure_rejects_budget_and_applies_scaling() {
        let (sim, mut sensor) = initialized();
        let settings = SensorSettings {
            scaling: Some(Scaling::Two),
            ..Default::default()
        };
        sensor.configure(&settings).unwrap();
        assert_eq!(sim.register16(0x29, RANGE_SCALER), Some(127));

        let settings = SensorSettings {
            timing_budget_us: Some(33_000),
            ..Default::default()
        };
        assert!(sensor.configure(&settings).is_err());
    }

    #[test]
    fn test_set_address_moves_device() {
        let (sim, mut sensor) = initialized();
        sensor.set_address(0x31).unwrap();

        assert_eq!(sensor.address(), 0x31);
        assert!(sim.has_device(0x31));
        assert_eq!(sensor.read_range_single().unwrap(), 100);
    }
}
