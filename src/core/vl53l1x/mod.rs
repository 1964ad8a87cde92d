//! VL53L1X long-range time-of-flight sensor. Register sequences derive from
//! Pololu's vl53l1x-arduino library.

pub mod calculations;
pub mod registers;

use self::calculations::{
    calc_macro_period, count_rate_fixed_to_float, decode_timeout, encode_timeout, range_to_mm,
    timeout_mclks_to_us, timeout_us_to_mclks,
};
use self::registers::*;
use crate::adapters::StdDelay;
use crate::core::register::{check_address, RegisterBus};
use crate::core::sensor::{RangeSensor, SensorSettings};
use crate::core::timeout::TimeoutTimer;
use crate::domain::model::{
    DistanceMode, RangeStatus, RangingData, Reading, SensorKind, DEFAULT_ADDRESS,
};
use crate::domain::ports::{Delay, I2cBus};
use crate::utils::error::{LidarError, Result};
use std::time::Duration;

const DEFAULT_TIMING_BUDGET_US: u32 = 50_000;
const MAX_RANGE_TIMEOUT_US: u32 = 550_000;

#[derive(Debug, Clone, Copy, Default)]
struct RawResults {
    range_status: u8,
    stream_count: u8,
    dss_actual_effective_spads_sd0: u16,
    ambient_count_rate_mcps_sd0: u16,
    final_crosstalk_corrected_range_mm_sd0: u16,
    peak_signal_count_rate_crosstalk_corrected_mcps_sd0: u16,
}

pub struct Vl53l1x<B: I2cBus, D: Delay = StdDelay> {
    regs: RegisterBus<B>,
    delay: D,
    timer: TimeoutTimer,
    fast_osc_frequency: u16,
    osc_calibrate_val: u16,
    calibrated: bool,
    saved_vhv_init: u8,
    saved_vhv_timeout: u8,
    distance_mode: DistanceMode,
}

impl<B: I2cBus> Vl53l1x<B> {
    pub fn new(bus: B) -> Result<Self> {
        Self::with_delay(bus, StdDelay)
    }
}

impl<B: I2cBus, D: Delay> Vl53l1x<B, D> {
    pub fn with_delay(bus: B, delay: D) -> Result<Self> {
        Self::at_address(bus, delay, DEFAULT_ADDRESS)
    }

    /// Talks to a sensor that already listens on `address`.
    pub fn at_address(bus: B, delay: D, address: u8) -> Result<Self> {
        Ok(Self {
            regs: RegisterBus::new(bus, SensorKind::Vl53l1x.addressing(), address)?,
            delay,
            timer: TimeoutTimer::default(),
            fast_osc_frequency: 0,
            osc_calibrate_val: 0,
            calibrated: false,
            saved_vhv_init: 0,
            saved_vhv_timeout: 0,
            distance_mode: DistanceMode::Unknown,
        })
    }

    /// Gives the bus back.
    pub fn release(self) -> B {
        self.regs.into_inner()
    }

    pub fn distance_mode(&self) -> DistanceMode {
        self.distance_mode
    }

    pub fn init(&mut self) -> Result<()> {
        let model_id = self.regs.read_reg16(IDENTIFICATION__MODEL_ID)?;
        if model_id != MODEL_ID {
            tracing::warn!(
                "VL53L1X at 0x{:02x} reported model ID 0x{:04x}",
                self.regs.address(),
                model_id
            );
            return Err(LidarError::IncorrectModelId {
                part: "VL53L1X",
                expected: MODEL_ID,
                actual: model_id,
            });
        }

        tracing::debug!("VL53L1X soft reset");
        self.regs.write_reg(SOFT_RESET, 0x00)?;
        self.delay.delay(Duration::from_micros(100));
        self.regs.write_reg(SOFT_RESET, 0x01)?;
        self.delay.delay(Duration::from_secs(1));

        self.await_boot()?;

        // io_2v8
        self.regs
            .update_reg(PAD_I2C_HV__EXTSUP_CONFIG, |value| value | 0x01)?;

        self.fast_osc_frequency = self.regs.read_reg16(OSC_MEASURED__FAST_OSC__FREQUENCY)?;
        self.osc_calibrate_val = self.regs.read_reg16(RESULT__OSC_CALIBRATE_VAL)?;
        tracing::debug!(
            "VL53L1X fast osc {} osc calibrate {}",
            self.fast_osc_frequency,
            self.osc_calibrate_val
        );

        for write in STATIC_CONFIG {
            match *write {
                StaticWrite::Byte(reg, value) => self.regs.write_reg(reg, value)?,
                StaticWrite::Word(reg, value) => self.regs.write_reg16(reg, value)?,
            }
        }

        self.set_distance_mode(DistanceMode::Long)?;
        self.set_measurement_timing_budget(DEFAULT_TIMING_BUDGET_US)?;

        let outer_offset = self.regs.read_reg16(MM_CONFIG__OUTER_OFFSET_MM)?;
        self.regs.write_reg16(
            ALGO__PART_TO_PART_RANGE_OFFSET_MM,
            outer_offset.wrapping_mul(4),
        )?;

        tracing::debug!("VL53L1X at 0x{:02x} initialized", self.regs.address());
        Ok(())
    }

    /// The firmware ignores the bus while it boots, so failed transactions
    /// count as "not yet".
    fn await_boot(&mut self) -> Result<()> {
        let regs = &mut self.regs;
        self.timer.start();
        self.timer.poll_until("system boot", || {
            let booted = regs
                .read_reg(FIRMWARE__SYSTEM_STATUS)
                .map(|status| status & 0x01 != 0)
                .unwrap_or(false);
            Ok(booted && regs.last_op_successful().unwrap_or(false))
        })
    }

    pub fn set_distance_mode(&mut self, mode: DistanceMode) -> Result<()> {
        let timing = match mode {
            DistanceMode::Short => SHORT_MODE,
            DistanceMode::Medium => MEDIUM_MODE,
            DistanceMode::Long => LONG_MODE,
            DistanceMode::Unknown => {
                return Err(LidarError::invalid_argument(
                    "distance mode must be short, medium or long",
                ))
            }
        };

        let budget_us = self.measurement_timing_budget()?;

        self.regs
            .write_reg(RANGE_CONFIG__VCSEL_PERIOD_A, timing.vcsel_period_a)?;
        self.regs
            .write_reg(RANGE_CONFIG__VCSEL_PERIOD_B, timing.vcsel_period_b)?;
        self.regs
            .write_reg(RANGE_CONFIG__VALID_PHASE_HIGH, timing.valid_phase_high)?;
        self.regs.write_reg(SD_CONFIG__WOI_SD0, timing.woi_sd0)?;
        self.regs.write_reg(SD_CONFIG__WOI_SD1, timing.woi_sd1)?;
        self.regs
            .write_reg(SD_CONFIG__INITIAL_PHASE_SD0, timing.initial_phase_sd0)?;
        self.regs
            .write_reg(SD_CONFIG__INITIAL_PHASE_SD1, timing.initial_phase_sd1)?;

        self.set_measurement_timing_budget(budget_us)?;
        self.distance_mode = mode;
        tracing::debug!("VL53L1X distance mode {:?}", mode);
        Ok(())
    }

    fn macro_period(&mut self, vcsel_period_reg: u16) -> Result<u32> {
        let vcsel_period = self.regs.read_reg(vcsel_period_reg)?;
        let macro_period_us = calc_macro_period(self.fast_osc_frequency, vcsel_period);
        if macro_period_us == 0 {
            return Err(LidarError::invalid_state(
                "oscillator frequency unknown, initialize the sensor first",
            ));
        }
        Ok(macro_period_us)
    }

    pub fn set_measurement_timing_budget(&mut self, budget_us: u32) -> Result<()> {
        if budget_us < TIMING_GUARD {
            return Err(LidarError::invalid_argument(format!(
                "timing budget {} us is below the {} us minimum",
                budget_us, TIMING_GUARD
            )));
        }
        let range_config_timeout_us = (budget_us - TIMING_GUARD) / 2;
        if range_config_timeout_us > MAX_RANGE_TIMEOUT_US {
            return Err(LidarError::invalid_argument(format!(
                "timing budget {} us is too large",
                budget_us
            )));
        }

        let macro_period_us = self.macro_period(RANGE_CONFIG__VCSEL_PERIOD_A)?;

        let phasecal_timeout_mclks = timeout_us_to_mclks(1000, macro_period_us).min(0xFF);
        self.regs
            .write_reg(PHASECAL_CONFIG__TIMEOUT_MACROP, phasecal_timeout_mclks as u8)?;

        self.regs.write_reg16(
            MM_CONFIG__TIMEOUT_MACROP_A,
            encode_timeout(timeout_us_to_mclks(1, macro_period_us)),
        )?;
        self.regs.write_reg16(
            RANGE_CONFIG__TIMEOUT_MACROP_A,
            encode_timeout(timeout_us_to_mclks(range_config_timeout_us, macro_period_us)),
        )?;

        let macro_period_us = self.macro_period(RANGE_CONFIG__VCSEL_PERIOD_B)?;

        self.regs.write_reg16(
            MM_CONFIG__TIMEOUT_MACROP_B,
            encode_timeout(timeout_us_to_mclks(1, macro_period_us)),
        )?;
        self.regs.write_reg16(
            RANGE_CONFIG__TIMEOUT_MACROP_B,
            encode_timeout(timeout_us_to_mclks(range_config_timeout_us, macro_period_us)),
        )?;

        Ok(())
    }

    pub fn measurement_timing_budget(&mut self) -> Result<u32> {
        let macro_period_us = self.macro_period(RANGE_CONFIG__VCSEL_PERIOD_A)?;
        let range_config_timeout_us = timeout_mclks_to_us(
            decode_timeout(self.regs.read_reg16(RANGE_CONFIG__TIMEOUT_MACROP_A)?),
            macro_period_us,
        );
        Ok(range_config_timeout_us
            .saturating_mul(2)
            .saturating_add(TIMING_GUARD))
    }

    /// Sets the ROI size in SPADs. Sides are clamped to 4..=16; a side above 10
    /// re-centres the ROI.
    pub fn set_roi_size(&mut self, width: u8, height: u8) -> Result<()> {
        let width = width.clamp(4, 16);
        let height = height.clamp(4, 16);
        if width > 10 || height > 10 {
            self.regs.write_reg(ROI_CONFIG__USER_ROI_CENTRE_SPAD, 199)?;
        }
        self.regs.write_reg(
            ROI_CONFIG__USER_ROI_REQUESTED_GLOBAL_XY_SIZE,
            ((height - 1) << 4) | (width - 1),
        )
    }

    /// ROI width and height in SPADs.
    pub fn roi_size(&mut self) -> Result<(u8, u8)> {
        let reg_val = self
            .regs
            .read_reg(ROI_CONFIG__USER_ROI_REQUESTED_GLOBAL_XY_SIZE)?;
        Ok(((reg_val & 0x0F) + 1, (reg_val >> 4) + 1))
    }

    pub fn set_roi_center(&mut self, spad_number: u8) -> Result<()> {
        self.regs
            .write_reg(ROI_CONFIG__USER_ROI_CENTRE_SPAD, spad_number)
    }

    pub fn roi_center(&mut self) -> Result<u8> {
        self.regs.read_reg(ROI_CONFIG__USER_ROI_CENTRE_SPAD)
    }

    pub fn start(&mut self, period_ms: u32) -> Result<()> {
        self.regs.write_reg32(
            SYSTEM__INTERMEASUREMENT_PERIOD,
            period_ms.wrapping_mul(u32::from(self.osc_calibrate_val)),
        )?;
        self.regs.write_reg(SYSTEM__INTERRUPT_CLEAR, 0x01)?;
        self.regs.write_reg(SYSTEM__MODE_START, 0x40)
    }

    pub fn stop(&mut self) -> Result<()> {
        self.regs.write_reg(SYSTEM__MODE_START, 0x80)?;
        self.calibrated = false;

        if self.saved_vhv_init != 0 {
            self.regs.write_reg(VHV_CONFIG__INIT, self.saved_vhv_init)?;
        }
        if self.saved_vhv_timeout != 0 {
            self.regs
                .write_reg(VHV_CONFIG__TIMEOUT_MACROP_LOOP_BOUND, self.saved_vhv_timeout)?;
        }

        self.regs.write_reg(PHASECAL_CONFIG__OVERRIDE, 0x00)
    }

    pub fn data_ready(&mut self) -> Result<bool> {
        Ok(self.regs.read_reg(GPIO__TIO_HV_STATUS)? & 0x01 == 0)
    }

    /// Waits for the next measurement and returns it in millimetres.
    pub fn read(&mut self) -> Result<u16> {
        Ok(self.read_ranging_data()?.range_mm)
    }

    /// Triggers one measurement and waits for it.
    pub fn read_single(&mut self) -> Result<u16> {
        self.regs.write_reg(SYSTEM__INTERRUPT_CLEAR, 0x01)?;
        self.regs.write_reg(SYSTEM__MODE_START, 0x10)?;
        self.read()
    }

    pub fn read_ranging_data(&mut self) -> Result<RangingData> {
        {
            let regs = &mut self.regs;
            self.timer.start();
            self.timer.poll_until("range data", || {
                Ok(regs.read_reg(GPIO__TIO_HV_STATUS)? & 0x01 == 0)
            })?;
        }

        let results = self.read_results()?;

        if !self.calibrated {
            self.setup_manual_calibration()?;
            self.calibrated = true;
        }

        self.update_dss(&results)?;

        self.regs.write_reg(SYSTEM__INTERRUPT_CLEAR, 0x01)?;

        Ok(RangingData {
            range_mm: range_to_mm(results.final_crosstalk_corrected_range_mm_sd0),
            status: RangeStatus::from_device(results.range_status, results.stream_count),
            peak_signal_count_rate_mcps: count_rate_fixed_to_float(
                results.peak_signal_count_rate_crosstalk_corrected_mcps_sd0,
            ),
            ambient_count_rate_mcps: count_rate_fixed_to_float(
                results.ambient_count_rate_mcps_sd0,
            ),
        })
    }

    fn read_results(&mut self) -> Result<RawResults> {
        let mut block = self
            .regs
            .request_block(RESULT__RANGE_STATUS, RESULT_BLOCK_LEN)?;

        let range_status = block.read_u8()?;
        block.skip(1)?; // report_status
        let stream_count = block.read_u8()?;
        let dss_actual_effective_spads_sd0 = block.read_u16()?;
        block.skip(2)?; // peak_signal_count_rate_mcps_sd0
        let ambient_count_rate_mcps_sd0 = block.read_u16()?;
        block.skip(2)?; // sigma_sd0
        block.skip(2)?; // phase_sd0
        let final_crosstalk_corrected_range_mm_sd0 = block.read_u16()?;
        let peak_signal_count_rate_crosstalk_corrected_mcps_sd0 = block.read_u16()?;

        Ok(RawResults {
            range_status,
            stream_count,
            dss_actual_effective_spads_sd0,
            ambient_count_rate_mcps_sd0,
            final_crosstalk_corrected_range_mm_sd0,
            peak_signal_count_rate_crosstalk_corrected_mcps_sd0,
        })
    }

    fn setup_manual_calibration(&mut self) -> Result<()> {
        self.saved_vhv_init = self.regs.read_reg(VHV_CONFIG__INIT)?;
        self.saved_vhv_timeout = self.regs.read_reg(VHV_CONFIG__TIMEOUT_MACROP_LOOP_BOUND)?;

        self.regs
            .write_reg(VHV_CONFIG__INIT, self.saved_vhv_init & 0x7F)?;
        self.regs.write_reg(
            VHV_CONFIG__TIMEOUT_MACROP_LOOP_BOUND,
            (self.saved_vhv_timeout & 0x03) + (3 << 2),
        )?;

        self.regs.write_reg(PHASECAL_CONFIG__OVERRIDE, 0x01)?;
        let vcsel_start = self.regs.read_reg(PHASECAL_RESULT__VCSEL_START)?;
        self.regs.write_reg(CAL_CONFIG__VCSEL_START, vcsel_start)
    }

    fn update_dss(&mut self, results: &RawResults) -> Result<()> {
        let spad_count = u32::from(results.dss_actual_effective_spads_sd0);

        if spad_count != 0 {
            let total_rate = (u32::from(results.peak_signal_count_rate_crosstalk_corrected_mcps_sd0)
                + u32::from(results.ambient_count_rate_mcps_sd0))
            .min(0xFFFF);
            let total_rate_per_spad = (total_rate << 16) / spad_count;

            if total_rate_per_spad != 0 {
                let required_spads =
                    ((u32::from(TARGET_RATE) << 16) / total_rate_per_spad).min(0xFFFF);
                return self
                    .regs
                    .write_reg16(DSS_CONFIG__MANUAL_EFFECTIVE_SPADS_SELECT, required_spads as u16);
            }
        }

        // zero rate per SPAD: request the maximum
        self.regs
            .write_reg16(DSS_CONFIG__MANUAL_EFFECTIVE_SPADS_SELECT, 0x8000)
    }
}

impl<B: I2cBus, D: Delay> RangeSensor for Vl53l1x<B, D> {
    fn kind(&self) -> SensorKind {
        SensorKind::Vl53l1x
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
        self.init()
    }

    fn configure(&mut self, settings: &SensorSettings) -> Result<()> {
        settings.check_supported(SensorKind::Vl53l1x)?;
        if let Some(mode) = settings.distance_mode {
            self.set_distance_mode(mode)?;
        }
        if let Some(budget_us) = settings.timing_budget_us {
            self.set_measurement_timing_budget(budget_us)?;
        }
        if let Some((width, height)) = settings.roi {
            self.set_roi_size(width, height)?;
        }
        Ok(())
    }

    fn start_continuous(&mut self, period_ms: u32) -> Result<()> {
        self.start(period_ms)
    }

    fn stop_continuous(&mut self) -> Result<()> {
        self.stop()
    }

    fn read_range_mm(&mut self) -> Result<u16> {
        self.read()
    }

    fn read_reading(&mut self) -> Result<Reading> {
        let data = self.read_ranging_data()?;
        let mut reading = Reading::range(SensorKind::Vl53l1x, data.range_mm);
        reading.status = Some(data.status);
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
