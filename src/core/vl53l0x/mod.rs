//! VL53L0X time-of-flight sensor. Register sequences derive from Pololu's
//! vl53l0x-arduino library, itself based on ST's VL53L0X API.

pub mod calculations;
pub mod registers;

use self::calculations::{
    decode_timeout, decode_vcsel_period, encode_timeout, encode_vcsel_period,
    timeout_mclks_to_us, timeout_us_to_mclks,
};
use self::registers::*;
use crate::core::register::{check_address, RegisterBus};
use crate::core::sensor::{RangeSensor, SensorSettings};
use crate::core::timeout::TimeoutTimer;
use crate::domain::model::{SensorKind, VcselPeriodType, DEFAULT_ADDRESS};
use crate::domain::ports::I2cBus;
use crate::utils::error::{LidarError, Result};
use std::time::Duration;

const START_OVERHEAD: u32 = 1910;
const END_OVERHEAD: u32 = 960;
const MSRC_OVERHEAD: u32 = 660;
const TCC_OVERHEAD: u32 = 590;
const DSS_OVERHEAD: u32 = 690;
const PRE_RANGE_OVERHEAD: u32 = 660;
const FINAL_RANGE_OVERHEAD: u32 = 550;

pub const MIN_TIMING_BUDGET_US: u32 = 20_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpadInfo {
    pub count: u8,
    pub is_aperture: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SequenceStepEnables {
    pub tcc: bool,
    pub msrc: bool,
    pub dss: bool,
    pub pre_range: bool,
    pub final_range: bool,
}

impl SequenceStepEnables {
    pub fn from_config(sequence_config: u8) -> Self {
        Self {
            tcc: (sequence_config >> 4) & 0x1 != 0,
            dss: (sequence_config >> 3) & 0x1 != 0,
            msrc: (sequence_config >> 2) & 0x1 != 0,
            pre_range: (sequence_config >> 6) & 0x1 != 0,
            final_range: (sequence_config >> 7) & 0x1 != 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SequenceStepTimeouts {
    pub pre_range_vcsel_period_pclks: u8,
    pub final_range_vcsel_period_pclks: u8,
    pub msrc_dss_tcc_mclks: u32,
    pub pre_range_mclks: u32,
    pub final_range_mclks: u32,
    pub msrc_dss_tcc_us: u32,
    pub pre_range_us: u32,
    pub final_range_us: u32,
}

pub struct Vl53l0x<B: I2cBus> {
    regs: RegisterBus<B>,
    timer: TimeoutTimer,
    stop_variable: u8,
    measurement_timing_budget_us: u32,
}

impl<B: I2cBus> Vl53l0x<B> {
    pub fn new(bus: B) -> Result<Self> {
        Self::at_address(bus, DEFAULT_ADDRESS)
    }

    pub fn at_address(bus: B, address: u8) -> Result<Self> {
        Ok(Self {
            regs: RegisterBus::new(bus, SensorKind::Vl53l0x.addressing(), address)?,
            timer: TimeoutTimer::default(),
            stop_variable: 0,
            measurement_timing_budget_us: 0,
        })
    }

    pub fn release(self) -> B {
        self.regs.into_inner()
    }

    pub fn init(&mut self) -> Result<()> {
        let model_id = self.regs.read_reg(IDENTIFICATION_MODEL_ID)?;
        if model_id != MODEL_ID {
            tracing::warn!(
                "VL53L0X at 0x{:02x} reported model ID 0x{:02x}",
                self.regs.address(),
                model_id
            );
            return Err(LidarError::IncorrectModelId {
                part: "VL53L0X",
                expected: u16::from(MODEL_ID),
                actual: u16::from(model_id),
            });
        }

        // io_2v8
        self.regs
            .update_reg(VHV_CONFIG_PAD_SCL_SDA__EXTSUP_HV, |value| value | 0x01)?;

        // I2C standard mode
        self.regs.write_reg(I2C_MODE, 0x00)?;

        self.regs.write_reg(POWER_MANAGEMENT_GO1_POWER_FORCE, 0x01)?;
        self.regs.write_reg(PAGE_SELECT, 0x01)?;
        self.regs.write_reg(SYSRANGE_START, 0x00)?;
        self.stop_variable = self.regs.read_reg(STOP_VARIABLE)?;
        self.regs.write_reg(SYSRANGE_START, 0x01)?;
        self.regs.write_reg(PAGE_SELECT, 0x00)?;
        self.regs.write_reg(POWER_MANAGEMENT_GO1_POWER_FORCE, 0x00)?;

        // disable SIGNAL_RATE_MSRC (bit 1) and SIGNAL_RATE_PRE_RANGE (bit 4) limit checks
        self.regs
            .update_reg(MSRC_CONFIG_CONTROL, |value| value | 0x12)?;

        self.set_signal_rate_limit(0.25)?;

        self.regs.write_reg(SYSTEM_SEQUENCE_CONFIG, 0xFF)?;

        let spad_info = self.spad_info()?;
        tracing::debug!(
            "VL53L0X reference SPADs: {} (aperture: {})",
            spad_info.count,
            spad_info.is_aperture
        );
        self.set_reference_spads(spad_info)?;

        for (reg, value) in TUNING_SETTINGS {
            self.regs.write_reg(*reg, *value)?;
        }

        // interrupt on new sample ready, active low
        self.regs.write_reg(SYSTEM_INTERRUPT_CONFIG_GPIO, 0x04)?;
        self.regs
            .update_reg(GPIO_HV_MUX_ACTIVE_HIGH, |value| value & !0x10)?;
        self.regs.write_reg(SYSTEM_INTERRUPT_CLEAR, 0x01)?;

        self.measurement_timing_budget_us = self.measurement_timing_budget()?;

        // disable MSRC and TCC
        self.regs.write_reg(SYSTEM_SEQUENCE_CONFIG, 0xE8)?;

        self.set_measurement_timing_budget(self.measurement_timing_budget_us)?;

        self.regs.write_reg(SYSTEM_SEQUENCE_CONFIG, 0x01)?;
        self.perform_single_ref_calibration(0x40, "VHV calibration")?;

        self.regs.write_reg(SYSTEM_SEQUENCE_CONFIG, 0x02)?;
        self.perform_single_ref_calibration(0x00, "phase calibration")?;

        self.regs.write_reg(SYSTEM_SEQUENCE_CONFIG, 0xE8)?;

        tracing::debug!(
            "VL53L0X at 0x{:02x} initialized, timing budget {} us",
            self.regs.address(),
            self.measurement_timing_budget_us
        );
        Ok(())
    }

    fn set_reference_spads(&mut self, spad_info: SpadInfo) -> Result<()> {
        let mut ref_spad_map = [0u8; SPAD_MAP_LEN];
        self.regs
            .read_reg_multi(GLOBAL_CONFIG_SPAD_ENABLES_REF_0, &mut ref_spad_map)?;

        self.regs.write_reg(PAGE_SELECT, 0x01)?;
        self.regs.write_reg(DYNAMIC_SPAD_REF_EN_START_OFFSET, 0x00)?;
        self.regs
            .write_reg(DYNAMIC_SPAD_NUM_REQUESTED_REF_SPAD, 0x2C)?;
        self.regs.write_reg(PAGE_SELECT, 0x00)?;
        self.regs
            .write_reg(GLOBAL_CONFIG_REF_EN_START_SELECT, 0xB4)?;

        // 12 is the first aperture SPAD
        let first_spad_to_enable = if spad_info.is_aperture { 12 } else { 0 };
        let mut spads_enabled = 0u8;

        for i in 0..(SPAD_MAP_LEN * 8) {
            let (byte, bit) = (i / 8, i % 8);
            if i < first_spad_to_enable || spads_enabled == spad_info.count {
                ref_spad_map[byte] &= !(1 << bit);
            } else if (ref_spad_map[byte] >> bit) & 0x1 != 0 {
                spads_enabled += 1;
            }
        }

        self.regs
            .write_reg_multi(GLOBAL_CONFIG_SPAD_ENABLES_REF_0, &ref_spad_map)
    }

    /// Reads the reference SPAD count and type from the device's NVM.
    pub fn spad_info(&mut self) -> Result<SpadInfo> {
        self.regs.write_reg(POWER_MANAGEMENT_GO1_POWER_FORCE, 0x01)?;
        self.regs.write_reg(PAGE_SELECT, 0x01)?;
        self.regs.write_reg(SYSRANGE_START, 0x00)?;

        self.regs.write_reg(PAGE_SELECT, 0x06)?;
        self.regs.update_reg(0x83, |value| value | 0x04)?;
        self.regs.write_reg(PAGE_SELECT, 0x07)?;
        self.regs.write_reg(SYSTEM_HISTOGRAM_BIN, 0x01)?;

        self.regs.write_reg(POWER_MANAGEMENT_GO1_POWER_FORCE, 0x01)?;

        self.regs.write_reg(0x94, 0x6B)?;
        self.regs.write_reg(0x83, 0x00)?;

        {
            let regs = &mut self.regs;
            self.timer.start();
            self.timer
                .poll_until("SPAD info", || Ok(regs.read_reg(0x83)? != 0x00))
                .map_err(|e| match e {
                    LidarError::Timeout { .. } => LidarError::NoSpadInfo,
                    other => other,
                })?;
        }

        self.regs.write_reg(0x83, 0x01)?;
        let tmp = self.regs.read_reg(0x92)?;
        let info = SpadInfo {
            count: tmp & 0x7F,
            is_aperture: (tmp >> 7) & 0x01 != 0,
        };

        self.regs.write_reg(SYSTEM_HISTOGRAM_BIN, 0x00)?;
        self.regs.write_reg(PAGE_SELECT, 0x06)?;
        self.regs.update_reg(0x83, |value| value & !0x04)?;
        self.regs.write_reg(PAGE_SELECT, 0x01)?;
        self.regs.write_reg(SYSRANGE_START, 0x01)?;

        self.regs.write_reg(PAGE_SELECT, 0x00)?;
        self.regs.write_reg(POWER_MANAGEMENT_GO1_POWER_FORCE, 0x00)?;

        Ok(info)
    }

    /// Sets the return signal rate limit in MCPS. Lower limits extend range at
    /// the cost of accuracy.
    pub fn set_signal_rate_limit(&mut self, limit_mcps: f32) -> Result<()> {
        if !(0.0..=511.99).contains(&limit_mcps) {
            return Err(LidarError::invalid_argument(format!(
                "signal rate limit {} MCPS is outside 0..=511.99",
                limit_mcps
            )));
        }
        // Q9.7 fixed point
        self.regs.write_reg16(
            FINAL_RANGE_CONFIG_MIN_COUNT_RATE_RTN_LIMIT,
            (limit_mcps * (1 << 7) as f32) as u16,
        )
    }

    pub fn signal_rate_limit(&mut self) -> Result<f32> {
        let raw = self
            .regs
            .read_reg16(FINAL_RANGE_CONFIG_MIN_COUNT_RATE_RTN_LIMIT)?;
        Ok(f32::from(raw) / (1 << 7) as f32)
    }

    pub fn sequence_step_enables(&mut self) -> Result<SequenceStepEnables> {
        let sequence_config = self.regs.read_reg(SYSTEM_SEQUENCE_CONFIG)?;
        Ok(SequenceStepEnables::from_config(sequence_config))
    }

    pub fn sequence_step_timeouts(
        &mut self,
        enables: &SequenceStepEnables,
    ) -> Result<SequenceStepTimeouts> {
        let pre_range_vcsel_period_pclks = self.vcsel_pulse_period(VcselPeriodType::PreRange)?;

        let msrc_dss_tcc_mclks = u32::from(self.regs.read_reg(MSRC_CONFIG_TIMEOUT_MACROP)?) + 1;
        let msrc_dss_tcc_us = timeout_mclks_to_us(msrc_dss_tcc_mclks, pre_range_vcsel_period_pclks);

        let pre_range_mclks =
            decode_timeout(self.regs.read_reg16(PRE_RANGE_CONFIG_TIMEOUT_MACROP_HI)?);
        let pre_range_us = timeout_mclks_to_us(pre_range_mclks, pre_range_vcsel_period_pclks);

        let final_range_vcsel_period_pclks =
            self.vcsel_pulse_period(VcselPeriodType::FinalRange)?;

        let mut final_range_mclks =
            decode_timeout(self.regs.read_reg16(FINAL_RANGE_CONFIG_TIMEOUT_MACROP_HI)?);
        if enables.pre_range {
            final_range_mclks = final_range_mclks.saturating_sub(pre_range_mclks);
        }
        let final_range_us = timeout_mclks_to_us(final_range_mclks, final_range_vcsel_period_pclks);

        Ok(SequenceStepTimeouts {
            pre_range_vcsel_period_pclks,
            final_range_vcsel_period_pclks,
            msrc_dss_tcc_mclks,
            pre_range_mclks,
            final_range_mclks,
            msrc_dss_tcc_us,
            pre_range_us,
            final_range_us,
        })
    }

    /// Time used by every enabled step except the final range.
    fn fixed_budget_us(enables: &SequenceStepEnables, timeouts: &SequenceStepTimeouts) -> u32 {
        let mut budget_us = START_OVERHEAD + END_OVERHEAD;

        if enables.tcc {
            budget_us += timeouts.msrc_dss_tcc_us + TCC_OVERHEAD;
        }

        if enables.dss {
            budget_us += 2 * (timeouts.msrc_dss_tcc_us + DSS_OVERHEAD);
        } else if enables.msrc {
            budget_us += timeouts.msrc_dss_tcc_us + MSRC_OVERHEAD;
        }

        if enables.pre_range {
            budget_us += timeouts.pre_range_us + PRE_RANGE_OVERHEAD;
        }

        budget_us
    }

    /// Sizes the final-range timeout so one measurement takes `budget_us`.
    pub fn set_measurement_timing_budget(&mut self, budget_us: u32) -> Result<()> {
        if budget_us < MIN_TIMING_BUDGET_US {
            return Err(LidarError::invalid_argument(format!(
                "timing budget {} us is below the {} us minimum",
                budget_us, MIN_TIMING_BUDGET_US
            )));
        }

        let enables = self.sequence_step_enables()?;
        let timeouts = self.sequence_step_timeouts(&enables)?;
        let mut used_budget_us = Self::fixed_budget_us(&enables, &timeouts);

        if enables.final_range {
            used_budget_us += FINAL_RANGE_OVERHEAD;

            if used_budget_us > budget_us {
                return Err(LidarError::invalid_argument(format!(
                    "timing budget {} us leaves no room for the final range ({} us used)",
                    budget_us, used_budget_us
                )));
            }

            let final_range_timeout_us = budget_us - used_budget_us;

            // the final range timeout includes the pre-range, both in MCLKs
            let mut final_range_timeout_mclks = timeout_us_to_mclks(
                final_range_timeout_us,
                timeouts.final_range_vcsel_period_pclks,
            );
            if enables.pre_range {
                final_range_timeout_mclks += timeouts.pre_range_mclks;
            }

            self.regs.write_reg16(
                FINAL_RANGE_CONFIG_TIMEOUT_MACROP_HI,
                encode_timeout(final_range_timeout_mclks),
            )?;

            self.measurement_timing_budget_us = budget_us;
        }
        Ok(())
    }

    pub fn measurement_timing_budget(&mut self) -> Result<u32> {
        let enables = self.sequence_step_enables()?;
        let timeouts = self.sequence_step_timeouts(&enables)?;

        let mut budget_us = Self::fixed_budget_us(&enables, &timeouts);
        if enables.final_range {
            budget_us += timeouts.final_range_us + FINAL_RANGE_OVERHEAD;
        }

        self.measurement_timing_budget_us = budget_us;
        Ok(budget_us)
    }

    /// Sets the VCSEL pulse period in PCLKs: 12, 14, 16 or 18 for the pre-range
    /// and 8, 10, 12 or 14 for the final range.
    pub fn set_vcsel_pulse_period(
        &mut self,
        period_type: VcselPeriodType,
        period_pclks: u8,
    ) -> Result<()> {
        let valid = match period_type {
            VcselPeriodType::PreRange => [12, 14, 16, 18].contains(&period_pclks),
            VcselPeriodType::FinalRange => [8, 10, 12, 14].contains(&period_pclks),
        };
        if !valid {
            return Err(LidarError::invalid_argument(format!(
                "invalid {:?} VCSEL period: {}",
                period_type, period_pclks
            )));
        }

        let vcsel_period_reg = encode_vcsel_period(period_pclks);
        let enables = self.sequence_step_enables()?;
        let timeouts = self.sequence_step_timeouts(&enables)?;

        match period_type {
            VcselPeriodType::PreRange => {
                let phase_high = match period_pclks {
                    12 => 0x18,
                    14 => 0x30,
                    16 => 0x40,
                    _ => 0x50,
                };
                self.regs
                    .write_reg(PRE_RANGE_CONFIG_VALID_PHASE_HIGH, phase_high)?;
                self.regs
                    .write_reg(PRE_RANGE_CONFIG_VALID_PHASE_LOW, 0x08)?;

                self.regs
                    .write_reg(PRE_RANGE_CONFIG_VCSEL_PERIOD, vcsel_period_reg)?;

                let new_pre_range_timeout_mclks =
                    timeout_us_to_mclks(timeouts.pre_range_us, period_pclks);
                self.regs.write_reg16(
                    PRE_RANGE_CONFIG_TIMEOUT_MACROP_HI,
                    encode_timeout(new_pre_range_timeout_mclks),
                )?;

                let new_msrc_timeout_mclks =
                    timeout_us_to_mclks(timeouts.msrc_dss_tcc_us, period_pclks);
                let msrc_reg = if new_msrc_timeout_mclks > 256 {
                    255
                } else {
                    new_msrc_timeout_mclks.saturating_sub(1) as u8
                };
                self.regs.write_reg(MSRC_CONFIG_TIMEOUT_MACROP, msrc_reg)?;
            }
            VcselPeriodType::FinalRange => {
                let (phase_high, vcsel_width, phasecal_timeout, phasecal_lim) =
                    match period_pclks {
                        8 => (0x10, 0x02, 0x0C, 0x30),
                        10 => (0x28, 0x03, 0x09, 0x20),
                        12 => (0x38, 0x03, 0x08, 0x20),
                        _ => (0x48, 0x03, 0x07, 0x20),
                    };
                self.regs
                    .write_reg(FINAL_RANGE_CONFIG_VALID_PHASE_HIGH, phase_high)?;
                self.regs
                    .write_reg(FINAL_RANGE_CONFIG_VALID_PHASE_LOW, 0x08)?;
                self.regs.write_reg(GLOBAL_CONFIG_VCSEL_WIDTH, vcsel_width)?;
                self.regs
                    .write_reg(ALGO_PHASECAL_CONFIG_TIMEOUT, phasecal_timeout)?;
                self.regs.write_reg(PAGE_SELECT, 0x01)?;
                self.regs.write_reg(ALGO_PHASECAL_LIM, phasecal_lim)?;
                self.regs.write_reg(PAGE_SELECT, 0x00)?;

                self.regs
                    .write_reg(FINAL_RANGE_CONFIG_VCSEL_PERIOD, vcsel_period_reg)?;

                let mut new_final_range_timeout_mclks =
                    timeout_us_to_mclks(timeouts.final_range_us, period_pclks);
                if enables.pre_range {
                    new_final_range_timeout_mclks += timeouts.pre_range_mclks;
                }
                self.regs.write_reg16(
                    FINAL_RANGE_CONFIG_TIMEOUT_MACROP_HI,
                    encode_timeout(new_final_range_timeout_mclks),
                )?;
            }
        }

        self.set_measurement_timing_budget(self.measurement_timing_budget_us)?;

        // a new VCSEL period needs a fresh phase calibration
        let sequence_config = self.regs.read_reg(SYSTEM_SEQUENCE_CONFIG)?;
        self.regs.write_reg(SYSTEM_SEQUENCE_CONFIG, 0x02)?;
        let calibration = self.perform_single_ref_calibration(0x00, "phase calibration");
        self.regs
            .write_reg(SYSTEM_SEQUENCE_CONFIG, sequence_config)?;
        calibration
    }

    pub fn vcsel_pulse_period(&mut self, period_type: VcselPeriodType) -> Result<u8> {
        let reg = match period_type {
            VcselPeriodType::PreRange => PRE_RANGE_CONFIG_VCSEL_PERIOD,
            VcselPeriodType::FinalRange => FINAL_RANGE_CONFIG_VCSEL_PERIOD,
        };
        Ok(decode_vcsel_period(self.regs.read_reg(reg)?))
    }

    fn restore_stop_variable(&mut self) -> Result<()> {
        self.regs.write_reg(POWER_MANAGEMENT_GO1_POWER_FORCE, 0x01)?;
        self.regs.write_reg(PAGE_SELECT, 0x01)?;
        self.regs.write_reg(SYSRANGE_START, 0x00)?;
        self.regs.write_reg(STOP_VARIABLE, self.stop_variable)?;
        self.regs.write_reg(SYSRANGE_START, 0x01)?;
        self.regs.write_reg(PAGE_SELECT, 0x00)?;
        self.regs.write_reg(POWER_MANAGEMENT_GO1_POWER_FORCE, 0x00)
    }

    /// Starts back-to-back ranging when `period_ms` is 0, timed ranging otherwise.
    pub fn start(&mut self, period_ms: u32) -> Result<()> {
        self.restore_stop_variable()?;

        if period_ms != 0 {
            let osc_calibrate_val = self.regs.read_reg16(OSC_CALIBRATE_VAL)?;
            let period = if osc_calibrate_val != 0 {
                period_ms.wrapping_mul(u32::from(osc_calibrate_val))
            } else {
                period_ms
            };
            self.regs
                .write_reg32(SYSTEM_INTERMEASUREMENT_PERIOD, period)?;
            // VL53L0X_REG_SYSRANGE_MODE_TIMED
            self.regs.write_reg(SYSRANGE_START, 0x04)
        } else {
            // VL53L0X_REG_SYSRANGE_MODE_BACKTOBACK
            self.regs.write_reg(SYSRANGE_START, 0x02)
        }
    }

    pub fn stop(&mut self) -> Result<()> {
        // VL53L0X_REG_SYSRANGE_MODE_SINGLESHOT
        self.regs.write_reg(SYSRANGE_START, 0x01)?;

        self.regs.write_reg(PAGE_SELECT, 0x01)?;
        self.regs.write_reg(SYSRANGE_START, 0x00)?;
        self.regs.write_reg(STOP_VARIABLE, 0x00)?;
        self.regs.write_reg(SYSRANGE_START, 0x01)?;
        self.regs.write_reg(PAGE_SELECT, 0x00)
    }

    pub fn data_ready(&mut self) -> Result<bool> {
        Ok(self.regs.read_reg(RESULT_INTERRUPT_STATUS)? & 0x07 != 0)
    }

    /// Returns the latest continuous measurement, or `NotReady` when none is
    /// waiting.
    pub fn read_range_continuous_mm(&mut self) -> Result<u16> {
        if !self.data_ready()? {
            return Err(LidarError::not_ready("range data"));
        }
        // assumes the default linearity corrective gain and no fractional ranging
        let range = self.regs.read_reg16(RESULT_RANGE_STATUS + 10)?;
        self.regs.write_reg(SYSTEM_INTERRUPT_CLEAR, 0x01)?;
        Ok(range)
    }

    fn wait_data_ready(&mut self) -> Result<()> {
        let regs = &mut self.regs;
        self.timer.start();
        self.timer.poll_until("range data", || {
            Ok(regs.read_reg(RESULT_INTERRUPT_STATUS)? & 0x07 != 0)
        })
    }

    pub fn read_range_single_mm(&mut self) -> Result<u16> {
        self.restore_stop_variable()?;
        self.regs.write_reg(SYSRANGE_START, 0x01)?;

        {
            let regs = &mut self.regs;
            self.timer.start();
            self.timer.poll_until("start bit to clear", || {
                Ok(regs.read_reg(SYSRANGE_START)? & 0x01 == 0)
            })?;
        }

        self.wait_data_ready()?;
        self.read_range_continuous_mm()
    }

    fn perform_single_ref_calibration(&mut self, vhv_init_byte: u8, waiting_for: &str) -> Result<()> {
        // VL53L0X_REG_SYSRANGE_MODE_START_STOP
        self.regs
            .write_reg(SYSRANGE_START, 0x01 | vhv_init_byte)?;

        self.wait_data_ready().map_err(|e| match e {
            LidarError::Timeout { .. } => LidarError::timeout(waiting_for),
            other => other,
        })?;

        self.regs.write_reg(SYSTEM_INTERRUPT_CLEAR, 0x01)?;
        self.regs.write_reg(SYSRANGE_START, 0x00)
    }
}

impl<B: I2cBus> RangeSensor for Vl53l0x<B> {
    fn kind(&self) -> SensorKind {
        SensorKind::Vl53l0x
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
            .write_reg(I2C_SLAVE_DEVICE_ADDRESS, address & 0x7F)?;
        self.regs.set_address(address)
    }

    fn initialize(&mut self) -> Result<()> {
        self.init()
    }

    fn configure(&mut self, settings: &SensorSettings) -> Result<()> {
        settings.check_supported(SensorKind::Vl53l0x)?;
        if let Some(limit_mcps) = settings.signal_rate_limit {
            self.set_signal_rate_limit(limit_mcps)?;
        }
        if let Some(budget_us) = settings.timing_budget_us {
            self.set_measurement_timing_budget(budget_us)?;
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
        self.wait_data_ready()?;
        self.read_range_continuous_mm()
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
