//! VL6180X register map (16-bit indices).

use crate::domain::model::Scaling;

pub const IDENTIFICATION__MODEL_ID: u16 = 0x000;
pub const IDENTIFICATION__MODEL_REV_MAJOR: u16 = 0x001;
pub const IDENTIFICATION__MODEL_REV_MINOR: u16 = 0x002;
pub const IDENTIFICATION__MODULE_REV_MAJOR: u16 = 0x003;
pub const IDENTIFICATION__MODULE_REV_MINOR: u16 = 0x004;
pub const IDENTIFICATION__DATE_HI: u16 = 0x006;
pub const IDENTIFICATION__DATE_LO: u16 = 0x007;
pub const IDENTIFICATION__TIME: u16 = 0x008;

pub const SYSTEM__MODE_GPIO0: u16 = 0x010;
pub const SYSTEM__MODE_GPIO1: u16 = 0x011;
pub const SYSTEM__HISTORY_CTRL: u16 = 0x012;
pub const SYSTEM__INTERRUPT_CONFIG_GPIO: u16 = 0x014;
pub const SYSTEM__INTERRUPT_CLEAR: u16 = 0x015;
pub const SYSTEM__FRESH_OUT_OF_RESET: u16 = 0x016;
pub const SYSTEM__GROUPED_PARAMETER_HOLD: u16 = 0x017;

pub const SYSRANGE__START: u16 = 0x018;
pub const SYSRANGE__THRESH_HIGH: u16 = 0x019;
pub const SYSRANGE__THRESH_LOW: u16 = 0x01A;
pub const SYSRANGE__INTERMEASUREMENT_PERIOD: u16 = 0x01B;
pub const SYSRANGE__MAX_CONVERGENCE_TIME: u16 = 0x01C;
pub const SYSRANGE__CROSSTALK_COMPENSATION_RATE: u16 = 0x01E;
pub const SYSRANGE__CROSSTALK_VALID_HEIGHT: u16 = 0x021;
pub const SYSRANGE__EARLY_CONVERGENCE_ESTIMATE: u16 = 0x022;
pub const SYSRANGE__PART_TO_PART_RANGE_OFFSET: u16 = 0x024;
pub const SYSRANGE__RANGE_IGNORE_VALID_HEIGHT: u16 = 0x025;
pub const SYSRANGE__RANGE_IGNORE_THRESHOLD: u16 = 0x026;
pub const SYSRANGE__MAX_AMBIENT_LEVEL_MULT: u16 = 0x02C;
pub const SYSRANGE__RANGE_CHECK_ENABLES: u16 = 0x02D;
pub const SYSRANGE__VHV_RECALIBRATE: u16 = 0x02E;
pub const SYSRANGE__VHV_REPEAT_RATE: u16 = 0x031;

pub const SYSALS__START: u16 = 0x038;
pub const SYSALS__THRESH_HIGH: u16 = 0x03A;
pub const SYSALS__THRESH_LOW: u16 = 0x03C;
pub const SYSALS__INTERMEASUREMENT_PERIOD: u16 = 0x03E;
pub const SYSALS__ANALOGUE_GAIN: u16 = 0x03F;
pub const SYSALS__INTEGRATION_PERIOD: u16 = 0x040;

pub const RESULT__RANGE_STATUS: u16 = 0x04D;
pub const RESULT__ALS_STATUS: u16 = 0x04E;
pub const RESULT__INTERRUPT_STATUS_GPIO: u16 = 0x04F;
pub const RESULT__ALS_VAL: u16 = 0x050;
pub const RESULT__RANGE_VAL: u16 = 0x062;
pub const RESULT__RANGE_RAW: u16 = 0x064;
pub const RESULT__RANGE_RETURN_RATE: u16 = 0x066;

pub const RANGE_SCALER: u16 = 0x096;

pub const READOUT__AVERAGING_SAMPLE_PERIOD: u16 = 0x10A;
pub const FIRMWARE__BOOTUP: u16 = 0x119;
pub const FIRMWARE__RESULT_SCALER: u16 = 0x120;
pub const I2C_SLAVE__DEVICE_ADDRESS: u16 = 0x212;
pub const INTERLEAVED_MODE__ENABLE: u16 = 0x2A3;

pub const MODEL_ID: u8 = 0xB4;

pub const DEFAULT_CROSSTALK_VALID_HEIGHT: u8 = 20;

/// Private registers from ST's application note AN4545, written once after
/// power-up. The 0x096/0x097 pair leaves RANGE_SCALER at 253 (1x).
pub const PRIVATE_SETTINGS: &[(u16, u8)] = &[
    (0x207, 0x01),
    (0x208, 0x01),
    (0x096, 0x00),
    (0x097, 0xFD),
    (0x0E3, 0x00),
    (0x0E4, 0x04),
    (0x0E5, 0x02),
    (0x0E6, 0x01),
    (0x0E7, 0x03),
    (0x0F5, 0x02),
    (0x0D9, 0x05),
    (0x0DB, 0xCE),
    (0x0DC, 0x03),
    (0x0DD, 0xF8),
    (0x09F, 0x00),
    (0x0A3, 0x3C),
    (0x0B7, 0x00),
    (0x0BB, 0x3C),
    (0x0B2, 0x09),
    (0x0CA, 0x09),
    (0x198, 0x01),
    (0x1B0, 0x17),
    (0x1AD, 0x00),
    (0x0FF, 0x05),
    (0x100, 0x05),
    (0x199, 0x05),
    (0x1A6, 0x1B),
    (0x1AC, 0x3E),
    (0x1A7, 0x1F),
    (0x030, 0x00),
];

/// RANGE_SCALER value for each scaling factor.
pub fn scaler_value(scaling: Scaling) -> u16 {
    match scaling {
        Scaling::One => 253,
        Scaling::Two => 127,
        Scaling::Three => 84,
    }
}

pub fn scaling_from_scaler(value: u16) -> Option<Scaling> {
    Scaling::ALL
        .into_iter()
        .find(|scaling| scaler_value(*scaling) == value)
}
