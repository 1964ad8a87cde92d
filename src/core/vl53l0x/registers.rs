//! VL53L0X register map (8-bit indices).

pub const SYSRANGE_START: u16 = 0x00;

pub const SYSTEM_THRESH_HIGH: u16 = 0x0C;
pub const SYSTEM_THRESH_LOW: u16 = 0x0E;

pub const SYSTEM_SEQUENCE_CONFIG: u16 = 0x01;
pub const SYSTEM_RANGE_CONFIG: u16 = 0x09;
pub const SYSTEM_INTERMEASUREMENT_PERIOD: u16 = 0x04;

pub const SYSTEM_INTERRUPT_CONFIG_GPIO: u16 = 0x0A;

pub const GPIO_HV_MUX_ACTIVE_HIGH: u16 = 0x84;

pub const SYSTEM_INTERRUPT_CLEAR: u16 = 0x0B;

pub const RESULT_INTERRUPT_STATUS: u16 = 0x13;
pub const RESULT_RANGE_STATUS: u16 = 0x14;

pub const CROSSTALK_COMPENSATION_PEAK_RATE_MCPS: u16 = 0x20;
pub const PRE_RANGE_CONFIG_MIN_SNR: u16 = 0x27;
pub const ALGO_PART_TO_PART_RANGE_OFFSET_MM: u16 = 0x28;

pub const MSRC_CONFIG_CONTROL: u16 = 0x60;

pub const PRE_RANGE_CONFIG_VALID_PHASE_LOW: u16 = 0x56;
pub const PRE_RANGE_CONFIG_VALID_PHASE_HIGH: u16 = 0x57;
pub const PRE_RANGE_MIN_COUNT_RATE_RTN_LIMIT: u16 = 0x64;

pub const FINAL_RANGE_CONFIG_MIN_SNR: u16 = 0x67;
pub const FINAL_RANGE_CONFIG_VALID_PHASE_LOW: u16 = 0x47;
pub const FINAL_RANGE_CONFIG_VALID_PHASE_HIGH: u16 = 0x48;
pub const FINAL_RANGE_CONFIG_MIN_COUNT_RATE_RTN_LIMIT: u16 = 0x44;

pub const PRE_RANGE_CONFIG_SIGMA_THRESH_HI: u16 = 0x61;
pub const PRE_RANGE_CONFIG_SIGMA_THRESH_LO: u16 = 0x62;

pub const PRE_RANGE_CONFIG_VCSEL_PERIOD: u16 = 0x50;
pub const PRE_RANGE_CONFIG_TIMEOUT_MACROP_HI: u16 = 0x51;

pub const SYSTEM_HISTOGRAM_BIN: u16 = 0x81;
pub const HISTOGRAM_CONFIG_INITIAL_PHASE_SELECT: u16 = 0x33;
pub const HISTOGRAM_CONFIG_READOUT_CTRL: u16 = 0x55;

pub const FINAL_RANGE_CONFIG_VCSEL_PERIOD: u16 = 0x70;
pub const FINAL_RANGE_CONFIG_TIMEOUT_MACROP_HI: u16 = 0x71;

pub const MSRC_CONFIG_TIMEOUT_MACROP: u16 = 0x46;

pub const SOFT_RESET_GO2_SOFT_RESET_N: u16 = 0xBF;
pub const IDENTIFICATION_MODEL_ID: u16 = 0xC0;
pub const IDENTIFICATION_REVISION_ID: u16 = 0xC2;

pub const OSC_CALIBRATE_VAL: u16 = 0xF8;

pub const GLOBAL_CONFIG_VCSEL_WIDTH: u16 = 0x32;
pub const GLOBAL_CONFIG_SPAD_ENABLES_REF_0: u16 = 0xB0;
pub const GLOBAL_CONFIG_REF_EN_START_SELECT: u16 = 0xB6;
pub const DYNAMIC_SPAD_NUM_REQUESTED_REF_SPAD: u16 = 0x4E;
pub const DYNAMIC_SPAD_REF_EN_START_OFFSET: u16 = 0x4F;
pub const POWER_MANAGEMENT_GO1_POWER_FORCE: u16 = 0x80;

pub const VHV_CONFIG_PAD_SCL_SDA__EXTSUP_HV: u16 = 0x89;

pub const ALGO_PHASECAL_LIM: u16 = 0x30;
pub const ALGO_PHASECAL_CONFIG_TIMEOUT: u16 = 0x30;

pub const I2C_SLAVE_DEVICE_ADDRESS: u16 = 0x8A;

/// Page select used by the undocumented register sequences.
pub const PAGE_SELECT: u16 = 0xFF;
pub const STOP_VARIABLE: u16 = 0x91;
pub const I2C_MODE: u16 = 0x88;

pub const MODEL_ID: u8 = 0xEE;

/// Reference SPAD map length in bytes.
pub const SPAD_MAP_LEN: usize = 6;

/// Default tuning settings from ST's API, written in order after the SPAD map.
pub const TUNING_SETTINGS: &[(u16, u8)] = &[
    (0xFF, 0x01),
    (0x00, 0x00),
    (0xFF, 0x00),
    (0x09, 0x00),
    (0x10, 0x00),
    (0x11, 0x00),
    (0x24, 0x01),
    (0x25, 0xFF),
    (0x75, 0x00),
    (0xFF, 0x01),
    (0x4E, 0x2C),
    (0x48, 0x00),
    (0x30, 0x20),
    (0xFF, 0x00),
    (0x30, 0x09),
    (0x54, 0x00),
    (0x31, 0x04),
    (0x32, 0x03),
    (0x40, 0x83),
    (0x46, 0x25),
    (0x60, 0x00),
    (0x27, 0x00),
    (0x50, 0x06),
    (0x51, 0x00),
    (0x52, 0x96),
    (0x56, 0x08),
    (0x57, 0x30),
    (0x61, 0x00),
    (0x62, 0x00),
    (0x64, 0x00),
    (0x65, 0x00),
    (0x66, 0xA0),
    (0xFF, 0x01),
    (0x22, 0x32),
    (0x47, 0x14),
    (0x49, 0xFF),
    (0x4A, 0x00),
    (0xFF, 0x00),
    (0x7A, 0x0A),
    (0x7B, 0x00),
    (0x78, 0x21),
    (0xFF, 0x01),
    (0x23, 0x34),
    (0x42, 0x00),
    (0x44, 0xFF),
    (0x45, 0x26),
    (0x46, 0x05),
    (0x40, 0x40),
    (0x0E, 0x06),
    (0x20, 0x1A),
    (0x43, 0x40),
    (0xFF, 0x00),
    (0x34, 0x03),
    (0x35, 0x44),
    (0xFF, 0x01),
    (0x31, 0x04),
    (0x4B, 0x09),
    (0x4C, 0x05),
    (0x4D, 0x04),
    (0xFF, 0x00),
    (0x44, 0x00),
    (0x45, 0x20),
    (0x47, 0x08),
    (0x48, 0x28),
    (0x67, 0x00),
    (0x70, 0x04),
    (0x71, 0x01),
    (0x72, 0xFE),
    (0x76, 0x00),
    (0x77, 0x00),
    (0xFF, 0x01),
    (0x0D, 0x01),
    (0xFF, 0x00),
    (0x80, 0x01),
    (0x01, 0xF8),
    (0xFF, 0x01),
    (0x8E, 0x01),
    (0x00, 0x01),
    (0xFF, 0x00),
    (0x80, 0x00),
];
