//! VL53L1X register map (16-bit indices). Only the registers the driver
//! touches are listed.

pub const SOFT_RESET: u16 = 0x0000;
pub const I2C_SLAVE__DEVICE_ADDRESS: u16 = 0x0001;
pub const OSC_MEASURED__FAST_OSC__FREQUENCY: u16 = 0x0006;
pub const VHV_CONFIG__TIMEOUT_MACROP_LOOP_BOUND: u16 = 0x0008;
pub const VHV_CONFIG__INIT: u16 = 0x000B;
pub const ALGO__PART_TO_PART_RANGE_OFFSET_MM: u16 = 0x001E;
pub const MM_CONFIG__OUTER_OFFSET_MM: u16 = 0x0022;
pub const DSS_CONFIG__TARGET_TOTAL_RATE_MCPS: u16 = 0x0024;
pub const PAD_I2C_HV__EXTSUP_CONFIG: u16 = 0x002E;
pub const GPIO__TIO_HV_STATUS: u16 = 0x0031;
pub const SIGMA_ESTIMATOR__EFFECTIVE_PULSE_WIDTH_NS: u16 = 0x0036;
pub const SIGMA_ESTIMATOR__EFFECTIVE_AMBIENT_WIDTH_NS: u16 = 0x0037;
pub const ALGO__CROSSTALK_COMPENSATION_VALID_HEIGHT_MM: u16 = 0x0039;
pub const ALGO__RANGE_IGNORE_VALID_HEIGHT_MM: u16 = 0x003E;
pub const ALGO__RANGE_MIN_CLIP: u16 = 0x003F;
pub const ALGO__CONSISTENCY_CHECK__TOLERANCE: u16 = 0x0040;
pub const CAL_CONFIG__VCSEL_START: u16 = 0x0047;
pub const PHASECAL_CONFIG__TIMEOUT_MACROP: u16 = 0x004B;
pub const PHASECAL_CONFIG__OVERRIDE: u16 = 0x004D;
pub const DSS_CONFIG__ROI_MODE_CONTROL: u16 = 0x004F;
pub const SYSTEM__THRESH_RATE_HIGH: u16 = 0x0050;
pub const SYSTEM__THRESH_RATE_LOW: u16 = 0x0052;
pub const DSS_CONFIG__MANUAL_EFFECTIVE_SPADS_SELECT: u16 = 0x0054;
pub const DSS_CONFIG__APERTURE_ATTENUATION: u16 = 0x0057;
pub const MM_CONFIG__TIMEOUT_MACROP_A: u16 = 0x005A;
pub const MM_CONFIG__TIMEOUT_MACROP_B: u16 = 0x005C;
pub const RANGE_CONFIG__TIMEOUT_MACROP_A: u16 = 0x005E;
pub const RANGE_CONFIG__VCSEL_PERIOD_A: u16 = 0x0060;
pub const RANGE_CONFIG__TIMEOUT_MACROP_B: u16 = 0x0061;
pub const RANGE_CONFIG__VCSEL_PERIOD_B: u16 = 0x0063;
pub const RANGE_CONFIG__SIGMA_THRESH: u16 = 0x0064;
pub const RANGE_CONFIG__MIN_COUNT_RATE_RTN_LIMIT_MCPS: u16 = 0x0066;
pub const RANGE_CONFIG__VALID_PHASE_HIGH: u16 = 0x0069;
pub const SYSTEM__INTERMEASUREMENT_PERIOD: u16 = 0x006C;
pub const SYSTEM__GROUPED_PARAMETER_HOLD_0: u16 = 0x0071;
pub const SYSTEM__SEED_CONFIG: u16 = 0x0077;
pub const SD_CONFIG__WOI_SD0: u16 = 0x0078;
pub const SD_CONFIG__WOI_SD1: u16 = 0x0079;
pub const SD_CONFIG__INITIAL_PHASE_SD0: u16 = 0x007A;
pub const SD_CONFIG__INITIAL_PHASE_SD1: u16 = 0x007B;
pub const SYSTEM__GROUPED_PARAMETER_HOLD_1: u16 = 0x007C;
pub const SD_CONFIG__QUANTIFIER: u16 = 0x007E;
pub const ROI_CONFIG__USER_ROI_CENTRE_SPAD: u16 = 0x007F;
pub const ROI_CONFIG__USER_ROI_REQUESTED_GLOBAL_XY_SIZE: u16 = 0x0080;
pub const SYSTEM__SEQUENCE_CONFIG: u16 = 0x0081;
pub const SYSTEM__GROUPED_PARAMETER_HOLD: u16 = 0x0082;
pub const SYSTEM__INTERRUPT_CLEAR: u16 = 0x0086;
pub const SYSTEM__MODE_START: u16 = 0x0087;
pub const RESULT__RANGE_STATUS: u16 = 0x0089;
pub const PHASECAL_RESULT__VCSEL_START: u16 = 0x00D8;
pub const RESULT__OSC_CALIBRATE_VAL: u16 = 0x00DE;
pub const FIRMWARE__SYSTEM_STATUS: u16 = 0x00E5;
pub const IDENTIFICATION__MODEL_ID: u16 = 0x010F;

pub const MODEL_ID: u16 = 0xEACC;

/// Target total signal rate for dynamic SPAD selection, 9.7 fixed point.
pub const TARGET_RATE: u16 = 0x0A00;

/// Fixed overhead of one measurement, in microseconds.
pub const TIMING_GUARD: u32 = 4528;

/// Bytes from RESULT__RANGE_STATUS through the crosstalk-corrected peak rate.
pub const RESULT_BLOCK_LEN: usize = 17;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StaticWrite {
    Byte(u16, u8),
    Word(u16, u16),
}

/// Register values loaded after boot, in order.
pub const STATIC_CONFIG: &[StaticWrite] = &[
    StaticWrite::Word(DSS_CONFIG__TARGET_TOTAL_RATE_MCPS, TARGET_RATE),
    StaticWrite::Byte(GPIO__TIO_HV_STATUS, 0x02),
    StaticWrite::Byte(SIGMA_ESTIMATOR__EFFECTIVE_PULSE_WIDTH_NS, 8),
    StaticWrite::Byte(SIGMA_ESTIMATOR__EFFECTIVE_AMBIENT_WIDTH_NS, 16),
    StaticWrite::Byte(ALGO__CROSSTALK_COMPENSATION_VALID_HEIGHT_MM, 0x01),
    StaticWrite::Byte(ALGO__RANGE_IGNORE_VALID_HEIGHT_MM, 0xFF),
    StaticWrite::Byte(ALGO__RANGE_MIN_CLIP, 0),
    StaticWrite::Byte(ALGO__CONSISTENCY_CHECK__TOLERANCE, 2),
    StaticWrite::Word(SYSTEM__THRESH_RATE_HIGH, 0x0000),
    StaticWrite::Word(SYSTEM__THRESH_RATE_LOW, 0x0000),
    StaticWrite::Byte(DSS_CONFIG__APERTURE_ATTENUATION, 0x38),
    StaticWrite::Word(RANGE_CONFIG__SIGMA_THRESH, 360),
    StaticWrite::Word(RANGE_CONFIG__MIN_COUNT_RATE_RTN_LIMIT_MCPS, 192),
    StaticWrite::Byte(SYSTEM__GROUPED_PARAMETER_HOLD_0, 0x01),
    StaticWrite::Byte(SYSTEM__GROUPED_PARAMETER_HOLD_1, 0x01),
    StaticWrite::Byte(SD_CONFIG__QUANTIFIER, 2),
    StaticWrite::Byte(SYSTEM__GROUPED_PARAMETER_HOLD, 0x00),
    StaticWrite::Byte(SYSTEM__SEED_CONFIG, 1),
    // VHV, PHASECAL, DSS1, RANGE
    StaticWrite::Byte(SYSTEM__SEQUENCE_CONFIG, 0x8B),
    StaticWrite::Word(DSS_CONFIG__MANUAL_EFFECTIVE_SPADS_SELECT, 200 << 8),
    StaticWrite::Byte(DSS_CONFIG__ROI_MODE_CONTROL, 2),
];

/// Per-mode timing registers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModeTiming {
    pub vcsel_period_a: u8,
    pub vcsel_period_b: u8,
    pub valid_phase_high: u8,
    pub woi_sd0: u8,
    pub woi_sd1: u8,
    pub initial_phase_sd0: u8,
    pub initial_phase_sd1: u8,
}

pub const SHORT_MODE: ModeTiming = ModeTiming {
    vcsel_period_a: 0x07,
    vcsel_period_b: 0x05,
    valid_phase_high: 0x38,
    woi_sd0: 0x07,
    woi_sd1: 0x05,
    initial_phase_sd0: 6,
    initial_phase_sd1: 6,
};

pub const MEDIUM_MODE: ModeTiming = ModeTiming {
    vcsel_period_a: 0x0B,
    vcsel_period_b: 0x09,
    valid_phase_high: 0x78,
    woi_sd0: 0x0B,
    woi_sd1: 0x09,
    initial_phase_sd0: 10,
    initial_phase_sd1: 10,
};

pub const LONG_MODE: ModeTiming = ModeTiming {
    vcsel_period_a: 0x0F,
    vcsel_period_b: 0x0D,
    valid_phase_high: 0xB8,
    woi_sd0: 0x0F,
    woi_sd1: 0x0D,
    initial_phase_sd0: 14,
    initial_phase_sd1: 14,
};
