//! Timeout and macro-period arithmetic. Values follow the device's unsigned
//! fixed-point conventions; intermediates that can exceed 32 bits use u64.

/// Encodes a timeout in macro clocks as `(ms_byte << 8) | ls_byte`.
pub fn encode_timeout(timeout_mclks: u32) -> u16 {
    if timeout_mclks == 0 {
        return 0;
    }
    let mut ls_byte = timeout_mclks - 1;
    let mut ms_byte: u16 = 0;
    while ls_byte & 0xFFFF_FF00 > 0 {
        ls_byte >>= 1;
        ms_byte += 1;
    }
    (ms_byte << 8) | (ls_byte & 0xFF) as u16
}

pub fn decode_timeout(reg_val: u16) -> u32 {
    let ls_byte = u64::from(reg_val & 0x00FF);
    let shift = u32::from(reg_val >> 8).min(31);
    let mclks = (ls_byte << shift) + 1;
    u32::try_from(mclks).unwrap_or(u32::MAX)
}

pub fn timeout_mclks_to_us(timeout_mclks: u32, macro_period_us: u32) -> u32 {
    let us = (u64::from(timeout_mclks) * u64::from(macro_period_us) + 0x800) >> 12;
    u32::try_from(us).unwrap_or(u32::MAX)
}

pub fn timeout_us_to_mclks(timeout_us: u32, macro_period_us: u32) -> u32 {
    if macro_period_us == 0 {
        return 0;
    }
    let mclks = ((u64::from(timeout_us) << 12) + u64::from(macro_period_us >> 1))
        / u64::from(macro_period_us);
    u32::try_from(mclks).unwrap_or(u32::MAX)
}

/// Macro period in microseconds (12.12 fixed point) for a VCSEL period
/// register value. Zero when the oscillator frequency is unknown.
pub fn calc_macro_period(fast_osc_frequency: u16, vcsel_period: u8) -> u32 {
    if fast_osc_frequency == 0 {
        return 0;
    }
    let pll_period_us = (1u64 << 30) / u64::from(fast_osc_frequency);
    let vcsel_period_pclks = (u64::from(vcsel_period) + 1) << 1;

    let mut macro_period_us = 2304 * pll_period_us;
    macro_period_us >>= 6;
    macro_period_us *= vcsel_period_pclks;
    macro_period_us >>= 6;
    u32::try_from(macro_period_us).unwrap_or(u32::MAX)
}

/// Raw crosstalk-corrected range to millimetres.
pub fn range_to_mm(raw: u16) -> u16 {
    ((u32::from(raw) * 2011 + 0x400) / 0x800) as u16
}

/// 9.7 fixed point to a float rate in MCPS.
pub fn count_rate_fixed_to_float(count_rate_fixed: u16) -> f32 {
    f32::from(count_rate_fixed) / 128.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_timeout_shifts_into_one_byte() {
        assert_eq!(encode_timeout(0), 0);
        assert_eq!(encode_timeout(1), 0x0000);
        assert_eq!(encode_timeout(256), 0x00FF);
        assert_eq!(encode_timeout(257), 0x0180);
        assert_eq!(encode_timeout(534), 0x0285);
    }

    #[test]
    fn test_decode_timeout_inverts_encoding() {
        assert_eq!(decode_timeout(0x00FF), 256);
        assert_eq!(decode_timeout(0x0180), 257);
        for mclks in [1u32, 200, 256] {
            assert_eq!(decode_timeout(encode_timeout(mclks)), mclks);
        }
    }

    #[test]
    fn test_decode_timeout_saturates_large_shifts() {
        assert_eq!(decode_timeout(0xFFFF), u32::MAX);
    }

    #[test]
    fn test_macro_period_for_long_mode() {
        // fast oscillator 0xBE00, VCSEL period A register 0x0F
        assert_eq!(calc_macro_period(0xBE00, 0x0F), 397_350);
        assert_eq!(calc_macro_period(0, 0x0F), 0);
    }

    #[test]
    fn test_timeout_conversions() {
        let macro_period = calc_macro_period(0xBE00, 0x0F);
        let mclks = timeout_us_to_mclks(22_736, macro_period);
        assert_eq!(mclks, 234);
        let us = timeout_mclks_to_us(mclks, macro_period);
        assert!((22_650..=22_750).contains(&us));
        assert_eq!(timeout_us_to_mclks(1000, 0), 0);
    }

    #[test]
    fn test_range_scaling() {
        assert_eq!(range_to_mm(509), 500);
        assert_eq!(range_to_mm(0), 0);
        assert_eq!(count_rate_fixed_to_float(0x0800), 16.0);
    }
}
