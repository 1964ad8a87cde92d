pub use crate::core::vl53l1x::calculations::{decode_timeout, encode_timeout};

/// VCSEL period in PCLKs from its register value.
pub fn decode_vcsel_period(reg_val: u8) -> u8 {
    reg_val.wrapping_add(1) << 1
}

pub fn encode_vcsel_period(period_pclks: u8) -> u8 {
    (period_pclks >> 1).saturating_sub(1)
}

/// Macro period in nanoseconds for a VCSEL period in PCLKs.
pub fn calc_macro_period_ns(vcsel_period_pclks: u8) -> u32 {
    (2304 * u32::from(vcsel_period_pclks) * 1655 + 500) / 1000
}

pub fn timeout_mclks_to_us(timeout_mclks: u32, vcsel_period_pclks: u8) -> u32 {
    let macro_period_ns = u64::from(calc_macro_period_ns(vcsel_period_pclks));
    let us = (u64::from(timeout_mclks) * macro_period_ns + macro_period_ns / 2) / 1000;
    u32::try_from(us).unwrap_or(u32::MAX)
}

pub fn timeout_us_to_mclks(timeout_us: u32, vcsel_period_pclks: u8) -> u32 {
    let macro_period_ns = u64::from(calc_macro_period_ns(vcsel_period_pclks));
    if macro_period_ns == 0 {
        return 0;
    }
    let mclks = (u64::from(timeout_us) * 1000 + macro_period_ns / 2) / macro_period_ns;
    u32::try_from(mclks).unwrap_or(u32::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vcsel_period_codec() {
        assert_eq!(decode_vcsel_period(0x06), 14);
        assert_eq!(decode_vcsel_period(0x04), 10);
        for pclks in [8u8, 10, 12, 14, 16, 18] {
            assert_eq!(decode_vcsel_period(encode_vcsel_period(pclks)), pclks);
        }
    }

    #[test]
    fn test_macro_period_ns() {
        assert_eq!(calc_macro_period_ns(14), 53_384);
        assert_eq!(calc_macro_period_ns(10), 38_131);
        assert_eq!(calc_macro_period_ns(0), 0);
    }

    #[test]
    fn test_timeout_conversions() {
        assert_eq!(timeout_mclks_to_us(151, 14), 8_087);
        assert_eq!(timeout_us_to_mclks(8_087, 14), 151);
        assert_eq!(timeout_us_to_mclks(1_000, 0), 0);
    }
}
