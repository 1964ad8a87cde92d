use crate::utils::error::{LidarError, Result};
use std::collections::HashSet;

pub trait Validate {
    fn validate(&self) -> Result<()>;
}

/// Lowest and highest non-reserved 7-bit I2C addresses.
pub const MIN_DEVICE_ADDRESS: u8 = 0x08;
pub const MAX_DEVICE_ADDRESS: u8 = 0x77;

pub fn validate_device_address(field_name: &str, address: u8) -> Result<()> {
    if !(MIN_DEVICE_ADDRESS..=MAX_DEVICE_ADDRESS).contains(&address) {
        return Err(LidarError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: format!("0x{:02x}", address),
            reason: format!(
                "Address must be between 0x{:02x} and 0x{:02x}",
                MIN_DEVICE_ADDRESS, MAX_DEVICE_ADDRESS
            ),
        });
    }
    Ok(())
}

pub fn validate_unique_addresses(field_name: &str, addresses: &[u8]) -> Result<()> {
    let mut seen = HashSet::new();
    for address in addresses {
        if !seen.insert(*address) {
            return Err(LidarError::InvalidConfigValueError {
                field: field_name.to_string(),
                value: format!("0x{:02x}", address),
                reason: "Two sensors cannot share an I2C address".to_string(),
            });
        }
    }
    Ok(())
}

/// Parses `0x29`, `41` or `0b0101001` style addresses.
pub fn parse_address(value: &str) -> std::result::Result<u8, String> {
    let trimmed = value.trim();
    let parsed = if let Some(hex) = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
    {
        u8::from_str_radix(hex, 16)
    } else if let Some(bin) = trimmed.strip_prefix("0b") {
        u8::from_str_radix(bin, 2)
    } else {
        trimmed.parse::<u8>()
    };
    let address = parsed.map_err(|e| format!("invalid address '{}': {}", value, e))?;
    if address > 0x7F {
        return Err(format!("address 0x{:02x} does not fit in 7 bits", address));
    }
    Ok(address)
}

pub fn validate_path(field_name: &str, path: &str) -> Result<()> {
    if path.is_empty() {
        return Err(LidarError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: path.to_string(),
            reason: "Path cannot be empty".to_string(),
        });
    }

    if path.contains('\0') {
        return Err(LidarError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: path.to_string(),
            reason: "Path contains null bytes".to_string(),
        });
    }

    Ok(())
}

pub fn validate_positive_number(field_name: &str, value: usize, min_value: usize) -> Result<()> {
    if value < min_value {
        return Err(LidarError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: value.to_string(),
            reason: format!("Value must be at least {}", min_value),
        });
    }
    Ok(())
}

pub fn validate_non_empty_string(field_name: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(LidarError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: value.to_string(),
            reason: "Value cannot be empty or whitespace-only".to_string(),
        });
    }
    Ok(())
}

pub fn validate_range<T: PartialOrd + std::fmt::Display + Copy>(
    field_name: &str,
    value: T,
    min: T,
    max: T,
) -> Result<()> {
    if value < min || value > max {
        return Err(LidarError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: value.to_string(),
            reason: format!("Value must be between {} and {}", min, max),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_device_address() {
        assert!(validate_device_address("address", 0x29).is_ok());
        assert!(validate_device_address("address", 0x08).is_ok());
        assert!(validate_device_address("address", 0x77).is_ok());
        assert!(validate_device_address("address", 0x07).is_err());
        assert!(validate_device_address("address", 0x78).is_err());
    }

    #[test]
    fn test_validate_unique_addresses() {
        assert!(validate_unique_addresses("sensors", &[0x29, 0x30, 0x31]).is_ok());
        assert!(validate_unique_addresses("sensors", &[0x29, 0x30, 0x29]).is_err());
    }

    #[test]
    fn test_parse_address() {
        assert_eq!(parse_address("0x29"), Ok(0x29));
        assert_eq!(parse_address("41"), Ok(41));
        assert_eq!(parse_address("0b0101001"), Ok(0x29));
        assert!(parse_address("0x80").is_err());
        assert!(parse_address("zz").is_err());
    }

    #[test]
    fn test_validate_positive_number() {
        assert!(validate_positive_number("samples", 5, 1).is_ok());
        assert!(validate_positive_number("samples", 0, 1).is_err());
    }

    #[test]
    fn test_validate_range() {
        assert!(validate_range("budget", 50_000u32, 20_000, 1_100_000).is_ok());
        assert!(validate_range("budget", 10_000u32, 20_000, 1_100_000).is_err());
    }

    #[test]
    fn test_validate_non_empty_string() {
        assert!(validate_non_empty_string("name", "left").is_ok());
        assert!(validate_non_empty_string("name", "   ").is_err());
    }
}
