pub mod cli;
pub mod toml_config;

use crate::core::sensor::SensorSettings;
use crate::domain::model::{DistanceMode, SensorKind};
use crate::utils::error::{LidarError, Result};
use crate::utils::validation::{validate_device_address, validate_range};

#[cfg(feature = "cli")]
use crate::adapters::sink::OutputFormat;
#[cfg(feature = "cli")]
use crate::core::ranging::SessionPlan;
#[cfg(feature = "cli")]
use crate::domain::model::{Port, Scaling};
#[cfg(feature = "cli")]
use crate::utils::validation::{parse_address, Validate};
#[cfg(feature = "cli")]
use clap::Parser;
#[cfg(feature = "cli")]
use serde::{Deserialize, Serialize};
#[cfg(feature = "cli")]
use std::path::PathBuf;
#[cfg(feature = "cli")]
use std::time::Duration;

#[cfg(feature = "cli")]
#[derive(Debug, Clone, Serialize, Deserialize, Parser)]
#[command(name = "lidar-contrib")]
#[command(about = "Sample a VL53L0X, VL53L1X or VL6180X time-of-flight sensor")]
pub struct CliConfig {
    #[arg(long, value_enum, default_value = "vl53l1x")]
    pub sensor: SensorKind,

    /// I2C bus: onboard, mxp or a bus number
    #[arg(long, default_value = "onboard")]
    pub port: Port,

    /// Device node, overriding the one derived from --port
    #[arg(long)]
    pub device: Option<PathBuf>,

    #[arg(long, value_parser = parse_address, default_value = "0x29")]
    pub address: u8,

    /// Readings to take; 0 samples until interrupted
    #[arg(long, default_value = "10")]
    pub samples: usize,

    #[arg(long, default_value = "50")]
    pub period_ms: u32,

    #[arg(long, default_value = "500")]
    pub timeout_ms: u64,

    #[arg(long, default_value = "3")]
    pub max_consecutive_timeouts: u32,

    #[arg(long, value_enum)]
    pub distance_mode: Option<DistanceMode>,

    #[arg(long)]
    pub timing_budget_us: Option<u32>,

    /// Return signal rate limit in MCPS (VL53L0X)
    #[arg(long)]
    pub signal_rate_limit: Option<f32>,

    /// Range scaling, 1 to 3 (VL6180X)
    #[arg(long)]
    pub scaling: Option<Scaling>,

    #[arg(long, value_enum, default_value = "text")]
    pub format: OutputFormat,

    /// Write readings to this file instead of stdout
    #[arg(long)]
    pub output: Option<PathBuf>,

    /// Use an in-memory sensor instead of the I2C bus
    #[arg(long)]
    pub simulate: bool,

    #[arg(long, help = "Enable verbose output")]
    pub verbose: bool,

    /// Log as JSON lines
    #[arg(long)]
    pub log_json: bool,
}

#[cfg(feature = "cli")]
impl CliConfig {
    pub fn settings(&self) -> SensorSettings {
        SensorSettings {
            distance_mode: self.distance_mode,
            timing_budget_us: self.timing_budget_us,
            signal_rate_limit: self.signal_rate_limit,
            scaling: self.scaling,
            roi: None,
        }
    }

    pub fn plan(&self) -> SessionPlan {
        SessionPlan {
            name: self.sensor.part_name().to_string(),
            samples: self.samples,
            period_ms: self.period_ms,
            timeout: Duration::from_millis(self.timeout_ms),
            max_consecutive_timeouts: self.max_consecutive_timeouts,
            settings: self.settings(),
        }
    }
}

#[cfg(feature = "cli")]
impl Validate for CliConfig {
    fn validate(&self) -> Result<()> {
        validate_sensor("address", self.sensor, self.address, self.period_ms, &self.settings())?;
        if let Some(output) = &self.output {
            crate::utils::validation::validate_path("output", &output.to_string_lossy())?;
        }
        Ok(())
    }
}

/// Timing budgets each part accepts, in microseconds.
pub fn timing_budget_range(kind: SensorKind) -> Option<(u32, u32)> {
    match kind {
        SensorKind::Vl53l1x => Some((20_000, 1_000_000)),
        SensorKind::Vl53l0x => Some((20_000, 1_000_000)),
        SensorKind::Vl6180x => None,
    }
}

/// Checks one sensor's address, period and settings against what its part
/// supports. `field` prefixes the names in error messages.
pub fn validate_sensor(
    field: &str,
    kind: SensorKind,
    address: u8,
    period_ms: u32,
    settings: &SensorSettings,
) -> Result<()> {
    validate_device_address(field, address)?;

    let prefix = field.rsplit_once('.').map(|(p, _)| format!("{}.", p)).unwrap_or_default();
    let unsupported = settings.unsupported_by(kind);
    if let Some(option) = unsupported.first() {
        return Err(LidarError::InvalidConfigValueError {
            field: format!("{}{}", prefix, option),
            value: kind.to_string(),
            reason: format!("{} applies to other sensor kinds only", option),
        });
    }

    if settings.distance_mode == Some(DistanceMode::Unknown) {
        return Err(LidarError::InvalidConfigValueError {
            field: format!("{}distance_mode", prefix),
            value: "unknown".to_string(),
            reason: "Use short, medium or long".to_string(),
        });
    }

    if let (Some(budget), Some((min, max))) = (settings.timing_budget_us, timing_budget_range(kind)) {
        validate_range(&format!("{}timing_budget_us", prefix), budget, min, max)?;
    }

    if let Some(limit) = settings.signal_rate_limit {
        validate_range(&format!("{}signal_rate_limit", prefix), limit, 0.0, 511.99)?;
    }

    if let Some((width, height)) = settings.roi {
        validate_range(&format!("{}roi", prefix), width, 4, 16)?;
        validate_range(&format!("{}roi", prefix), height, 4, 16)?;
    }

    let period_field = format!("{}period_ms", prefix);
    match kind {
        SensorKind::Vl53l1x => {
            // a new measurement cannot start before the previous one finishes
            let budget_ms = settings.timing_budget_us.unwrap_or(50_000).div_ceil(1000);
            if period_ms < budget_ms {
                return Err(LidarError::InvalidConfigValueError {
                    field: period_field,
                    value: period_ms.to_string(),
                    reason: format!("Period must cover the {} ms timing budget", budget_ms),
                });
            }
        }
        SensorKind::Vl6180x => validate_range(&period_field, period_ms, 10, 2550)?,
        SensorKind::Vl53l0x => {}
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::Scaling;

    #[test]
    fn test_validate_sensor_accepts_defaults() {
        let settings = SensorSettings::default();
        assert!(validate_sensor("address", SensorKind::Vl53l1x, 0x29, 50, &settings).is_ok());
        assert!(validate_sensor("address", SensorKind::Vl53l0x, 0x30, 0, &settings).is_ok());
        assert!(validate_sensor("address", SensorKind::Vl6180x, 0x31, 100, &settings).is_ok());
    }

    #[test]
    fn test_validate_sensor_rejects_foreign_options() {
        let settings = SensorSettings {
            distance_mode: Some(DistanceMode::Short),
            ..Default::default()
        };
        let err = validate_sensor("sensors[0].address", SensorKind::Vl6180x, 0x29, 100, &settings)
            .unwrap_err();
        assert!(err.to_string().contains("sensors[0].distance_mode"));

        let settings = SensorSettings {
            scaling: Some(Scaling::Two),
            ..Default::default()
        };
        assert!(validate_sensor("address", SensorKind::Vl53l1x, 0x29, 50, &settings).is_err());
    }

    #[test]
    fn test_validate_sensor_rejects_unknown_distance_mode() {
        let settings = SensorSettings {
            distance_mode: Some(DistanceMode::Unknown),
            ..Default::default()
        };
        let err = validate_sensor("sensors[2].address", SensorKind::Vl53l1x, 0x30, 100, &settings)
            .unwrap_err();
        assert!(err.to_string().contains("sensors[2].distance_mode"));

        let settings = SensorSettings {
            distance_mode: Some(DistanceMode::Medium),
            ..Default::default()
        };
        assert!(validate_sensor("address", SensorKind::Vl53l1x, 0x30, 100, &settings).is_ok());
    }

    #[test]
    fn test_validate_sensor_checks_budget_and_period() {
        let settings = SensorSettings {
            timing_budget_us: Some(100_000),
            ..Default::default()
        };
        assert!(validate_sensor("address", SensorKind::Vl53l1x, 0x29, 50, &settings).is_err());
        assert!(validate_sensor("address", SensorKind::Vl53l1x, 0x29, 100, &settings).is_ok());

        let settings = SensorSettings {
            timing_budget_us: Some(10_000),
            ..Default::default()
        };
        assert!(validate_sensor("address", SensorKind::Vl53l0x, 0x29, 0, &settings).is_err());

        let settings = SensorSettings::default();
        assert!(validate_sensor("address", SensorKind::Vl6180x, 0x29, 5, &settings).is_err());
        assert!(validate_sensor("address", SensorKind::Vl53l1x, 0x07, 50, &settings).is_err());
    }

    #[cfg(feature = "cli")]
    #[test]
    fn test_cli_config_parses_flags() {
        let config = CliConfig::try_parse_from([
            "lidar-contrib",
            "--sensor",
            "vl6180x",
            "--port",
            "mxp",
            "--address",
            "0x31",
            "--scaling",
            "2",
            "--samples",
            "0",
            "--period-ms",
            "100",
            "--format",
            "csv",
        ])
        .unwrap();

        assert_eq!(config.sensor, SensorKind::Vl6180x);
        assert_eq!(config.port, Port::Mxp);
        assert_eq!(config.address, 0x31);
        assert_eq!(config.format, OutputFormat::Csv);
        assert!(config.validate().is_ok());

        let plan = config.plan();
        assert_eq!(plan.samples, 0);
        assert_eq!(plan.settings.scaling, Some(Scaling::Two));
        assert_eq!(plan.timeout, Duration::from_millis(500));
    }

    #[cfg(feature = "cli")]
    #[test]
    fn test_cli_config_rejects_mismatched_options() {
        let config = CliConfig::try_parse_from([
            "lidar-contrib",
            "--sensor",
            "vl53l0x",
            "--distance-mode",
            "short",
        ])
        .unwrap();
        assert!(config.validate().is_err());

        assert!(CliConfig::try_parse_from(["lidar-contrib", "--address", "0x99"]).is_err());
    }
}
