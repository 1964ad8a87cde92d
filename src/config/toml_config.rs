use crate::adapters::sink::OutputFormat;
use crate::config::cli::MemberSpec;
use crate::config::validate_sensor;
use crate::core::ranging::SessionPlan;
use crate::core::sensor::SensorSettings;
use crate::domain::model::{Port, SensorKind};
use crate::utils::error::{LidarError, Result};
use crate::utils::validation::{
    validate_non_empty_string, validate_path, validate_positive_number, validate_unique_addresses,
    Validate,
};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// A robot's sensor rig, loaded from TOML.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RigConfig {
    pub rig: RigInfo,
    #[serde(default)]
    pub bus: BusConfig,
    #[serde(default)]
    pub sensors: Vec<SensorConfig>,
    #[serde(default)]
    pub output: OutputConfig,
    pub logging: Option<LoggingConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RigInfo {
    pub name: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BusConfig {
    #[serde(default)]
    pub port: Port,
    /// Overrides the device node derived from `port`.
    pub device: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SensorConfig {
    pub name: String,
    pub kind: SensorKind,
    pub address: u8,
    pub timeout_ms: Option<u64>,
    pub period_ms: Option<u32>,
    pub samples: Option<usize>,
    pub max_consecutive_timeouts: Option<u32>,
    #[serde(flatten)]
    pub settings: SensorSettings,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OutputConfig {
    #[serde(default)]
    pub format: OutputFormat,
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: Option<String>,
    #[serde(default)]
    pub json: bool,
}

const DEFAULT_TIMEOUT_MS: u64 = 500;
const DEFAULT_PERIOD_MS: u32 = 50;
const DEFAULT_SAMPLES: usize = 10;
const DEFAULT_MAX_CONSECUTIVE_TIMEOUTS: u32 = 3;

impl SensorConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms.unwrap_or(DEFAULT_TIMEOUT_MS))
    }

    pub fn period_ms(&self) -> u32 {
        self.period_ms.unwrap_or(DEFAULT_PERIOD_MS)
    }

    pub fn samples(&self) -> usize {
        self.samples.unwrap_or(DEFAULT_SAMPLES)
    }

    pub fn max_consecutive_timeouts(&self) -> u32 {
        self.max_consecutive_timeouts
            .unwrap_or(DEFAULT_MAX_CONSECUTIVE_TIMEOUTS)
    }

    pub fn plan(&self) -> SessionPlan {
        SessionPlan {
            name: self.name.clone(),
            samples: self.samples(),
            period_ms: self.period_ms(),
            timeout: self.timeout(),
            max_consecutive_timeouts: self.max_consecutive_timeouts(),
            settings: self.settings.clone(),
        }
    }

    pub fn member_spec(&self) -> MemberSpec {
        MemberSpec {
            name: self.name.clone(),
            kind: self.kind,
            address: self.address,
            timeout: self.timeout(),
            period_ms: self.period_ms(),
            samples: self.samples(),
            max_consecutive_timeouts: self.max_consecutive_timeouts(),
            settings: self.settings.clone(),
        }
    }
}

impl RigConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(LidarError::IoError)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content)?;

        toml::from_str(&processed_content).map_err(|e| LidarError::ConfigValidationError {
            field: "toml_parsing".to_string(),
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// Replaces `${VAR}` with the variable's value. Unset variables are left as is.
    fn substitute_env_vars(content: &str) -> Result<String> {
        let re = Regex::new(r"\$\{([^}]+)\}").map_err(|e| LidarError::ConfigValidationError {
            field: "environment".to_string(),
            message: e.to_string(),
        })?;

        let result = re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        });

        Ok(result.to_string())
    }

    pub fn validate_config(&self) -> Result<()> {
        validate_non_empty_string("rig.name", &self.rig.name)?;

        if self.sensors.is_empty() {
            return Err(LidarError::MissingConfigError {
                field: "sensors".to_string(),
            });
        }

        for (i, sensor) in self.sensors.iter().enumerate() {
            validate_non_empty_string(&format!("sensors[{}].name", i), &sensor.name)?;
            validate_positive_number(&format!("sensors[{}].samples", i), sensor.samples(), 1)?;
            validate_sensor(
                &format!("sensors[{}].address", i),
                sensor.kind,
                sensor.address,
                sensor.period_ms(),
                &sensor.settings,
            )?;
        }

        let addresses: Vec<u8> = self.sensors.iter().map(|s| s.address).collect();
        validate_unique_addresses("sensors.address", &addresses)?;

        if let Some(device) = &self.bus.device {
            validate_path("bus.device", &device.to_string_lossy())?;
        }
        if let Some(path) = &self.output.path {
            validate_path("output.path", &path.to_string_lossy())?;
        }

        if let Some(level) = self.logging.as_ref().and_then(|l| l.level.as_deref()) {
            let valid_levels = ["trace", "debug", "info", "warn", "error"];
            if !valid_levels.contains(&level) {
                return Err(LidarError::InvalidConfigValueError {
                    field: "logging.level".to_string(),
                    value: level.to_string(),
                    reason: format!("Valid levels: {}", valid_levels.join(", ")),
                });
            }
        }

        Ok(())
    }

    pub fn sensor(&self, name: &str) -> Option<&SensorConfig> {
        self.sensors.iter().find(|s| s.name == name)
    }

    pub fn member_specs(&self) -> Vec<MemberSpec> {
        self.sensors.iter().map(SensorConfig::member_spec).collect()
    }

    /// Rounds needed for every sensor to take its samples.
    pub fn rounds(&self) -> usize {
        self.sensors
            .iter()
            .map(SensorConfig::samples)
            .max()
            .unwrap_or(0)
    }

    pub fn log_json(&self) -> bool {
        self.logging.as_ref().map(|l| l.json).unwrap_or(false)
    }
}

impl Validate for RigConfig {
    fn validate(&self) -> Result<()> {
        self.validate_config()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::{DistanceMode, Scaling};
    use std::io::Write;
    use tempfile::NamedTempFile;

    const RIG: &str = r#"
[rig]
name = "drive-base"
description = "Front and rear ranging"

[bus]
port = "mxp"

[[sensors]]
name = "front"
kind = "vl53l1x"
address = 0x30
period_ms = 100
distance_mode = "short"
timing_budget_us = 33000
roi = [8, 8]

[[sensors]]
name = "gripper"
kind = "vl6180x"
address = 0x31
scaling = 2
samples = 20

[output]
format = "csv"
path = "readings/drive.csv"
"#;

    #[test]
    fn test_parse_rig_config() {
        let config = RigConfig::from_toml_str(RIG).unwrap();

        assert_eq!(config.rig.name, "drive-base");
        assert_eq!(config.bus.port, Port::Mxp);
        assert_eq!(config.sensors.len(), 2);
        assert_eq!(config.output.format, OutputFormat::Csv);

        let front = config.sensor("front").unwrap();
        assert_eq!(front.kind, SensorKind::Vl53l1x);
        assert_eq!(front.settings.distance_mode, Some(DistanceMode::Short));
        assert_eq!(front.settings.roi, Some((8, 8)));
        assert_eq!(front.timeout(), Duration::from_millis(500));

        let gripper = config.sensor("gripper").unwrap();
        assert_eq!(gripper.settings.scaling, Some(Scaling::Two));
        assert_eq!(config.rounds(), 20);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_env_var_substitution() {
        std::env::set_var("LIDAR_TEST_RIG_NAME", "practice-bot");

        let content = RIG.replace("\"drive-base\"", "\"${LIDAR_TEST_RIG_NAME}\"");
        let config = RigConfig::from_toml_str(&content).unwrap();
        assert_eq!(config.rig.name, "practice-bot");

        std::env::remove_var("LIDAR_TEST_RIG_NAME");
    }

    #[test]
    fn test_duplicate_addresses_fail_validation() {
        let content = RIG.replace("address = 0x31", "address = 0x30");
        let config = RigConfig::from_toml_str(&content).unwrap();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("share an I2C address"));
    }

    #[test]
    fn test_options_for_other_parts_fail_validation() {
        let content = RIG.replace("scaling = 2", "scaling = 2\ndistance_mode = \"long\"");
        let config = RigConfig::from_toml_str(&content).unwrap();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("sensors[1].distance_mode"));
    }

    #[test]
    fn test_unknown_distance_mode_fails_validation() {
        let content = RIG.replace("distance_mode = \"short\"", "distance_mode = \"unknown\"");
        let config = RigConfig::from_toml_str(&content).unwrap();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("sensors[0].distance_mode"));
    }

    #[test]
    fn test_period_shorter_than_budget_fails_validation() {
        let content = RIG.replace("period_ms = 100", "period_ms = 20");
        let config = RigConfig::from_toml_str(&content).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_samples_fail_validation() {
        let content = RIG.replace("samples = 20", "samples = 0");
        let config = RigConfig::from_toml_str(&content).unwrap();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("sensors[1].samples"));
    }

    #[test]
    fn test_invalid_scaling_fails_parsing() {
        let content = RIG.replace("scaling = 2", "scaling = 4");
        assert!(RigConfig::from_toml_str(&content).is_err());
    }

    #[test]
    fn test_empty_rig_fails_validation() {
        let config = RigConfig::from_toml_str("[rig]\nname = \"empty\"\n").unwrap();
        assert!(matches!(
            config.validate(),
            Err(LidarError::MissingConfigError { .. })
        ));
    }

    #[test]
    fn test_config_from_file() {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(RIG.as_bytes()).unwrap();

        let config = RigConfig::from_file(temp_file.path()).unwrap();
        assert_eq!(config.rig.name, "drive-base");
        let specs = config.member_specs();
        assert_eq!(specs[1].address, 0x31);
        assert_eq!(specs[0].period_ms, 100);
        assert_eq!(specs[0].samples, 10);
        assert_eq!(specs[1].samples, 20);
    }
}
