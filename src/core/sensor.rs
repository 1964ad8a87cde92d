use crate::domain::model::{DistanceMode, Reading, Scaling, SensorKind};
use crate::utils::error::{LidarError, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Sensor-specific tuning applied after `initialize`. Options a part does not
/// support are rejected by that part's driver.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SensorSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub distance_mode: Option<DistanceMode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timing_budget_us: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signal_rate_limit: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scaling: Option<Scaling>,
    /// ROI width and height in SPADs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub roi: Option<(u8, u8)>,
}

impl SensorSettings {
    pub fn is_empty(&self) -> bool {
        *self == SensorSettings::default()
    }

    /// Names of the options set here that `kind` cannot apply.
    pub fn unsupported_by(&self, kind: SensorKind) -> Vec<&'static str> {
        let mut options = Vec::new();
        if kind != SensorKind::Vl53l1x {
            if self.distance_mode.is_some() {
                options.push("distance_mode");
            }
            if self.roi.is_some() {
                options.push("roi");
            }
        }
        if kind != SensorKind::Vl53l0x && self.signal_rate_limit.is_some() {
            options.push("signal_rate_limit");
        }
        if kind != SensorKind::Vl6180x && self.scaling.is_some() {
            options.push("scaling");
        }
        if kind == SensorKind::Vl6180x && self.timing_budget_us.is_some() {
            options.push("timing_budget_us");
        }
        options
    }

    pub(crate) fn check_supported(&self, kind: SensorKind) -> Result<()> {
        match self.unsupported_by(kind).first() {
            Some(option) => Err(LidarError::invalid_argument(format!(
                "{} is not supported by the {}",
                option, kind
            ))),
            None => Ok(()),
        }
    }
}

/// Operations every time-of-flight driver offers.
pub trait RangeSensor: Send {
    fn kind(&self) -> SensorKind;

    fn address(&self) -> u8;

    /// Moves the device to `address`. A no-op when it is already there.
    fn set_address(&mut self, address: u8) -> Result<()>;

    /// Verifies the model identity and loads the default configuration.
    fn initialize(&mut self) -> Result<()>;

    fn configure(&mut self, settings: &SensorSettings) -> Result<()>;

    fn start_continuous(&mut self, period_ms: u32) -> Result<()>;

    fn stop_continuous(&mut self) -> Result<()>;

    /// Waits for the next continuous sample, bounded by the timeout.
    fn read_range_mm(&mut self) -> Result<u16>;

    fn read_reading(&mut self) -> Result<Reading> {
        let range_mm = self.read_range_mm()?;
        Ok(Reading::range(self.kind(), range_mm))
    }

    fn set_timeout(&mut self, timeout: Duration);

    fn timeout(&self) -> Duration;

    /// Whether a timeout happened since the last call. Clears the flag.
    fn timeout_occurred(&mut self) -> bool;
}

impl<S: RangeSensor + ?Sized> RangeSensor for Box<S> {
    fn kind(&self) -> SensorKind {
        (**self).kind()
    }

    fn address(&self) -> u8 {
        (**self).address()
    }

    fn set_address(&mut self, address: u8) -> Result<()> {
        (**self).set_address(address)
    }

    fn initialize(&mut self) -> Result<()> {
        (**self).initialize()
    }

    fn configure(&mut self, settings: &SensorSettings) -> Result<()> {
        (**self).configure(settings)
    }

    fn start_continuous(&mut self, period_ms: u32) -> Result<()> {
        (**self).start_continuous(period_ms)
    }

    fn stop_continuous(&mut self) -> Result<()> {
        (**self).stop_continuous()
    }

    fn read_range_mm(&mut self) -> Result<u16> {
        (**self).read_range_mm()
    }

    fn read_reading(&mut self) -> Result<Reading> {
        (**self).read_reading()
    }

    fn set_timeout(&mut self, timeout: Duration) {
        (**self).set_timeout(timeout)
    }

    fn timeout(&self) -> Duration {
        (**self).timeout()
    }

    fn timeout_occurred(&mut self) -> bool {
        (**self).timeout_occurred()
    }
}
