use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Address all three sensors answer on after power-up.
pub const DEFAULT_ADDRESS: u8 = 0x29;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
#[serde(rename_all = "lowercase")]
pub enum SensorKind {
    Vl53l0x,
    Vl53l1x,
    Vl6180x,
}

impl SensorKind {
    pub fn default_address(&self) -> u8 {
        DEFAULT_ADDRESS
    }

    pub fn addressing(&self) -> Addressing {
        match self {
            SensorKind::Vl53l0x => Addressing::EightBit,
            SensorKind::Vl53l1x | SensorKind::Vl6180x => Addressing::SixteenBit,
        }
    }

    pub fn part_name(&self) -> &'static str {
        match self {
            SensorKind::Vl53l0x => "VL53L0X",
            SensorKind::Vl53l1x => "VL53L1X",
            SensorKind::Vl6180x => "VL6180X",
        }
    }
}

impl fmt::Display for SensorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.part_name())
    }
}

impl FromStr for SensorKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "vl53l0x" => Ok(SensorKind::Vl53l0x),
            "vl53l1x" => Ok(SensorKind::Vl53l1x),
            "vl6180x" => Ok(SensorKind::Vl6180x),
            other => Err(format!("unknown sensor kind '{}'", other)),
        }
    }
}

/// Width of the register index sent ahead of every payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Addressing {
    EightBit,
    SixteenBit,
}

impl Addressing {
    pub fn index_len(&self) -> usize {
        match self {
            Addressing::EightBit => 1,
            Addressing::SixteenBit => 2,
        }
    }

    pub fn encode(&self, reg: u16, out: &mut Vec<u8>) {
        match self {
            Addressing::EightBit => out.push((reg & 0xFF) as u8),
            Addressing::SixteenBit => out.extend_from_slice(&reg.to_be_bytes()),
        }
    }
}

/// VL53L1X ranging presets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
#[serde(rename_all = "lowercase")]
pub enum DistanceMode {
    Short,
    Medium,
    Long,
    #[cfg_attr(feature = "cli", value(skip))]
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VcselPeriodType {
    PreRange,
    FinalRange,
}

/// VL6180X range scaling: 1x reports millimetres, 2x and 3x trade resolution for reach.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum Scaling {
    One,
    Two,
    Three,
}

impl Scaling {
    pub const ALL: [Scaling; 3] = [Scaling::One, Scaling::Two, Scaling::Three];

    pub fn amount(&self) -> u8 {
        match self {
            Scaling::One => 1,
            Scaling::Two => 2,
            Scaling::Three => 3,
        }
    }
}

impl TryFrom<u8> for Scaling {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Scaling::One),
            2 => Ok(Scaling::Two),
            3 => Ok(Scaling::Three),
            other => Err(format!("scaling must be 1, 2 or 3, got {}", other)),
        }
    }
}

impl From<Scaling> for u8 {
    fn from(value: Scaling) -> Self {
        value.amount()
    }
}

impl FromStr for Scaling {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim().trim_end_matches(&['x', 'X'][..]);
        let amount: u8 = trimmed
            .parse()
            .map_err(|_| format!("invalid scaling '{}'", s))?;
        Scaling::try_from(amount)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RangeStatus {
    RangeValid,
    SigmaFail,
    SignalFail,
    RangeValidMinRangeClipped,
    OutOfBoundsFail,
    HardwareFail,
    RangeValidNoWrapCheckFail,
    WrapTargetFail,
    XtalkSignalFail,
    SynchronizationInt,
    MinRangeFail,
    None,
}

impl RangeStatus {
    /// Maps the VL53L1X raw result status to the condensed status.
    pub fn from_device(raw: u8, stream_count: u8) -> Self {
        match raw {
            17 | 2 | 1 | 3 => RangeStatus::HardwareFail,
            13 => RangeStatus::MinRangeFail,
            18 => RangeStatus::SynchronizationInt,
            5 => RangeStatus::OutOfBoundsFail,
            4 => RangeStatus::SignalFail,
            6 => RangeStatus::SigmaFail,
            7 => RangeStatus::WrapTargetFail,
            12 => RangeStatus::XtalkSignalFail,
            8 => RangeStatus::RangeValidMinRangeClipped,
            9 if stream_count == 0 => RangeStatus::RangeValidNoWrapCheckFail,
            9 => RangeStatus::RangeValid,
            _ => RangeStatus::None,
        }
    }

    pub fn is_valid(&self) -> bool {
        matches!(
            self,
            RangeStatus::RangeValid
                | RangeStatus::RangeValidMinRangeClipped
                | RangeStatus::RangeValidNoWrapCheckFail
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RangingData {
    pub range_mm: u16,
    pub status: RangeStatus,
    pub peak_signal_count_rate_mcps: f32,
    pub ambient_count_rate_mcps: f32,
}

/// One sample, as handed to output sinks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    pub sensor: String,
    pub kind: SensorKind,
    pub timestamp: DateTime<Utc>,
    pub range_mm: u16,
    pub ambient: Option<u16>,
    pub status: Option<RangeStatus>,
}

impl Reading {
    pub fn range(kind: SensorKind, range_mm: u16) -> Self {
        Self {
            sensor: kind.part_name().to_string(),
            kind,
            timestamp: Utc::now(),
            range_mm,
            ambient: None,
            status: None,
        }
    }

    pub fn named(mut self, sensor: impl Into<String>) -> Self {
        self.sensor = sensor.into();
        self
    }
}

/// I2C bus selector. The roboRIO exposes the onboard header and the MXP connector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "PortRepr", into = "PortRepr")]
pub enum Port {
    Onboard,
    Mxp,
    Custom(u8),
}

impl Port {
    pub fn number(&self) -> u8 {
        match self {
            Port::Onboard => 0,
            Port::Mxp => 1,
            Port::Custom(n) => *n,
        }
    }

    pub fn device_path(&self) -> String {
        format!("/dev/i2c-{}", self.number())
    }
}

impl Default for Port {
    fn default() -> Self {
        Port::Onboard
    }
}

impl fmt::Display for Port {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Port::Onboard => f.write_str("onboard"),
            Port::Mxp => f.write_str("mxp"),
            Port::Custom(n) => write!(f, "{}", n),
        }
    }
}

impl FromStr for Port {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "onboard" => Ok(Port::Onboard),
            "mxp" => Ok(Port::Mxp),
            other => other
                .parse::<u8>()
                .map(Port::Custom)
                .map_err(|_| format!("unknown I2C port '{}'", s)),
        }
    }
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum PortRepr {
    Number(u8),
    Name(String),
}

impl TryFrom<PortRepr> for Port {
    type Error = String;

    fn try_from(value: PortRepr) -> Result<Self, Self::Error> {
        match value {
            PortRepr::Number(n) => Ok(Port::Custom(n)),
            PortRepr::Name(name) => name.parse(),
        }
    }
}

impl From<Port> for PortRepr {
    fn from(value: Port) -> Self {
        match value {
            Port::Custom(n) => PortRepr::Number(n),
            named => PortRepr::Name(named.to_string()),
        }
    }
}
