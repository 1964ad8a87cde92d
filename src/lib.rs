pub mod adapters;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::CliConfig;
pub use config::toml_config::RigConfig;

pub use core::ranging::{RangingEngine, SessionPlan, SessionReport};
pub use core::sensor::{RangeSensor, SensorSettings};
pub use core::{vl53l0x::Vl53l0x, vl53l1x::Vl53l1x, vl6180x::Vl6180x};
pub use domain::model::{Reading, SensorKind};
pub use utils::error::{LidarError, Result};
