pub mod ranging;
pub mod register;
pub mod sensor;
pub mod timeout;
pub mod vl53l0x;
pub mod vl53l1x;
pub mod vl6180x;

pub use crate::core::ranging::{RangingEngine, SessionPlan, SessionReport};
pub use crate::core::sensor::{RangeSensor, SensorSettings};
pub use crate::domain::ports::{I2cBus, ReadingSink};
pub use crate::utils::error::Result;
