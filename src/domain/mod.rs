// Domain layer: sensor-independent models and the ports the drivers are written against.

pub mod model;
pub mod ports;
