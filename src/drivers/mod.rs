//! Actuator drivers.

pub mod relay;
pub mod sysfs_gpio;
