//! Hardware adapter: picks the sensor and relay for the configured mode.
//!
//! This is the only place that looks at [`HardwareMode`]. Everything
//! downstream sees the port traits, so simulation and physical runs share
//! the same control core.

use log::{error, info};

use crate::app::ports::{RelayActuator, TemperatureSensor};
use crate::config::{HardwareMode, ThermostatConfig};
use crate::drivers::relay::{GpioRelay, SimulatedRelay};
use crate::drivers::sysfs_gpio::SysfsPin;
use crate::error::{ActuatorError, ConfigError, Error};
use crate::sensors::ds18b20::Ds18b20Sensor;
use crate::sensors::simulated::SimulatedSensor;
use crate::state::SharedDeviceState;

pub type BoxedSensor = Box<dyn TemperatureSensor + Send>;
pub type BoxedRelay = Box<dyn RelayActuator + Send>;

/// Sensor and relay selected for one run.
pub struct HardwareAdapter {
    pub sensor: BoxedSensor,
    pub relay: BoxedRelay,
}

impl HardwareAdapter {
    /// Build the adapters for `config.mode`.
    ///
    /// The simulated sensor reads the heater status from `state`.
    pub fn build(config: &ThermostatConfig, state: &SharedDeviceState) -> Result<Self, Error> {
        match config.mode {
            HardwareMode::Simulation => {
                info!("Hardware: simulation");
                Ok(Self {
                    sensor: Box::new(SimulatedSensor::new(state.clone(), &config.simulation)),
                    relay: Box::new(SimulatedRelay::new()),
                })
            }
            HardwareMode::Physical => {
                let phys = config
                    .physical
                    .as_ref()
                    .ok_or(ConfigError::MissingSection("physical"))?;
                info!(
                    "Hardware: physical (relay GPIO{}, sensor {})",
                    phys.relay_gpio,
                    phys.sensor_path.display()
                );
                let pin = SysfsPin::open(phys.relay_gpio).map_err(|e| {
                    error!("Relay GPIO unavailable: {e}");
                    ActuatorError::GpioWriteFailed
                })?;
                let relay = GpioRelay::new(pin, phys.relay_active_low)?;
                Ok(Self {
                    sensor: Box::new(Ds18b20Sensor::new(phys.sensor_path.clone())),
                    relay: Box::new(relay),
                })
            }
        }
    }
}
