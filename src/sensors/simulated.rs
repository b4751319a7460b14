//! Simulated room temperature.
//!
//! First-order model: each read warms the room by a fixed step while the
//! heater is on, and decays toward ambient while it is off. The heater
//! status is taken from the shared state, as a real room would "see" the
//! relay.

use crate::app::ports::TemperatureSensor;
use crate::config::SimulationConfig;
use crate::state::SharedDeviceState;

pub struct SimulatedSensor {
    state: SharedDeviceState,
    temperature: f64,
    ambient: f64,
    heating_per_read: f64,
    cooling_factor: f64,
}

impl SimulatedSensor {
    pub fn new(state: SharedDeviceState, config: &SimulationConfig) -> Self {
        Self {
            state,
            temperature: config.start_temperature_c,
            ambient: config.ambient_temperature_c,
            heating_per_read: config.heating_per_read_c,
            cooling_factor: config.cooling_factor,
        }
    }

    pub fn temperature(&self) -> f64 {
        self.temperature
    }
}

impl TemperatureSensor for SimulatedSensor {
    fn read(&mut self) -> Option<f64> {
        if self.state.get_status() {
            self.temperature += self.heating_per_read;
        } else {
            self.temperature -= (self.temperature - self.ambient) * self.cooling_factor;
        }
        Some(self.temperature)
    }
}
