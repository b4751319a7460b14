//! Temperature sensing: sensor adapters and the smoothing [`TemperatureSampler`].
//!
//! The sampler takes one reading per tick into a fixed-size window. When
//! the window fills it publishes the mean, rounded to two decimals, to the
//! shared state and starts a new window. Failed reads are dropped and do
//! not count toward the window.

pub mod ds18b20;
pub mod simulated;

use log::{debug, info, warn};

use crate::app::events::round2;
use crate::app::ports::TemperatureSensor;
use crate::config::{MAX_SAMPLE_SIZE, SamplerConfig};
use crate::state::SharedDeviceState;

pub struct TemperatureSampler<S> {
    sensor: S,
    state: SharedDeviceState,
    window: heapless::Vec<f64, MAX_SAMPLE_SIZE>,
    sample_size: usize,
    publish_raw: bool,
}

impl<S: TemperatureSensor> TemperatureSampler<S> {
    /// `sample_size` is clamped to `1..=MAX_SAMPLE_SIZE`; configs are
    /// validated before this point.
    pub fn new(sensor: S, state: SharedDeviceState, config: &SamplerConfig) -> Self {
        Self {
            sensor,
            state,
            window: heapless::Vec::new(),
            sample_size: config.sample_size.clamp(1, MAX_SAMPLE_SIZE),
            publish_raw: config.publish_raw_readings,
        }
    }

    /// One sampling tick. Returns the average if this tick completed a window.
    pub fn tick(&mut self) -> Option<f64> {
        let Some(reading) = self.sensor.read() else {
            warn!("Temperature read failed, sample dropped");
            return None;
        };
        if !reading.is_finite() {
            warn!("Non-finite temperature reading, sample dropped");
            return None;
        }
        debug!("Current temperature: {reading:.2} °C");

        if self.publish_raw {
            self.state.update_temperature(reading);
        }
        // Capacity is MAX_SAMPLE_SIZE >= sample_size, and the window is
        // cleared as soon as it reaches sample_size.
        let _ = self.window.push(reading);
        if self.window.len() < self.sample_size {
            return None;
        }

        let avg = round2(self.window.iter().sum::<f64>() / self.window.len() as f64);
        self.window.clear();
        self.state.update_temperature(avg);
        info!("Average temperature: {avg:.2} °C");
        Some(avg)
    }

    /// Samples collected toward the current window.
    pub fn pending(&self) -> usize {
        self.window.len()
    }
}
