//! Thermostat configuration parameters.
//!
//! Loaded once from a JSON file before any worker starts and read-only for
//! the rest of the run. Every field has a default, so an empty object is a
//! valid file; unknown fields are rejected.

use core::str::FromStr;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Largest sampling window the sampler can hold.
pub const MAX_SAMPLE_SIZE: usize = 32;

/// Accepted setpoint range in degrees Celsius.
pub const TARGET_RANGE_C: core::ops::RangeInclusive<f64> = 0.0..=50.0;

// ---------------------------------------------------------------------------
// Safety timing guards
// ---------------------------------------------------------------------------

/// Device-safety timing guards, in minutes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SafetyConfig {
    /// Device must stay on at least this long before it may be turned off.
    pub minimum_on_minutes: f64,
    /// Device must stay off at least this long before it may be turned on.
    pub cool_down_minutes: f64,
    /// Device is forced off once it has been on this long.
    pub maximum_on_minutes: f64,
}

impl Default for SafetyConfig {
    fn default() -> Self {
        Self {
            minimum_on_minutes: 0.2,
            cool_down_minutes: 0.2,
            maximum_on_minutes: 10.0,
        }
    }
}

/// Names of the safety parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SafetyKey {
    MinimumOnTime,
    CoolDownPeriod,
    MaximumOnTime,
}

impl SafetyKey {
    pub const ALL: [Self; 3] = [Self::MinimumOnTime, Self::CoolDownPeriod, Self::MaximumOnTime];

    pub const fn name(self) -> &'static str {
        match self {
            Self::MinimumOnTime => "MINIMUM_ON_TIME",
            Self::CoolDownPeriod => "COOL_DOWN_PERIOD",
            Self::MaximumOnTime => "MAXIMUM_ON_TIME",
        }
    }
}

impl FromStr for SafetyKey {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|k| k.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| ConfigError::UnknownKey(s.to_string()))
    }
}

impl SafetyConfig {
    /// Look up a guard by key.
    pub fn minutes(&self, key: SafetyKey) -> f64 {
        match key {
            SafetyKey::MinimumOnTime => self.minimum_on_minutes,
            SafetyKey::CoolDownPeriod => self.cool_down_minutes,
            SafetyKey::MaximumOnTime => self.maximum_on_minutes,
        }
    }

    /// Look up a guard by its textual name.
    pub fn minutes_by_name(&self, name: &str) -> Result<f64, ConfigError> {
        Ok(self.minutes(name.parse()?))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for key in SafetyKey::ALL {
            let v = self.minutes(key);
            if !v.is_finite() || v <= 0.0 {
                return Err(ConfigError::ValidationFailed(match key {
                    SafetyKey::MinimumOnTime => "minimum_on_minutes must be a positive number",
                    SafetyKey::CoolDownPeriod => "cool_down_minutes must be a positive number",
                    SafetyKey::MaximumOnTime => "maximum_on_minutes must be a positive number",
                }));
            }
        }
        if self.maximum_on_minutes < self.minimum_on_minutes {
            return Err(ConfigError::ValidationFailed(
                "maximum_on_minutes must not be shorter than minimum_on_minutes",
            ));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Workers
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SamplerConfig {
    /// Delay between sensor reads (milliseconds).
    pub interval_ms: u64,
    /// Number of reads averaged before publishing.
    pub sample_size: usize,
    /// Also publish every raw reading between window fills.
    pub publish_raw_readings: bool,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            interval_ms: 1000,
            sample_size: 5,
            publish_raw_readings: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ControllerConfig {
    /// Delay between control decisions (milliseconds).
    pub interval_ms: u64,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self { interval_ms: 1000 }
    }
}

// ---------------------------------------------------------------------------
// Hardware
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HardwareMode {
    #[default]
    Simulation,
    Physical,
}

impl FromStr for HardwareMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "simulation" | "sim" => Ok(Self::Simulation),
            "physical" | "target" => Ok(Self::Physical),
            _ => Err(ConfigError::ValidationFailed("mode must be simulation or physical")),
        }
    }
}

/// Parameters of the simulated room.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SimulationConfig {
    /// Room temperature at startup (°C).
    pub start_temperature_c: f64,
    /// Temperature the room drifts toward while the heater is off (°C).
    pub ambient_temperature_c: f64,
    /// Warming per read while the heater is on (°C).
    pub heating_per_read_c: f64,
    /// Fraction of the gap to ambient lost per read while off.
    pub cooling_factor: f64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            start_temperature_c: 19.0,
            ambient_temperature_c: 15.0,
            heating_per_read_c: 0.1,
            cooling_factor: 0.01,
        }
    }
}

/// Wiring of the physical relay and sensor.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PhysicalConfig {
    /// Kernel GPIO number driving the relay coil.
    pub relay_gpio: u32,
    /// Relay board energises on a low output.
    #[serde(default)]
    pub relay_active_low: bool,
    /// Path to the DS18B20 `w1_slave` file.
    pub sensor_path: PathBuf,
}

// ---------------------------------------------------------------------------
// Storage
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AuditConfig {
    /// JSON-lines audit log; `None` disables the file sink.
    pub path: Option<PathBuf>,
    /// Records written before the log is rotated.
    pub max_records: usize,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            path: Some(PathBuf::from("state_transition_record.jsonl")),
            max_records: 20,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StateStoreConfig {
    /// Directory for the persisted shared-state record; `None` keeps state in memory only.
    pub dir: Option<PathBuf>,
}

// ---------------------------------------------------------------------------
// Top level
// ---------------------------------------------------------------------------

/// Complete process configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ThermostatConfig {
    /// Setpoint (°C).
    pub target_temperature_c: f64,
    pub safety: SafetyConfig,
    pub sampler: SamplerConfig,
    pub controller: ControllerConfig,
    pub mode: HardwareMode,
    pub simulation: SimulationConfig,
    pub physical: Option<PhysicalConfig>,
    pub audit: AuditConfig,
    pub state_store: StateStoreConfig,
}

impl Default for ThermostatConfig {
    fn default() -> Self {
        Self {
            target_temperature_c: 22.0,
            safety: SafetyConfig::default(),
            sampler: SamplerConfig::default(),
            controller: ControllerConfig::default(),
            mode: HardwareMode::default(),
            simulation: SimulationConfig::default(),
            physical: None,
            audit: AuditConfig::default(),
            state_store: StateStoreConfig::default(),
        }
    }
}

impl ThermostatConfig {
    /// Parse a JSON document and validate it.
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        let cfg: Self =
            serde_json::from_str(text).map_err(|e| ConfigError::Parse(e.to_string()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Read and validate the file at `path`.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => ConfigError::NotFound(path.display().to_string()),
            _ => ConfigError::Io(e.to_string()),
        })?;
        Self::from_json(&text)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.safety.validate()?;
        if !self.target_temperature_c.is_finite()
            || !TARGET_RANGE_C.contains(&self.target_temperature_c)
        {
            return Err(ConfigError::ValidationFailed(
                "target_temperature_c must be 0.0–50.0",
            ));
        }
        if !(1..=MAX_SAMPLE_SIZE).contains(&self.sampler.sample_size) {
            return Err(ConfigError::ValidationFailed("sampler.sample_size must be 1–32"));
        }
        if self.sampler.interval_ms == 0 {
            return Err(ConfigError::ValidationFailed("sampler.interval_ms must be > 0"));
        }
        if self.controller.interval_ms == 0 {
            return Err(ConfigError::ValidationFailed("controller.interval_ms must be > 0"));
        }
        if self.audit.max_records == 0 {
            return Err(ConfigError::ValidationFailed("audit.max_records must be > 0"));
        }
        let sim = &self.simulation;
        if !(0.0..=1.0).contains(&sim.cooling_factor) || sim.heating_per_read_c < 0.0 {
            return Err(ConfigError::ValidationFailed(
                "simulation cooling_factor must be 0–1 and heating_per_read_c >= 0",
            ));
        }
        if self.mode == HardwareMode::Physical && self.physical.is_none() {
            return Err(ConfigError::MissingSection("physical"));
        }
        Ok(())
    }
}
