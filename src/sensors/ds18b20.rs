//! DS18B20 1-Wire temperature sensor via the Linux `w1_therm` driver.
//!
//! The kernel exposes each probe as `/sys/bus/w1/devices/28-*/w1_slave`:
//!
//! ```text
//! 72 01 4b 46 7f ff 0e 10 57 : crc=57 YES
//! 72 01 4b 46 7f ff 0e 10 57 t=23125
//! ```
//!
//! The first line must end in `YES` (CRC ok); `t=` is millidegrees Celsius.

use std::fs;
use std::path::PathBuf;

use log::warn;

use crate::app::ports::TemperatureSensor;
use crate::error::SensorError;

/// Plausible range of the DS18B20.
const VALID_RANGE_C: core::ops::RangeInclusive<f64> = -55.0..=125.0;

/// Power-on reset value; a probe that returns it has not converted yet.
const POWER_ON_RESET_MILLI: i32 = 85_000;

pub struct Ds18b20Sensor {
    path: PathBuf,
}

impl Ds18b20Sensor {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn read_celsius(&self) -> Result<f64, SensorError> {
        let text = fs::read_to_string(&self.path).map_err(|_| SensorError::ReadFailed)?;
        parse_w1_slave(&text)
    }
}

impl TemperatureSensor for Ds18b20Sensor {
    fn read(&mut self) -> Option<f64> {
        match self.read_celsius() {
            Ok(c) => Some(c),
            Err(e) => {
                warn!("DS18B20 {}: {e}", self.path.display());
                None
            }
        }
    }
}

/// Parse the contents of a `w1_slave` file into degrees Celsius.
pub fn parse_w1_slave(text: &str) -> Result<f64, SensorError> {
    let mut lines = text.lines();
    let crc_line = lines.next().ok_or(SensorError::Malformed)?;
    if !crc_line.trim_end().ends_with("YES") {
        return Err(SensorError::CrcMismatch);
    }
    let data_line = lines.next().ok_or(SensorError::Malformed)?;
    let (_, raw) = data_line.rsplit_once("t=").ok_or(SensorError::Malformed)?;
    let milli: i32 = raw.trim().parse().map_err(|_| SensorError::Malformed)?;
    if milli == POWER_ON_RESET_MILLI {
        return Err(SensorError::OutOfRange);
    }
    let celsius = f64::from(milli) / 1000.0;
    if !VALID_RANGE_C.contains(&celsius) {
        return Err(SensorError::OutOfRange);
    }
    Ok(celsius)
}
