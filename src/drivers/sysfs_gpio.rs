//! Linux sysfs GPIO output pin.
//!
//! Exports `/sys/class/gpio/gpioN` if needed, sets the direction to `out`,
//! and writes `0`/`1` to `value`. Implements the `embedded-hal` digital
//! output traits so it plugs into [`GpioRelay`](super::relay::GpioRelay).

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use core::fmt;
use embedded_hal::digital::{self, ErrorKind, ErrorType, OutputPin};
use log::info;

pub const SYSFS_GPIO_ROOT: &str = "/sys/class/gpio";

#[derive(Debug)]
pub struct SysfsError(pub io::Error);

impl fmt::Display for SysfsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sysfs gpio: {}", self.0)
    }
}

impl std::error::Error for SysfsError {}

impl digital::Error for SysfsError {
    fn kind(&self) -> ErrorKind {
        ErrorKind::Other
    }
}

pub struct SysfsPin {
    value_path: PathBuf,
}

impl SysfsPin {
    /// Open GPIO `number` under the standard sysfs root.
    pub fn open(number: u32) -> Result<Self, SysfsError> {
        Self::open_at(Path::new(SYSFS_GPIO_ROOT), number)
    }

    /// Open GPIO `number` under `root` (tests point this at a temp dir).
    pub fn open_at(root: &Path, number: u32) -> Result<Self, SysfsError> {
        let pin_dir = root.join(format!("gpio{number}"));
        if !pin_dir.exists() {
            fs::write(root.join("export"), number.to_string()).map_err(SysfsError)?;
        }
        fs::write(pin_dir.join("direction"), "out").map_err(SysfsError)?;
        info!("GPIO{number} exported as output");
        Ok(Self {
            value_path: pin_dir.join("value"),
        })
    }

    fn write(&mut self, high: bool) -> Result<(), SysfsError> {
        fs::write(&self.value_path, if high { "1" } else { "0" }).map_err(SysfsError)
    }
}

impl ErrorType for SysfsPin {
    type Error = SysfsError;
}

impl OutputPin for SysfsPin {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.write(false)
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.write(true)
    }
}
