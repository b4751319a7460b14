//! Adapters: concrete implementations of the hexagonal port traits.
//!
//! | Adapter       | Implements          | Connects to                     |
//! |---------------|---------------------|---------------------------------|
//! | `hardware`    | TemperatureSensor   | simulated room / DS18B20        |
//! |               | RelayActuator       | simulated relay / sysfs GPIO    |
//! | `log_sink`    | TransitionRecorder  | `log` output                    |
//! | `audit_file`  | TransitionRecorder  | rotating JSON-lines file        |
//! | `history`     | TransitionRecorder  | in-memory ring                  |
//! | `store`       | StoragePort         | memory map / directory of files |
//! | `time`        | ClockPort           | system clock / manual clock     |

pub mod audit_file;
pub mod hardware;
pub mod history;
pub mod log_sink;
pub mod store;
pub mod time;
