//! Thermogate library.
//!
//! A thermostat that drives a heating relay through a safety gatekeeper
//! enforcing minimum on-time, cool-down and maximum on-time. The control
//! core (`state`, `sensors`, `safety`, `control`) only sees the port traits
//! in [`app::ports`]; simulated and Linux hardware live in `adapters` and
//! `drivers`.

#![deny(unused_must_use)]

pub mod adapters;
pub mod app;
pub mod config;
pub mod control;
pub mod drivers;
pub mod error;
pub mod safety;
pub mod sensors;
pub mod state;

pub use error::{Error, Result};
