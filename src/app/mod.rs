//! Application layer.
//!
//! The control core talks to the outside world only through the **port
//! traits** in [`ports`]. [`events`] holds what it emits, and [`service`]
//! wires adapters to the core and runs the periodic workers.

pub mod events;
pub mod ports;
pub mod service;
