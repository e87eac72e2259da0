//! Sensor provider implementations
//!
//! - [`RegisterSensor`] reads a register-mapped IMU over any [`RegisterBus`]
//! - [`SyntheticSensor`] produces a deterministic waveform without hardware

pub mod register;
pub mod synthetic;

pub use register::{RegisterBus, RegisterSensor};
pub use synthetic::SyntheticSensor;
