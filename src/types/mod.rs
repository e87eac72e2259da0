//! Core types for sampled sensor data.
//!
//! This module provides the data that flows from the sensor to the wire:
//! - [`RawAxes`] holds the six signed 16-bit axis counts of one burst read
//! - [`Sample`] pairs raw axes with a monotonic capture timestamp
//! - [`SampleRecord`] is the physical-unit form serialized as one JSON line
//! - [`SampleRate`] and [`RateSet`] model the selectable sampling frequencies
//!
//! ## Usage Example
//!
//! ```rust
//! use sensorlink::types::{RateSet, RawAxes, Sample};
//!
//! let raw = RawAxes::from_le_bytes(&[0x00, 0x10, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0]).unwrap();
//! assert_eq!(raw.acc[0], 0x1000);
//!
//! let rate = RateSet::default().require(400).unwrap();
//! let line = Sample::new(raw, 2_000).to_record(rate).to_line().unwrap();
//! assert!(line.starts_with("{\"ts_ms\":2,"));
//! ```

mod sample;
mod sample_rate;

pub use sample::{
    ACC_SCALE_G, ACC_SCALE_M_S2, GYR_SCALE_RAD_S, RAW_SAMPLE_LEN, RawAxes, Sample, SampleRecord,
};
pub use sample_rate::{MIN_SAMPLE_PERIOD, RateSet, SampleRate};
