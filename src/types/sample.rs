//! Sample types for the streaming pipeline

use serde::Serialize;

use super::SampleRate;
use crate::{LinkError, Result};

/// Size of one accelerometer + gyroscope burst read.
pub const RAW_SAMPLE_LEN: usize = 12;

/// m/s² per LSB at the ±8 g range.
pub const ACC_SCALE_M_S2: f64 = 78.4532 / 32768.0;

/// g per LSB at the ±8 g range.
pub const ACC_SCALE_G: f64 = 8.0 / 32768.0;

/// rad/s per LSB at the ±2000 °/s range.
pub const GYR_SCALE_RAD_S: f64 = 34.90659 / 32768.0;

/// Raw sensor axes as signed 16-bit counts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RawAxes {
    pub acc: [i16; 3],
    pub gyr: [i16; 3],
}

impl RawAxes {
    /// Decode a burst read of little-endian pairs: acc x, y, z then gyr x, y, z.
    pub fn from_le_bytes(data: &[u8]) -> Result<Self> {
        let bytes: &[u8; RAW_SAMPLE_LEN] = data.try_into().map_err(|_| {
            LinkError::sensor(format!(
                "expected {RAW_SAMPLE_LEN} bytes of axis data, got {}",
                data.len()
            ))
        })?;

        let axis = |i: usize| i16::from_le_bytes([bytes[2 * i], bytes[2 * i + 1]]);

        Ok(Self { acc: [axis(0), axis(1), axis(2)], gyr: [axis(3), axis(4), axis(5)] })
    }

    /// Encode back into the burst layout read from the sensor
    pub fn to_le_bytes(self) -> [u8; RAW_SAMPLE_LEN] {
        let mut out = [0u8; RAW_SAMPLE_LEN];
        for (i, value) in self.acc.iter().chain(self.gyr.iter()).enumerate() {
            out[2 * i..2 * i + 2].copy_from_slice(&value.to_le_bytes());
        }
        out
    }
}

/// One timestamped reading
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    pub raw: RawAxes,

    /// Monotonic capture time in microseconds
    pub timestamp_us: u64,
}

impl Sample {
    pub fn new(raw: RawAxes, timestamp_us: u64) -> Self {
        Self { raw, timestamp_us }
    }

    /// Convert to physical units for transmission at `rate`
    pub fn to_record(&self, rate: SampleRate) -> SampleRecord {
        let scale = |axes: [i16; 3], factor: f64| axes.map(|v| round5(f64::from(v) * factor));

        SampleRecord {
            ts_ms: self.timestamp_us / 1000,
            acc_m_s2: scale(self.raw.acc, ACC_SCALE_M_S2),
            acc_g: scale(self.raw.acc, ACC_SCALE_G),
            gyr_rad_s: scale(self.raw.gyr, GYR_SCALE_RAD_S),
            fs_hz: rate.hz(),
        }
    }
}

/// Outbound record, serialized as one JSON object per line
///
/// Field order is part of the wire format.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SampleRecord {
    pub ts_ms: u64,
    pub acc_m_s2: [f64; 3],
    pub acc_g: [f64; 3],
    pub gyr_rad_s: [f64; 3],
    pub fs_hz: u32,
}

impl SampleRecord {
    /// Encode as a newline-terminated JSON line
    pub fn to_line(&self) -> Result<String> {
        let mut line = serde_json::to_string(self)?;
        line.push('\n');
        Ok(line)
    }
}

fn round5(value: f64) -> f64 {
    (value * 1e5).round() / 1e5
}
