//! Synthetic provider for bench setups without hardware

use tracing::trace;

use crate::Result;
use crate::provider::SensorProvider;
use crate::types::{RawAxes, SampleRate};

/// Raw counts for 1 g at the ±8 g range.
const ONE_G: f64 = 4096.0;

/// Raw counts for 1 rad/s at the ±2000 °/s range.
const ONE_RAD_S: f64 = 32768.0 / 34.90659;

/// Deterministic sensor: gravity on z plus a slow wobble on x and a yaw rate
///
/// Every reading advances an internal phase by one sample period at the last
/// applied rate, so the waveform has the same shape at every rate.
#[derive(Debug, Clone)]
pub struct SyntheticSensor {
    /// Seconds of simulated time
    t: f64,
    dt: f64,
    frequency_hz: f64,
}

impl SyntheticSensor {
    /// Wobble at `frequency_hz`
    pub fn new(frequency_hz: f64) -> Self {
        Self { t: 0.0, dt: 1.0 / 400.0, frequency_hz }
    }

    fn next_axes(&mut self) -> RawAxes {
        let phase = std::f64::consts::TAU * self.frequency_hz * self.t;
        self.t += self.dt;

        let to_raw = |v: f64| v.round().clamp(f64::from(i16::MIN), f64::from(i16::MAX)) as i16;
        RawAxes {
            acc: [to_raw(0.1 * ONE_G * phase.sin()), 0, to_raw(ONE_G)],
            gyr: [0, 0, to_raw(0.5 * ONE_RAD_S * phase.cos())],
        }
    }
}

impl Default for SyntheticSensor {
    fn default() -> Self {
        Self::new(1.0)
    }
}

#[async_trait::async_trait]
impl SensorProvider for SyntheticSensor {
    async fn read_raw(&mut self) -> Result<RawAxes> {
        let axes = self.next_axes();
        trace!(t = self.t, ?axes, "Synthetic reading");
        Ok(axes)
    }

    async fn apply_rate(&mut self, rate: SampleRate) -> Result<()> {
        self.dt = 1.0 / f64::from(rate.hz());
        Ok(())
    }

    fn name(&self) -> &str {
        "synthetic"
    }
}
