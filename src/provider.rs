//! Provider trait for sensor sources

use crate::Result;
use crate::types::{RawAxes, SampleRate};

/// Trait for sensor data sources
///
/// The sampling loop owns its provider and calls it only while streaming is
/// active. A read should have bounded latency; a failed read skips one cycle
/// and never affects the connection.
#[async_trait::async_trait]
pub trait SensorProvider: Send + 'static {
    /// Read one accelerometer + gyroscope burst
    async fn read_raw(&mut self) -> Result<RawAxes>;

    /// Called before the first read and whenever the peer selects a new rate
    ///
    /// Providers backed by hardware reprogram the output data rate here.
    async fn apply_rate(&mut self, _rate: SampleRate) -> Result<()> {
        Ok(())
    }

    /// Short name for logs
    fn name(&self) -> &str {
        "sensor"
    }
}
