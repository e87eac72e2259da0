//! Register-mapped IMU provider
//!
//! Reads the accelerometer and gyroscope data registers of a BMI2xx-style IMU
//! through an abstract register bus. Bus bring-up (I²C/SPI pins, clocking,
//! chip init) belongs to the [`RegisterBus`] implementation.

use tracing::{debug, info};

use crate::provider::SensorProvider;
use crate::types::{RAW_SAMPLE_LEN, RawAxes, SampleRate};
use crate::{LinkError, Result};

/// First data register: ACC_X_LSB, followed by ACC_Y/Z and GYR_X/Y/Z.
pub const DATA_REGISTER: u8 = 0x0C;

/// Accelerometer configuration register (ODR in the low nibble).
pub const ACC_CONF_REGISTER: u8 = 0x40;

/// Gyroscope configuration register (ODR in the low nibble).
pub const GYR_CONF_REGISTER: u8 = 0x42;

/// ACC_CONF upper bits: performance filter, normal averaging.
const ACC_CONF_BASE: u8 = 0xA0;

/// GYR_CONF upper bits: performance filter and noise mode, normal bandwidth.
const GYR_CONF_BASE: u8 = 0xE0;

/// Register-level access to the sensor
#[async_trait::async_trait]
pub trait RegisterBus: Send + 'static {
    /// Burst-read `buf.len()` bytes starting at `register`
    async fn read(&mut self, register: u8, buf: &mut [u8]) -> Result<()>;

    /// Write `data` starting at `register`
    async fn write(&mut self, register: u8, data: &[u8]) -> Result<()>;
}

/// Output data rate code shared by the accelerometer and gyroscope
pub fn odr_code(rate: SampleRate) -> Option<u8> {
    match rate.hz() {
        25 => Some(0x06),
        50 => Some(0x07),
        100 => Some(0x08),
        200 => Some(0x09),
        400 => Some(0x0A),
        800 => Some(0x0B),
        1600 => Some(0x0C),
        3200 => Some(0x0D),
        _ => None,
    }
}

/// Sensor provider reading the IMU data registers over a [`RegisterBus`]
pub struct RegisterSensor<B: RegisterBus> {
    bus: B,
    configured: Option<SampleRate>,
}

impl<B: RegisterBus> RegisterSensor<B> {
    pub fn new(bus: B) -> Self {
        Self { bus, configured: None }
    }

    /// Rate last written to the configuration registers
    pub fn configured_rate(&self) -> Option<SampleRate> {
        self.configured
    }

    pub fn into_inner(self) -> B {
        self.bus
    }
}

#[async_trait::async_trait]
impl<B: RegisterBus> SensorProvider for RegisterSensor<B> {
    async fn read_raw(&mut self) -> Result<RawAxes> {
        let mut data = [0u8; RAW_SAMPLE_LEN];
        self.bus.read(DATA_REGISTER, &mut data).await?;
        RawAxes::from_le_bytes(&data)
    }

    async fn apply_rate(&mut self, rate: SampleRate) -> Result<()> {
        if self.configured == Some(rate) {
            return Ok(());
        }
        let odr = odr_code(rate)
            .ok_or_else(|| LinkError::sensor(format!("no output data rate code for {rate}")))?;

        debug!(%rate, odr, "Programming output data rate");
        self.bus.write(ACC_CONF_REGISTER, &[ACC_CONF_BASE | odr]).await?;
        self.bus.write(GYR_CONF_REGISTER, &[GYR_CONF_BASE | odr]).await?;
        self.configured = Some(rate);

        info!(%rate, "Sensor output data rate configured");
        Ok(())
    }

    fn name(&self) -> &str {
        "register-imu"
    }
}
