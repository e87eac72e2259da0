//! Streaming link between an IMU and a remote data collector.
//!
//! `sensorlink` keeps a TCP connection to a collector alive, answers its line
//! commands and, once told to `START`, streams accelerometer and gyroscope
//! samples as one JSON object per line.
//!
//! # Features
//!
//! - **Line protocol**: `SRATE <hz>`, `START`, `STOP` and `PING`, one reply per command
//! - **Self-healing**: the link reconnects after any failure and comes back paused
//! - **Pluggable sensors**: anything implementing [`SensorProvider`]
//! - **Pluggable transports**: anything implementing [`Connector`]
//!
//! # Architecture
//!
//! Two tasks share one [`SessionState`]:
//!
//! - the [`SessionManager`] opens transports, reads commands and tears
//!   transports down
//! - the [`Sampler`] reads the sensor and sends records while streaming is on
//!
//! A failed sample send only marks the transport invalid; the session manager
//! notices within one receive window and reconnects.
//!
//! ## Example
//!
//! ```rust,no_run
//! use sensorlink::{LinkConfig, SensorLink, SyntheticSensor};
//!
//! #[tokio::main]
//! async fn main() -> sensorlink::Result<()> {
//!     let config = LinkConfig::for_peer("192.168.1.100:5000");
//!     let link = SensorLink::spawn_tcp(&config, SyntheticSensor::default())?;
//!
//!     link.wait_for_phase(sensorlink::SessionPhase::Connected).await?;
//!     tokio::time::sleep(std::time::Duration::from_secs(60)).await;
//!     println!("{:?}", link.stats());
//!     link.shutdown().await;
//!     Ok(())
//! }
//! ```

pub mod codec;
pub mod command;
mod config;
pub mod driver;
mod error;
pub mod provider;
pub mod providers;
pub mod sampler;
pub mod session;
pub mod state;
pub mod stats;
#[cfg(test)]
mod test_utils;
pub mod transport;
pub mod types;

pub use codec::CommandCodec;
pub use command::{Command, Reply, interpret};
pub use config::LinkConfig;
pub use driver::{Driver, LinkHandle};
pub use error::*;
pub use provider::SensorProvider;
pub use providers::{RegisterBus, RegisterSensor, SyntheticSensor};
pub use sampler::Sampler;
pub use session::{SessionManager, SessionPhase};
pub use state::{SessionState, StateSnapshot};
pub use stats::{LinkStats, StatsSnapshot};
pub use transport::{Connector, TcpConnector, Transport};
pub use types::*;

use std::path::Path;

/// Entry point for spawning a link
///
/// # Examples
///
/// ## TCP collector
/// ```rust,no_run
/// use sensorlink::{LinkConfig, SensorLink, SyntheticSensor};
///
/// #[tokio::main]
/// async fn main() -> sensorlink::Result<()> {
///     let link = SensorLink::spawn_tcp(&LinkConfig::default(), SyntheticSensor::default())?;
///     link.wait_for_phase(sensorlink::SessionPhase::Connected).await?;
///     Ok(())
/// }
/// ```
///
/// ## From a configuration file
/// ```rust,no_run
/// use sensorlink::{SensorLink, SyntheticSensor};
///
/// #[tokio::main]
/// async fn main() -> sensorlink::Result<()> {
///     let link = SensorLink::spawn_from_file("link.yaml", SyntheticSensor::default())?;
///     link.shutdown().await;
///     Ok(())
/// }
/// ```
pub struct SensorLink;

impl SensorLink {
    /// Stream from `sensor` to the TCP peer named in `config`
    pub fn spawn_tcp<S: SensorProvider>(config: &LinkConfig, sensor: S) -> Result<LinkHandle> {
        Driver::spawn(TcpConnector::from_config(config), sensor, config)
    }

    /// Load a YAML configuration and stream over TCP
    pub fn spawn_from_file<P, S>(path: P, sensor: S) -> Result<LinkHandle>
    where
        P: AsRef<Path>,
        S: SensorProvider,
    {
        let config = LinkConfig::from_file(path)?;
        Self::spawn_tcp(&config, sensor)
    }

    /// Stream from `sensor` over a custom transport
    pub fn spawn<C, S>(connector: C, sensor: S, config: &LinkConfig) -> Result<LinkHandle>
    where
        C: Connector,
        S: SensorProvider,
    {
        Driver::spawn(connector, sensor, config)
    }
}
