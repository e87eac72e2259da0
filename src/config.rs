//! Link configuration
//!
//! All timing used by the session manager and the sampling loop lives here so
//! it can be shortened in tests or tuned per deployment. Configuration is
//! plain YAML; every field is optional and falls back to the device defaults.
//!
//! ```yaml
//! peer: "192.168.1.100:5000"
//! reconnect_backoff_ms: 2000
//! allowed_rates: [100, 400, 1600]
//! default_rate: 400
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::types::{RateSet, SampleRate};
use crate::{LinkError, Result};

/// Configuration for one streaming link
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LinkConfig {
    /// Collector address as `host:port`
    pub peer: String,

    /// Upper bound for a single connect attempt
    pub connect_timeout_ms: u64,

    /// Fixed wait between a failed or closed connection and the next attempt
    pub reconnect_backoff_ms: u64,

    /// Bounded wait of one receive iteration
    pub receive_timeout_ms: u64,

    /// Upper bound for writing one line to the transport
    pub send_timeout_ms: u64,

    /// Sampler wait while no transport is connected
    pub disconnected_idle_ms: u64,

    /// Sampler wait while connected but streaming is stopped
    pub paused_idle_ms: u64,

    /// Sampler wait after a failed sensor read
    pub sensor_retry_ms: u64,

    /// Rates a peer may select with `SRATE`
    pub allowed_rates: Vec<u32>,

    /// Rate in effect until the first successful `SRATE`
    pub default_rate: u32,

    /// Longest accepted command line in bytes, terminator excluded
    pub max_line_len: usize,

    /// Disable Nagle's algorithm on the TCP transport
    pub tcp_nodelay: bool,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            peer: "192.168.1.100:5000".to_string(),
            connect_timeout_ms: 5000,
            reconnect_backoff_ms: 2000,
            receive_timeout_ms: 1000,
            send_timeout_ms: 1000,
            disconnected_idle_ms: 500,
            paused_idle_ms: 200,
            sensor_retry_ms: 10,
            allowed_rates: RateSet::DEFAULT_RATES.to_vec(),
            default_rate: 400,
            max_line_len: 256,
            tcp_nodelay: true,
        }
    }
}

impl LinkConfig {
    /// Default configuration pointed at `peer`
    pub fn for_peer(peer: impl Into<String>) -> Self {
        Self { peer: peer.into(), ..Self::default() }
    }

    /// Parse and validate a YAML document
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let config: Self = serde_yaml_ng::from_str(yaml)
            .map_err(|e| LinkError::config(format!("invalid YAML: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let yaml = std::fs::read_to_string(path)
            .map_err(|source| LinkError::ConfigFile { path: path.to_path_buf(), source })?;
        Self::from_yaml_str(&yaml)
    }

    /// Serialize back to YAML
    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml_ng::to_string(self).map_err(|e| LinkError::config(e.to_string()))
    }

    /// Check cross-field constraints
    pub fn validate(&self) -> Result<()> {
        if self.peer.trim().is_empty() {
            return Err(LinkError::config("peer address is empty"));
        }
        let rates = self.rate_set()?;
        if !rates.contains(self.default_rate) {
            return Err(LinkError::config(format!(
                "default rate {} Hz is not one of {:?}",
                self.default_rate,
                rates.rates()
            )));
        }
        if self.connect_timeout_ms == 0 {
            return Err(LinkError::config("connect_timeout_ms must be positive"));
        }
        if self.receive_timeout_ms == 0 {
            return Err(LinkError::config("receive_timeout_ms must be positive"));
        }
        if self.send_timeout_ms == 0 {
            return Err(LinkError::config("send_timeout_ms must be positive"));
        }
        if self.max_line_len == 0 {
            return Err(LinkError::config("max_line_len must be positive"));
        }
        Ok(())
    }

    pub fn rate_set(&self) -> Result<RateSet> {
        RateSet::new(self.allowed_rates.iter().copied())
    }

    pub fn initial_rate(&self) -> Result<SampleRate> {
        self.rate_set()?.require(self.default_rate)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn reconnect_backoff(&self) -> Duration {
        Duration::from_millis(self.reconnect_backoff_ms)
    }

    pub fn receive_timeout(&self) -> Duration {
        Duration::from_millis(self.receive_timeout_ms)
    }

    pub fn send_timeout(&self) -> Duration {
        Duration::from_millis(self.send_timeout_ms)
    }

    pub fn disconnected_idle(&self) -> Duration {
        Duration::from_millis(self.disconnected_idle_ms)
    }

    pub fn paused_idle(&self) -> Duration {
        Duration::from_millis(self.paused_idle_ms)
    }

    pub fn sensor_retry(&self) -> Duration {
        Duration::from_millis(self.sensor_retry_ms)
    }
}
