//! Error types for the streaming session.
//!
//! Every failure in this crate is local and recoverable from the point of view
//! of the process: transport errors send the session back to connecting,
//! sensor errors skip a sampling cycle and protocol errors only ever surface
//! as a reply line. [`LinkError`] still carries enough structure to log the
//! failure meaningfully and to decide whether retrying makes sense.
//!
//! ## Error Categories
//!
//! - **Connection Errors**: connect refused, connect timeout
//! - **I/O Errors**: read or write failures on an established transport
//! - **Not Connected**: a send was attempted while no transport is installed
//! - **Sensor Errors**: the sensor provider failed to deliver a reading
//! - **Configuration Errors**: invalid or unreadable configuration
//!
//! ```rust
//! use sensorlink::LinkError;
//!
//! let error = LinkError::connection_failed("connection refused");
//! assert!(error.is_retryable());
//! ```

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Result type alias for link operations.
pub type Result<T, E = LinkError> = std::result::Result<T, E>;

/// Main error type for link operations.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum LinkError {
    #[error("Failed to connect to {peer}: {reason}")]
    Connection {
        peer: String,
        reason: String,
        #[source]
        source: Option<std::io::Error>,
    },

    #[error("Transport {operation} failed")]
    Io {
        operation: &'static str,
        #[source]
        source: std::io::Error,
    },

    #[error("No transport is connected")]
    NotConnected,

    #[error("Operation timed out after {duration:?}")]
    Timeout { duration: Duration },

    #[error("Sample rate {hz} Hz is not in the allowed set")]
    InvalidRate { hz: u32 },

    #[error("Sensor read failed: {reason}")]
    Sensor { reason: String },

    #[error("Configuration error: {details}")]
    Config { details: String },

    #[error("Configuration file error: {path}")]
    ConfigFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to encode sample record")]
    Encode {
        #[source]
        source: serde_json::Error,
    },
}

impl LinkError {
    /// Returns whether this error is potentially recoverable through retry.
    pub fn is_retryable(&self) -> bool {
        match self {
            LinkError::Connection { .. } => true,
            LinkError::Io { .. } => true,
            LinkError::NotConnected => true,
            LinkError::Timeout { .. } => true,
            LinkError::Sensor { .. } => true,
            LinkError::InvalidRate { .. } => false,
            LinkError::Config { .. } => false,
            LinkError::ConfigFile { .. } => false,
            LinkError::Encode { .. } => false,
        }
    }

    /// Whether this error means the transport it happened on is no longer usable.
    pub fn is_transport_failure(&self) -> bool {
        matches!(
            self,
            LinkError::Io { .. } | LinkError::NotConnected | LinkError::Timeout { .. }
        )
    }

    /// Helper constructor for connection errors.
    pub fn connection_failed(reason: impl Into<String>) -> Self {
        LinkError::Connection { peer: "<unknown>".to_string(), reason: reason.into(), source: None }
    }

    /// Helper constructor for connection errors with the peer and io source.
    pub fn connect_error(peer: impl Into<String>, source: std::io::Error) -> Self {
        LinkError::Connection { peer: peer.into(), reason: source.to_string(), source: Some(source) }
    }

    /// Helper constructor for transport I/O errors.
    pub fn io(operation: &'static str, source: std::io::Error) -> Self {
        LinkError::Io { operation, source }
    }

    /// Helper constructor for sensor errors.
    pub fn sensor(reason: impl Into<String>) -> Self {
        LinkError::Sensor { reason: reason.into() }
    }

    /// Helper constructor for configuration errors.
    pub fn config(details: impl Into<String>) -> Self {
        LinkError::Config { details: details.into() }
    }
}

impl From<std::io::Error> for LinkError {
    fn from(err: std::io::Error) -> Self {
        LinkError::Io { operation: "read", source: err }
    }
}

impl From<serde_json::Error> for LinkError {
    fn from(err: serde_json::Error) -> Self {
        LinkError::Encode { source: err }
    }
}
