//! Connectivity provider for the session manager
//!
//! The session manager never opens sockets itself. It asks a [`Connector`]
//! for a fresh [`Transport`] every time it enters the connecting phase, which
//! keeps the reconnect loop independent of TCP and lets tests hand in
//! in-memory pipes.

use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tracing::{debug, warn};

use crate::{LinkConfig, LinkError, Result};

/// Read side of an established transport
pub type BoxedReader = Box<dyn AsyncRead + Send + Unpin>;

/// Write side of an established transport
pub type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// An established bidirectional byte stream, split into halves
///
/// The session manager keeps the reader; the writer is installed into the
/// shared session state so replies and samples go through one handle.
pub struct Transport {
    pub reader: BoxedReader,
    pub writer: BoxedWriter,
}

impl Transport {
    pub fn new<R, W>(reader: R, writer: W) -> Self
    where
        R: AsyncRead + Send + Unpin + 'static,
        W: AsyncWrite + Send + Unpin + 'static,
    {
        Self { reader: Box::new(reader), writer: Box::new(writer) }
    }

    /// Split any duplex stream into a transport
    pub fn from_stream<S>(stream: S) -> Self
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        let (reader, writer) = tokio::io::split(stream);
        Self::new(reader, writer)
    }
}

impl std::fmt::Debug for Transport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transport").finish_non_exhaustive()
    }
}

/// Trait for connectivity providers
///
/// `connect` is called once per connecting phase and may fail any number of
/// times; the session manager retries forever with a fixed backoff.
#[async_trait::async_trait]
pub trait Connector: Send + Sync + 'static {
    /// Open a new transport to the peer
    async fn connect(&self) -> Result<Transport>;

    /// Human-readable peer description for logs
    fn peer(&self) -> &str;
}

/// TCP connectivity provider
#[derive(Debug, Clone)]
pub struct TcpConnector {
    peer: String,
    connect_timeout: Duration,
    nodelay: bool,
}

impl TcpConnector {
    pub fn new(peer: impl Into<String>) -> Self {
        let defaults = LinkConfig::default();
        Self { peer: peer.into(), connect_timeout: defaults.connect_timeout(), nodelay: defaults.tcp_nodelay }
    }

    pub fn from_config(config: &LinkConfig) -> Self {
        Self {
            peer: config.peer.clone(),
            connect_timeout: config.connect_timeout(),
            nodelay: config.tcp_nodelay,
        }
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }
}

#[async_trait::async_trait]
impl Connector for TcpConnector {
    async fn connect(&self) -> Result<Transport> {
        debug!(peer = %self.peer, "Opening TCP connection");

        let stream = tokio::time::timeout(self.connect_timeout, TcpStream::connect(self.peer.as_str()))
            .await
            .map_err(|_| LinkError::Connection {
                peer: self.peer.clone(),
                reason: format!("timed out after {:?}", self.connect_timeout),
                source: None,
            })?
            .map_err(|e| LinkError::connect_error(self.peer.clone(), e))?;

        if let Err(e) = stream.set_nodelay(self.nodelay) {
            warn!(error = %e, nodelay = self.nodelay, "Setting TCP_NODELAY failed");
        }

        let (reader, writer) = stream.into_split();
        Ok(Transport::new(reader, writer))
    }

    fn peer(&self) -> &str {
        &self.peer
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn tcp_connector_reaches_listener() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let connector = TcpConnector::new(addr.to_string());
        assert_eq!(connector.peer(), addr.to_string());

        let (transport, accepted) = tokio::join!(connector.connect(), listener.accept());
        let mut transport = transport.expect("connect should succeed");
        let (mut peer, _) = accepted.unwrap();

        transport.writer.write_all(b"PONG\n").await.unwrap();
        let mut buf = [0u8; 5];
        peer.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"PONG\n");
    }

    #[tokio::test]
    async fn tcp_connector_reports_refused_peer() {
        // Bind then drop to get a port with nothing listening.
        let addr = {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            listener.local_addr().unwrap()
        };

        let err = TcpConnector::new(addr.to_string()).connect().await.unwrap_err();
        assert!(matches!(err, LinkError::Connection { .. }));
        assert!(err.is_retryable());
        assert!(err.to_string().contains(&addr.to_string()));
    }

    #[tokio::test]
    async fn from_stream_splits_duplex() {
        let (near, mut far) = tokio::io::duplex(64);
        let mut transport = Transport::from_stream(near);

        far.write_all(b"PING\n").await.unwrap();
        let mut buf = [0u8; 5];
        transport.reader.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"PING\n");
    }
}
