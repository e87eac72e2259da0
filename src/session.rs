//! Session manager: connection lifecycle and command handling
//!
//! The manager is the only task that creates or destroys transports. It
//! cycles through
//!
//! ```text
//! Idle -> Connecting -> Connected -> Draining -> Idle -> ...
//! ```
//!
//! forever, waiting a fixed backoff between attempts. While connected it reads
//! command lines with a bounded wait per iteration, so a transport invalidated
//! by the sampling loop is noticed within one receive window even when the
//! peer is silent.

use futures::StreamExt;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::sync::watch;
use tokio_util::codec::FramedRead;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::codec::CommandCodec;
use crate::state::SessionState;
use crate::stats::LinkStats;
use crate::transport::{BoxedReader, Connector, Transport};
use crate::{LinkConfig, LinkError};

/// Phase of the session state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionPhase {
    /// Waiting out the backoff before the next attempt
    Idle,
    /// Opening a new transport
    Connecting,
    /// Transport installed, receiving commands
    Connected,
    /// Tearing the transport down
    Draining,
}

impl fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionPhase::Idle => "idle",
            SessionPhase::Connecting => "connecting",
            SessionPhase::Connected => "connected",
            SessionPhase::Draining => "draining",
        };
        f.write_str(name)
    }
}

/// Why a connected session ended
#[derive(Debug)]
enum SessionEnd {
    PeerClosed,
    ReadFailed(LinkError),
    ReplyFailed(LinkError),
    Invalidated,
    Cancelled,
}

/// Owns the transport lifecycle for one peer
pub struct SessionManager<C: Connector> {
    connector: C,
    state: SessionState,
    stats: Arc<LinkStats>,
    phase: watch::Sender<SessionPhase>,
    cancel: CancellationToken,
    backoff: Duration,
    receive_timeout: Duration,
    shutdown_timeout: Duration,
    max_line_len: usize,
}

impl<C: Connector> SessionManager<C> {
    pub fn new(
        connector: C,
        state: SessionState,
        config: &LinkConfig,
        stats: Arc<LinkStats>,
        cancel: CancellationToken,
    ) -> Self {
        let (phase, _) = watch::channel(SessionPhase::Idle);
        Self {
            connector,
            state,
            stats,
            phase,
            cancel,
            backoff: config.reconnect_backoff(),
            receive_timeout: config.receive_timeout(),
            shutdown_timeout: config.send_timeout(),
            max_line_len: config.max_line_len,
        }
    }

    /// Receiver for phase changes; subscribe before calling [`run`](Self::run)
    pub fn phases(&self) -> watch::Receiver<SessionPhase> {
        self.phase.subscribe()
    }

    fn enter(&self, phase: SessionPhase) {
        let previous = self.phase.send_replace(phase);
        if previous != phase {
            debug!(from = %previous, to = %phase, "Session phase changed");
        }
    }

    /// Run until cancelled
    pub async fn run(self) {
        info!(peer = %self.connector.peer(), "Session manager started");

        while !self.cancel.is_cancelled() {
            self.enter(SessionPhase::Connecting);
            info!(peer = %self.connector.peer(), "Connecting");

            let connected = tokio::select! {
                _ = self.cancel.cancelled() => break,
                result = self.connector.connect() => result,
            };

            match connected {
                Ok(transport) => {
                    if let SessionEnd::Cancelled = self.serve(transport).await {
                        break;
                    }
                    warn!(retry_in = ?self.backoff, "Disconnected, reconnecting after backoff");
                }
                Err(e) => {
                    let failures = self.stats.record_connect_failure();
                    warn!(
                        peer = %self.connector.peer(),
                        error = %e,
                        failures,
                        retry_in = ?self.backoff,
                        "Connect failed, retrying"
                    );
                }
            }

            self.enter(SessionPhase::Idle);
            tokio::select! {
                _ = self.cancel.cancelled() => break,
                _ = tokio::time::sleep(self.backoff) => {}
            }
        }

        self.state.clear_transport();
        self.enter(SessionPhase::Idle);
        info!("Session manager stopped");
    }

    async fn serve(&self, transport: Transport) -> SessionEnd {
        let Transport { reader, writer } = transport;
        let generation = self.state.set_transport(writer);
        let connects = self.stats.record_connect();
        self.enter(SessionPhase::Connected);

        if self.state.is_sending() {
            info!(peer = %self.connector.peer(), generation, connects, "Connected, streaming active");
        } else {
            info!(peer = %self.connector.peer(), generation, connects, "Connected, waiting for START");
        }

        let end = self.receive_loop(reader, generation).await;

        self.enter(SessionPhase::Draining);
        match &end {
            SessionEnd::PeerClosed => warn!(generation, "Peer closed the connection"),
            SessionEnd::ReadFailed(e) => warn!(generation, error = %e, "Receive failed"),
            SessionEnd::ReplyFailed(e) => warn!(generation, error = %e, "Reply send failed"),
            SessionEnd::Invalidated => warn!(generation, "Transport invalidated by a failed send"),
            SessionEnd::Cancelled => info!(generation, "Session cancelled"),
        }
        self.drain().await;
        end
    }

    async fn receive_loop(&self, reader: BoxedReader, generation: u64) -> SessionEnd {
        let mut lines = FramedRead::new(reader, CommandCodec::new(self.max_line_len));

        loop {
            if !self.state.holds(generation) {
                return SessionEnd::Invalidated;
            }

            let received = tokio::select! {
                _ = self.cancel.cancelled() => return SessionEnd::Cancelled,
                received = tokio::time::timeout(self.receive_timeout, lines.next()) => received,
            };

            let command = match received {
                Err(_) => {
                    trace!(generation, "No data within receive window");
                    continue;
                }
                Ok(None) => return SessionEnd::PeerClosed,
                Ok(Some(Err(e))) => return SessionEnd::ReadFailed(e),
                Ok(Some(Ok(command))) => command,
            };

            self.stats.record_command();
            debug!(?command, "Command received");

            let mut reply = None;
            let sent = self
                .state
                .send_with(|| {
                    let r = command.apply(&self.state);
                    reply = Some(r);
                    r.to_line().into_bytes()
                })
                .await;

            match sent {
                Ok(()) => trace!(?reply, "Reply sent"),
                Err(e) => return SessionEnd::ReplyFailed(e),
            }
        }
    }

    /// Clear the transport from the shared state and close it
    async fn drain(&self) {
        let Some(writer) = self.state.clear_transport() else {
            return;
        };
        let mut writer = writer.lock().await;
        match tokio::time::timeout(self.shutdown_timeout, writer.shutdown()).await {
            Ok(Ok(())) => debug!("Transport closed"),
            Ok(Err(e)) => debug!(error = %e, "Transport shutdown failed"),
            Err(_) => debug!("Transport shutdown timed out"),
        }
    }
}
