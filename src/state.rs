//! Shared session state
//!
//! One [`SessionState`] is shared by the session manager and the sampling
//! loop. It is the only place that knows whether a transport is installed,
//! whether samples should be streamed and at which rate.
//!
//! The state lock is a plain [`std::sync::Mutex`] held only while fields are
//! read or written. Network writes happen outside it: the writer handle is
//! cloned out of the lock, written through its own async mutex (which keeps
//! lines from different tasks from interleaving), and the state lock is taken
//! again only to invalidate the transport if the write failed.
//!
//! Every installed transport gets a new generation number. Invalidation names
//! the generation that failed, so a late failure on an old transport can never
//! tear down the one that replaced it.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use crate::transport::BoxedWriter;
use crate::types::{RateSet, SampleRate};
use crate::{LinkConfig, LinkError, Result};

/// Writer handle shared between the state and in-flight sends
pub type SharedWriter = Arc<tokio::sync::Mutex<BoxedWriter>>;

struct InstalledTransport {
    generation: u64,
    writer: SharedWriter,
}

struct Inner {
    transport: Option<InstalledTransport>,
    sending: bool,
    rate: SampleRate,
    generations: u64,
}

/// Consistent copy of the state, taken in one critical section
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateSnapshot {
    pub connected: bool,
    pub sending: bool,
    pub rate: SampleRate,
    /// Generation of the installed transport, if any
    pub generation: Option<u64>,
}

/// Mutex-guarded session state shared between tasks
///
/// Cloning is cheap and every clone observes the same state.
#[derive(Clone)]
pub struct SessionState {
    inner: Arc<Mutex<Inner>>,
    rates: Arc<RateSet>,
    send_timeout: Duration,
}

impl SessionState {
    pub fn new(rates: RateSet, initial_rate: SampleRate) -> Self {
        let inner = Inner { transport: None, sending: false, rate: initial_rate, generations: 0 };
        Self {
            inner: Arc::new(Mutex::new(inner)),
            rates: Arc::new(rates),
            send_timeout: LinkConfig::default().send_timeout(),
        }
    }

    pub fn from_config(config: &LinkConfig) -> Result<Self> {
        let rates = config.rate_set()?;
        let initial = rates.require(config.default_rate)?;
        Ok(Self::new(rates, initial).with_send_timeout(config.send_timeout()))
    }

    /// Bound the time a single send may take before the transport is dropped
    pub fn with_send_timeout(mut self, timeout: Duration) -> Self {
        self.send_timeout = timeout;
        self
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        // Critical sections never panic halfway through an update.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Install a freshly connected transport and return its generation
    ///
    /// Streaming stays as it is: a reconnect never turns sending back on.
    pub fn set_transport(&self, writer: BoxedWriter) -> u64 {
        let mut inner = self.lock();
        inner.generations += 1;
        let generation = inner.generations;
        if inner.transport.is_some() {
            warn!(generation, "Replacing a transport that was never cleared");
        }
        inner.transport =
            Some(InstalledTransport { generation, writer: Arc::new(tokio::sync::Mutex::new(writer)) });
        generation
    }

    /// Remove the transport, mark disconnected and stop streaming
    ///
    /// Returns the writer so the caller can shut it down outside the lock.
    pub fn clear_transport(&self) -> Option<SharedWriter> {
        let mut inner = self.lock();
        inner.sending = false;
        inner.transport.take().map(|t| t.writer)
    }

    /// Clear the transport only if it is still the one with `generation`
    ///
    /// Returns whether anything was cleared.
    pub fn invalidate(&self, generation: u64) -> bool {
        let mut inner = self.lock();
        match &inner.transport {
            Some(t) if t.generation == generation => {
                inner.transport = None;
                inner.sending = false;
                true
            }
            _ => false,
        }
    }

    /// Whether the transport with `generation` is still installed
    pub fn holds(&self, generation: u64) -> bool {
        self.lock().transport.as_ref().is_some_and(|t| t.generation == generation)
    }

    pub fn is_connected(&self) -> bool {
        self.lock().transport.is_some()
    }

    pub fn set_sending(&self, sending: bool) {
        self.lock().sending = sending;
    }

    pub fn is_sending(&self) -> bool {
        self.lock().sending
    }

    /// Change the sample rate if `hz` is allowed
    pub fn set_rate(&self, hz: u32) -> Result<SampleRate> {
        let rate = self.rates.require(hz)?;
        self.lock().rate = rate;
        Ok(rate)
    }

    pub fn rate(&self) -> SampleRate {
        self.lock().rate
    }

    pub fn allowed_rates(&self) -> &RateSet {
        &self.rates
    }

    pub fn snapshot(&self) -> StateSnapshot {
        let inner = self.lock();
        StateSnapshot {
            connected: inner.transport.is_some(),
            sending: inner.sending,
            rate: inner.rate,
            generation: inner.transport.as_ref().map(|t| t.generation),
        }
    }

    fn writer(&self) -> Option<(u64, SharedWriter)> {
        self.lock().transport.as_ref().map(|t| (t.generation, Arc::clone(&t.writer)))
    }

    /// Send bytes on the current transport
    ///
    /// Fails fast with [`LinkError::NotConnected`] when nothing is installed.
    /// A failed or timed-out write invalidates the transport it was issued on.
    pub async fn try_send(&self, bytes: &[u8]) -> Result<()> {
        let (generation, writer) = self.writer().ok_or(LinkError::NotConnected)?;
        let mut writer = writer.lock().await;
        self.write_through(&mut writer, generation, bytes).await
    }

    /// Produce bytes while holding the transport's write handle, then send them
    ///
    /// `produce` runs after the writer lock is taken, so any state change it
    /// makes cannot be followed on the wire by another task's line before the
    /// produced bytes. `produce` runs even when no transport is installed.
    pub async fn send_with<F>(&self, produce: F) -> Result<()>
    where
        F: FnOnce() -> Vec<u8>,
    {
        let Some((generation, writer)) = self.writer() else {
            produce();
            return Err(LinkError::NotConnected);
        };
        let mut writer = writer.lock().await;
        let bytes = produce();
        self.write_through(&mut writer, generation, &bytes).await
    }

    async fn write_through(&self, writer: &mut BoxedWriter, generation: u64, bytes: &[u8]) -> Result<()> {
        let write = async {
            writer.write_all(bytes).await?;
            writer.flush().await
        };

        let err = match tokio::time::timeout(self.send_timeout, write).await {
            Ok(Ok(())) => return Ok(()),
            Ok(Err(e)) => LinkError::io("write", e),
            Err(_) => LinkError::Timeout { duration: self.send_timeout },
        };

        if self.invalidate(generation) {
            warn!(generation, error = %err, "Send failed, transport invalidated");
        } else {
            debug!(generation, error = %err, "Send failed on a transport that is already gone");
        }
        Err(err)
    }
}

impl std::fmt::Debug for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionState").field("snapshot", &self.snapshot()).finish()
    }
}
