//! Test helpers: in-memory connectors, scripted sensors and fast timings

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, DuplexStream};
use tokio::sync::mpsc;

use crate::provider::SensorProvider;
use crate::transport::{Connector, Transport};
use crate::types::{RawAxes, SampleRate};
use crate::{LinkConfig, LinkError, Result};

/// Buffer size of each in-memory connection.
const DUPLEX_CAPACITY: usize = 64 * 1024;

/// How long [`read_line`] waits before failing the test.
const READ_LINE_TIMEOUT: Duration = Duration::from_secs(5);

/// Configuration with every interval shrunk to keep tests fast
pub fn fast_config() -> LinkConfig {
    LinkConfig {
        connect_timeout_ms: 500,
        reconnect_backoff_ms: 20,
        receive_timeout_ms: 20,
        send_timeout_ms: 500,
        disconnected_idle_ms: 10,
        paused_idle_ms: 5,
        sensor_retry_ms: 2,
        ..LinkConfig::for_peer("in-memory")
    }
}

/// Connector handing out in-memory duplex streams
///
/// Each successful connect sends the far end of a fresh stream on the channel
/// returned by [`ChannelConnector::new`], so the test plays the peer.
pub struct ChannelConnector {
    peers: mpsc::UnboundedSender<DuplexStream>,
    fail_next: Arc<AtomicU32>,
}

impl ChannelConnector {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<DuplexStream>) {
        let (peers, rx) = mpsc::unbounded_channel();
        (Self { peers, fail_next: Arc::new(AtomicU32::new(0)) }, rx)
    }

    /// Refuse the next `count` connection attempts
    pub fn fail_next(&self, count: u32) {
        self.fail_next.store(count, Ordering::SeqCst);
    }
}

#[async_trait::async_trait]
impl Connector for ChannelConnector {
    async fn connect(&self) -> Result<Transport> {
        let refused = self
            .fail_next
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if refused {
            return Err(LinkError::connection_failed("refused by test connector"));
        }

        let (near, far) = tokio::io::duplex(DUPLEX_CAPACITY);
        self.peers
            .send(far)
            .map_err(|_| LinkError::connection_failed("test peer receiver dropped"))?;
        Ok(Transport::from_stream(near))
    }

    fn peer(&self) -> &str {
        "in-memory"
    }
}

/// Read one newline-terminated line, without the terminator
pub async fn read_line<R: AsyncRead + Unpin>(reader: &mut R) -> String {
    let read = async {
        let mut line = Vec::new();
        loop {
            let byte = reader.read_u8().await.expect("peer stream closed mid-line");
            if byte == b'\n' {
                break;
            }
            line.push(byte);
        }
        String::from_utf8(line).expect("line is not UTF-8")
    };
    tokio::time::timeout(READ_LINE_TIMEOUT, read).await.expect("timed out waiting for a line")
}

/// Observations shared between a [`ScriptedSensor`] and the test
#[derive(Debug, Default)]
pub struct SensorProbe {
    pub reads: AtomicU64,
    pub applied: Mutex<Vec<u32>>,
    /// Number of upcoming reads that fail
    pub fail_reads: AtomicU32,
    /// Make every `apply_rate` call fail
    pub fail_apply: AtomicBool,
}

impl SensorProbe {
    pub fn reads(&self) -> u64 {
        self.reads.load(Ordering::SeqCst)
    }

    pub fn applied(&self) -> Vec<u32> {
        self.applied.lock().unwrap().clone()
    }
}

/// Sensor returning the same reading forever, with scriptable failures
pub struct ScriptedSensor {
    raw: RawAxes,
    probe: Arc<SensorProbe>,
}

impl ScriptedSensor {
    pub fn new(raw: RawAxes) -> (Self, Arc<SensorProbe>) {
        let probe = Arc::new(SensorProbe::default());
        (Self { raw, probe: Arc::clone(&probe) }, probe)
    }
}

#[async_trait::async_trait]
impl SensorProvider for ScriptedSensor {
    async fn read_raw(&mut self) -> Result<RawAxes> {
        self.probe.reads.fetch_add(1, Ordering::SeqCst);
        let failing = self
            .probe
            .fail_reads
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(LinkError::sensor("scripted read failure"));
        }
        Ok(self.raw)
    }

    async fn apply_rate(&mut self, rate: SampleRate) -> Result<()> {
        self.probe.applied.lock().unwrap().push(rate.hz());
        if self.probe.fail_apply.load(Ordering::SeqCst) {
            return Err(LinkError::sensor("scripted configuration failure"));
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "scripted"
    }
}
