//! Sampling engine: reads the sensor and streams records while enabled
//!
//! The sampler never opens or closes transports. Each cycle it takes a
//! snapshot of the shared state and either idles (no transport, or streaming
//! paused) or reads one sample and sends it. A failed send invalidates the
//! transport it was issued on and leaves reconnection to the session manager.

use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::provider::SensorProvider;
use crate::state::{SessionState, StateSnapshot};
use crate::stats::LinkStats;
use crate::types::{Sample, SampleRate};
use crate::{LinkConfig, LinkError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Activity {
    Disconnected,
    Paused,
    Streaming(SampleRate),
}

impl Activity {
    fn of(view: &StateSnapshot) -> Self {
        match (view.connected, view.sending) {
            (false, _) => Activity::Disconnected,
            (true, false) => Activity::Paused,
            (true, true) => Activity::Streaming(view.rate),
        }
    }
}

/// Periodic sensor reader owning its [`SensorProvider`]
pub struct Sampler<S: SensorProvider> {
    sensor: S,
    state: SessionState,
    stats: Arc<LinkStats>,
    cancel: CancellationToken,
    epoch: Instant,
    configured: Option<SampleRate>,
    disconnected_idle: Duration,
    paused_idle: Duration,
    sensor_retry: Duration,
}

impl<S: SensorProvider> Sampler<S> {
    pub fn new(
        sensor: S,
        state: SessionState,
        config: &LinkConfig,
        stats: Arc<LinkStats>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            sensor,
            state,
            stats,
            cancel,
            epoch: Instant::now(),
            configured: None,
            disconnected_idle: config.disconnected_idle(),
            paused_idle: config.paused_idle(),
            sensor_retry: config.sensor_retry(),
        }
    }

    /// Run until cancelled
    pub async fn run(mut self) {
        info!(sensor = self.sensor.name(), "Sampler started");
        let mut last = None;

        while !self.cancel.is_cancelled() {
            let view = self.state.snapshot();
            let activity = Activity::of(&view);
            if last != Some(activity) {
                match activity {
                    Activity::Disconnected => info!("Sampler waiting for a connection"),
                    Activity::Paused => info!("Streaming paused"),
                    Activity::Streaming(rate) => info!(%rate, "Streaming samples"),
                }
                last = Some(activity);
            }

            let wait = match activity {
                Activity::Disconnected => self.disconnected_idle,
                Activity::Paused => self.paused_idle,
                Activity::Streaming(rate) => self.sample_once(rate, view.generation).await,
            };

            if wait.is_zero() {
                tokio::task::yield_now().await;
                continue;
            }
            tokio::select! {
                _ = self.cancel.cancelled() => break,
                _ = tokio::time::sleep(wait) => {}
            }
        }

        info!(sensor = self.sensor.name(), "Sampler stopped");
    }

    /// Read and send one sample, returning how long to wait before the next
    async fn sample_once(&mut self, rate: SampleRate, generation: Option<u64>) -> Duration {
        if self.configured != Some(rate) {
            if let Err(e) = self.sensor.apply_rate(rate).await {
                warn!(%rate, error = %e, "Sensor rate configuration failed, sampling anyway");
            }
            self.configured = Some(rate);
        }

        let raw = match self.sensor.read_raw().await {
            Ok(raw) => raw,
            Err(e) => {
                let errors = self.stats.record_sensor_error();
                warn!(error = %e, errors, "Sensor read failed, skipping cycle");
                return self.sensor_retry;
            }
        };

        let timestamp_us = u64::try_from(self.epoch.elapsed().as_micros()).unwrap_or(u64::MAX);
        let sample = Sample::new(raw, timestamp_us);

        // Re-check under the writer lock so nothing follows a STOPPED reply.
        let mut sent_rate = None;
        let result = self
            .state
            .send_with(|| {
                let now = self.state.snapshot();
                if !now.sending {
                    return Vec::new();
                }
                match sample.to_record(now.rate).to_line() {
                    Ok(line) => {
                        sent_rate = Some(now.rate);
                        line.into_bytes()
                    }
                    Err(e) => {
                        warn!(error = %e, "Sample encoding failed");
                        Vec::new()
                    }
                }
            })
            .await;

        match result {
            Ok(()) => match sent_rate {
                Some(sent_rate) => {
                    let sent = self.stats.record_sample_sent();
                    trace!(ts_us = timestamp_us, sent, "Sample sent");
                    sent_rate.period()
                }
                None => Duration::ZERO,
            },
            Err(LinkError::NotConnected) => {
                debug!("Transport went away before the sample was sent");
                Duration::ZERO
            }
            Err(e) => {
                self.stats.record_send_failure();
                if let Some(generation) = generation {
                    self.state.invalidate(generation);
                }
                warn!(error = %e, "Sample send failed, waiting for reconnect");
                Duration::ZERO
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{ScriptedSensor, SensorProbe, fast_config, read_line};
    use crate::types::RawAxes;
    use std::sync::atomic::Ordering;
    use tokio::io::DuplexStream;

    const RAW: RawAxes = RawAxes { acc: [0, 0, 4096], gyr: [0, 0, 0] };

    fn spawn_sampler() -> (SessionState, Arc<SensorProbe>, Arc<LinkStats>, CancellationToken) {
        let config = fast_config();
        let state = SessionState::from_config(&config).unwrap();
        let stats = Arc::new(LinkStats::new());
        let cancel = CancellationToken::new();
        let (sensor, probe) = ScriptedSensor::new(RAW);
        let sampler = Sampler::new(sensor, state.clone(), &config, Arc::clone(&stats), cancel.clone());
        tokio::spawn(sampler.run());
        (state, probe, stats, cancel)
    }

    fn install(state: &SessionState) -> (u64, DuplexStream) {
        let (near, far) = tokio::io::duplex(64 * 1024);
        let (_, writer) = tokio::io::split(near);
        (state.set_transport(Box::new(writer)), far)
    }

    async fn read_record(peer: &mut DuplexStream) -> serde_json::Value {
        serde_json::from_str(&read_line(peer).await).unwrap()
    }

    #[tokio::test]
    async fn idles_without_transport_or_start() {
        let (state, probe, _stats, cancel) = spawn_sampler();

        state.set_sending(true);
        tokio::time::sleep(Duration::from_millis(40)).await;
        assert_eq!(probe.reads(), 0, "no reads while disconnected");

        state.set_sending(false);
        let (_generation, _peer) = install(&state);
        tokio::time::sleep(Duration::from_millis(40)).await;
        assert_eq!(probe.reads(), 0, "no reads while paused");

        cancel.cancel();
    }

    #[tokio::test]
    async fn start_while_disconnected_streams_once_connected() {
        let (state, probe, _stats, cancel) = spawn_sampler();

        state.set_sending(true);
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(probe.reads(), 0);

        let (_generation, mut peer) = install(&state);
        assert_eq!(read_record(&mut peer).await["fs_hz"], 400);
        assert!(probe.reads() >= 1);

        cancel.cancel();
    }

    #[tokio::test]
    async fn streams_records_at_current_rate() {
        let _ = tracing_subscriber::fmt::try_init();
        let (state, probe, stats, cancel) = spawn_sampler();
        let (_generation, mut peer) = install(&state);
        state.set_sending(true);

        let record = read_record(&mut peer).await;
        assert_eq!(record["fs_hz"], 400);
        assert_eq!(record["acc_g"][2], 1.0);
        assert_eq!(record["acc_m_s2"][2], 9.80665);

        state.set_rate(1600).unwrap();
        let mut fs = 0;
        for _ in 0..50 {
            fs = read_record(&mut peer).await["fs_hz"].as_u64().unwrap();
            if fs == 1600 {
                break;
            }
        }
        assert_eq!(fs, 1600);
        assert_eq!(probe.applied(), vec![400, 1600]);
        assert!(stats.snapshot().samples_sent >= 2);

        cancel.cancel();
    }

    #[tokio::test]
    async fn timestamps_do_not_go_backwards() {
        let (state, _probe, _stats, cancel) = spawn_sampler();
        let (_generation, mut peer) = install(&state);
        state.set_sending(true);

        let mut last = 0;
        for _ in 0..5 {
            let ts = read_record(&mut peer).await["ts_ms"].as_u64().unwrap();
            assert!(ts >= last);
            last = ts;
        }

        cancel.cancel();
    }

    #[tokio::test]
    async fn sensor_failures_skip_cycles_but_keep_the_link() {
        let (state, probe, stats, cancel) = spawn_sampler();
        probe.fail_reads.store(3, Ordering::SeqCst);
        let (_generation, mut peer) = install(&state);
        state.set_sending(true);

        read_record(&mut peer).await;
        assert_eq!(stats.snapshot().sensor_errors, 3);
        assert!(state.is_connected());

        cancel.cancel();
    }

    #[tokio::test]
    async fn rate_configuration_failure_still_samples() {
        let (state, probe, _stats, cancel) = spawn_sampler();
        probe.fail_apply.store(true, Ordering::SeqCst);
        let (_generation, mut peer) = install(&state);
        state.set_sending(true);

        assert_eq!(read_record(&mut peer).await["fs_hz"], 400);
        assert_eq!(probe.applied(), vec![400]);

        cancel.cancel();
    }

    #[tokio::test]
    async fn send_failure_invalidates_transport() {
        let (state, _probe, stats, cancel) = spawn_sampler();
        let (_generation, peer) = install(&state);
        drop(peer);
        state.set_sending(true);

        for _ in 0..100 {
            if !state.is_connected() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert!(!state.is_connected());
        assert!(!state.is_sending());
        assert!(stats.snapshot().send_failures >= 1);

        cancel.cancel();
    }

    #[tokio::test]
    async fn nothing_follows_stop() {
        let (state, _probe, _stats, cancel) = spawn_sampler();
        let (_generation, mut peer) = install(&state);
        state.set_sending(true);
        read_record(&mut peer).await;

        // STOP through the same writer path the session manager uses.
        state
            .send_with(|| {
                state.set_sending(false);
                b"STOPPED\n".to_vec()
            })
            .await
            .unwrap();

        loop {
            let line = read_line(&mut peer).await;
            if line == "STOPPED" {
                break;
            }
            assert!(line.starts_with('{'));
        }
        tokio::time::sleep(Duration::from_millis(30)).await;

        cancel.cancel();
        drop(state);
        let mut rest = Vec::new();
        let read = tokio::time::timeout(
            Duration::from_millis(50),
            tokio::io::AsyncReadExt::read_buf(&mut peer, &mut rest),
        )
        .await;
        assert!(read.is_err() || rest.is_empty(), "unexpected bytes after STOPPED: {rest:?}");
    }
}
