//! Link counters
//!
//! Lock-free counters bumped by the session manager and the sampling loop and
//! readable at any time through [`LinkStats::snapshot`].

use std::sync::atomic::{AtomicU64, Ordering};

/// Running counters for one link
#[derive(Debug, Default)]
pub struct LinkStats {
    connects: AtomicU64,
    connect_failures: AtomicU64,
    commands: AtomicU64,
    samples_sent: AtomicU64,
    send_failures: AtomicU64,
    sensor_errors: AtomicU64,
}

/// Point-in-time copy of [`LinkStats`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub connects: u64,
    pub connect_failures: u64,
    pub commands: u64,
    pub samples_sent: u64,
    pub send_failures: u64,
    pub sensor_errors: u64,
}

impl LinkStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_connect(&self) -> u64 {
        self.connects.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub(crate) fn record_connect_failure(&self) -> u64 {
        self.connect_failures.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub(crate) fn record_command(&self) {
        self.commands.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_sample_sent(&self) -> u64 {
        self.samples_sent.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub(crate) fn record_send_failure(&self) {
        self.send_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_sensor_error(&self) -> u64 {
        self.sensor_errors.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            connects: self.connects.load(Ordering::Relaxed),
            connect_failures: self.connect_failures.load(Ordering::Relaxed),
            commands: self.commands.load(Ordering::Relaxed),
            samples_sent: self.samples_sent.load(Ordering::Relaxed),
            send_failures: self.send_failures.load(Ordering::Relaxed),
            sensor_errors: self.sensor_errors.load(Ordering::Relaxed),
        }
    }
}
