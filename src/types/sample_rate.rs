//! Sample rate control for the sampling loop

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

use crate::{LinkError, Result};

/// Shortest wait between two samples, whatever the configured rate.
pub const MIN_SAMPLE_PERIOD: Duration = Duration::from_millis(1);

/// Sampling frequency in Hz
///
/// Only values accepted by a [`RateSet`] ever reach the sampling loop, so a
/// `SampleRate` is always positive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SampleRate(u32);

impl SampleRate {
    /// Frequency in Hz
    pub fn hz(self) -> u32 {
        self.0
    }

    /// Wait between two samples at this rate
    ///
    /// Whole milliseconds of `1000 / hz`, never shorter than
    /// [`MIN_SAMPLE_PERIOD`]: 400 Hz waits 2 ms, 1600 Hz waits 1 ms.
    pub fn period(self) -> Duration {
        Duration::from_millis(u64::from(1000 / self.0.max(1))).max(MIN_SAMPLE_PERIOD)
    }
}

impl fmt::Display for SampleRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} Hz", self.0)
    }
}

/// The fixed set of rates a peer may select with `SRATE`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateSet {
    rates: Vec<u32>,
}

impl RateSet {
    /// Rates supported by the accelerometer/gyroscope pair out of the box.
    pub const DEFAULT_RATES: [u32; 3] = [100, 400, 1600];

    /// Build a rate set, rejecting empty sets and zero rates.
    pub fn new(rates: impl IntoIterator<Item = u32>) -> Result<Self> {
        let mut rates: Vec<u32> = rates.into_iter().collect();
        if rates.is_empty() {
            return Err(LinkError::config("allowed rate set is empty"));
        }
        if rates.contains(&0) {
            return Err(LinkError::config("allowed rate set contains 0 Hz"));
        }
        rates.sort_unstable();
        rates.dedup();
        Ok(Self { rates })
    }

    /// Look up a rate, returning it only when it is allowed
    pub fn get(&self, hz: u32) -> Option<SampleRate> {
        self.rates.binary_search(&hz).ok().map(|_| SampleRate(hz))
    }

    /// Same as [`RateSet::get`] but with an error naming the rejected value
    pub fn require(&self, hz: u32) -> Result<SampleRate> {
        self.get(hz).ok_or(LinkError::InvalidRate { hz })
    }

    pub fn contains(&self, hz: u32) -> bool {
        self.get(hz).is_some()
    }

    /// Allowed rates in ascending order
    pub fn rates(&self) -> &[u32] {
        &self.rates
    }
}

impl Default for RateSet {
    fn default() -> Self {
        Self { rates: Self::DEFAULT_RATES.to_vec() }
    }
}
