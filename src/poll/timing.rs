//! Sleep interval policy between polling cycles.
//!
//! Instead of a fixed period the loop sleeps a uniformly drawn duration from
//! `[1 / (F + 0.1F), 1 / (F - 0.1F)]`. The jitter keeps the sampling from locking onto
//! periodic noise on the lines while the average rate stays close to `F`.

use crate::error::{PollkbError, Result};
use crate::poll::MAX_FREQUENCY_HZ;
use rand::Rng;
use std::time::Duration;

/// Relative width of the jitter band on each side of the nominal frequency.
pub const JITTER_FRACTION: f64 = 0.1;

/// Closed range of sleep durations for one nominal frequency.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SleepBand {
    frequency_hz: u32,
    min: Duration,
    max: Duration,
}

impl SleepBand {
    /// Band for a nominal frequency in `1..=MAX_FREQUENCY_HZ`.
    pub fn for_frequency(frequency_hz: u32) -> Result<Self> {
        if frequency_hz == 0 || frequency_hz > MAX_FREQUENCY_HZ {
            return Err(PollkbError::InvalidFrequency { hz: frequency_hz });
        }

        let f = f64::from(frequency_hz);
        let fastest = f + JITTER_FRACTION * f;
        let slowest = f - JITTER_FRACTION * f;

        Ok(Self {
            frequency_hz,
            min: Duration::from_secs_f64(1.0 / fastest),
            max: Duration::from_secs_f64(1.0 / slowest),
        })
    }

    pub fn frequency_hz(&self) -> u32 {
        self.frequency_hz
    }

    /// Shortest sleep (10% faster than nominal).
    pub fn min(&self) -> Duration {
        self.min
    }

    /// Longest sleep (10% slower than nominal).
    pub fn max(&self) -> Duration {
        self.max
    }

    /// Nominal period `1 / F`.
    pub fn nominal(&self) -> Duration {
        Duration::from_secs_f64(1.0 / f64::from(self.frequency_hz))
    }

    /// Draw one sleep duration uniformly from the closed band.
    pub fn draw<R: Rng>(&self, rng: &mut R) -> Duration {
        rng.gen_range(self.min..=self.max)
    }
}
