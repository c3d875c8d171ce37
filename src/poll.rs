//! Polling loop.
//!
//! [`PollLoop`] samples the [`LineTable`](crate::lines::LineTable) on a jittered
//! cadence described by [`SleepBand`] and forwards transitions to a
//! [`ReportingSink`](crate::sink::ReportingSink).

pub mod timing;
pub mod worker;

/// Highest supported nominal polling frequency.
pub const MAX_FREQUENCY_HZ: u32 = 1_000_000;

/// Nominal polling frequency used when none is configured.
pub const DEFAULT_FREQUENCY_HZ: u32 = 5000;

pub use timing::{SleepBand, JITTER_FRACTION};
pub use worker::{LoopState, PollLoop, PollLoopHandle};
