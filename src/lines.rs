//! Physical input lines.
//!
//! [`LineTable`] owns the fixed, ordered set of [`LineDescriptor`]s and drives a
//! [`LineAccess`] backend to claim, sample, and release them. Backends:
//!
//! - [`CdevLines`] - Linux GPIO character device (`/dev/gpiochipN`), Linux only
//! - [`PinLines`] - any `embedded-hal` input pins the caller has already set up
//! - [`SimulatedLines`] - in-memory lines with scripted levels, for tests and dry runs

pub mod access;
#[cfg(target_os = "linux")]
pub mod cdev;
pub mod pins;
pub mod simulated;
pub mod table;

/// Identifier of a physical line (the GPIO offset on its chip).
pub type LineId = u32;

pub use access::LineAccess;
#[cfg(target_os = "linux")]
pub use cdev::{CdevInput, CdevLines, DEFAULT_GPIO_CHIP};
pub use pins::PinLines;
pub use simulated::SimulatedLines;
pub use table::{KeyTransition, LineDescriptor, LineTable, Transitions, INACTIVE_LEVEL};
