//! # pollkb - Polling GPIO Keyboard
//!
//! Turns a fixed set of digital input lines into keyboard key-press and key-release
//! events by sampling them repeatedly instead of waiting for interrupts.
//!
//! ## Architecture
//!
//! - [`lines`] - the fixed line table and the physical line backends
//! - [`poll`] - the jittered polling loop running on a dedicated thread
//! - [`sink`] - keyboard-like devices the transitions are reported to
//! - [`keyboard`] - startup and teardown of the whole system
//! - [`config`] - the `{ label, line, key }` table and polling frequency
//! - [`error`] - centralized error types
//!
//! Switches are wired active-low: a line that reads low is a pressed key.
//!
//! ```no_run
//! use pollkb::{KeyboardConfig, LogSink, PollingKeyboard, SimulatedLines};
//!
//! let keyboard = PollingKeyboard::start(
//!     &KeyboardConfig::default(),
//!     SimulatedLines::new(),
//!     LogSink::new(),
//! )?;
//! // ...
//! keyboard.stop();
//! # Ok::<(), pollkb::PollkbError>(())
//! ```

// Core modules
pub mod config;
pub mod error;
pub mod keys;

// Components
pub mod keyboard;
pub mod lines;
pub mod poll;
pub mod sink;

// Re-export commonly used types for convenience
pub use error::{PollkbError, Result};

// Public API surface for external usage
pub use config::{KeyboardConfig, LineConfig};
pub use keyboard::PollingKeyboard;
pub use keys::KeyCode;
pub use lines::{KeyTransition, LineAccess, LineDescriptor, LineTable, PinLines, SimulatedLines};
#[cfg(target_os = "linux")]
pub use lines::CdevLines;
pub use poll::{LoopState, PollLoop, SleepBand};
pub use sink::{DeviceIdentity, LogSink, RecordingSink, ReportingSink};

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
