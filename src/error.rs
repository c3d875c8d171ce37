//! Error types and handling infrastructure for pollkb.
//!
//! Startup failures are fatal for the run and surface as a single [`PollkbError`].
//! Steady-state failures (a bad sample, a failed report) are logged by the poll loop
//! and never propagated, so the loop keeps running.

use crate::lines::LineId;
use thiserror::Error;

/// Failures of the physical line collaborator.
#[derive(Error, Debug)]
pub enum LineError {
    /// The line is already reserved by someone else
    #[error("Line {line} ({label}) is already in use")]
    AlreadyInUse { line: LineId, label: String },

    /// Reservation or input configuration failed for another reason
    #[error("Failed to configure line {line}: {message}")]
    ConfigFailed { line: LineId, message: String },

    /// A single sample could not be read
    #[error("Failed to read line {line}: {message}")]
    ReadFailed { line: LineId, message: String },
}

impl LineError {
    pub fn config_failed(line: LineId, message: impl Into<String>) -> Self {
        Self::ConfigFailed {
            line,
            message: message.into(),
        }
    }

    pub fn read_failed(line: LineId, message: impl Into<String>) -> Self {
        Self::ReadFailed {
            line,
            message: message.into(),
        }
    }
}

/// Failures of the reporting sink collaborator.
#[derive(Error, Debug)]
pub enum SinkError {
    #[error("Sink registration failed: {message}")]
    RegistrationFailed { message: String },

    #[error("Sink report failed: {message}")]
    ReportFailed { message: String },
}

impl SinkError {
    pub fn registration(message: impl Into<String>) -> Self {
        Self::RegistrationFailed {
            message: message.into(),
        }
    }

    pub fn report(message: impl Into<String>) -> Self {
        Self::ReportFailed {
            message: message.into(),
        }
    }
}

/// The main error type for pollkb operations.
#[derive(Error, Debug)]
pub enum PollkbError {
    /// A line could not be reserved or configured during startup
    #[error(transparent)]
    Line(#[from] LineError),

    /// The reporting sink refused registration
    #[error("Sink registration failed: {message}")]
    SinkRegistrationFailed { message: String },

    /// The poll loop thread could not be spawned
    #[error("Failed to launch poll loop: {source}")]
    TaskLaunchFailed {
        #[source]
        source: std::io::Error,
    },

    /// Nominal polling frequency outside the supported range
    #[error("Invalid polling frequency: {hz} Hz (expected 1..={} Hz)", crate::poll::MAX_FREQUENCY_HZ)]
    InvalidFrequency { hz: u32 },

    /// Configuration related errors
    #[error("Configuration error: {message}")]
    ConfigError { message: String },
}

/// Standard Result type for pollkb operations.
pub type Result<T> = std::result::Result<T, PollkbError>;

impl PollkbError {
    /// Create a ConfigError with a descriptive message
    pub fn config(message: impl Into<String>) -> Self {
        Self::ConfigError {
            message: message.into(),
        }
    }

    /// Create a TaskLaunchFailed from the spawn error
    pub fn task_launch(source: std::io::Error) -> Self {
        Self::TaskLaunchFailed { source }
    }
}

impl From<SinkError> for PollkbError {
    fn from(err: SinkError) -> Self {
        match err {
            SinkError::RegistrationFailed { message } | SinkError::ReportFailed { message } => {
                Self::SinkRegistrationFailed { message }
            }
        }
    }
}
