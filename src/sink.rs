//! Reporting sinks.
//!
//! A [`ReportingSink`] is the keyboard-like device key transitions are forwarded to.
//! Capabilities are declared before [`register`](ReportingSink::register); reports are
//! only made between `register` and `unregister`.

pub mod logger;
pub mod recording;
#[cfg(all(feature = "uinput", target_os = "linux"))]
pub mod uinput;

use crate::error::SinkError;
use crate::keys::KeyCode;

pub use logger::LogSink;
pub use recording::{RecordingSink, SinkCall};
#[cfg(all(feature = "uinput", target_os = "linux"))]
pub use uinput::UinputSink;

/// Bus the device claims to sit on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(
    feature = "config",
    derive(serde::Serialize, serde::Deserialize),
    serde(rename_all = "lowercase")
)]
pub enum BusType {
    #[default]
    Virtual,
    Host,
}

/// How the device presents itself to consumers.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(
    feature = "config",
    derive(serde::Serialize, serde::Deserialize),
    serde(default)
)]
pub struct DeviceIdentity {
    pub name: String,
    pub phys: String,
    pub bus: BusType,
}

impl Default for DeviceIdentity {
    fn default() -> Self {
        Self {
            name: "Polling GPIO keyboard driver".to_string(),
            phys: "pgpiokb/input0".to_string(),
            bus: BusType::Virtual,
        }
    }
}

/// Consumer-facing keyboard device.
pub trait ReportingSink: Send {
    /// Advertise a key. Called once per key before `register`.
    fn declare_capability(&mut self, key: KeyCode);

    /// Make the device visible to consumers.
    fn register(&mut self, identity: &DeviceIdentity) -> Result<(), SinkError>;

    /// Queue a key state change.
    fn report_key(&mut self, key: KeyCode, pressed: bool) -> Result<(), SinkError>;

    /// Publish queued reports as one input frame.
    fn synchronize(&mut self) -> Result<(), SinkError>;

    /// Hide the device again. Must tolerate being called when not registered.
    fn unregister(&mut self);
}

impl<T: ReportingSink + ?Sized> ReportingSink for Box<T> {
    fn declare_capability(&mut self, key: KeyCode) {
        (**self).declare_capability(key)
    }

    fn register(&mut self, identity: &DeviceIdentity) -> Result<(), SinkError> {
        (**self).register(identity)
    }

    fn report_key(&mut self, key: KeyCode, pressed: bool) -> Result<(), SinkError> {
        (**self).report_key(key, pressed)
    }

    fn synchronize(&mut self) -> Result<(), SinkError> {
        (**self).synchronize()
    }

    fn unregister(&mut self) {
        (**self).unregister()
    }
}
