//! Sink that writes key frames to the log.
//!
//! The binary's default sink. Nothing is made visible to other programs: each
//! synchronized frame becomes one `info` record per key, which makes it useful for
//! checking wiring from a terminal (`RUST_LOG=info pollkb --simulate`).

use crate::error::SinkError;
use crate::keys::KeyCode;
use crate::sink::{DeviceIdentity, ReportingSink};
use log::info;
use std::collections::BTreeSet;

/// Logs every synchronized frame at `info` level.
#[derive(Debug, Default)]
pub struct LogSink {
    capabilities: BTreeSet<KeyCode>,
    device: Option<String>,
    pending: Vec<(KeyCode, bool)>,
}

impl LogSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `register` succeeded and `unregister` has not been called since.
    pub fn is_registered(&self) -> bool {
        self.device.is_some()
    }
}

impl ReportingSink for LogSink {
    fn declare_capability(&mut self, key: KeyCode) {
        self.capabilities.insert(key);
    }

    fn register(&mut self, identity: &DeviceIdentity) -> Result<(), SinkError> {
        info!(
            "Registered \"{}\" ({}, {:?}) with {} keys",
            identity.name,
            identity.phys,
            identity.bus,
            self.capabilities.len()
        );
        self.device = Some(identity.name.clone());
        Ok(())
    }

    fn report_key(&mut self, key: KeyCode, pressed: bool) -> Result<(), SinkError> {
        if !self.capabilities.contains(&key) {
            return Err(SinkError::report(format!("{key} was never declared")));
        }
        self.pending.push((key, pressed));
        Ok(())
    }

    fn synchronize(&mut self) -> Result<(), SinkError> {
        for (key, pressed) in self.pending.drain(..) {
            info!("{} {}", key, if pressed { "pressed" } else { "released" });
        }
        Ok(())
    }

    fn unregister(&mut self) {
        if let Some(name) = self.device.take() {
            info!("Unregistered \"{}\"", name);
        }
        self.pending.clear();
    }
}
