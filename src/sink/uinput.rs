//! uinput-backed virtual keyboard (Linux, feature `uinput`).
//!
//! Declared keys are collected into an [`AttributeSet`] and the device is only
//! built on `register`, since uinput fixes a device's capabilities at creation.
//! Reports are queued and written in one `emit` per frame. Key auto-repeat is left
//! to the consumer.

use crate::error::SinkError;
use crate::keys::KeyCode;
use crate::sink::{BusType, DeviceIdentity, ReportingSink};
use evdev::uinput::{VirtualDevice, VirtualDeviceBuilder};
use evdev::{AttributeSet, EventType, InputEvent, InputId, Key};
use log::{debug, info};

/// Creates a `/dev/uinput` keyboard on `register` and destroys it on `unregister`.
pub struct UinputSink {
    keys: AttributeSet<Key>,
    device: Option<VirtualDevice>,
    pending: Vec<InputEvent>,
}

impl UinputSink {
    /// A sink with no declared keys and no device yet.
    pub fn new() -> Self {
        Self {
            keys: AttributeSet::new(),
            device: None,
            pending: Vec::new(),
        }
    }
}

impl Default for UinputSink {
    fn default() -> Self {
        Self::new()
    }
}

fn bus_of(bus: BusType) -> evdev::BusType {
    match bus {
        BusType::Virtual => evdev::BusType::BUS_VIRTUAL,
        BusType::Host => evdev::BusType::BUS_HOST,
    }
}

impl ReportingSink for UinputSink {
    fn declare_capability(&mut self, key: KeyCode) {
        self.keys.insert(Key::new(key.code()));
    }

    fn register(&mut self, identity: &DeviceIdentity) -> Result<(), SinkError> {
        let device = VirtualDeviceBuilder::new()
            .and_then(|builder| {
                builder
                    .name(identity.name.as_str())
                    .input_id(InputId::new(bus_of(identity.bus), 0, 0, 1))
                    .with_keys(&self.keys)
            })
            .and_then(|builder| builder.build())
            .map_err(|err| SinkError::registration(format!("uinput: {err}")))?;

        info!("Created uinput device \"{}\"", identity.name);
        self.device = Some(device);
        Ok(())
    }

    fn report_key(&mut self, key: KeyCode, pressed: bool) -> Result<(), SinkError> {
        self.pending.push(InputEvent::new(
            EventType::KEY,
            key.code(),
            i32::from(pressed),
        ));
        Ok(())
    }

    /// `emit` appends SYN_REPORT after the queued events.
    fn synchronize(&mut self) -> Result<(), SinkError> {
        let device = match self.device.as_mut() {
            Some(device) => device,
            None => {
                self.pending.clear();
                return Err(SinkError::report("uinput device is not registered"));
            }
        };

        let result = device
            .emit(&self.pending)
            .map_err(|err| SinkError::report(format!("uinput emit: {err}")));
        self.pending.clear();
        result
    }

    fn unregister(&mut self) {
        if self.device.take().is_some() {
            debug!("Destroyed uinput device");
        }
        self.pending.clear();
    }
}
