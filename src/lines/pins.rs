//! Backend over `embedded-hal` input pins.
//!
//! [`PinLines`] maps line ids to pins that a HAL has already configured as inputs
//! (with pull-ups for active-low switches). Reservation is tracked here since the
//! pins themselves are owned values: a pin can only be handed out once.

use crate::error::LineError;
use crate::lines::{LineAccess, LineId};
use embedded_hal::digital::InputPin;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PinState {
    Free,
    Reserved,
    Input,
}

struct PinSlot<P> {
    pin: P,
    state: PinState,
}

/// Lines backed by `embedded-hal` [`InputPin`]s.
pub struct PinLines<P> {
    pins: BTreeMap<LineId, PinSlot<P>>,
}

impl<P: InputPin> PinLines<P> {
    pub fn new() -> Self {
        Self {
            pins: BTreeMap::new(),
        }
    }

    /// Wire `pin` to `line`, replacing whatever pin was there.
    pub fn with_pin(mut self, line: LineId, pin: P) -> Self {
        self.insert(line, pin);
        self
    }

    pub fn insert(&mut self, line: LineId, pin: P) {
        self.pins.insert(
            line,
            PinSlot {
                pin,
                state: PinState::Free,
            },
        );
    }

    /// Lines that currently have a pin wired.
    pub fn wired_lines(&self) -> impl Iterator<Item = LineId> + '_ {
        self.pins.keys().copied()
    }

    pub fn is_reserved(&self, line: LineId) -> bool {
        self.pins
            .get(&line)
            .is_some_and(|slot| slot.state != PinState::Free)
    }
}

impl<P: InputPin> Default for PinLines<P> {
    fn default() -> Self {
        Self::new()
    }
}

/// Sample one pin, mapping the HAL error into a read failure.
pub(crate) fn read_pin<P: InputPin>(line: LineId, pin: &mut P) -> Result<bool, LineError> {
    pin.is_high()
        .map_err(|err| LineError::read_failed(line, format!("{err:?}")))
}

impl<P: InputPin + Send> LineAccess for PinLines<P> {
    fn reserve(&mut self, line: LineId, label: &str) -> Result<(), LineError> {
        let slot = self
            .pins
            .get_mut(&line)
            .ok_or_else(|| LineError::config_failed(line, "no pin is wired to this line"))?;

        if slot.state != PinState::Free {
            return Err(LineError::AlreadyInUse {
                line,
                label: label.to_string(),
            });
        }
        slot.state = PinState::Reserved;
        Ok(())
    }

    fn configure_as_input(&mut self, line: LineId) -> Result<(), LineError> {
        match self.pins.get_mut(&line) {
            Some(slot) if slot.state != PinState::Free => {
                slot.state = PinState::Input;
                Ok(())
            }
            _ => Err(LineError::config_failed(line, "line is not reserved")),
        }
    }

    fn read_level(&mut self, line: LineId) -> Result<bool, LineError> {
        match self.pins.get_mut(&line) {
            Some(slot) if slot.state == PinState::Input => read_pin(line, &mut slot.pin),
            _ => Err(LineError::read_failed(line, "line is not configured")),
        }
    }

    fn release(&mut self, line: LineId) {
        if let Some(slot) = self.pins.get_mut(&line) {
            slot.state = PinState::Free;
        }
    }
}
