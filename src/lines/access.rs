//! Physical line access contract.

use crate::error::LineError;
use crate::lines::LineId;

/// Backend that owns the physical lines.
///
/// Levels are raw electrical levels: `true` is high. Switches are wired active-low,
/// so a pressed key reads `false`; the inversion happens in [`LineTable`](super::LineTable).
pub trait LineAccess: Send {
    /// Reserve a line for exclusive use. `label` is informational.
    fn reserve(&mut self, line: LineId, label: &str) -> Result<(), LineError>;

    /// Put a reserved line into input mode.
    fn configure_as_input(&mut self, line: LineId) -> Result<(), LineError>;

    /// Read the current level of a configured line.
    ///
    /// Must not block for an unbounded time.
    fn read_level(&mut self, line: LineId) -> Result<bool, LineError>;

    /// Release a line. Releasing a line that is not reserved is a no-op.
    fn release(&mut self, line: LineId);
}

impl<T: LineAccess + ?Sized> LineAccess for Box<T> {
    fn reserve(&mut self, line: LineId, label: &str) -> Result<(), LineError> {
        (**self).reserve(line, label)
    }

    fn configure_as_input(&mut self, line: LineId) -> Result<(), LineError> {
        (**self).configure_as_input(line)
    }

    fn read_level(&mut self, line: LineId) -> Result<bool, LineError> {
        (**self).read_level(line)
    }

    fn release(&mut self, line: LineId) {
        (**self).release(line)
    }
}
