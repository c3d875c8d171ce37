//! Linux GPIO character device backend.
//!
//! Lines are offsets on one `/dev/gpiochipN`. Reserving a line looks it up on the
//! chip and refuses it if the kernel reports another consumer. Configuring it
//! requests an input handle labelled with the line's label, and dropping the handle
//! gives the line back to the kernel. Samples go through [`CdevInput`], the
//! `embedded-hal` input pin view of a requested handle.

use crate::error::LineError;
use crate::lines::pins::read_pin;
use crate::lines::{LineAccess, LineId};
use embedded_hal::digital::{ErrorKind, ErrorType, InputPin};
use gpio_cdev::{Chip, Line, LineHandle, LineRequestFlags};
use log::debug;
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};

/// Default GPIO character device.
pub const DEFAULT_GPIO_CHIP: &str = "/dev/gpiochip0";

/// A requested input line, usable as an `embedded-hal` pin.
pub struct CdevInput {
    handle: LineHandle,
}

impl CdevInput {
    pub fn new(handle: LineHandle) -> Self {
        Self { handle }
    }
}

/// Error from the character device while sampling.
#[derive(Debug)]
pub struct CdevPinError(gpio_cdev::Error);

impl fmt::Display for CdevPinError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl embedded_hal::digital::Error for CdevPinError {
    fn kind(&self) -> ErrorKind {
        ErrorKind::Other
    }
}

impl ErrorType for CdevInput {
    type Error = CdevPinError;
}

impl InputPin for CdevInput {
    fn is_high(&mut self) -> Result<bool, CdevPinError> {
        self.handle
            .get_value()
            .map(|value| value != 0)
            .map_err(CdevPinError)
    }

    fn is_low(&mut self) -> Result<bool, CdevPinError> {
        self.is_high().map(|high| !high)
    }
}

enum Claim {
    Reserved { line: Line, label: String },
    Input(CdevInput),
}

/// Lines of one GPIO chip, accessed through the character device.
pub struct CdevLines {
    path: PathBuf,
    chip: Option<Chip>,
    claims: HashMap<LineId, Claim>,
}

impl CdevLines {
    /// The chip is opened on the first reservation.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            chip: None,
            claims: HashMap::new(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn chip(&mut self, line: LineId) -> Result<&mut Chip, LineError> {
        if self.chip.is_none() {
            let chip = Chip::new(&self.path).map_err(|err| {
                LineError::config_failed(
                    line,
                    format!("cannot open {}: {}", self.path.display(), err),
                )
            })?;
            debug!("Opened {} ({} lines)", self.path.display(), chip.num_lines());
            self.chip = Some(chip);
        }
        self.chip
            .as_mut()
            .ok_or_else(|| LineError::config_failed(line, "chip is not open"))
    }
}

impl Default for CdevLines {
    fn default() -> Self {
        Self::new(DEFAULT_GPIO_CHIP)
    }
}

impl LineAccess for CdevLines {
    fn reserve(&mut self, line: LineId, label: &str) -> Result<(), LineError> {
        let in_use = || LineError::AlreadyInUse {
            line,
            label: label.to_string(),
        };
        if self.claims.contains_key(&line) {
            return Err(in_use());
        }

        let chip_line = self
            .chip(line)?
            .get_line(line)
            .map_err(|err| LineError::config_failed(line, err.to_string()))?;
        let info = chip_line
            .info()
            .map_err(|err| LineError::config_failed(line, err.to_string()))?;
        if info.is_used() {
            debug!(
                "Line {} is held by {}",
                line,
                info.consumer().unwrap_or("the kernel")
            );
            return Err(in_use());
        }

        self.claims.insert(
            line,
            Claim::Reserved {
                line: chip_line,
                label: label.to_string(),
            },
        );
        Ok(())
    }

    fn configure_as_input(&mut self, line: LineId) -> Result<(), LineError> {
        let claim = self
            .claims
            .get_mut(&line)
            .ok_or_else(|| LineError::config_failed(line, "line is not reserved"))?;

        if let Claim::Reserved {
            line: chip_line,
            label,
        } = claim
        {
            let handle = chip_line
                .request(LineRequestFlags::INPUT, 0, label)
                .map_err(|err| LineError::config_failed(line, format!("request failed: {err}")))?;
            *claim = Claim::Input(CdevInput::new(handle));
        }
        Ok(())
    }

    fn read_level(&mut self, line: LineId) -> Result<bool, LineError> {
        match self.claims.get_mut(&line) {
            Some(Claim::Input(pin)) => read_pin(line, pin),
            _ => Err(LineError::read_failed(line, "line is not configured")),
        }
    }

    fn release(&mut self, line: LineId) {
        // Dropping the handle returns the line to the kernel
        if self.claims.remove(&line).is_some() {
            debug!("Released line {} on {}", line, self.path.display());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_chip_fails_configuration() {
        let dir = tempfile::tempdir().unwrap();
        let mut lines = CdevLines::new(dir.path().join("gpiochip9"));

        let err = lines.reserve(5, "A").unwrap_err();
        assert!(matches!(err, LineError::ConfigFailed { line: 5, .. }));
        assert!(err.to_string().contains("gpiochip9"));
    }

    #[test]
    fn unreserved_lines_are_not_configured_or_read() {
        let mut lines = CdevLines::default();
        assert_eq!(lines.path(), Path::new(DEFAULT_GPIO_CHIP));

        assert!(matches!(
            lines.configure_as_input(6),
            Err(LineError::ConfigFailed { line: 6, .. })
        ));
        assert!(matches!(
            lines.read_level(6),
            Err(LineError::ReadFailed { line: 6, .. })
        ));
        // releasing a line that was never reserved is a no-op
        lines.release(6);
    }
}
