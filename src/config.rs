//! Keyboard configuration.
//!
//! The line table and polling frequency are fixed for the lifetime of a run. The
//! built-in default matches the reference wiring (four switches on GPIO 5, 6, 13
//! and 19). With the `config` feature a TOML file can replace it:
//!
//! ```toml
//! frequency_hz = 5000
//!
//! [device]
//! name = "Polling GPIO keyboard driver"
//!
//! [[lines]]
//! label = "A"
//! line = 5
//! key = "KEY_A"
//! ```

use crate::error::{PollkbError, Result};
use crate::keys::KeyCode;
use crate::lines::{LineDescriptor, LineId};
use crate::poll::{DEFAULT_FREQUENCY_HZ, MAX_FREQUENCY_HZ};
use crate::sink::DeviceIdentity;
use std::collections::HashSet;

/// One `{ label, line, key }` entry of the line table.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "config", derive(serde::Serialize, serde::Deserialize))]
pub struct LineConfig {
    pub label: String,
    pub line: LineId,
    pub key: KeyCode,
}

impl LineConfig {
    pub fn new(label: impl Into<String>, line: LineId, key: KeyCode) -> Self {
        Self {
            label: label.into(),
            line,
            key,
        }
    }

    pub fn descriptor(&self) -> LineDescriptor {
        LineDescriptor::new(self.label.clone(), self.line, self.key)
    }
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(
    feature = "config",
    derive(serde::Serialize, serde::Deserialize),
    serde(default)
)]
pub struct KeyboardConfig {
    /// Nominal sampling frequency `F` in cycles per second
    pub frequency_hz: u32,
    /// Also declare a block of common keys so udev classifies the device as a keyboard
    pub udev_filler_keys: bool,
    /// Stack size in bytes for the poll thread; the platform default when unset
    #[cfg_attr(feature = "config", serde(skip_serializing_if = "Option::is_none"))]
    pub worker_stack_size: Option<usize>,
    /// Identity the sink registers with
    pub device: DeviceIdentity,
    pub lines: Vec<LineConfig>,
}

impl Default for KeyboardConfig {
    fn default() -> Self {
        Self {
            frequency_hz: DEFAULT_FREQUENCY_HZ,
            udev_filler_keys: true,
            worker_stack_size: None,
            device: DeviceIdentity::default(),
            lines: vec![
                LineConfig::new("A", 5, KeyCode::KEY_A),
                LineConfig::new("B", 6, KeyCode::KEY_B),
                LineConfig::new("C", 13, KeyCode::KEY_C),
                LineConfig::new("D", 19, KeyCode::KEY_D),
            ],
        }
    }
}

impl KeyboardConfig {
    /// Check the frequency range and that the line table is non-empty with unique,
    /// labelled lines.
    pub fn validate(&self) -> Result<()> {
        if self.frequency_hz == 0 || self.frequency_hz > MAX_FREQUENCY_HZ {
            return Err(PollkbError::InvalidFrequency {
                hz: self.frequency_hz,
            });
        }

        if self.lines.is_empty() {
            return Err(PollkbError::config("at least one line must be configured"));
        }

        let mut seen = HashSet::new();
        for entry in &self.lines {
            if entry.label.trim().is_empty() {
                return Err(PollkbError::config(format!(
                    "line {} has an empty label",
                    entry.line
                )));
            }
            if !seen.insert(entry.line) {
                return Err(PollkbError::config(format!(
                    "line {} is configured more than once",
                    entry.line
                )));
            }
        }

        Ok(())
    }

    /// Fresh, unclaimed descriptors in declaration order.
    pub fn descriptors(&self) -> impl Iterator<Item = LineDescriptor> + '_ {
        self.lines.iter().map(LineConfig::descriptor)
    }
}

#[cfg(feature = "config")]
mod file {
    use super::KeyboardConfig;
    use crate::error::{PollkbError, Result};
    use log::{debug, info};
    use std::path::{Path, PathBuf};

    impl KeyboardConfig {
        /// Parse and validate a TOML document.
        pub fn from_toml_str(contents: &str) -> Result<Self> {
            let config: Self = toml::from_str(contents)
                .map_err(|err| PollkbError::config(err.to_string()))?;
            config.validate()?;
            Ok(config)
        }

        pub fn to_toml_string(&self) -> Result<String> {
            toml::to_string_pretty(self).map_err(|err| PollkbError::config(err.to_string()))
        }

        pub fn load(path: &Path) -> Result<Self> {
            let contents = std::fs::read_to_string(path).map_err(|err| {
                PollkbError::config(format!("cannot read {}: {}", path.display(), err))
            })?;
            let config = Self::from_toml_str(&contents)?;
            info!("Loaded configuration from {}", path.display());
            Ok(config)
        }

        /// `<config_dir>/pollkb/config.toml`, if the platform has a config directory.
        pub fn default_path() -> Option<PathBuf> {
            dirs::config_dir().map(|dir| dir.join("pollkb").join("config.toml"))
        }

        /// Load the user configuration file, falling back to the built-in table.
        pub fn discover() -> Result<Self> {
            match Self::default_path() {
                Some(path) if path.is_file() => Self::load(&path),
                _ => {
                    debug!("No configuration file found, using built-in line table");
                    Ok(Self::default())
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_table_is_valid() {
        let config = KeyboardConfig::default();
        config.validate().unwrap();
        assert_eq!(config.frequency_hz, 5000);

        let lines: Vec<(LineId, KeyCode)> = config
            .descriptors()
            .map(|desc| (desc.line(), desc.key()))
            .collect();
        assert_eq!(
            lines,
            vec![
                (5, KeyCode::KEY_A),
                (6, KeyCode::KEY_B),
                (13, KeyCode::KEY_C),
                (19, KeyCode::KEY_D),
            ]
        );
    }

    #[test]
    fn validation_rejects_bad_tables() {
        let mut config = KeyboardConfig::default();
        config.frequency_hz = 0;
        assert!(matches!(
            config.validate(),
            Err(PollkbError::InvalidFrequency { hz: 0 })
        ));

        let mut config = KeyboardConfig::default();
        config.lines.push(LineConfig::new("dup", 5, KeyCode::KEY_E));
        assert!(matches!(
            config.validate(),
            Err(PollkbError::ConfigError { .. })
        ));

        let mut config = KeyboardConfig::default();
        config.lines.clear();
        assert!(config.validate().is_err());

        let mut config = KeyboardConfig::default();
        config.lines[0].label = "  ".to_string();
        assert!(config.validate().is_err());
    }

    #[cfg(feature = "config")]
    #[test]
    fn toml_overrides_defaults() {
        let config = KeyboardConfig::from_toml_str(
            r#"
            frequency_hz = 1000

            [device]
            name = "Test pad"

            [[lines]]
            label = "up"
            line = 17
            key = "KEY_UP"

            [[lines]]
            label = "fire"
            line = 27
            key = "space"
            "#,
        )
        .unwrap();

        assert_eq!(config.frequency_hz, 1000);
        assert_eq!(config.device.name, "Test pad");
        assert_eq!(config.device.phys, "pgpiokb/input0");
        assert!(config.udev_filler_keys);
        assert_eq!(
            config.lines,
            vec![
                LineConfig::new("up", 17, KeyCode::KEY_UP),
                LineConfig::new("fire", 27, KeyCode::KEY_SPACE),
            ]
        );
    }

    #[cfg(feature = "config")]
    #[test]
    fn toml_errors_are_config_errors() {
        let unknown_key = KeyboardConfig::from_toml_str(
            r#"
            [[lines]]
            label = "x"
            line = 1
            key = "KEY_NOPE"
            "#,
        );
        assert!(matches!(unknown_key, Err(PollkbError::ConfigError { .. })));

        let too_fast = KeyboardConfig::from_toml_str("frequency_hz = 2000000");
        assert!(matches!(
            too_fast,
            Err(PollkbError::InvalidFrequency { hz: 2_000_000 })
        ));
    }

    #[cfg(feature = "config")]
    #[test]
    fn load_reads_a_file_and_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let original = KeyboardConfig::default();
        std::fs::write(&path, original.to_toml_string().unwrap()).unwrap();

        assert_eq!(KeyboardConfig::load(&path).unwrap(), original);
        assert!(KeyboardConfig::load(&dir.path().join("missing.toml")).is_err());
    }
}
