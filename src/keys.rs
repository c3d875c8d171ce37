//! Symbolic key codes.
//!
//! Values follow the Linux input event codes (`linux/input-event-codes.h`) so that
//! they can be handed to a uinput device unchanged.

use std::fmt;
use std::str::FromStr;

/// A key identifier emitted when a line transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(
    feature = "config",
    derive(serde::Serialize, serde::Deserialize),
    serde(try_from = "String", into = "String")
)]
pub struct KeyCode(pub u16);

macro_rules! key_codes {
    ($($name:ident = $value:expr),* $(,)?) => {
        impl KeyCode {
            $(pub const $name: KeyCode = KeyCode($value);)*
        }

        const KEY_NAMES: &[(&str, KeyCode)] = &[$((stringify!($name), KeyCode($value))),*];
    };
}

key_codes! {
    KEY_ESC = 1,
    KEY_1 = 2,
    KEY_2 = 3,
    KEY_3 = 4,
    KEY_4 = 5,
    KEY_5 = 6,
    KEY_6 = 7,
    KEY_7 = 8,
    KEY_8 = 9,
    KEY_9 = 10,
    KEY_0 = 11,
    KEY_MINUS = 12,
    KEY_EQUAL = 13,
    KEY_BACKSPACE = 14,
    KEY_TAB = 15,
    KEY_Q = 16,
    KEY_W = 17,
    KEY_E = 18,
    KEY_R = 19,
    KEY_T = 20,
    KEY_Y = 21,
    KEY_U = 22,
    KEY_I = 23,
    KEY_O = 24,
    KEY_P = 25,
    KEY_LEFTBRACE = 26,
    KEY_RIGHTBRACE = 27,
    KEY_ENTER = 28,
    KEY_LEFTCTRL = 29,
    KEY_A = 30,
    KEY_S = 31,
    KEY_D = 32,
    KEY_F = 33,
    KEY_G = 34,
    KEY_H = 35,
    KEY_J = 36,
    KEY_K = 37,
    KEY_L = 38,
    KEY_SEMICOLON = 39,
    KEY_APOSTROPHE = 40,
    KEY_GRAVE = 41,
    KEY_LEFTSHIFT = 42,
    KEY_BACKSLASH = 43,
    KEY_Z = 44,
    KEY_X = 45,
    KEY_C = 46,
    KEY_V = 47,
    KEY_B = 48,
    KEY_N = 49,
    KEY_M = 50,
    KEY_COMMA = 51,
    KEY_DOT = 52,
    KEY_SLASH = 53,
    KEY_RIGHTSHIFT = 54,
    KEY_LEFTALT = 56,
    KEY_SPACE = 57,
    KEY_CAPSLOCK = 58,
    KEY_F1 = 59,
    KEY_F2 = 60,
    KEY_F3 = 61,
    KEY_F4 = 62,
    KEY_F5 = 63,
    KEY_F6 = 64,
    KEY_F7 = 65,
    KEY_F8 = 66,
    KEY_F9 = 67,
    KEY_F10 = 68,
    KEY_UP = 103,
    KEY_LEFT = 105,
    KEY_RIGHT = 106,
    KEY_DOWN = 108,
}

/// Keys declared on the sink even when no line uses them.
///
/// udev only tags an input device as a keyboard when it advertises a typical block
/// of alphanumeric keys.
pub const UDEV_FILLER_KEYS: &[KeyCode] = &[
    KeyCode::KEY_ESC,
    KeyCode::KEY_1,
    KeyCode::KEY_2,
    KeyCode::KEY_3,
    KeyCode::KEY_4,
    KeyCode::KEY_5,
    KeyCode::KEY_6,
    KeyCode::KEY_7,
    KeyCode::KEY_8,
    KeyCode::KEY_9,
    KeyCode::KEY_0,
    KeyCode::KEY_MINUS,
    KeyCode::KEY_EQUAL,
    KeyCode::KEY_BACKSPACE,
    KeyCode::KEY_TAB,
    KeyCode::KEY_Q,
    KeyCode::KEY_W,
    KeyCode::KEY_E,
    KeyCode::KEY_R,
    KeyCode::KEY_T,
    KeyCode::KEY_Y,
    KeyCode::KEY_U,
    KeyCode::KEY_I,
    KeyCode::KEY_O,
    KeyCode::KEY_P,
    KeyCode::KEY_LEFTBRACE,
    KeyCode::KEY_RIGHTBRACE,
    KeyCode::KEY_ENTER,
    KeyCode::KEY_LEFTCTRL,
    KeyCode::KEY_A,
    KeyCode::KEY_S,
    KeyCode::KEY_D,
];

impl KeyCode {
    /// Raw event code.
    pub fn code(self) -> u16 {
        self.0
    }

    /// Symbolic name (`"KEY_A"`), if the code is one of the known keys.
    pub fn name(self) -> Option<&'static str> {
        KEY_NAMES
            .iter()
            .find(|(_, key)| *key == self)
            .map(|(name, _)| *name)
    }
}

impl fmt::Display for KeyCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => f.write_str(name),
            None => write!(f, "KEY_{}", self.0),
        }
    }
}

/// Error returned when a key name cannot be resolved.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown key name: {0}")]
pub struct UnknownKey(pub String);

impl FromStr for KeyCode {
    type Err = UnknownKey;

    /// Accepts `KEY_A`, `a`, `A`, a raw numeric code such as `30`, or `KEY_30`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if let Ok(code) = trimmed.parse::<u16>() {
            return Ok(KeyCode(code));
        }

        let upper = trimmed.to_ascii_uppercase();
        let bare = upper.strip_prefix("KEY_").unwrap_or(upper.as_str());
        let wanted = format!("KEY_{bare}");

        if let Some((_, key)) = KEY_NAMES.iter().find(|(name, _)| *name == wanted) {
            return Ok(*key);
        }

        // Display writes unnamed codes as KEY_<n>
        match upper.strip_prefix("KEY_").map(str::parse::<u16>) {
            Some(Ok(code)) => Ok(KeyCode(code)),
            _ => Err(UnknownKey(s.to_string())),
        }
    }
}

impl TryFrom<String> for KeyCode {
    type Error = UnknownKey;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<KeyCode> for String {
    fn from(key: KeyCode) -> Self {
        key.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_codes_match_input_event_codes() {
        assert_eq!(KeyCode::KEY_A.code(), 30);
        assert_eq!(KeyCode::KEY_B.code(), 48);
        assert_eq!(KeyCode::KEY_C.code(), 46);
        assert_eq!(KeyCode::KEY_D.code(), 32);
    }

    #[test]
    fn parse_accepts_short_and_long_names() {
        assert_eq!("KEY_A".parse::<KeyCode>(), Ok(KeyCode::KEY_A));
        assert_eq!("b".parse::<KeyCode>(), Ok(KeyCode::KEY_B));
        assert_eq!(" enter ".parse::<KeyCode>(), Ok(KeyCode::KEY_ENTER));
        assert_eq!("30".parse::<KeyCode>(), Ok(KeyCode::KEY_A));
        assert!("KEY_NOPE".parse::<KeyCode>().is_err());
    }

    #[test]
    fn display_falls_back_to_number() {
        assert_eq!(KeyCode::KEY_LEFTCTRL.to_string(), "KEY_LEFTCTRL");
        assert_eq!(KeyCode(250).to_string(), "KEY_250");
        assert_eq!("KEY_250".parse::<KeyCode>(), Ok(KeyCode(250)));
        assert_eq!("KEY_1".parse::<KeyCode>(), Ok(KeyCode::KEY_1));
    }

    #[test]
    fn filler_keys_cover_the_default_table() {
        for key in [KeyCode::KEY_A, KeyCode::KEY_S, KeyCode::KEY_D] {
            assert!(UDEV_FILLER_KEYS.contains(&key));
        }
        assert_eq!(UDEV_FILLER_KEYS.len(), 32);
    }
}
