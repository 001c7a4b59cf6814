//! Symbolic keys and chord grammar ("CTRL+SHIFT+TAB").

use std::{fmt, str::FromStr};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum KeyParseError {
    #[error("empty key chord")]
    Empty,
    #[error("unsupported key token: {0}")]
    Unknown(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Key {
    Ctrl,
    Alt,
    Shift,
    Super,
    Tab,
    Minus,
    Equal,
    Up,
    Down,
    Left,
    Right,
    Home,
    End,
    PageUp,
    PageDown,
    Enter,
    Escape,
    Space,
    Backspace,
    Delete,
    /// F1..=F12
    Function(u8),
    /// Uppercase ASCII letter.
    Letter(char),
    /// 0..=9
    Digit(u8),
}

impl Key {
    /// Every key the grammar can name; the virtual device registers all of them.
    pub fn all() -> Vec<Key> {
        let mut v = vec![
            Key::Ctrl,
            Key::Alt,
            Key::Shift,
            Key::Super,
            Key::Tab,
            Key::Minus,
            Key::Equal,
            Key::Up,
            Key::Down,
            Key::Left,
            Key::Right,
            Key::Home,
            Key::End,
            Key::PageUp,
            Key::PageDown,
            Key::Enter,
            Key::Escape,
            Key::Space,
            Key::Backspace,
            Key::Delete,
        ];
        v.extend((1..=12).map(Key::Function));
        v.extend(('A'..='Z').map(Key::Letter));
        v.extend((0..=9).map(Key::Digit));
        v
    }
}

impl FromStr for Key {
    type Err = KeyParseError;

    fn from_str(tok: &str) -> Result<Self, Self::Err> {
        let up = tok.trim().to_ascii_uppercase();
        let k = match up.as_str() {
            "CTRL" | "CONTROL" | "LEFTCONTROL" => Key::Ctrl,
            "ALT" | "OPTION" | "LEFTALT" => Key::Alt,
            "SHIFT" | "LEFTSHIFT" => Key::Shift,
            "SUPER" | "META" | "WIN" | "CMD" | "COMMAND" | "LEFTSUPER" => Key::Super,
            "TAB" => Key::Tab,
            "MINUS" | "-" => Key::Minus,
            "EQUAL" | "=" => Key::Equal,
            "UP" | "UPARROW" => Key::Up,
            "DOWN" | "DOWNARROW" => Key::Down,
            "LEFT" | "LEFTARROW" => Key::Left,
            "RIGHT" | "RIGHTARROW" => Key::Right,
            "HOME" => Key::Home,
            "END" => Key::End,
            "PAGEUP" | "PGUP" => Key::PageUp,
            "PAGEDOWN" | "PGDOWN" => Key::PageDown,
            "ENTER" | "RETURN" => Key::Enter,
            "ESC" | "ESCAPE" => Key::Escape,
            "SPACE" => Key::Space,
            "BACKSPACE" => Key::Backspace,
            "DELETE" | "DEL" => Key::Delete,
            s if s.len() == 1 && s.as_bytes()[0].is_ascii_uppercase() => {
                Key::Letter(s.as_bytes()[0] as char)
            }
            s if s.len() == 1 && s.as_bytes()[0].is_ascii_digit() => {
                Key::Digit(s.as_bytes()[0] - b'0')
            }
            s if s.starts_with('F') => match s[1..].parse::<u8>() {
                Ok(n) if (1..=12).contains(&n) => Key::Function(n),
                _ => return Err(KeyParseError::Unknown(tok.trim().to_string())),
            },
            _ => return Err(KeyParseError::Unknown(tok.trim().to_string())),
        };
        Ok(k)
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Function(n) => write!(f, "F{n}"),
            Key::Letter(c) => write!(f, "{c}"),
            Key::Digit(d) => write!(f, "{d}"),
            other => write!(f, "{}", format!("{other:?}").to_ascii_uppercase()),
        }
    }
}

/// Keys pressed in order and released in reverse.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyChord(pub Vec<Key>);

impl KeyChord {
    pub fn keys(&self) -> &[Key] {
        &self.0
    }
}

impl FromStr for KeyChord {
    type Err = KeyParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().is_empty() {
            return Err(KeyParseError::Empty);
        }
        let keys = s
            .split('+')
            .map(str::parse)
            .collect::<Result<Vec<Key>, _>>()?;
        Ok(KeyChord(keys))
    }
}

impl fmt::Display for KeyChord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.0.iter().map(Key::to_string).collect();
        f.write_str(&parts.join("+"))
    }
}

impl<'de> serde::Deserialize<'de> for KeyChord {
    fn deserialize<D: serde::Deserializer<'de>>(de: D) -> Result<Self, D::Error> {
        let s = String::deserialize(de)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

impl serde::Serialize for KeyChord {
    fn serialize<S: serde::Serializer>(&self, ser: S) -> Result<S::Ok, S::Error> {
        ser.serialize_str(&self.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_aliases_and_case() {
        let c: KeyChord = "cmd+Shift+tab".parse().unwrap();
        assert_eq!(c.keys(), &[Key::Super, Key::Shift, Key::Tab]);
        let c: KeyChord = "Control+PgUp".parse().unwrap();
        assert_eq!(c.keys(), &[Key::Ctrl, Key::PageUp]);
    }

    #[test]
    fn parses_letters_digits_and_function_keys() {
        let c: KeyChord = "SUPER+L".parse().unwrap();
        assert_eq!(c.keys(), &[Key::Super, Key::Letter('L')]);
        assert_eq!("f11".parse::<Key>().unwrap(), Key::Function(11));
        assert_eq!("7".parse::<Key>().unwrap(), Key::Digit(7));
    }

    #[test]
    fn rejects_unknown_tokens() {
        assert_eq!(
            "CTRL+F13".parse::<KeyChord>(),
            Err(KeyParseError::Unknown("F13".into()))
        );
        assert_eq!("  ".parse::<KeyChord>(), Err(KeyParseError::Empty));
    }

    #[test]
    fn display_is_parseable() {
        let c: KeyChord = "ctrl+alt+right".parse().unwrap();
        assert_eq!(c.to_string(), "CTRL+ALT+RIGHT");
        assert_eq!(c.to_string().parse::<KeyChord>().unwrap(), c);
    }
}
