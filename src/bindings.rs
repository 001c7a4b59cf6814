//! Profile-declared gesture bindings ("key:CTRL+TAB", "mouse:middle").

use anyhow::Result;
use std::str::FromStr;
use thiserror::Error;

use crate::actions::{Button, InputSink};
use crate::keys::{KeyChord, KeyParseError};

#[derive(Debug, Error)]
pub enum BindingError {
    #[error("invalid action '{0}' (expected key:<chord> or mouse:<button>)")]
    Invalid(String),
    #[error(transparent)]
    Key(#[from] KeyParseError),
    #[error("{0}")]
    Button(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Binding {
    Key(KeyChord),
    Mouse(Button),
}

impl FromStr for Binding {
    type Err = BindingError;

    fn from_str(action: &str) -> Result<Self, Self::Err> {
        let action = action.trim();
        if let Some(rest) = action.strip_prefix("key:") {
            return Ok(Binding::Key(rest.trim().parse()?));
        }
        if let Some(rest) = action.strip_prefix("mouse:") {
            let b = rest
                .parse::<Button>()
                .map_err(|e| BindingError::Button(e.to_string()))?;
            return Ok(Binding::Mouse(b));
        }
        Err(BindingError::Invalid(action.to_string()))
    }
}

impl Binding {
    pub fn run(&self, sink: &mut dyn InputSink) -> Result<()> {
        match self {
            Binding::Key(chord) => sink.key_chord(chord),
            Binding::Mouse(b) => sink.click(*b),
        }
    }
}
