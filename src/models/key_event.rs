use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub enum KeyEventKind {
    Press,
    Release,
}

impl KeyEventKind {
    /// Single-letter code used in exported tables.
    pub fn as_code(&self) -> &'static str {
        match self {
            KeyEventKind::Press => "P",
            KeyEventKind::Release => "R",
        }
    }

    pub fn as_u8(&self) -> u8 {
        match self {
            KeyEventKind::Press => 0,
            KeyEventKind::Release => 1,
        }
    }

    pub fn from_u8(value: u8) -> Self {
        if value == 0 {
            KeyEventKind::Press
        } else {
            KeyEventKind::Release
        }
    }
}

/// One recorded key transition. `timestamp` is milliseconds relative to the
/// capture origin (sub-millisecond resolution).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyEvent {
    pub kind: KeyEventKind,
    pub key: String,
    pub timestamp: f64,
}

impl KeyEvent {
    pub fn new(kind: KeyEventKind, key: impl Into<String>, timestamp: f64) -> Self {
        Self {
            kind,
            key: key.into(),
            timestamp,
        }
    }

    pub fn press(key: impl Into<String>, timestamp: f64) -> Self {
        Self::new(KeyEventKind::Press, key, timestamp)
    }

    pub fn release(key: impl Into<String>, timestamp: f64) -> Self {
        Self::new(KeyEventKind::Release, key, timestamp)
    }
}

/// Where a key signal was dispatched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub enum SignalTarget {
    /// The task's designated text field.
    TextField,
    #[default]
    Elsewhere,
}

/// A physical key-down or key-up signal as delivered by the page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeySignal {
    /// Hardware position, e.g. `KeyA` or `ShiftLeft`.
    pub code: String,
    /// Layout-dependent key value, e.g. `a`, `A`, `Shift`.
    pub key: String,
    #[serde(default)]
    pub target: SignalTarget,
    #[serde(default)]
    pub shift: bool,
}

impl KeySignal {
    pub fn new(code: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            key: key.into(),
            target: SignalTarget::Elsewhere,
            shift: false,
        }
    }

    pub fn in_text_field(mut self) -> Self {
        self.target = SignalTarget::TextField;
        self
    }

    pub fn with_shift(mut self) -> Self {
        self.shift = true;
        self
    }
}
