//! Completion marker stored in the `state` slot of a call record.

use serde_json::{json, Value};

/// Tri-state completion marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CallState {
    /// Waiting for the listener.
    Pending,
    /// The listener produced a result.
    Confirmed,
    /// The exchange was declined by the remote side.
    Cancelled,
}

impl CallState {
    /// Integer code persisted for this state.
    pub const fn code(self) -> u8 {
        match self {
            Self::Pending => 0,
            Self::Confirmed => 1,
            Self::Cancelled => 2,
        }
    }

    /// Persisted representation.
    pub fn to_value(self) -> Value {
        json!(self.code())
    }

    /// Decodes a persisted state.
    ///
    /// Accepts the bare integer as well as a string whose first character is the code, which is
    /// how a state carrying an associated value is written.
    pub fn from_value(value: Option<&Value>) -> Option<Self> {
        let code = match value? {
            Value::Number(number) => number.as_u64()?,
            Value::String(text) => u64::from(text.chars().next()?.to_digit(10)?),
            _ => return None,
        };
        match code {
            0 => Some(Self::Pending),
            1 => Some(Self::Confirmed),
            2 => Some(Self::Cancelled),
            _ => None,
        }
    }
}
