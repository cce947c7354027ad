//! Validated 4-digit PIN

use crate::error::AuthError;
use std::fmt;

/// Number of digits in a camera PIN
pub const PIN_LENGTH: usize = 4;

/// A PIN that has passed format validation
#[derive(Clone, PartialEq, Eq)]
pub struct Pin(String);

impl Pin {
    /// Accept exactly four ASCII digits
    pub fn parse(pin: &str) -> Result<Self, AuthError> {
        if pin.len() == PIN_LENGTH && pin.bytes().all(|b| b.is_ascii_digit()) {
            Ok(Self(pin.to_string()))
        } else {
            Err(AuthError::InvalidPinFormat)
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

// Never print the digits
impl fmt::Debug for Pin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Pin(****)")
    }
}

impl std::str::FromStr for Pin {
    type Err = AuthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}
