use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::Error;

/// Registration serial number
///
/// Rendered zero-padded to [`SerialNumber::WIDTH`] digits. Values past the
/// padding width simply grow longer; they are never truncated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct SerialNumber(u64);

impl SerialNumber {
    /// Number of digits a serial is padded to
    pub const WIDTH: usize = 6;

    pub fn new(value: u64) -> Self {
        Self(value)
    }

    pub fn value(&self) -> u64 {
        self.0
    }

    /// The serial directly after this one
    pub fn next(&self) -> Self {
        Self(self.0.saturating_add(1))
    }
}

impl fmt::Display for SerialNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:0width$}", self.0, width = Self::WIDTH)
    }
}

impl FromStr for SerialNumber {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() || !trimmed.bytes().all(|b| b.is_ascii_digit()) {
            return Err(Error::InvalidSerial(s.to_string()));
        }
        trimmed
            .parse::<u64>()
            .map(Self)
            .map_err(|_| Error::InvalidSerial(s.to_string()))
    }
}

impl From<SerialNumber> for String {
    fn from(serial: SerialNumber) -> Self {
        serial.to_string()
    }
}

impl TryFrom<String> for SerialNumber {
    type Error = Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_padding() {
        assert_eq!(SerialNumber::new(819).to_string(), "000819");
        assert_eq!(SerialNumber::new(0).to_string(), "000000");
        assert_eq!(SerialNumber::new(1_234_567).to_string(), "1234567");
    }

    #[test]
    fn test_parse_padded() {
        let serial: SerialNumber = "000819".parse().unwrap();
        assert_eq!(serial.value(), 819);
        assert_eq!(serial.next().to_string(), "000820");
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!("".parse::<SerialNumber>().is_err());
        assert!("00a819".parse::<SerialNumber>().is_err());
        assert!("-12".parse::<SerialNumber>().is_err());
    }

    #[test]
    fn test_serde_as_string() {
        let json = serde_json::to_string(&SerialNumber::new(42)).unwrap();
        assert_eq!(json, "\"000042\"");

        let parsed: SerialNumber = serde_json::from_str("\"000042\"").unwrap();
        assert_eq!(parsed, SerialNumber::new(42));
    }
}
