//! Call record model
//!
//! Represents one call event as reported by the switch on its CDR port.

use chrono::NaiveDateTime;
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Single-digit call type code reported by the switch
///
/// The meaning is switch-specific. Codes 1 and 2 are answered incoming and
/// outgoing calls, 0 an unanswered attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct CallType(u8);

impl CallType {
    pub const UNANSWERED: CallType = CallType(0);
    pub const ANSWERED_INCOMING: CallType = CallType(1);
    pub const ANSWERED_OUTGOING: CallType = CallType(2);

    /// Build a call type from its digit, `None` outside `0..=9`
    pub fn new(code: u8) -> Option<Self> {
        (code <= 9).then_some(Self(code))
    }

    /// Build a call type from its ASCII digit
    pub fn from_digit(byte: u8) -> Option<Self> {
        byte.is_ascii_digit().then(|| Self(byte - b'0'))
    }

    pub fn code(self) -> u8 {
        self.0
    }

    /// Answered calls must report ring and talk time
    #[inline]
    pub fn is_answered(self) -> bool {
        self == Self::ANSWERED_INCOMING || self == Self::ANSWERED_OUTGOING
    }
}

impl TryFrom<u8> for CallType {
    type Error = String;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        Self::new(code).ok_or_else(|| format!("call type out of range: {}", code))
    }
}

impl From<CallType> for u8 {
    fn from(call_type: CallType) -> Self {
        call_type.0
    }
}

impl fmt::Display for CallType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Error returned when a time span is not `MM:SS` or `HH:MM:SS`
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid call duration: {0:?}")]
pub struct InvalidDuration(pub String);

/// Ring or talk time of a call, at one-second resolution
///
/// Displays and serializes as `HH:MM:SS`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct CallDuration(u32);

impl CallDuration {
    pub fn from_secs(secs: u32) -> Self {
        Self(secs)
    }

    pub fn from_hms(hours: u32, minutes: u32, seconds: u32) -> Self {
        Self(hours * 3600 + minutes * 60 + seconds)
    }

    pub fn as_secs(self) -> u32 {
        self.0
    }
}

impl FromStr for CallDuration {
    type Err = InvalidDuration;

    /// Parses `HH:MM:SS` or the short `MM:SS` form
    ///
    /// Every component is exactly two ASCII digits; minutes and seconds stay
    /// below 60.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || InvalidDuration(s.to_string());

        let parts: Vec<&str> = s.split(':').collect();
        if parts.len() < 2 || parts.len() > 3 {
            return Err(invalid());
        }

        let mut values = [0u32; 3];
        let offset = 3 - parts.len();
        for (i, part) in parts.iter().enumerate() {
            if part.len() != 2 || !part.bytes().all(|b| b.is_ascii_digit()) {
                return Err(invalid());
            }
            values[offset + i] = part.parse().map_err(|_| invalid())?;
        }

        let [hours, minutes, seconds] = values;
        if minutes >= 60 || seconds >= 60 {
            return Err(invalid());
        }

        Ok(Self::from_hms(hours, minutes, seconds))
    }
}

impl fmt::Display for CallDuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let hours = self.0 / 3600;
        let minutes = (self.0 % 3600) / 60;
        let seconds = self.0 % 60;
        write!(f, "{:02}:{:02}:{:02}", hours, minutes, seconds)
    }
}

impl Serialize for CallDuration {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for CallDuration {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(de::Error::custom)
    }
}

/// Decoded call-detail record
///
/// Built once from a single CDR line and never modified afterwards. Blank
/// columns are carried as empty strings or `None`, never as zero.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    /// Event time from the switch clock (`None` while the clock is unset)
    pub timestamp: Option<NaiveDateTime>,

    /// Switch call type code
    pub call_type: CallType,

    /// Internal station or trunk identifier (may be empty)
    pub extension: String,

    /// Line index on the switch
    pub line: Option<u16>,

    /// Dialled or calling number, marker characters kept verbatim
    pub number: String,

    /// Ring time before answer
    pub ring: Option<CallDuration>,

    /// Talk time
    pub duration: Option<CallDuration>,

    /// Charge units reported for the call
    pub units: Option<u32>,

    /// Content after the line column (account code on some firmware)
    pub trailer: Option<String>,
}

impl Record {
    /// Check if the switch reported this call as answered
    #[inline]
    pub fn is_answered(&self) -> bool {
        self.call_type.is_answered()
    }

    /// First timing field an answered call is missing, if any
    pub fn missing_answered_field(&self) -> Option<&'static str> {
        if !self.is_answered() {
            return None;
        }
        if self.ring.is_none() {
            return Some("ring");
        }
        if self.duration.is_none() {
            return Some("duration");
        }
        None
    }

    /// Check if the number column holds digits the switch could not capture
    pub fn has_number_markers(&self) -> bool {
        self.number.bytes().any(|b| !b.is_ascii_digit())
    }
}
