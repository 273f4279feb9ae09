//! Error taxonomy for the HiPath CDR logger
//!
//! Failures fall in three groups and are handled differently:
//!
//! - [`TransportError`]: the serial link dropped, is busy, or had nothing to
//!   say yet. Recoverable by re-polling or reconnecting.
//! - [`DecodeError`]: one line of dirty data. The line is discarded and the
//!   stream continues.
//! - Everything else is fatal and ends the read loop.

use std::io;
use thiserror::Error;

/// Why a single CDR line could not be turned into a record
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("Empty line")]
    EmptyLine,

    #[error("Line too short: {len} bytes, layout needs at least {min}")]
    ShortLine { len: usize, min: usize },

    #[error("Invalid timestamp: {0:?}")]
    BadTimestamp(String),

    #[error("Invalid call type: {0:?}")]
    BadCallType(String),

    #[error("Invalid {field} duration: {value:?}")]
    BadDuration { field: &'static str, value: String },

    #[error("Non-digit characters in {field}: {value:?}")]
    BadDigits { field: &'static str, value: String },

    #[error("Missing required field for call type {call_type}: {field}")]
    MissingRequiredField { field: &'static str, call_type: u8 },
}

impl DecodeError {
    /// Returns the error code for structured logs
    pub fn error_code(&self) -> &'static str {
        match self {
            DecodeError::EmptyLine => "empty_line",
            DecodeError::ShortLine { .. } => "short_line",
            DecodeError::BadTimestamp(_) => "bad_timestamp",
            DecodeError::BadCallType(_) => "bad_call_type",
            DecodeError::BadDuration { .. } => "bad_duration",
            DecodeError::BadDigits { .. } => "bad_digits",
            DecodeError::MissingRequiredField { .. } => "missing_required_field",
        }
    }
}

/// Failures reported by a [`crate::Transport`]
#[derive(Error, Debug)]
pub enum TransportError {
    /// Nothing arrived within the read timeout. Not a reason to reconnect.
    #[error("Read timed out")]
    Timeout,

    /// Link-level failure: device absent or busy, cable pulled, peer gone
    #[error("Connection error: {0}")]
    Connection(String),

    /// Condition no reconnect can fix, such as an invalid device setting
    #[error("Unrecoverable transport error: {0}")]
    Fatal(String),
}

impl TransportError {
    /// Check if the read loop should reconnect after this error
    #[inline]
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, TransportError::Fatal(_))
    }

    /// Returns the error code for structured logs
    pub fn error_code(&self) -> &'static str {
        match self {
            TransportError::Timeout => "timeout",
            TransportError::Connection(_) => "connection_error",
            TransportError::Fatal(_) => "transport_fatal",
        }
    }

    /// Classify an I/O error from opening or reading a link
    ///
    /// Configuration mistakes are fatal, anything the hardware or the network
    /// can recover from is a connection error.
    pub fn from_io(err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => TransportError::Timeout,
            io::ErrorKind::InvalidInput | io::ErrorKind::Unsupported => {
                TransportError::Fatal(err.to_string())
            }
            _ => TransportError::Connection(err.to_string()),
        }
    }
}

impl From<io::Error> for TransportError {
    fn from(err: io::Error) -> Self {
        TransportError::from_io(err)
    }
}

/// Failures reported by a [`crate::RecordSink`]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SinkError {
    /// The consumer is gone; no record pushed from now on can be delivered
    #[error("Record sink closed")]
    Closed,
}

/// Application-level error type
///
/// Used by configuration loading and process wiring.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid column layout: {0}")]
    Layout(String),
}

impl AppError {
    /// Returns the error code for structured logs
    pub fn error_code(&self) -> &'static str {
        match self {
            AppError::Config(_) => "config_error",
            AppError::Validation(_) => "validation_error",
            AppError::Layout(_) => "layout_error",
        }
    }
}

// ==================== From implementations ====================

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::Config(err.to_string())
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        AppError::Validation(err.to_string())
    }
}
