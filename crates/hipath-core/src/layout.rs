//! Fixed-column layout of a HiPath CDR line
//!
//! The switch writes each call as a fixed-width text record. Which byte
//! ranges hold which field depends on the PBX firmware, so the boundaries
//! live in this table instead of in the decoder. The defaults are calibrated
//! against traffic captured from HiPath 3000 series switches:
//!
//! ```text
//! 0               16 19    25   30      38                              70  74 76
//! |dd.mm.yyHH:MM:SS|ct|ext  |ring|durat. |number                        |unit|ln|trailer...
//! 11.04.1900:35:48  1   10400:0100:00:070876153281                           1
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;

/// Width of the `dd.mm.yyHH:MM:SS` timestamp column
pub const TIMESTAMP_WIDTH: usize = 16;

/// Half-open byte range `[start, end)` of one column
///
/// `end = None` extends the column to the end of the line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    pub start: usize,
    #[serde(default)]
    pub end: Option<usize>,
}

impl Column {
    pub const fn new(start: usize, end: usize) -> Self {
        Self { start, end: Some(end) }
    }

    pub const fn open_ended(start: usize) -> Self {
        Self { start, end: None }
    }

    /// Width in bytes, `None` for an open-ended column
    pub fn width(&self) -> Option<usize> {
        self.end.map(|end| end.saturating_sub(self.start))
    }

    /// Slice this column out of `line`, clipped to the line's length
    ///
    /// A column starting past the end of the line yields an empty slice.
    pub fn slice<'a>(&self, line: &'a [u8]) -> &'a [u8] {
        let end = self.end.unwrap_or(line.len()).min(line.len());
        let start = self.start.min(end);
        &line[start..end]
    }
}

impl fmt::Display for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.end {
            Some(end) => write!(f, "[{}, {})", self.start, end),
            None => write!(f, "[{}, ..)", self.start),
        }
    }
}

/// Column table for one firmware's CDR format
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColumnLayout {
    /// Lines shorter than this are rejected before any slicing
    pub min_width: usize,
    pub timestamp: Column,
    pub call_type: Column,
    pub extension: Column,
    pub ring: Column,
    pub duration: Column,
    pub number: Column,
    pub units: Column,
    pub line: Column,
    pub trailer: Column,
}

impl Default for ColumnLayout {
    fn default() -> Self {
        Self {
            min_width: 76,
            timestamp: Column::new(0, 16),
            call_type: Column::new(16, 19),
            extension: Column::new(19, 25),
            ring: Column::new(25, 30),
            duration: Column::new(30, 38),
            number: Column::new(38, 70),
            units: Column::new(70, 74),
            line: Column::new(74, 76),
            trailer: Column::open_ended(76),
        }
    }
}

impl ColumnLayout {
    /// Named columns in table order
    pub fn columns(&self) -> [(&'static str, Column); 9] {
        [
            ("timestamp", self.timestamp),
            ("call_type", self.call_type),
            ("extension", self.extension),
            ("ring", self.ring),
            ("duration", self.duration),
            ("number", self.number),
            ("units", self.units),
            ("line", self.line),
            ("trailer", self.trailer),
        ]
    }

    /// Check the table is usable by the decoder
    ///
    /// Every bounded column must be non-empty, the timestamp column must be
    /// exactly 16 bytes wide, and `min_width` must cover the timestamp and
    /// call-type columns so those are never clipped.
    pub fn validate(&self) -> Result<(), String> {
        for (name, column) in self.columns() {
            if column.width() == Some(0) {
                return Err(format!("column {} {} is empty", name, column));
            }
        }

        if self.timestamp.width() != Some(TIMESTAMP_WIDTH) {
            return Err(format!(
                "timestamp column {} must be {} bytes wide",
                self.timestamp, TIMESTAMP_WIDTH
            ));
        }

        for (name, column) in [("timestamp", self.timestamp), ("call_type", self.call_type)] {
            match column.end {
                Some(end) if end <= self.min_width => {}
                _ => {
                    return Err(format!(
                        "column {} {} must end within min_width {}",
                        name, column, self.min_width
                    ))
                }
            }
        }

        Ok(())
    }
}

/// How strictly answered calls must report their timings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequiredFieldPolicy {
    /// Call types 1 and 2 must carry ring and duration
    Strict,
    /// Answered calls may have blank timing columns
    #[default]
    Lenient,
}
