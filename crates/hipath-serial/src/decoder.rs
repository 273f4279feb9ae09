//! Fixed-column CDR line decoder
//!
//! A HiPath CDR line is a fixed-width text record. Blank columns are padded
//! with spaces rather than marked by a placeholder, so the decoder slices by
//! byte offset (see [`ColumnLayout`]) and never splits on whitespace.
//!
//! Decoding is pure: no I/O, no state, and the same bytes always produce the
//! same [`Record`] or the same [`DecodeError`].

use chrono::{NaiveDate, NaiveDateTime};
use hipath_core::{
    AppError, CallDuration, CallType, ColumnLayout, DecodeError, Record, RequiredFieldPolicy,
};

/// Turns one raw line into a record
///
/// The read loop is generic over this trait so a decoder can be swapped
/// without touching the loop.
pub trait Decode: Send + Sync {
    fn decode(&self, raw: &[u8]) -> Result<Record, DecodeError>;
}

/// Decoder for the HiPath fixed-column CDR format
#[derive(Debug, Clone, Default)]
pub struct LineDecoder {
    layout: ColumnLayout,
    policy: RequiredFieldPolicy,
}

impl LineDecoder {
    /// Create a decoder for a validated column layout
    pub fn new(layout: ColumnLayout, policy: RequiredFieldPolicy) -> Result<Self, AppError> {
        layout.validate().map_err(AppError::Layout)?;
        Ok(Self { layout, policy })
    }

    /// Default layout with the given required-field policy
    pub fn with_policy(policy: RequiredFieldPolicy) -> Self {
        Self {
            layout: ColumnLayout::default(),
            policy,
        }
    }

    pub fn layout(&self) -> &ColumnLayout {
        &self.layout
    }

    pub fn policy(&self) -> RequiredFieldPolicy {
        self.policy
    }

    /// Decode one line with its terminator removed
    pub fn decode_line(&self, raw: &[u8]) -> Result<Record, DecodeError> {
        let line = strip_terminator(raw);

        if trim(line).is_empty() {
            return Err(DecodeError::EmptyLine);
        }

        if line.len() < self.layout.min_width {
            return Err(DecodeError::ShortLine {
                len: line.len(),
                min: self.layout.min_width,
            });
        }

        let layout = &self.layout;
        let timestamp = parse_timestamp(layout.timestamp.slice(line))?;
        let call_type = parse_call_type(layout.call_type.slice(line))?;
        let extension = parse_digits("extension", layout.extension.slice(line))?;
        let ring = parse_duration("ring", layout.ring.slice(line))?;
        let duration = parse_duration("duration", layout.duration.slice(line))?;
        let number = text(trim(layout.number.slice(line)));
        let units = parse_number::<u32>("units", layout.units.slice(line))?;
        let line_index = parse_number::<u16>("line", layout.line.slice(line))?;
        let trailer = Some(text(trim(layout.trailer.slice(line)))).filter(|t| !t.is_empty());

        let record = Record {
            timestamp,
            call_type,
            extension,
            line: line_index,
            number,
            ring,
            duration,
            units,
            trailer,
        };

        if self.policy == RequiredFieldPolicy::Strict {
            if let Some(field) = record.missing_answered_field() {
                return Err(DecodeError::MissingRequiredField {
                    field,
                    call_type: call_type.code(),
                });
            }
        }

        Ok(record)
    }
}

impl Decode for LineDecoder {
    fn decode(&self, raw: &[u8]) -> Result<Record, DecodeError> {
        self.decode_line(raw)
    }
}

fn strip_terminator(raw: &[u8]) -> &[u8] {
    let mut end = raw.len();
    while end > 0 && matches!(raw[end - 1], b'\r' | b'\n') {
        end -= 1;
    }
    &raw[..end]
}

fn trim(bytes: &[u8]) -> &[u8] {
    let start = bytes
        .iter()
        .position(|b| !b.is_ascii_whitespace())
        .unwrap_or(bytes.len());
    let end = bytes
        .iter()
        .rposition(|b| !b.is_ascii_whitespace())
        .map_or(start, |i| i + 1);
    &bytes[start..end]
}

fn text(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}

/// `dd.mm.yyHH:MM:SS`; an all-zero date is the switch's unset clock
fn parse_timestamp(raw: &[u8]) -> Result<Option<NaiveDateTime>, DecodeError> {
    let bad = || DecodeError::BadTimestamp(text(raw));

    const SEPARATORS: [(usize, u8); 4] = [(2, b'.'), (5, b'.'), (10, b':'), (13, b':')];
    if raw.len() != 16 {
        return Err(bad());
    }
    for (i, byte) in raw.iter().enumerate() {
        let expected = SEPARATORS.iter().find(|(pos, _)| *pos == i).map(|(_, sep)| *sep);
        let ok = match expected {
            Some(sep) => *byte == sep,
            None => byte.is_ascii_digit(),
        };
        if !ok {
            return Err(bad());
        }
    }

    let pair = |at: usize| u32::from(raw[at] - b'0') * 10 + u32::from(raw[at + 1] - b'0');
    let (day, month, year) = (pair(0), pair(3), pair(6));
    let (hour, minute, second) = (pair(8), pair(11), pair(14));

    if hour >= 24 || minute >= 60 || second >= 60 {
        return Err(bad());
    }

    if day == 0 && month == 0 && year == 0 {
        return Ok(None);
    }

    NaiveDate::from_ymd_opt(2000 + year as i32, month, day)
        .and_then(|date| date.and_hms_opt(hour, minute, second))
        .map(Some)
        .ok_or_else(bad)
}

fn parse_call_type(raw: &[u8]) -> Result<CallType, DecodeError> {
    match trim(raw) {
        [digit] => CallType::from_digit(*digit).ok_or_else(|| DecodeError::BadCallType(text(raw))),
        _ => Err(DecodeError::BadCallType(text(raw))),
    }
}

fn parse_digits(field: &'static str, raw: &[u8]) -> Result<String, DecodeError> {
    let value = trim(raw);
    if !value.iter().all(u8::is_ascii_digit) {
        return Err(DecodeError::BadDigits {
            field,
            value: text(value),
        });
    }
    Ok(text(value))
}

/// Blank is `None`, never zero
fn parse_number<T: std::str::FromStr>(
    field: &'static str,
    raw: &[u8],
) -> Result<Option<T>, DecodeError> {
    let digits = parse_digits(field, raw)?;
    if digits.is_empty() {
        return Ok(None);
    }
    digits
        .parse()
        .map(Some)
        .map_err(|_| DecodeError::BadDigits { field, value: digits })
}

fn parse_duration(field: &'static str, raw: &[u8]) -> Result<Option<CallDuration>, DecodeError> {
    let value = trim(raw);
    if value.is_empty() {
        return Ok(None);
    }
    std::str::from_utf8(value)
        .ok()
        .and_then(|s| s.parse().ok())
        .map(Some)
        .ok_or_else(|| DecodeError::BadDuration {
            field,
            value: text(value),
        })
}
