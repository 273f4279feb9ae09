//! Decoder behavior over captured switch output

mod common;

use common::{ANSWERED_WITHOUT_TIMINGS, CAPTURE};
use hipath_core::{CallDuration, DecodeError, RequiredFieldPolicy};
use hipath_serial::LineDecoder;
use proptest::prelude::*;

fn lenient() -> LineDecoder {
    LineDecoder::with_policy(RequiredFieldPolicy::Lenient)
}

#[test]
fn test_capture_decodes_leniently() {
    let decoder = lenient();
    for (i, line) in CAPTURE.iter().enumerate() {
        let record = decoder
            .decode_line(line.as_bytes())
            .unwrap_or_else(|e| panic!("line {i} rejected: {e}"));
        assert!(
            record.extension.chars().all(|c| c.is_ascii_digit()),
            "line {i}"
        );
    }
}

#[test]
fn test_strict_rejects_only_answered_lines_without_timings() {
    let decoder = LineDecoder::with_policy(RequiredFieldPolicy::Strict);
    for (i, line) in CAPTURE.iter().enumerate() {
        let result = decoder.decode_line(line.as_bytes());
        if ANSWERED_WITHOUT_TIMINGS.contains(&i) {
            assert!(
                matches!(result, Err(DecodeError::MissingRequiredField { .. })),
                "line {i} should be rejected"
            );
        } else {
            let record = result.unwrap_or_else(|e| panic!("line {i} rejected: {e}"));
            if record.is_answered() {
                assert!(record.ring.is_some() && record.duration.is_some());
            }
        }
    }
}

#[test]
fn test_capture_field_samples() {
    let decoder = lenient();

    let record = decoder.decode_line(CAPTURE[28].as_bytes()).unwrap();
    assert_eq!(record.extension, "14");
    assert_eq!(record.duration, Some(CallDuration::from_hms(5, 42, 43)));
    assert_eq!(record.number, "38449434444495598376");
    assert_eq!(record.units, Some(245));
    assert_eq!(record.line, Some(2));

    let record = decoder.decode_line(CAPTURE[29].as_bytes()).unwrap();
    assert_eq!(record.number, "1234567890123412????");
    assert!(record.has_number_markers());

    let record = decoder.decode_line(CAPTURE[24].as_bytes()).unwrap();
    assert_eq!(record.call_type.code(), 4);
    assert_eq!(record.line, Some(2));
    assert_eq!(record.trailer.as_deref(), Some("902725  841"));

    let record = decoder.decode_line(CAPTURE[25].as_bytes()).unwrap();
    assert_eq!(record.number, "834756");
    assert_eq!(record.line, Some(2));
    assert_eq!(
        record.trailer.as_deref(),
        Some("12345678901                 2")
    );

    let record = decoder.decode_line(CAPTURE[53].as_bytes()).unwrap();
    assert_eq!(record.call_type.code(), 8);
    assert_eq!(record.extension, "");
    assert_eq!(record.units, Some(23));
}

#[test]
fn test_line_digit_stays_out_of_trailer() {
    let decoder = lenient();

    // Two legs of the same call on lines 0 and 1
    let first = decoder.decode_line(CAPTURE[20].as_bytes()).unwrap();
    let second = decoder.decode_line(CAPTURE[21].as_bytes()).unwrap();
    assert_eq!(first.number, "0248873711");
    assert_eq!(first.line, Some(0));
    assert_eq!(first.trailer.as_deref(), Some("4416"));
    assert_eq!(second.line, Some(1));
    assert_eq!(second.trailer.as_deref(), Some("54416"));

    for (i, line) in CAPTURE.iter().enumerate() {
        let record = decoder.decode_line(line.as_bytes()).unwrap();
        assert!(record.line.map_or(true, |l| l < 10), "line {i}");
    }
}

#[test]
fn test_default_decoder_accepts_whole_capture() {
    let decoder = LineDecoder::default();
    for (i, line) in CAPTURE.iter().enumerate() {
        decoder
            .decode_line(line.as_bytes())
            .unwrap_or_else(|e| panic!("line {i} rejected: {e}"));
    }
}

#[test]
fn test_capture_with_crlf_terminators() {
    let decoder = lenient();
    for line in CAPTURE.iter() {
        let terminated = format!("{line}\r\n");
        assert_eq!(
            decoder.decode_line(terminated.as_bytes()),
            decoder.decode_line(line.as_bytes())
        );
    }
}

proptest! {
    #[test]
    fn prop_short_lines_never_decode(line in "[ -~]{1,75}") {
        let result = lenient().decode_line(line.as_bytes());
        if line.trim().is_empty() {
            prop_assert_eq!(result, Err(DecodeError::EmptyLine));
        } else {
            let is_short = matches!(result, Err(DecodeError::ShortLine { .. }));
            prop_assert!(is_short);
        }
    }

    #[test]
    fn prop_decoding_is_deterministic(raw in proptest::collection::vec(any::<u8>(), 0..160)) {
        let decoder = lenient();
        prop_assert_eq!(decoder.decode_line(&raw), decoder.decode_line(&raw));
    }

    #[test]
    fn prop_number_column_kept_verbatim(number in "[0-9?*#]{1,32}") {
        let line = format!("11.04.1900:35:48  1   10400:0100:00:07{:<32}     1", number);
        let record = lenient().decode_line(line.as_bytes()).unwrap();
        prop_assert_eq!(record.number, number);
    }
}
