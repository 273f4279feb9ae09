//! Line framing for the CDR byte stream
//!
//! Splits the raw stream on `\n`, strips an optional `\r`, and drops lines
//! longer than the configured maximum instead of buffering without bound.
//! Line content is passed through as bytes; decoding is the decoder's job.

use crate::constants::{CARRIAGE_RETURN, DEFAULT_MAX_LINE_LENGTH, LINE_TERMINATOR};
use bytes::{Buf, Bytes, BytesMut};
use std::io;
use tokio_util::codec::Decoder;
use tracing::{debug, warn};

/// Newline framing with a line length limit
#[derive(Debug, Clone)]
pub struct CdrLineCodec {
    max_length: usize,
    // Bytes already scanned for a terminator
    next_index: usize,
    discarding: bool,
    discarded: u64,
}

impl CdrLineCodec {
    pub fn new(max_length: usize) -> Self {
        Self {
            max_length,
            next_index: 0,
            discarding: false,
            discarded: 0,
        }
    }

    pub fn max_length(&self) -> usize {
        self.max_length
    }

    /// Number of overlong lines dropped so far
    pub fn discarded(&self) -> u64 {
        self.discarded
    }
}

impl Default for CdrLineCodec {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_LINE_LENGTH)
    }
}

impl Decoder for CdrLineCodec {
    type Item = Bytes;
    type Error = io::Error;

    fn decode(&mut self, buf: &mut BytesMut) -> Result<Option<Bytes>, io::Error> {
        loop {
            let read_to = buf.len().min(self.max_length.saturating_add(1));
            let terminator = buf[self.next_index..read_to]
                .iter()
                .position(|b| *b == LINE_TERMINATOR);

            match (self.discarding, terminator) {
                (true, Some(offset)) => {
                    // End of the overlong line, resume framing after it
                    buf.advance(self.next_index + offset + 1);
                    self.discarding = false;
                    self.next_index = 0;
                }
                (true, None) => {
                    buf.advance(read_to);
                    self.next_index = 0;
                    if buf.is_empty() {
                        return Ok(None);
                    }
                }
                (false, Some(offset)) => {
                    let end = self.next_index + offset;
                    self.next_index = 0;

                    let mut line = buf.split_to(end + 1);
                    line.truncate(end);
                    if line.last() == Some(&CARRIAGE_RETURN) {
                        line.truncate(end - 1);
                    }
                    return Ok(Some(line.freeze()));
                }
                (false, None) if buf.len() > self.max_length => {
                    warn!(
                        max_length = self.max_length,
                        "Discarding CDR line longer than the maximum line length"
                    );
                    self.discarding = true;
                    self.discarded += 1;
                }
                (false, None) => {
                    self.next_index = read_to;
                    return Ok(None);
                }
            }
        }
    }

    fn decode_eof(&mut self, buf: &mut BytesMut) -> Result<Option<Bytes>, io::Error> {
        if let Some(line) = self.decode(buf)? {
            return Ok(Some(line));
        }

        // A fragment without terminator is a record cut off by the link drop
        if !buf.is_empty() {
            debug!(bytes = buf.len(), "Dropping unterminated fragment at end of stream");
            buf.clear();
        }
        self.next_index = 0;
        self.discarding = false;
        Ok(None)
    }
}
