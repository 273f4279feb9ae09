//! Siemens HiPath CDR serial adapter
//!
//! This crate turns the call-detail record stream a HiPath switch prints on
//! its serial CDR port into [`Record`](hipath_core::Record) values.
//!
//! # Features
//!
//! - Fixed-column line decoding driven by a calibratable column table
//! - Line framing with overlong-line protection
//! - Device node and TCP (serial device server) transports
//! - A read loop that reconnects on link failures, skips malformed lines,
//!   and stops cleanly on cancellation
//!
//! # Architecture
//!
//! ```text
//!  HiPath CDR port
//!         |
//!         v
//!  Transport (device / TCP) + CdrLineCodec
//!         |
//!         v
//!  ReadLoop (connect / read / reconnect)
//!         |
//!         v
//!  LineDecoder (fixed columns)
//!         |
//!         v
//!  RecordSink (queue)
//! ```
//!
//! # Example Usage
//!
//! ```rust,ignore
//! use hipath_serial::{DeviceTransport, LineDecoder, ReadLoop, ReadLoopConfig};
//! use tokio_util::sync::CancellationToken;
//!
//! let transport = DeviceTransport::new("/dev/ttyUSB0", 9600, 512);
//! let cancel = CancellationToken::new();
//! let read_loop = ReadLoop::new(
//!     transport,
//!     LineDecoder::default(),
//!     queue,
//!     ReadLoopConfig::default(),
//!     cancel.clone(),
//! );
//! let stats = read_loop.run().await?;
//! ```

pub mod codec;
pub mod decoder;
pub mod read_loop;
pub mod transport;

pub use codec::CdrLineCodec;
pub use decoder::{Decode, LineDecoder};
pub use read_loop::{LoopState, LoopStats, ReadLoop, ReadLoopConfig, ReadLoopError};
pub use transport::{DeviceTransport, TcpTransport};

/// Serial adapter constants
pub mod constants {
    /// Line terminator written by the switch
    pub const LINE_TERMINATOR: u8 = b'\n';

    /// Carriage return some firmware writes before the terminator
    pub const CARRIAGE_RETURN: u8 = b'\r';

    /// Default longest accepted line
    pub const DEFAULT_MAX_LINE_LENGTH: usize = 512;

    /// Default wait for one line in milliseconds
    pub const DEFAULT_READ_TIMEOUT_MS: u64 = 1000;

    /// Default wait for the link to open in milliseconds
    pub const DEFAULT_OPEN_TIMEOUT_MS: u64 = 5000;

    /// Default pause between connection attempts in seconds
    pub const DEFAULT_RETRY_DELAY_SECS: u64 = 5;
}
