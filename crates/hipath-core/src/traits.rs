//! Seams between the read loop and its collaborators
//!
//! The read loop owns one [`Transport`] and one [`RecordSink`]. Both are
//! traits so the loop can be driven by scripted fakes in tests.

use crate::error::{SinkError, TransportError};
use crate::models::Record;
use async_trait::async_trait;
use bytes::Bytes;
use std::time::Duration;

/// Byte-stream link to the switch's CDR port
///
/// Implementations are exclusively owned by a single read loop and are never
/// shared between tasks.
#[async_trait]
pub trait Transport: Send {
    /// Open the link
    ///
    /// Fails with `TransportError::Connection` when the device is absent or
    /// busy, which the caller retries.
    async fn open(&mut self) -> Result<(), TransportError>;

    /// Close the link. Closing a closed transport is a no-op.
    async fn close(&mut self);

    /// Read one line with its terminator removed
    ///
    /// Waits at most `timeout` and returns `TransportError::Timeout` when
    /// nothing arrived, so the caller can re-check cancellation.
    async fn read_line(&mut self, timeout: Duration) -> Result<Bytes, TransportError>;

    /// Whether the link is currently open
    fn is_open(&self) -> bool;

    /// Human-readable endpoint name for logs (device path or address)
    fn endpoint(&self) -> String;
}

/// Downstream consumer of decoded records
///
/// A push either hands the whole record over or fails. It may wait for
/// capacity, so callers race it against their own shutdown signal.
#[async_trait]
pub trait RecordSink: Send + Sync {
    /// Hand one record over to the consumer
    async fn push(&self, record: Record) -> Result<(), SinkError>;
}

#[async_trait]
impl<S: RecordSink + ?Sized> RecordSink for std::sync::Arc<S> {
    async fn push(&self, record: Record) -> Result<(), SinkError> {
        (**self).push(record).await
    }
}
