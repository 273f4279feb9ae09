//! Byte-stream transports for the CDR port
//!
//! Two links are supported:
//!
//! - [`DeviceTransport`] reads a local serial port such as `/dev/ttyUSB0`
//!   at the configured baud rate (8N1, no flow control).
//! - [`TcpTransport`] reads from a serial device server that exposes the
//!   switch's CDR port as a raw TCP socket.
//!
//! Both frame the stream with [`CdrLineCodec`] and bound every read with a
//! timeout so the caller can re-check cancellation.

use crate::codec::CdrLineCodec;
use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use hipath_core::{Transport, TransportError};
use std::io;
use std::pin::Pin;
use std::time::Duration;
use tokio::io::AsyncRead;
use tokio::net::TcpStream;
use tokio_serial::SerialPortBuilderExt;
use tokio_util::codec::FramedRead;
use tracing::{debug, info};

type LineStream = FramedRead<Pin<Box<dyn AsyncRead + Send>>, CdrLineCodec>;

/// Wait at most `timeout` for the next framed line
async fn next_line(
    stream: &mut Option<LineStream>,
    timeout: Duration,
) -> Result<Bytes, TransportError> {
    let framed = stream
        .as_mut()
        .ok_or_else(|| TransportError::Connection("transport is not open".to_string()))?;

    match tokio::time::timeout(timeout, framed.next()).await {
        Err(_) => Err(TransportError::Timeout),
        Ok(Some(Ok(line))) => Ok(line),
        Ok(Some(Err(e))) => Err(TransportError::from_io(e)),
        Ok(None) => Err(TransportError::Connection("end of stream".to_string())),
    }
}

fn framed<R: AsyncRead + Send + 'static>(reader: R, max_line_length: usize) -> LineStream {
    let reader: Pin<Box<dyn AsyncRead + Send>> = Box::pin(reader);
    FramedRead::new(reader, CdrLineCodec::new(max_line_length))
}

/// Classify a failure to open a serial port
fn serial_error(path: &str, err: tokio_serial::Error) -> TransportError {
    let message = format!("{}: {}", path, err);
    match err.kind() {
        tokio_serial::ErrorKind::InvalidInput => TransportError::Fatal(message),
        tokio_serial::ErrorKind::Io(kind) => TransportError::from_io(io::Error::new(kind, message)),
        _ => TransportError::Connection(message),
    }
}

/// Local serial port
///
/// The port is registered with the runtime's reactor, so an idle read never
/// occupies a blocking thread and runtime shutdown is not held up by it.
pub struct DeviceTransport {
    path: String,
    baud_rate: u32,
    max_line_length: usize,
    stream: Option<LineStream>,
}

impl DeviceTransport {
    pub fn new(path: impl Into<String>, baud_rate: u32, max_line_length: usize) -> Self {
        Self {
            path: path.into(),
            baud_rate,
            max_line_length,
            stream: None,
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }
}

#[async_trait]
impl Transport for DeviceTransport {
    async fn open(&mut self) -> Result<(), TransportError> {
        if self.path.trim().is_empty() {
            return Err(TransportError::Fatal("device path is empty".to_string()));
        }

        let port = tokio_serial::new(self.path.as_str(), self.baud_rate)
            .data_bits(tokio_serial::DataBits::Eight)
            .parity(tokio_serial::Parity::None)
            .stop_bits(tokio_serial::StopBits::One)
            .flow_control(tokio_serial::FlowControl::None)
            .open_native_async()
            .map_err(|e| serial_error(&self.path, e))?;

        info!(
            device = %self.path,
            baud_rate = self.baud_rate,
            "Opened CDR device"
        );

        self.stream = Some(framed(port, self.max_line_length));
        Ok(())
    }

    async fn close(&mut self) {
        if self.stream.take().is_some() {
            debug!(device = %self.path, "Closed CDR device");
        }
    }

    async fn read_line(&mut self, timeout: Duration) -> Result<Bytes, TransportError> {
        next_line(&mut self.stream, timeout).await
    }

    fn is_open(&self) -> bool {
        self.stream.is_some()
    }

    fn endpoint(&self) -> String {
        self.path.clone()
    }
}

/// Serial device server speaking raw TCP
pub struct TcpTransport {
    host: String,
    port: u16,
    max_line_length: usize,
    stream: Option<LineStream>,
}

impl TcpTransport {
    pub fn new(host: impl Into<String>, port: u16, max_line_length: usize) -> Self {
        Self {
            host: host.into(),
            port,
            max_line_length,
            stream: None,
        }
    }
}

#[async_trait]
impl Transport for TcpTransport {
    async fn open(&mut self) -> Result<(), TransportError> {
        if self.host.trim().is_empty() || self.port == 0 {
            return Err(TransportError::Fatal(format!(
                "invalid device server address {}",
                self.endpoint()
            )));
        }

        let socket = TcpStream::connect((self.host.as_str(), self.port))
            .await
            .map_err(|e| TransportError::Connection(format!("{}: {}", self.endpoint(), e)))?;

        info!(server = %self.endpoint(), "Connected to CDR device server");

        self.stream = Some(framed(socket, self.max_line_length));
        Ok(())
    }

    async fn close(&mut self) {
        if self.stream.take().is_some() {
            debug!(server = %self.endpoint(), "Closed CDR device server connection");
        }
    }

    async fn read_line(&mut self, timeout: Duration) -> Result<Bytes, TransportError> {
        next_line(&mut self.stream, timeout).await
    }

    fn is_open(&self) -> bool {
        self.stream.is_some()
    }

    fn endpoint(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
