//! Resilient CDR read loop
//!
//! Drives a [`Transport`], a [`Decode`] implementation and a [`RecordSink`]
//! through the connection state machine:
//!
//! ```text
//! Disconnected -> Connecting -> Reading <-> Reconnecting -> Connecting
//!                       \            \             \
//!                        +------------+-------------+--> Stopped (cancelled)
//! ```
//!
//! Link failures reconnect, undecodable lines are skipped, and cancellation
//! returns `Ok`. An unrecoverable transport error or a closed sink ends the
//! loop with an error. Panics in the decoder or sink are not caught.

use crate::constants::{
    DEFAULT_OPEN_TIMEOUT_MS, DEFAULT_READ_TIMEOUT_MS, DEFAULT_RETRY_DELAY_SECS,
};
use crate::decoder::Decode;
use hipath_core::config::ReaderConfig;
use hipath_core::{DecodeError, RecordSink, Transport, TransportError};
use std::fmt;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Read loop timing, fixed for the lifetime of the loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadLoopConfig {
    /// Longest wait for one line
    pub read_timeout: Duration,
    /// Longest wait for the transport to open
    pub open_timeout: Duration,
    /// Pause between connection attempts
    pub retry_delay: Duration,
}

impl Default for ReadLoopConfig {
    fn default() -> Self {
        Self {
            read_timeout: Duration::from_millis(DEFAULT_READ_TIMEOUT_MS),
            open_timeout: Duration::from_millis(DEFAULT_OPEN_TIMEOUT_MS),
            retry_delay: Duration::from_secs(DEFAULT_RETRY_DELAY_SECS),
        }
    }
}

impl From<&ReaderConfig> for ReadLoopConfig {
    fn from(config: &ReaderConfig) -> Self {
        Self {
            read_timeout: config.read_timeout(),
            open_timeout: config.open_timeout(),
            retry_delay: config.retry_delay(),
        }
    }
}

/// Connection state of the read loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Disconnected,
    Connecting,
    Reading,
    Reconnecting,
    Stopped,
}

impl fmt::Display for LoopState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LoopState::Disconnected => "disconnected",
            LoopState::Connecting => "connecting",
            LoopState::Reading => "reading",
            LoopState::Reconnecting => "reconnecting",
            LoopState::Stopped => "stopped",
        };
        f.write_str(name)
    }
}

/// Counters for one run of the loop
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoopStats {
    pub lines_read: u64,
    pub records_pushed: u64,
    pub decode_failures: u64,
    pub reconnects: u64,
    pub open_failures: u64,
}

/// Conditions that end the loop abnormally
#[derive(Error, Debug)]
pub enum ReadLoopError {
    #[error("Unrecoverable transport error on {endpoint}: {source}")]
    Transport {
        endpoint: String,
        #[source]
        source: TransportError,
    },

    #[error("Record sink closed after {pushed} records")]
    SinkClosed { pushed: u64 },
}

/// Observer for lines the decoder rejected
pub type DecodeHook = Box<dyn Fn(&[u8], &DecodeError) + Send + Sync>;

enum ReadOutcome {
    Cancelled,
    LinkLost(TransportError),
}

/// Single-worker CDR read loop
pub struct ReadLoop<T, D, S> {
    transport: T,
    decoder: D,
    sink: S,
    config: ReadLoopConfig,
    cancel: CancellationToken,
    state: watch::Sender<LoopState>,
    on_decode_error: Option<DecodeHook>,
    stats: LoopStats,
}

impl<T, D, S> ReadLoop<T, D, S>
where
    T: Transport,
    D: Decode,
    S: RecordSink,
{
    pub fn new(
        transport: T,
        decoder: D,
        sink: S,
        config: ReadLoopConfig,
        cancel: CancellationToken,
    ) -> Self {
        let (state, _) = watch::channel(LoopState::Disconnected);
        Self {
            transport,
            decoder,
            sink,
            config,
            cancel,
            state,
            on_decode_error: None,
            stats: LoopStats::default(),
        }
    }

    /// Call `hook` with every line the decoder rejects
    pub fn with_decode_hook<F>(mut self, hook: F) -> Self
    where
        F: Fn(&[u8], &DecodeError) + Send + Sync + 'static,
    {
        self.on_decode_error = Some(Box::new(hook));
        self
    }

    /// Follow state transitions from another task
    pub fn subscribe_state(&self) -> watch::Receiver<LoopState> {
        self.state.subscribe()
    }

    pub fn state(&self) -> LoopState {
        *self.state.borrow()
    }

    /// Run until cancelled
    ///
    /// Returns the loop counters on cancellation. The transport is closed on
    /// every exit path that returns.
    pub async fn run(mut self) -> Result<LoopStats, ReadLoopError> {
        let endpoint = self.transport.endpoint();
        info!(endpoint = %endpoint, "Starting CDR read loop");

        let result = self.drive().await;

        if self.transport.is_open() {
            self.transport.close().await;
        }
        self.set_state(LoopState::Stopped);

        match result {
            Ok(()) => {
                info!(
                    endpoint = %endpoint,
                    lines = self.stats.lines_read,
                    records = self.stats.records_pushed,
                    rejected = self.stats.decode_failures,
                    reconnects = self.stats.reconnects,
                    "CDR read loop stopped"
                );
                Ok(self.stats)
            }
            Err(e) => {
                error!(endpoint = %endpoint, error = %e, "CDR read loop failed");
                Err(e)
            }
        }
    }

    async fn drive(&mut self) -> Result<(), ReadLoopError> {
        loop {
            self.set_state(LoopState::Connecting);
            if !self.connect().await? {
                return Ok(());
            }

            self.set_state(LoopState::Reading);
            match self.read_lines().await? {
                ReadOutcome::Cancelled => return Ok(()),
                ReadOutcome::LinkLost(err) => {
                    self.set_state(LoopState::Reconnecting);
                    warn!(
                        endpoint = %self.transport.endpoint(),
                        code = err.error_code(),
                        error = %err,
                        retry_in = ?self.config.retry_delay,
                        "CDR link lost, reconnecting"
                    );
                    self.transport.close().await;
                    self.stats.reconnects += 1;

                    if !pause(&self.cancel, self.config.retry_delay).await {
                        return Ok(());
                    }
                }
            }
        }
    }

    /// Open the transport, retrying until it succeeds
    ///
    /// Returns `false` when cancelled first.
    async fn connect(&mut self) -> Result<bool, ReadLoopError> {
        loop {
            if self.cancel.is_cancelled() {
                return Ok(false);
            }

            let open = tokio::time::timeout(self.config.open_timeout, self.transport.open());
            let attempt = tokio::select! {
                opened = open => match opened {
                    Ok(result) => result,
                    Err(_) => Err(TransportError::Connection(format!(
                        "open timed out after {:?}",
                        self.config.open_timeout
                    ))),
                },
                // An abandoned open leaves the transport closed
                _ = self.cancel.cancelled() => return Ok(false),
            };

            match attempt {
                Ok(()) => {
                    info!(endpoint = %self.transport.endpoint(), "CDR link open");
                    return Ok(true);
                }
                Err(err) if err.is_recoverable() => {
                    self.stats.open_failures += 1;
                    warn!(
                        endpoint = %self.transport.endpoint(),
                        code = err.error_code(),
                        error = %err,
                        retry_in = ?self.config.retry_delay,
                        "Failed to open CDR link"
                    );
                    if !pause(&self.cancel, self.config.retry_delay).await {
                        return Ok(false);
                    }
                }
                Err(err) => return Err(self.fatal(err)),
            }
        }
    }

    async fn read_lines(&mut self) -> Result<ReadOutcome, ReadLoopError> {
        loop {
            if self.cancel.is_cancelled() {
                return Ok(ReadOutcome::Cancelled);
            }

            let raw = match self.transport.read_line(self.config.read_timeout).await {
                Ok(raw) => raw,
                Err(TransportError::Timeout) => continue,
                Err(err) if err.is_recoverable() => return Ok(ReadOutcome::LinkLost(err)),
                Err(err) => return Err(self.fatal(err)),
            };
            self.stats.lines_read += 1;

            if self.cancel.is_cancelled() {
                debug!("Dropping CDR line read after cancellation");
                return Ok(ReadOutcome::Cancelled);
            }

            match self.decoder.decode(&raw) {
                Ok(record) => {
                    tokio::select! {
                        pushed = self.sink.push(record) => {
                            pushed.map_err(|_| ReadLoopError::SinkClosed {
                                pushed: self.stats.records_pushed,
                            })?;
                            self.stats.records_pushed += 1;
                        }
                        _ = self.cancel.cancelled() => {
                            debug!("Cancelled while the record sink was full");
                            return Ok(ReadOutcome::Cancelled);
                        }
                    }
                }
                Err(err) => self.reject(&raw, err),
            }
        }
    }

    fn reject(&mut self, raw: &[u8], err: DecodeError) {
        self.stats.decode_failures += 1;

        if err == DecodeError::EmptyLine {
            debug!("Skipping empty CDR line");
        } else {
            warn!(
                code = err.error_code(),
                error = %err,
                line = %String::from_utf8_lossy(raw),
                "Discarding undecodable CDR line"
            );
        }

        if let Some(hook) = &self.on_decode_error {
            hook(raw, &err);
        }
    }

    fn fatal(&self, source: TransportError) -> ReadLoopError {
        ReadLoopError::Transport {
            endpoint: self.transport.endpoint(),
            source,
        }
    }

    fn set_state(&self, next: LoopState) {
        let previous = self.state.send_replace(next);
        if previous != next {
            debug!(from = %previous, to = %next, "Read loop state change");
        }
    }
}

/// Sleep for `delay` unless cancelled first; `false` when cancelled
async fn pause(cancel: &CancellationToken, delay: Duration) -> bool {
    tokio::select! {
        _ = cancel.cancelled() => false,
        _ = tokio::time::sleep(delay) => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_from_reader_settings() {
        let reader = ReaderConfig {
            read_timeout_ms: 250,
            open_timeout_ms: 3000,
            retry_delay_secs: 2,
        };
        let config = ReadLoopConfig::from(&reader);
        assert_eq!(config.read_timeout, Duration::from_millis(250));
        assert_eq!(config.open_timeout, Duration::from_secs(3));
        assert_eq!(config.retry_delay, Duration::from_secs(2));
    }

    #[test]
    fn test_state_names() {
        assert_eq!(LoopState::Reconnecting.to_string(), "reconnecting");
        assert_eq!(LoopState::Stopped.to_string(), "stopped");
    }
}
