//! Delivery of decoded records
//!
//! The forwarder drains the record queue on its own task. With a collection
//! API configured each record is POSTed as JSON and retried until the API
//! accepts it; otherwise records are written to the log.

use hipath_core::config::CollectorConfig;
use hipath_core::Record;
use reqwest::{Client, ClientBuilder};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

/// Delivery failures
#[derive(Debug, Error)]
pub enum ForwarderError {
    #[error("Client error: {0}")]
    Client(String),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Timeout: request took longer than {0}ms")]
    Timeout(u64),

    #[error("HTTP error: status {0}")]
    HttpError(u16),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl ForwarderError {
    /// Whether the same record may succeed on another attempt
    pub fn is_retryable(&self) -> bool {
        !matches!(self, ForwarderError::Client(_) | ForwarderError::Serialization(_))
    }
}

/// Where records end up
#[derive(Debug, Clone)]
pub enum Delivery {
    /// POST each record to the collection API
    Http {
        client: Client,
        url: String,
        timeout: Duration,
    },
    /// Log each record as JSON
    Log,
}

impl Delivery {
    pub fn http(url: &str, request_timeout: Duration) -> Result<Self, ForwarderError> {
        let client = ClientBuilder::new()
            .timeout(request_timeout)
            .pool_idle_timeout(Duration::from_secs(90))
            .tcp_keepalive(Duration::from_secs(60))
            .build()
            .map_err(|e| ForwarderError::Client(e.to_string()))?;

        Ok(Delivery::Http {
            client,
            url: url.to_string(),
            timeout: request_timeout,
        })
    }

    fn describe(&self) -> &str {
        match self {
            Delivery::Http { url, .. } => url,
            Delivery::Log => "log",
        }
    }
}

/// Delivery counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ForwarderStats {
    pub delivered: u64,
    pub failed_attempts: u64,
    pub dropped: u64,
}

/// Queue consumer task
pub struct Forwarder {
    rx: mpsc::Receiver<Record>,
    delivery: Delivery,
    retry_delay: Duration,
    cancel: CancellationToken,
    stats: ForwarderStats,
}

impl Forwarder {
    pub fn new(
        rx: mpsc::Receiver<Record>,
        delivery: Delivery,
        retry_delay: Duration,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            rx,
            delivery,
            retry_delay,
            cancel,
            stats: ForwarderStats::default(),
        }
    }

    /// Build the forwarder described by the `collector` config section
    pub fn from_config(
        rx: mpsc::Receiver<Record>,
        config: &CollectorConfig,
        cancel: CancellationToken,
    ) -> Result<Self, ForwarderError> {
        let delivery = match &config.api_url {
            Some(url) => Delivery::http(url, config.request_timeout())?,
            None => Delivery::Log,
        };

        Ok(Self::new(rx, delivery, config.retry_delay(), cancel))
    }

    pub fn delivery(&self) -> &Delivery {
        &self.delivery
    }

    /// Deliver records until the queue closes or the token is cancelled
    ///
    /// Records already queued when cancellation arrives get one more
    /// delivery attempt each.
    pub async fn run(mut self) -> ForwarderStats {
        info!(target_endpoint = %self.delivery.describe(), "Starting record forwarder");

        loop {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                next = self.rx.recv() => match next {
                    Some(record) => self.forward(record).await,
                    None => {
                        debug!("Record queue closed");
                        break;
                    }
                },
            }
        }

        while let Ok(record) = self.rx.try_recv() {
            self.forward(record).await;
        }

        info!(
            delivered = self.stats.delivered,
            dropped = self.stats.dropped,
            failed_attempts = self.stats.failed_attempts,
            "Record forwarder stopped"
        );
        self.stats
    }

    async fn forward(&mut self, record: Record) {
        loop {
            match deliver(&self.delivery, &record).await {
                Ok(()) => {
                    self.stats.delivered += 1;
                    return;
                }
                Err(e) if e.is_retryable() && !self.cancel.is_cancelled() => {
                    self.stats.failed_attempts += 1;
                    warn!(
                        error = %e,
                        retry_in = ?self.retry_delay,
                        "Record delivery failed, retrying"
                    );

                    let resumed = tokio::select! {
                        _ = self.cancel.cancelled() => false,
                        _ = tokio::time::sleep(self.retry_delay) => true,
                    };
                    if !resumed {
                        self.stats.dropped += 1;
                        error!(error = %e, "Dropping undelivered record on shutdown");
                        return;
                    }
                }
                Err(e) => {
                    self.stats.failed_attempts += 1;
                    self.stats.dropped += 1;
                    error!(error = %e, number = %record.number, "Dropping undeliverable record");
                    return;
                }
            }
        }
    }
}

#[instrument(skip(delivery, record), fields(extension = %record.extension))]
async fn deliver(delivery: &Delivery, record: &Record) -> Result<(), ForwarderError> {
    match delivery {
        Delivery::Log => {
            let json = serde_json::to_string(record)
                .map_err(|e| ForwarderError::Serialization(e.to_string()))?;
            info!(record = %json, "CDR record");
            Ok(())
        }
        Delivery::Http {
            client,
            url,
            timeout,
        } => {
            let response = client.post(url).json(record).send().await.map_err(|e| {
                if e.is_timeout() {
                    ForwarderError::Timeout(timeout.as_millis() as u64)
                } else if e.is_builder() {
                    ForwarderError::Client(e.to_string())
                } else {
                    ForwarderError::Connection(e.to_string())
                }
            })?;

            let status = response.status();
            if !status.is_success() {
                return Err(ForwarderError::HttpError(status.as_u16()));
            }

            debug!(status = status.as_u16(), "Record delivered");
            Ok(())
        }
    }
}
