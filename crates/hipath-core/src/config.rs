//! Application configuration
//!
//! This module provides centralized configuration management using the `config` crate.
//! Configuration can be loaded from environment variables and config files.

use crate::error::AppError;
use crate::layout::{ColumnLayout, RequiredFieldPolicy};
use config::{Config, Environment, File};
use serde::Deserialize;
use std::env;
use std::time::Duration;
use validator::Validate;

/// Main application configuration
#[derive(Debug, Deserialize, Clone, Default, Validate)]
pub struct AppConfig {
    #[serde(default)]
    #[validate(nested)]
    pub transport: TransportConfig,

    #[serde(default)]
    #[validate(nested)]
    pub reader: ReaderConfig,

    #[serde(default)]
    pub decoder: DecoderConfig,

    #[serde(default)]
    #[validate(nested)]
    pub collector: CollectorConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Which link carries the CDR stream
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    /// Local character device such as `/dev/ttyUSB0`
    #[default]
    Device,
    /// Serial device server reachable over TCP
    Tcp,
}

/// Serial link configuration
#[derive(Debug, Deserialize, Clone, Validate)]
pub struct TransportConfig {
    #[serde(default)]
    pub kind: TransportKind,

    /// Device node path (device transport)
    #[serde(default = "default_device")]
    pub device: String,

    /// Line speed set on the device when it is opened
    #[serde(default = "default_baud_rate")]
    #[validate(range(min = 300, max = 115200))]
    pub baud_rate: u32,

    /// Device server host (tcp transport)
    #[serde(default = "default_host")]
    pub host: String,

    /// Device server port (tcp transport)
    #[serde(default = "default_port")]
    #[validate(range(min = 1))]
    pub port: u16,

    /// Longest line accepted before it is discarded
    #[serde(default = "default_max_line_length")]
    #[validate(range(min = 80, max = 65536))]
    pub max_line_length: usize,
}

fn default_device() -> String {
    "/dev/ttyUSB0".to_string()
}

fn default_baud_rate() -> u32 {
    9600
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    4001
}

fn default_max_line_length() -> usize {
    512
}

/// Read loop timing
#[derive(Debug, Deserialize, Clone, Validate)]
pub struct ReaderConfig {
    /// Longest wait for one line before cancellation is re-checked
    #[serde(default = "default_read_timeout")]
    #[validate(range(min = 1, max = 60000))]
    pub read_timeout_ms: u64,

    /// Longest wait for the link to open
    #[serde(default = "default_open_timeout")]
    #[validate(range(min = 1))]
    pub open_timeout_ms: u64,

    /// Pause between connection attempts
    #[serde(default = "default_retry_delay")]
    #[validate(range(min = 1))]
    pub retry_delay_secs: u64,
}

fn default_read_timeout() -> u64 {
    1000
}

fn default_open_timeout() -> u64 {
    5000
}

fn default_retry_delay() -> u64 {
    5
}

impl ReaderConfig {
    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    pub fn open_timeout(&self) -> Duration {
        Duration::from_millis(self.open_timeout_ms)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_secs(self.retry_delay_secs)
    }
}

/// Line decoder configuration
#[derive(Debug, Deserialize, Clone, Default)]
pub struct DecoderConfig {
    #[serde(default)]
    pub policy: RequiredFieldPolicy,

    #[serde(default)]
    pub layout: ColumnLayout,
}

/// Downstream collection API
#[derive(Debug, Deserialize, Clone, Validate)]
pub struct CollectorConfig {
    /// Endpoint records are POSTed to; records are only logged when unset
    #[serde(default)]
    #[validate(url)]
    pub api_url: Option<String>,

    /// Records buffered between the read loop and the forwarder
    #[serde(default = "default_queue_capacity")]
    #[validate(range(min = 1))]
    pub queue_capacity: usize,

    /// Per-request timeout
    #[serde(default = "default_request_timeout")]
    #[validate(range(min = 1))]
    pub request_timeout_secs: u64,

    /// Pause before a failed delivery is retried
    #[serde(default = "default_retry_delay")]
    #[validate(range(min = 1))]
    pub retry_delay_secs: u64,
}

fn default_queue_capacity() -> usize {
    1024
}

fn default_request_timeout() -> u64 {
    10
}

impl CollectorConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_secs(self.retry_delay_secs)
    }
}

/// Log output configuration
#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Emit JSON lines instead of human-readable output
    #[serde(default)]
    pub json: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl AppConfig {
    /// Load configuration from environment and optional config file
    ///
    /// A `.env` file is not read here; the binary loads it before calling this.
    pub fn load() -> Result<Self, AppError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".to_string());

        let config = Config::builder()
            // Start with default values
            .set_default("transport.kind", "device")?
            .set_default("transport.device", default_device())?
            .set_default("reader.read_timeout_ms", default_read_timeout())?
            .set_default("reader.retry_delay_secs", default_retry_delay())?
            .set_default("logging.level", default_log_level())?
            // Load config file if exists
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", run_mode)).required(false))
            // Load from environment variables with HIPATH prefix
            .add_source(
                Environment::with_prefix("HIPATH")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        Ok(config.try_deserialize()?)
    }

    /// Check value ranges and the column layout
    pub fn validate_all(&self) -> Result<(), AppError> {
        self.validate()?;
        self.decoder.layout.validate().map_err(AppError::Layout)?;
        Ok(())
    }

    /// Endpoint name of the configured link, for logs
    pub fn endpoint(&self) -> String {
        match self.transport.kind {
            TransportKind::Device => self.transport.device.clone(),
            TransportKind::Tcp => format!("{}:{}", self.transport.host, self.transport.port),
        }
    }
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            kind: TransportKind::Device,
            device: default_device(),
            baud_rate: default_baud_rate(),
            host: default_host(),
            port: default_port(),
            max_line_length: default_max_line_length(),
        }
    }
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            read_timeout_ms: default_read_timeout(),
            open_timeout_ms: default_open_timeout(),
            retry_delay_secs: default_retry_delay(),
        }
    }
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            api_url: None,
            queue_capacity: default_queue_capacity(),
            request_timeout_secs: default_request_timeout(),
            retry_delay_secs: default_retry_delay(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::Column;

    #[test]
    fn test_default_config_is_valid() {
        let config = AppConfig::default();
        assert!(config.validate_all().is_ok());
        assert_eq!(config.reader.read_timeout(), Duration::from_secs(1));
        assert_eq!(config.reader.retry_delay(), Duration::from_secs(5));
        assert_eq!(config.endpoint(), "/dev/ttyUSB0");
        assert_eq!(config.transport.port, 4001);
        assert_eq!(config.decoder.policy, RequiredFieldPolicy::Lenient);
    }

    #[test]
    fn test_tcp_endpoint() {
        let mut config = AppConfig::default();
        config.transport.kind = TransportKind::Tcp;
        config.transport.host = "10.0.0.5".to_string();
        config.transport.port = 4001;
        assert_eq!(config.endpoint(), "10.0.0.5:4001");
    }

    #[test]
    fn test_rejects_zero_read_timeout() {
        let mut config = AppConfig::default();
        config.reader.read_timeout_ms = 0;
        assert!(matches!(config.validate_all(), Err(AppError::Validation(_))));
    }

    #[test]
    fn test_rejects_zero_retry_delays() {
        let mut config = AppConfig::default();
        config.reader.retry_delay_secs = 0;
        assert!(matches!(config.validate_all(), Err(AppError::Validation(_))));

        let mut config = AppConfig::default();
        config.collector.retry_delay_secs = 0;
        assert!(matches!(config.validate_all(), Err(AppError::Validation(_))));

        let mut config = AppConfig::default();
        config.collector.retry_delay_secs = 1;
        config.reader.retry_delay_secs = 1;
        assert!(config.validate_all().is_ok());
    }

    #[test]
    fn test_rejects_bad_api_url() {
        let mut config = AppConfig::default();
        config.collector.api_url = Some("not a url".to_string());
        assert!(config.validate_all().is_err());
    }

    #[test]
    fn test_rejects_bad_layout() {
        let mut config = AppConfig::default();
        config.decoder.layout.number = Column::new(40, 38);
        assert!(matches!(config.validate_all(), Err(AppError::Layout(_))));
    }

    #[test]
    fn test_deserialize_partial_sections() {
        let config: AppConfig = serde_json::from_str(
            r#"{
                "transport": { "kind": "tcp", "host": "pbx-gw", "port": 950 },
                "decoder": { "policy": "lenient", "layout": { "min_width": 74 } }
            }"#,
        )
        .unwrap();

        assert_eq!(config.transport.kind, TransportKind::Tcp);
        assert_eq!(config.transport.max_line_length, 512);
        assert_eq!(config.decoder.policy, RequiredFieldPolicy::Lenient);
        assert_eq!(config.decoder.layout.min_width, 74);
        assert_eq!(config.decoder.layout.number, Column::new(38, 70));
        assert_eq!(config.reader.read_timeout_ms, 1000);
    }
}
