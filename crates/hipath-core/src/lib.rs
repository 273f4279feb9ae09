//! HiPath CDR Logger Core Library
//!
//! This crate provides the foundational types, traits, and error handling
//! for the HiPath call-detail record logger. It includes:
//!
//! - The decoded call record model (`Record`, `CallType`, `CallDuration`)
//! - The `Transport` and `RecordSink` seams consumed by the read loop
//! - The error taxonomy separating link, data, and fatal failures
//! - The calibratable column layout of a CDR line
//! - Application configuration

pub mod config;
pub mod error;
pub mod layout;
pub mod models;
pub mod traits;

pub use config::AppConfig;
pub use error::{AppError, DecodeError, SinkError, TransportError};
pub use layout::{Column, ColumnLayout, RequiredFieldPolicy};
pub use models::{CallDuration, CallType, Record};
pub use traits::{RecordSink, Transport};
