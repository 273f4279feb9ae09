//! Domain models for the HiPath CDR logger
//!
//! A single decoded call event and the small value types it is built from.

pub mod record;

pub use record::{CallDuration, CallType, Record};
