//! Record collection for the HiPath CDR logger
//!
//! [`RecordQueue`] is the [`RecordSink`](hipath_core::RecordSink) the read
//! loop pushes into. A [`Forwarder`] task drains the other end and delivers
//! each record to the collection API, or to the log when none is configured.

pub mod forwarder;
pub mod queue;

pub use forwarder::{Delivery, Forwarder, ForwarderError, ForwarderStats};
pub use queue::{channel, RecordQueue};
