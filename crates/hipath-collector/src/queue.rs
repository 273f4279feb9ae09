//! Bounded hand-off between the read loop and the forwarder

use async_trait::async_trait;
use hipath_core::{Record, RecordSink, SinkError};
use tokio::sync::mpsc;

/// Create a queue holding at most `capacity` undelivered records
///
/// A capacity of zero is raised to one.
pub fn channel(capacity: usize) -> (RecordQueue, mpsc::Receiver<Record>) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (RecordQueue { tx }, rx)
}

/// Producer side of the record queue
#[derive(Debug, Clone)]
pub struct RecordQueue {
    tx: mpsc::Sender<Record>,
}

impl RecordQueue {
    /// Free slots right now
    pub fn available(&self) -> usize {
        self.tx.capacity()
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

#[async_trait]
impl RecordSink for RecordQueue {
    async fn push(&self, record: Record) -> Result<(), SinkError> {
        self.tx.send(record).await.map_err(|_| SinkError::Closed)
    }
}
