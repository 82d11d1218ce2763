use tokio::sync::{mpsc, oneshot};

use super::EntryLogFact;
use crate::metrics::WRITE_BACK_QUEUE_FULL;

/// What travels on the entry-log queue.
#[derive(Debug)]
pub enum WriteBackMessage {
    Fact(EntryLogFact),
    /// Acknowledged once every message queued before it has been handled.
    Flush(oneshot::Sender<()>),
}

/// Handle for queueing entry-log facts
///
/// This is cheaply cloneable and can be shared across tasks.
/// Facts are sent through a bounded channel to be written by the EntryLogWriter.
#[derive(Clone)]
pub struct EntryLogHandle {
    tx: mpsc::Sender<WriteBackMessage>,
}

impl EntryLogHandle {
    pub fn new(tx: mpsc::Sender<WriteBackMessage>) -> Self {
        Self { tx }
    }

    /// Queue a fact, waiting for capacity if the queue is full
    ///
    /// If the channel is closed, the error is logged but the caller is not failed.
    pub async fn emit(&self, fact: EntryLogFact) {
        if let Err(e) = self.tx.send(WriteBackMessage::Fact(fact)).await {
            tracing::error!("Failed to queue entry-log fact: {}", e);
        }
    }

    /// Queue a fact without waiting
    ///
    /// Used on the scan path. Returns false if the queue is full or closed; the
    /// fact is lost from the durable trail and an alert is logged.
    pub fn try_emit(&self, fact: EntryLogFact) -> bool {
        match self.tx.try_send(WriteBackMessage::Fact(fact)) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(WriteBackMessage::Fact(fact))) => {
                WRITE_BACK_QUEUE_FULL.inc();
                tracing::error!(
                    ticket_code = %fact.ticket_code,
                    outcome = fact.outcome.as_str(),
                    "Entry-log queue full, fact not persisted"
                );
                false
            }
            Err(mpsc::error::TrySendError::Closed(WriteBackMessage::Fact(fact))) => {
                tracing::error!(
                    ticket_code = %fact.ticket_code,
                    "Entry-log queue closed, fact not persisted"
                );
                false
            }
            Err(_) => false,
        }
    }

    /// Wait until every fact queued before this call is written or dropped.
    ///
    /// Returns false if the writer is gone.
    pub async fn flush(&self) -> bool {
        let (ack, done) = oneshot::channel();
        if self.tx.send(WriteBackMessage::Flush(ack)).await.is_err() {
            return false;
        }
        done.await.is_ok()
    }

    /// Number of facts that can still be queued without waiting.
    pub fn capacity(&self) -> usize {
        self.tx.capacity()
    }
}
