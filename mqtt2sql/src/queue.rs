//! The in-memory delivery queue between the subscriber and the writer.
//!
//! An unbounded FIFO: `push` never blocks and never fails, `pop` suspends
//! until an item arrives. The queue is created once at startup and lives
//! for the whole process; it is drained to empty in normal operation but
//! may grow without bound during a database outage. That trade-off is
//! deliberate: there is no backpressure towards the broker, and messages
//! still queued when the process dies are lost.
//!
//! Shutdown of the consumer is signalled in-band with
//! [QueueItem::Shutdown], a sentinel distinct from any real message.

use tokio::sync::mpsc;
use tracing::trace;

use crate::message::Message;

/// An entry on the delivery queue: either a real message or the shutdown
/// sentinel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueueItem {
    Message(Message),
    /// Unblocks a pending `pop` and tells the consumer to exit its drain
    /// loop. Never processed as data.
    Shutdown,
}

/// Create the delivery queue, returning the producer and consumer halves.
pub fn delivery_queue() -> (QueueProducer, QueueConsumer) {
    let (tx, rx) = mpsc::unbounded_channel();
    (QueueProducer { tx }, QueueConsumer { rx })
}

/// Producer half of the delivery queue. Cheap to clone; held by the
/// subscriber, and by the writer for requeueing failed inserts.
#[derive(Debug, Clone)]
pub struct QueueProducer {
    tx: mpsc::UnboundedSender<QueueItem>,
}

impl QueueProducer {
    /// Append a message to the queue tail. Never blocks. A send can only
    /// fail once the consumer has gone away, at which point the message
    /// had nowhere to go anyway.
    pub fn push(&self, message: Message) {
        if self.tx.send(QueueItem::Message(message)).is_err() {
            trace!("delivery queue consumer is gone, dropping message");
        }
    }

    /// Append the shutdown sentinel to the queue tail.
    pub fn push_shutdown(&self) {
        let _ = self.tx.send(QueueItem::Shutdown);
    }
}

/// Consumer half of the delivery queue. Owned by exactly one drain loop.
#[derive(Debug)]
pub struct QueueConsumer {
    rx: mpsc::UnboundedReceiver<QueueItem>,
}

impl QueueConsumer {
    /// Wait for the next item in FIFO order. If every producer handle has
    /// been dropped the queue can never yield again, so this resolves to
    /// the shutdown sentinel rather than suspending forever.
    pub async fn pop(&mut self) -> QueueItem {
        self.rx.recv().await.unwrap_or(QueueItem::Shutdown)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(payload: &str) -> Message {
        Message::new("a/b".into(), payload.into(), 0, false)
    }

    #[tokio::test]
    async fn fifo_order() {
        let (producer, mut consumer) = delivery_queue();
        producer.push(message("1"));
        producer.push(message("2"));
        producer.push(message("3"));
        for expected in ["1", "2", "3"] {
            match consumer.pop().await {
                QueueItem::Message(msg) => assert_eq!(msg.payload, expected),
                QueueItem::Shutdown => panic!("unexpected sentinel"),
            }
        }
    }

    #[tokio::test]
    async fn sentinel_unblocks_pending_pop() {
        let (producer, mut consumer) = delivery_queue();
        let pop = tokio::spawn(async move { consumer.pop().await });
        producer.push_shutdown();
        assert_eq!(pop.await.unwrap(), QueueItem::Shutdown);
    }

    #[tokio::test]
    async fn sentinel_after_messages_preserves_order() {
        let (producer, mut consumer) = delivery_queue();
        producer.push(message("1"));
        producer.push_shutdown();
        assert!(matches!(consumer.pop().await, QueueItem::Message(_)));
        assert_eq!(consumer.pop().await, QueueItem::Shutdown);
    }

    #[tokio::test]
    async fn dropped_producers_resolve_to_shutdown() {
        let (producer, mut consumer) = delivery_queue();
        drop(producer);
        assert_eq!(consumer.pop().await, QueueItem::Shutdown);
    }
}
