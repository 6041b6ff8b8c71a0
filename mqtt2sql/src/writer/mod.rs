//! The database side of the bridge.
//!
//! A [Writer] owns the datastore connection lifecycle and drains the
//! delivery queue. Each message is written under a serialization lock (at
//! most one transaction in flight, which also bounds connection usage to
//! a single active statement) and, on any failure, requeued at the queue
//! tail after a fixed retry delay. No distinction is made between
//! transient and permanent failures: a write is retried until it lands,
//! never dropped and never fatal. During a sustained outage the queue
//! simply grows.
//!
//! Popping the shutdown sentinel exits the drain loop, releases the
//! connection and signals completion.

use std::sync::Arc;

use tokio::{
    sync::{watch, Mutex},
    time::{sleep, timeout},
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::{
    config::WriterSettings,
    message::Message,
    queue::{QueueConsumer, QueueItem, QueueProducer},
    store::MessageStore,
};

/// Where the writer currently is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriterState {
    Disconnected,
    Connected,
    Draining,
    Stopped,
}

pub struct Writer<S> {
    store: Arc<S>,
    queue: QueueConsumer,
    /// Producer handle used to requeue failed writes at the tail.
    requeue: QueueProducer,
    settings: WriterSettings,
    shutdown: CancellationToken,
    /// Serializes write transactions. One writer task exists, but the
    /// lock makes the at-most-one-in-flight-write invariant structural.
    write_lock: Mutex<()>,
    state_tx: watch::Sender<WriterState>,
    state_rx: watch::Receiver<WriterState>,
}

impl<S: MessageStore> Writer<S> {
    pub fn new(
        store: Arc<S>,
        queue: QueueConsumer,
        requeue: QueueProducer,
        settings: WriterSettings,
        shutdown: CancellationToken,
    ) -> Self {
        let (state_tx, state_rx) = watch::channel(WriterState::Disconnected);
        Self {
            store,
            queue,
            requeue,
            settings,
            shutdown,
            write_lock: Mutex::new(()),
            state_tx,
            state_rx,
        }
    }

    /// Observe state transitions.
    pub fn state(&self) -> watch::Receiver<WriterState> {
        self.state_rx.clone()
    }

    fn set_state(&self, next: WriterState) {
        debug!(state = ?next, "writer state");
        self.state_tx.send_replace(next);
    }

    /// Connect, then drain the queue until the sentinel (or a stop during
    /// an outage) ends the loop.
    pub async fn run(mut self) {
        if self.connect().await {
            self.set_state(WriterState::Draining);
            self.drain().await;
            if let Err(err) = self.store.close().await {
                warn!(error = %err, "error releasing database connection");
            }
        }
        self.set_state(WriterState::Stopped);
        info!("writer stopped");
    }

    /// Establish the connection and run the idempotent schema statements,
    /// retrying at the poll interval. Returns false when a stop request
    /// arrived before the database became reachable.
    async fn connect(&self) -> bool {
        loop {
            match self.store.connect().await {
                Ok(()) => {
                    info!("database connected, schema ensured");
                    self.set_state(WriterState::Connected);
                    return true;
                }
                Err(err) => {
                    warn!(
                        error = %err,
                        retry_in = ?self.settings.poll_interval(),
                        "database connection failed, will retry"
                    );
                    tokio::select! {
                        _ = self.shutdown.cancelled() => return false,
                        _ = sleep(self.settings.poll_interval()) => {}
                    }
                }
            }
        }
    }

    async fn drain(&mut self) {
        loop {
            // The sentinel is the primary stop signal; the bounded wait
            // re-checks the token in case the sentinel never arrives.
            let item = match timeout(self.settings.poll_interval(), self.queue.pop()).await {
                Ok(item) => item,
                Err(_) => {
                    if self.shutdown.is_cancelled() {
                        break;
                    }
                    continue;
                }
            };
            match item {
                QueueItem::Shutdown => {
                    info!("shutdown sentinel received, leaving drain loop");
                    break;
                }
                QueueItem::Message(message) => self.write(message).await,
            }
        }
    }

    /// Attempt one write. On failure the lock is released, the retry
    /// delay elapses in the background and the message rejoins the queue
    /// at the tail, behind whatever arrived in the interim.
    async fn write(&self, message: Message) {
        let guard = self.write_lock.lock().await;
        match self.store.store_message(&message).await {
            Ok(()) => {
                drop(guard);
                debug!(topic = %message.topic, "message stored");
            }
            Err(err) => {
                drop(guard);
                let delay = self.settings.insert_retry_delay();
                warn!(
                    error = %err,
                    topic = %message.topic,
                    retry_in = ?delay,
                    "insert failed, requeueing message"
                );
                let requeue = self.requeue.clone();
                tokio::spawn(async move {
                    sleep(delay).await;
                    requeue.push(message);
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::{
        queue::delivery_queue,
        store::mock::MockMessageStore,
    };

    fn settings() -> WriterSettings {
        WriterSettings {
            insert_retry_delay_secs: 1,
            poll_interval_secs: 1,
        }
    }

    fn message(topic: &str, payload: &str) -> Message {
        Message::new(topic.into(), payload.into(), 0, false)
    }

    fn spawn_writer(
        store: Arc<MockMessageStore>,
    ) -> (
        QueueProducer,
        watch::Receiver<WriterState>,
        CancellationToken,
        tokio::task::JoinHandle<()>,
    ) {
        let (producer, consumer) = delivery_queue();
        let shutdown = CancellationToken::new();
        let writer = Writer::new(
            store,
            consumer,
            producer.clone(),
            settings(),
            shutdown.clone(),
        );
        let state = writer.state();
        let task = tokio::spawn(writer.run());
        (producer, state, shutdown, task)
    }

    #[tokio::test(start_paused = true)]
    async fn writes_in_arrival_order() {
        let store = Arc::new(MockMessageStore::new());
        let (producer, _state, _shutdown, task) = spawn_writer(Arc::clone(&store));

        producer.push(message("a/b", "1"));
        producer.push(message("a/b", "2"));
        producer.push_shutdown();
        task.await.unwrap();

        // one topic row, two message rows, in push order
        assert_eq!(store.topics().await, vec!["a/b"]);
        let rows = store.rows().await;
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].payload, "1");
        assert_eq!(rows[1].payload, "2");
        assert!(rows.iter().all(|row| row.topic_id == 0));
    }

    #[tokio::test(start_paused = true)]
    async fn failed_write_is_requeued_then_stored_once() {
        let store = Arc::new(MockMessageStore::new());
        store.fail_next_writes(1).await;
        let (producer, _state, _shutdown, _task) = spawn_writer(Arc::clone(&store));

        producer.push(message("a/b", "1"));
        while store.rows().await.is_empty() {
            sleep(Duration::from_millis(10)).await;
        }
        // exactly one row despite two attempts
        assert_eq!(store.write_attempts().await, 2);
        assert_eq!(store.rows().await.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn requeued_message_loses_its_position() {
        let store = Arc::new(MockMessageStore::new());
        store.fail_next_writes(1).await;
        let (producer, _state, _shutdown, _task) = spawn_writer(Arc::clone(&store));

        producer.push(message("a/b", "first"));
        producer.push(message("a/b", "second"));
        while store.rows().await.len() < 2 {
            sleep(Duration::from_millis(10)).await;
        }
        let rows = store.rows().await;
        assert_eq!(rows[0].payload, "second");
        assert_eq!(rows[1].payload, "first");
    }

    #[tokio::test(start_paused = true)]
    async fn message_awaiting_retry_at_shutdown_is_dropped() {
        let store = Arc::new(MockMessageStore::new());
        store.fail_next_writes(1).await;
        let (producer, _state, _shutdown, task) = spawn_writer(Arc::clone(&store));

        producer.push(message("a/b", "1"));
        while store.write_attempts().await < 1 {
            sleep(Duration::from_millis(1)).await;
        }
        producer.push_shutdown();
        task.await.unwrap();

        // the retry timer fires after the drain loop has exited; the
        // requeued message has nowhere to go
        sleep(Duration::from_secs(2)).await;
        assert_eq!(store.write_attempts().await, 1);
        assert!(store.rows().await.is_empty());
        assert!(store.is_closed().await);
    }

    #[tokio::test(start_paused = true)]
    async fn sentinel_stops_and_releases_the_connection() {
        let store = Arc::new(MockMessageStore::new());
        let (producer, mut state, _shutdown, task) = spawn_writer(Arc::clone(&store));

        producer.push(message("a/b", "1"));
        producer.push_shutdown();
        task.await.unwrap();

        assert_eq!(*state.borrow_and_update(), WriterState::Stopped);
        assert!(store.is_closed().await);
        assert_eq!(store.rows().await.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn retries_connecting_until_database_is_reachable() {
        let store = Arc::new(MockMessageStore::new());
        store.fail_next_connects(2).await;
        let (producer, _state, _shutdown, task) = spawn_writer(Arc::clone(&store));

        producer.push(message("a/b", "1"));
        producer.push_shutdown();
        task.await.unwrap();
        assert_eq!(store.rows().await.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_during_outage_ends_the_writer() {
        let store = Arc::new(MockMessageStore::new());
        store.fail_next_connects(usize::MAX).await;
        let (_producer, mut state, shutdown, task) = spawn_writer(Arc::clone(&store));

        shutdown.cancel();
        task.await.unwrap();
        assert_eq!(*state.borrow_and_update(), WriterState::Stopped);
    }
}
