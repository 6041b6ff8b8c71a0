//! Wiring and lifetime of the whole bridge.
//!
//! [Bridge::start] creates the delivery queue, spawns the subscriber and
//! writer run loops independently (neither waits for the other; the
//! writer can drain before the subscriber is ready, and vice versa) and
//! hands back a [BridgeHandle].
//!
//! [BridgeHandle::stop] drives the coordinated shutdown: cancel the
//! shared token (observed by both reconnect loops), push the sentinel
//! (observed by the drain loop) and wait for both tasks to signal
//! completion. Everything queued ahead of the sentinel is still written.
//! Two classes of message can be lost at this point: those inside the
//! broker client's own buffers, and those waiting out an insert retry
//! delay, which rejoin the queue after the drain loop has exited.

use std::sync::Arc;

use tokio::{sync::watch, task::JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::{
    broker::BrokerClient,
    config::Settings,
    queue::{delivery_queue, QueueProducer},
    store::MessageStore,
    subscriber::{Subscriber, SubscriberState},
    writer::{Writer, WriterState},
};

pub struct Bridge;

impl Bridge {
    /// Start both sides of the bridge.
    pub fn start<B, S>(settings: &Settings, client: B, store: Arc<S>) -> BridgeHandle
    where
        B: BrokerClient,
        S: MessageStore,
    {
        let (producer, consumer) = delivery_queue();
        let shutdown = CancellationToken::new();

        let subscriber = Subscriber::new(
            client,
            settings.broker.clone(),
            producer.clone(),
            shutdown.clone(),
        );
        let writer = Writer::new(
            store,
            consumer,
            producer.clone(),
            settings.writer.clone(),
            shutdown.clone(),
        );
        let subscriber_state = subscriber.state();
        let writer_state = writer.state();

        info!("starting bridge");
        BridgeHandle {
            shutdown,
            queue: producer,
            subscriber_state,
            writer_state,
            subscriber: tokio::spawn(subscriber.run()),
            writer: tokio::spawn(writer.run()),
        }
    }
}

/// A running bridge. Dropping the handle detaches the tasks; call
/// [stop](BridgeHandle::stop) for a clean shutdown.
pub struct BridgeHandle {
    shutdown: CancellationToken,
    queue: QueueProducer,
    subscriber_state: watch::Receiver<SubscriberState>,
    writer_state: watch::Receiver<WriterState>,
    subscriber: JoinHandle<()>,
    writer: JoinHandle<()>,
}

impl BridgeHandle {
    /// Observe the subscriber's state transitions.
    pub fn subscriber_state(&self) -> watch::Receiver<SubscriberState> {
        self.subscriber_state.clone()
    }

    /// Observe the writer's state transitions.
    pub fn writer_state(&self) -> watch::Receiver<WriterState> {
        self.writer_state.clone()
    }

    /// Request both components to stop, concurrently, and wait for both
    /// to complete.
    pub async fn stop(self) {
        info!("stopping bridge");
        self.shutdown.cancel();
        self.queue.push_shutdown();
        let (subscriber, writer) = tokio::join!(self.subscriber, self.writer);
        if let Err(err) = subscriber {
            error!(error = %err, "subscriber task failed");
        }
        if let Err(err) = writer {
            error!(error = %err, "writer task failed");
        }
        info!("bridge stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        broker::mock::MockBroker,
        config::BrokerSettings,
        store::mock::MockMessageStore,
        subscriber::SubscriberState,
        writer::WriterState,
    };

    fn settings() -> Settings {
        Settings {
            broker: BrokerSettings {
                topics: "a/#".to_string(),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn end_to_end_then_clean_shutdown() -> anyhow::Result<()> {
        let (client, handle) = MockBroker::new();
        let store = Arc::new(MockMessageStore::new());
        let bridge = Bridge::start(&settings(), client, Arc::clone(&store));

        let mut subscriber_state = bridge.subscriber_state();
        subscriber_state
            .wait_for(|s| *s == SubscriberState::Ready)
            .await?;

        handle.publish("a/b", "1", 0, false);
        while store.rows().await.is_empty() {
            tokio::time::sleep(std::time::Duration::from_millis(1)).await;
        }

        let mut writer_state = bridge.writer_state();
        bridge.stop().await;
        assert_eq!(*subscriber_state.borrow_and_update(), SubscriberState::Stopped);
        assert_eq!(*writer_state.borrow_and_update(), WriterState::Stopped);
        assert!(store.is_closed().await);
        assert_eq!(store.rows().await.len(), 1);
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn writer_drains_before_subscriber_is_ready() {
        // the broker never comes up, but the writer side still runs
        let (client, handle) = MockBroker::new();
        handle.fail_next_connects(usize::MAX);
        let store = Arc::new(MockMessageStore::new());
        let bridge = Bridge::start(&settings(), client, Arc::clone(&store));

        let mut writer_state = bridge.writer_state();
        writer_state
            .wait_for(|s| *s == WriterState::Draining)
            .await
            .unwrap();
        bridge.stop().await;
    }
}
