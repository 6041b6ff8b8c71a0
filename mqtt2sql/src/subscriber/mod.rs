//! The broker side of the bridge.
//!
//! A [Subscriber] owns the broker connection lifecycle: connect, subscribe
//! to every configured topic pattern, and reconnect whenever the
//! connection drops. Inbound publications received while `Ready` pass
//! through the [TopicFilter]; accepted ones are timestamped and pushed to
//! the delivery queue, which never blocks.
//!
//! Connection errors are retried indefinitely with a fixed backoff and are
//! never fatal. A stop request always wins over auto-reconnect: the token
//! is checked before each connect attempt and during each backoff wait,
//! and completion is only signalled once the broker's disconnect
//! notification has been observed.

use std::{collections::HashSet, time::Duration};

use tokio::{sync::watch, time::sleep};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::{
    broker::{BrokerClient, BrokerEvent, InboundMessage},
    config::BrokerSettings,
    constants::BROKER_RECONNECT_BACKOFF,
    filter::TopicFilter,
    message::Message,
    queue::QueueProducer,
};

/// Where the subscriber currently is in its connection lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriberState {
    Disconnected,
    Connecting,
    Connected,
    Subscribing,
    Ready,
    /// Terminal; only entered after an explicit stop request.
    Stopped,
}

/// Why a broker session ended.
enum SessionEnd {
    /// Unsolicited drop; reconnect unless a stop is pending.
    Dropped,
    /// A stop request completed.
    Stop,
}

pub struct Subscriber<B> {
    client: B,
    settings: BrokerSettings,
    filter: TopicFilter,
    queue: QueueProducer,
    shutdown: CancellationToken,
    backoff: Duration,
    /// Patterns awaiting a subscription ack. Cleared and refilled on
    /// entry to `Subscribing`; all subscriptions are complete when empty.
    pending_acks: HashSet<String>,
    state: SubscriberState,
    state_tx: watch::Sender<SubscriberState>,
    state_rx: watch::Receiver<SubscriberState>,
}

impl<B: BrokerClient> Subscriber<B> {
    pub fn new(
        client: B,
        settings: BrokerSettings,
        queue: QueueProducer,
        shutdown: CancellationToken,
    ) -> Self {
        let filter = TopicFilter::new(settings.filter_policy());
        let (state_tx, state_rx) = watch::channel(SubscriberState::Disconnected);
        Self {
            client,
            settings,
            filter,
            queue,
            shutdown,
            backoff: BROKER_RECONNECT_BACKOFF,
            pending_acks: HashSet::new(),
            state: SubscriberState::Disconnected,
            state_tx,
            state_rx,
        }
    }

    /// Observe state transitions.
    pub fn state(&self) -> watch::Receiver<SubscriberState> {
        self.state_rx.clone()
    }

    fn set_state(&mut self, next: SubscriberState) {
        debug!(state = ?next, "subscriber state");
        self.state = next;
        self.state_tx.send_replace(next);
    }

    /// The connect/reconnect loop. Runs until a stop request completes.
    pub async fn run(mut self) {
        loop {
            if self.shutdown.is_cancelled() {
                break;
            }
            self.set_state(SubscriberState::Connecting);
            if let Err(err) = self
                .client
                .connect(&self.settings.host, self.settings.port, self.settings.keepalive())
                .await
            {
                warn!(error = %err, backoff = ?self.backoff, "broker connection failed, will retry");
                if self.backoff_or_stop().await {
                    break;
                }
                continue;
            }
            match self.session().await {
                SessionEnd::Stop => break,
                SessionEnd::Dropped => {
                    self.set_state(SubscriberState::Disconnected);
                    info!("broker connection dropped, reconnecting");
                }
            }
        }
        self.set_state(SubscriberState::Stopped);
        info!("subscriber stopped");
    }

    /// Wait out the fixed backoff. Returns true when a stop request
    /// arrived first.
    async fn backoff_or_stop(&self) -> bool {
        tokio::select! {
            _ = self.shutdown.cancelled() => true,
            _ = sleep(self.backoff) => false,
        }
    }

    /// Drive one broker session, consuming events one at a time until the
    /// connection ends.
    async fn session(&mut self) -> SessionEnd {
        let mut stopping = false;
        loop {
            let event = tokio::select! {
                _ = self.shutdown.cancelled(), if !stopping => {
                    stopping = true;
                    info!("stop requested, disconnecting from broker");
                    if let Err(err) = self.client.disconnect().await {
                        warn!(error = %err, "disconnect request failed");
                        return SessionEnd::Stop;
                    }
                    continue;
                }
                event = self.client.next_event() => event,
            };
            let Some(event) = event else {
                // the client is gone for good
                return if stopping {
                    SessionEnd::Stop
                } else {
                    SessionEnd::Dropped
                };
            };
            match event {
                BrokerEvent::Connected => {
                    self.set_state(SubscriberState::Connected);
                    info!(
                        host = %self.settings.host,
                        port = self.settings.port,
                        "connected to broker"
                    );
                    if let Err(err) = self.subscribe_all().await {
                        // subscription errors are treated as connection
                        // errors: force a reconnect
                        warn!(error = %err, "subscription failed, reconnecting");
                        let _ = self.client.disconnect().await;
                        return SessionEnd::Dropped;
                    }
                }
                BrokerEvent::SubscribeAck { pattern } => {
                    if !self.pending_acks.remove(&pattern) {
                        debug!(pattern = %pattern, "unexpected subscription ack");
                    }
                    if self.pending_acks.is_empty()
                        && self.state == SubscriberState::Subscribing
                    {
                        self.set_state(SubscriberState::Ready);
                        info!("subscribed to all topics");
                    }
                }
                BrokerEvent::Publish(inbound) => self.on_publish(inbound),
                BrokerEvent::Disconnected => {
                    return if stopping || self.shutdown.is_cancelled() {
                        SessionEnd::Stop
                    } else {
                        SessionEnd::Dropped
                    };
                }
            }
        }
    }

    /// Issue a subscribe request for every configured pattern and arm the
    /// pending-ack set.
    async fn subscribe_all(&mut self) -> Result<(), B::Error> {
        self.set_state(SubscriberState::Subscribing);
        let patterns = self.settings.topic_patterns();
        self.pending_acks = patterns.iter().cloned().collect();
        for pattern in &patterns {
            self.client.subscribe(pattern, self.settings.qos).await?;
        }
        Ok(())
    }

    /// Filter, timestamp and queue an inbound publication. Never blocks.
    fn on_publish(&self, inbound: InboundMessage) {
        if self.state != SubscriberState::Ready {
            debug!(topic = %inbound.topic, "dropping publication outside ready state");
            return;
        }
        if !self.filter.accept(&inbound.topic, &inbound.payload, inbound.retained) {
            debug!(topic = %inbound.topic, "publication filtered out");
            return;
        }
        debug!(topic = %inbound.topic, payload = %inbound.payload, "rx");
        self.queue.push(Message::new(
            inbound.topic,
            inbound.payload,
            inbound.qos,
            self.client.transport_secure(),
        ));
    }
}
