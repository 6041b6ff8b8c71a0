//! A scriptable in-memory broker client for tests.

use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;

use super::{BrokerClient, BrokerEvent, InboundMessage};

#[derive(Debug, Error)]
pub enum MockBrokerError {
    #[error("connection refused")]
    ConnectionRefused,
}

#[derive(Debug, Default)]
struct MockBrokerState {
    connect_attempts: usize,
    /// Number of upcoming connect calls which should fail.
    fail_connects: usize,
    subscriptions: Vec<(String, u8)>,
    disconnect_calls: usize,
}

/// Test double for [BrokerClient]. Connection and subscription
/// acknowledgements are emitted automatically; everything else is emitted
/// by the paired [MockBrokerHandle].
#[derive(Debug)]
pub struct MockBroker {
    state: Arc<Mutex<MockBrokerState>>,
    events: mpsc::UnboundedReceiver<BrokerEvent>,
    event_tx: mpsc::UnboundedSender<BrokerEvent>,
    secure: bool,
}

impl MockBroker {
    /// Create a client and the handle used to script it.
    pub fn new() -> (Self, MockBrokerHandle) {
        let (event_tx, events) = mpsc::unbounded_channel();
        let state = Arc::new(Mutex::new(MockBrokerState::default()));
        let broker = Self {
            state: Arc::clone(&state),
            events,
            event_tx: event_tx.clone(),
            secure: false,
        };
        (broker, MockBrokerHandle { tx: event_tx, state })
    }

    /// Report an encrypted endpoint from now on.
    pub fn secure(mut self) -> Self {
        self.secure = true;
        self
    }
}

#[async_trait]
impl BrokerClient for MockBroker {
    type Error = MockBrokerError;

    async fn connect(
        &mut self,
        _host: &str,
        _port: u16,
        _keepalive: Duration,
    ) -> Result<(), Self::Error> {
        let mut state = self.state.lock().unwrap();
        state.connect_attempts += 1;
        if state.fail_connects > 0 {
            state.fail_connects -= 1;
            return Err(MockBrokerError::ConnectionRefused);
        }
        let _ = self.event_tx.send(BrokerEvent::Connected);
        Ok(())
    }

    async fn subscribe(&mut self, pattern: &str, qos: u8) -> Result<(), Self::Error> {
        let mut state = self.state.lock().unwrap();
        state.subscriptions.push((pattern.to_string(), qos));
        let _ = self.event_tx.send(BrokerEvent::SubscribeAck {
            pattern: pattern.to_string(),
        });
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<(), Self::Error> {
        self.state.lock().unwrap().disconnect_calls += 1;
        let _ = self.event_tx.send(BrokerEvent::Disconnected);
        Ok(())
    }

    async fn next_event(&mut self) -> Option<BrokerEvent> {
        self.events.recv().await
    }

    fn transport_secure(&self) -> bool {
        self.secure
    }
}

/// Scripting and inspection handle for a [MockBroker].
#[derive(Debug, Clone)]
pub struct MockBrokerHandle {
    tx: mpsc::UnboundedSender<BrokerEvent>,
    state: Arc<Mutex<MockBrokerState>>,
}

impl MockBrokerHandle {
    /// Emit an arbitrary event to the client.
    pub fn emit(&self, event: BrokerEvent) {
        let _ = self.tx.send(event);
    }

    /// Emit an inbound publication.
    pub fn publish(&self, topic: &str, payload: &str, qos: u8, retained: bool) {
        self.emit(BrokerEvent::Publish(InboundMessage {
            topic: topic.to_string(),
            payload: payload.to_string(),
            qos,
            retained,
        }));
    }

    /// Emit an unsolicited disconnect.
    pub fn drop_connection(&self) {
        self.emit(BrokerEvent::Disconnected);
    }

    /// Make the next `n` connect calls fail.
    pub fn fail_next_connects(&self, n: usize) {
        self.state.lock().unwrap().fail_connects = n;
    }

    pub fn connect_attempts(&self) -> usize {
        self.state.lock().unwrap().connect_attempts
    }

    /// Every `(pattern, qos)` subscription requested so far, in order.
    pub fn subscriptions(&self) -> Vec<(String, u8)> {
        self.state.lock().unwrap().subscriptions.clone()
    }

    pub fn disconnect_calls(&self) -> usize {
        self.state.lock().unwrap().disconnect_calls
    }
}
