//! The broker capability consumed by the [Subscriber](crate::Subscriber).
//!
//! The MQTT wire protocol itself is an external collaborator. This module
//! only defines the surface the subscriber drives: connect, subscribe,
//! disconnect, and a stream of discrete [BrokerEvent]s consumed one at a
//! time by the single owning task. Client libraries deliver these through
//! callbacks; modelling them as an event sequence keeps the state machine
//! free of re-entrant handling.

#[cfg(any(test, feature = "mocks"))]
pub mod mock;

use std::{error::Error, time::Duration};

use async_trait::async_trait;

/// A raw inbound publication, before filtering and timestamping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub topic: String,
    pub payload: String,
    pub qos: u8,
    /// Set when the broker redelivered a retained message on
    /// subscription.
    pub retained: bool,
}

/// A discrete broker lifecycle or message event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BrokerEvent {
    /// The broker acknowledged the connection.
    Connected,
    /// The broker acknowledged a subscription to `pattern`.
    SubscribeAck { pattern: String },
    /// An inbound publication.
    Publish(InboundMessage),
    /// The connection dropped, whether requested or not.
    Disconnected,
}

/// Interface to an MQTT client implementation.
///
/// Command methods return quickly; their outcomes arrive asynchronously as
/// [BrokerEvent]s through [next_event](BrokerClient::next_event).
#[async_trait]
pub trait BrokerClient: Send + Sync + 'static {
    /// An error establishing or driving the connection.
    type Error: Error + Send + Sync + 'static;

    /// Open the network connection. Acknowledgement arrives as
    /// [BrokerEvent::Connected].
    async fn connect(&mut self, host: &str, port: u16, keepalive: Duration)
        -> Result<(), Self::Error>;

    /// Request a subscription to a topic pattern. Acknowledgement arrives
    /// as [BrokerEvent::SubscribeAck].
    async fn subscribe(&mut self, pattern: &str, qos: u8) -> Result<(), Self::Error>;

    /// Request a disconnect. Completion arrives as
    /// [BrokerEvent::Disconnected].
    async fn disconnect(&mut self) -> Result<(), Self::Error>;

    /// Wait for the next event. `None` means the client has shut down for
    /// good and no further events will arrive.
    async fn next_event(&mut self) -> Option<BrokerEvent>;

    /// Whether the connected endpoint is encrypted. Drives the stored
    /// `ssl` flag on every message.
    fn transport_secure(&self) -> bool;
}
