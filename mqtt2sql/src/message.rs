use chrono::Utc;

/// A single MQTT message accepted for storage.
///
/// Constructed by the [Subscriber](crate::Subscriber) when an inbound
/// publication passes the [TopicFilter](crate::TopicFilter), then moved
/// through the delivery queue to the [Writer](crate::Writer). Ownership
/// transfers along that path; the record is never mutated after
/// construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    /// Topic the message was published on.
    pub topic: String,
    /// Raw payload, decoded as text.
    pub payload: String,
    /// QoS level the broker delivered the message with (0/1/2).
    pub qos: u8,
    /// Epoch seconds at the moment of ingest. Always stamped by us,
    /// never taken from the broker.
    pub timestamp: i64,
    /// Whether the message arrived over an encrypted broker endpoint.
    pub transport_secure: bool,
}

impl Message {
    /// Create a message stamped with the current time.
    pub fn new(topic: String, payload: String, qos: u8, transport_secure: bool) -> Self {
        Self {
            topic,
            payload,
            qos,
            timestamp: Utc::now().timestamp(),
            transport_secure,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stamped_at_ingest() {
        let before = Utc::now().timestamp();
        let msg = Message::new("a/b".into(), "1".into(), 0, false);
        let after = Utc::now().timestamp();
        assert!(msg.timestamp >= before && msg.timestamp <= after);
    }
}
