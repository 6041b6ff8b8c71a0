use tokio::sync::Mutex;

use super::error::MockStoreError;
use crate::{message::Message, store::MessageStore};

/// What the mock persisted for one message: the deduplicated topic id
/// plus the message fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredRow {
    pub topic_id: usize,
    pub payload: String,
    pub qos: u8,
    pub timestamp: i64,
    pub transport_secure: bool,
}

#[derive(Debug, Default)]
struct MockStoreState {
    connected: bool,
    closed: bool,
    fail_connects: usize,
    fail_writes: usize,
    write_attempts: usize,
    topics: Vec<String>,
    rows: Vec<StoredRow>,
}

/// In-memory [MessageStore] with the same topic-deduplication semantics
/// as the MySQL backend, plus scriptable failures.
#[derive(Debug, Default)]
pub struct MockMessageStore {
    inner: Mutex<MockStoreState>,
}

impl MockMessageStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `n` connect calls fail.
    pub async fn fail_next_connects(&self, n: usize) {
        self.inner.lock().await.fail_connects = n;
    }

    /// Make the next `n` writes fail.
    pub async fn fail_next_writes(&self, n: usize) {
        self.inner.lock().await.fail_writes = n;
    }

    /// Distinct topic names in insertion order.
    pub async fn topics(&self) -> Vec<String> {
        self.inner.lock().await.topics.clone()
    }

    /// Persisted rows in insertion order.
    pub async fn rows(&self) -> Vec<StoredRow> {
        self.inner.lock().await.rows.clone()
    }

    /// Total write attempts, failed ones included.
    pub async fn write_attempts(&self) -> usize {
        self.inner.lock().await.write_attempts
    }

    pub async fn is_closed(&self) -> bool {
        self.inner.lock().await.closed
    }
}

#[async_trait::async_trait]
impl MessageStore for MockMessageStore {
    type Error = MockStoreError;

    async fn connect(&self) -> Result<(), Self::Error> {
        let mut state = self.inner.lock().await;
        if state.fail_connects > 0 {
            state.fail_connects -= 1;
            return Err(MockStoreError::ConnectFailed);
        }
        state.connected = true;
        Ok(())
    }

    async fn store_message(&self, message: &Message) -> Result<(), Self::Error> {
        let mut state = self.inner.lock().await;
        if !state.connected {
            return Err(MockStoreError::NotConnected);
        }
        state.write_attempts += 1;
        if state.fail_writes > 0 {
            state.fail_writes -= 1;
            return Err(MockStoreError::WriteFailed);
        }
        // Insert-if-absent, as the conditional topic insert does.
        let topic_id = match state.topics.iter().position(|t| t == &message.topic) {
            Some(id) => id,
            None => {
                state.topics.push(message.topic.clone());
                state.topics.len() - 1
            }
        };
        state.rows.push(StoredRow {
            topic_id,
            payload: message.payload.clone(),
            qos: message.qos,
            timestamp: message.timestamp,
            transport_secure: message.transport_secure,
        });
        Ok(())
    }

    async fn close(&self) -> Result<(), Self::Error> {
        let mut state = self.inner.lock().await;
        state.connected = false;
        state.closed = true;
        Ok(())
    }
}
