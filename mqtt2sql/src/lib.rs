//! # mqtt2sql
//!
//! mqtt2sql bridges an MQTT broker to a MySQL/MariaDB database: it
//! subscribes to a configurable set of topic patterns and durably stores
//! every received message (topic, payload, QoS, arrival timestamp and
//! transport-security flag) in two related tables, deduplicating topics.
//!
//! The pipeline is broker → [Subscriber] → [TopicFilter] → delivery queue
//! → [Writer] → database. Both ends manage their own connection lifecycle
//! and survive outages on their side without affecting the other: the
//! subscriber reconnects with a fixed backoff, the writer requeues failed
//! inserts, and the unbounded in-memory queue absorbs the difference. The
//! one guarantee deliberately not made is durability across a crash of
//! this process itself; there is no on-disk queue.
//!
//! ## Core Modules
//!
//! - `broker`: the capability an MQTT client library must provide,
//!   modelled as discrete events rather than callbacks.
//! - `subscriber`: the broker-side connect/subscribe/reconnect state
//!   machine feeding the queue.
//! - `filter`: the pure accept/reject policy applied before queueing.
//! - `queue`: the unbounded FIFO between the two sides, with an in-band
//!   shutdown sentinel.
//! - `store`: the database capability, with a `sqlx`-backed MySQL
//!   implementation and an in-memory mock.
//! - `writer`: the database-side drain loop with its requeue-on-failure
//!   retry policy.
//! - `bridge`: startup wiring and the coordinated shutdown sequence.
//! - `config`: the settings surface, built once and passed explicitly.
//!
//! ## Crate feature flags
//!
//! - `mysql`: the production [store](crate::store) backend. Enabled by
//!   default.
//! - `mocks`: in-memory broker and store test doubles.

pub mod bridge;
pub mod broker;
pub mod config;
pub(crate) mod constants;
pub mod filter;
pub mod message;
pub mod queue;
pub mod store;
pub mod subscriber;
pub mod writer;

pub use bridge::{Bridge, BridgeHandle};
pub use config::{load_config, Settings};
pub use filter::{topic_matches, TopicFilter};
pub use message::Message;
pub use queue::{delivery_queue, QueueItem};
pub use store::MessageStore;
pub use subscriber::{Subscriber, SubscriberState};
pub use writer::{Writer, WriterState};
