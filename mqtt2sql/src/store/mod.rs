//! # Durable storage for received messages
//!
//! Every message that survives the topic filter must eventually land in
//! two related tables: `mqtt_topics`, holding one row per distinct topic
//! name ever observed, and `mqtt`, holding one row per message with a
//! foreign key into the topics table. A `messages` view joins the two and
//! projects a human-readable datetime for ad-hoc querying.
//!
//! ## Insert protocol
//!
//! Both inserts for a message happen inside a single transaction, topic
//! first: the topic insert is conditional (insert only when no row with
//! that exact name exists), which makes topic creation race-safe and
//! idempotent, and guarantees that the message row always references an
//! existing topic.
//!
//! ## Backends
//!
//! The database driver is an external collaborator behind the
//! [MessageStore] trait. The `mysql` feature provides the production
//! binding via `sqlx`; the mock backend records rows in memory and can be
//! told to fail, which is how the writer's requeue policy is tested.

#[cfg(feature = "mysql")]
pub mod mysql;

#[cfg(any(test, feature = "mocks"))]
pub mod mock;

mod message_store;

pub use message_store::MessageStore;
