//! The database capability consumed by the [Writer](crate::Writer).

use std::error::Error;

use async_trait::async_trait;

use crate::message::Message;

/// Interface to the relational datastore.
///
/// Implementations own the connection lifecycle; callers serialize access
/// (the writer holds a lock around every [store_message](MessageStore::store_message)
/// call), so at most one statement is in flight at any time.
#[async_trait]
pub trait MessageStore: Send + Sync + 'static {
    /// An error occurring from an operation.
    type Error: Error + Send + Sync + 'static;

    /// Establish the connection and run the idempotent schema statements.
    /// Safe to call on every start.
    async fn connect(&self) -> Result<(), Self::Error>;

    /// Persist one message: conditionally insert the topic row, insert
    /// the message row referencing it, commit. All within one
    /// transaction. Implementations verify or re-establish the
    /// connection before writing.
    async fn store_message(&self, message: &Message) -> Result<(), Self::Error>;

    /// Final commit and connection release on shutdown.
    async fn close(&self) -> Result<(), Self::Error>;
}
