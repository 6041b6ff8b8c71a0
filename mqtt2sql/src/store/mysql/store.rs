use sqlx::mysql::{MySqlConnectOptions, MySqlPool, MySqlPoolOptions};

use super::{
    error::StoreError,
    queries::{CREATE_QUERIES, INSERT_MESSAGE, INSERT_TOPIC},
};
use crate::{config::DatabaseSettings, message::Message, store::MessageStore};

/// A message store backed by MySQL/MariaDB.
pub struct MySqlMessageStore {
    /// Connection pool. Capped at a single connection: the writer holds a
    /// serialization lock around every statement anyway, and the cap
    /// bounds connection usage accordingly.
    pool: MySqlPool,
}

impl MySqlMessageStore {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }

    /// Build a store from settings without touching the network. The
    /// first connection is established lazily, surfacing any failure
    /// through [connect](MessageStore::connect).
    pub fn from_settings(settings: &DatabaseSettings) -> Self {
        let options = MySqlConnectOptions::new()
            .host(&settings.host)
            .port(settings.port)
            .username(&settings.user)
            .password(&settings.password)
            .database(&settings.database)
            .charset(&settings.charset);
        let pool = MySqlPoolOptions::new()
            .max_connections(1)
            .connect_lazy_with(options);
        Self { pool }
    }
}

#[async_trait::async_trait]
impl MessageStore for MySqlMessageStore {
    type Error = StoreError;

    async fn connect(&self) -> Result<(), Self::Error> {
        let mut conn = self.pool.acquire().await?;
        for query in CREATE_QUERIES {
            sqlx::query(query).execute(&mut conn).await?;
        }
        Ok(())
    }

    async fn store_message(&self, message: &Message) -> Result<(), Self::Error> {
        // Acquiring from the pool checks the connection and re-establishes
        // it when the previous one died.
        let mut tx = self.pool.begin().await?;
        sqlx::query(INSERT_TOPIC)
            .bind(&message.topic)
            .bind(&message.topic)
            .execute(&mut tx)
            .await?;
        sqlx::query(INSERT_MESSAGE)
            .bind(&message.topic)
            .bind(&message.payload)
            .bind(message.qos)
            .bind(message.timestamp)
            .bind(message.transport_secure)
            .execute(&mut tx)
            .await?;
        tx.commit().await?;
        Ok(())
    }

    async fn close(&self) -> Result<(), Self::Error> {
        self.pool.close().await;
        Ok(())
    }
}
