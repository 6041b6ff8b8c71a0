use thiserror::Error;

/// Newtype around [sqlx::Error]
#[derive(Debug, Error)]
#[error("mysql error: {0}")]
pub struct StoreError(#[from] sqlx::Error);
