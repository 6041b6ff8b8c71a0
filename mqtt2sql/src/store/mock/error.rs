use thiserror::Error;

#[derive(Debug, Error)]
pub enum MockStoreError {
    #[error("not connected")]
    NotConnected,
    #[error("simulated connect failure")]
    ConnectFailed,
    #[error("simulated write failure")]
    WriteFailed,
}
