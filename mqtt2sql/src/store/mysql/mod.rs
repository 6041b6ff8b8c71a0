mod error;
mod queries;
mod store;

pub use error::StoreError;
pub use store::MySqlMessageStore;
