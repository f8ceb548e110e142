pub mod error;
pub mod gateway;
pub mod message_store;
mod sql;
pub mod trade_store;

pub use error::StoreError;
pub use gateway::{MessageStore, TradeStore};
pub use message_store::SqliteMessageStore;
pub use trade_store::SqliteTradeStore;
