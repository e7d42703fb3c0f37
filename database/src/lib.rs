pub mod config;
pub mod error;
pub mod models;
pub mod retry;
pub mod seed;
pub mod stores;

#[cfg(test)]
mod tests;

pub use config::DatabaseConfig;
pub use error::DatabaseError;
pub use models::{
    AdminRecord, CategoryRecord, HistoryEntry, NewAnswer, NewOption, NewQuestion, NewRoom, OptionRecord,
    PlayerRecord, QuestionRecord, RoomDeletion, RoomRecord, SessionRecord, TriviaRecord,
    WinnerPick, WinnerRecord,
};
pub use retry::retry_with_backoff;
pub use seed::{SeedCatalog, SeedReport};
pub use stores::{SqliteStore, TriviaStore};
