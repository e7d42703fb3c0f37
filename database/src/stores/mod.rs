pub mod sqlite_store;
pub mod traits;

pub use sqlite_store::SqliteStore;
pub use traits::TriviaStore;
