use thiserror::Error;

#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("Database connection error: {0}")]
    Connection(String),

    #[error("Query execution error: {0}")]
    Query(String),

    #[error("Migration error: {0}")]
    Migration(String),

    #[error("Transaction error: {0}")]
    Transaction(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("Invalid seed data: {0}")]
    InvalidSeed(String),

    #[error("Seed file error: {0}")]
    SeedFile(#[from] std::io::Error),

    #[error("Seed parsing error: {0}")]
    SeedParsing(#[from] serde_yaml::Error),

    #[error("UUID parsing error: {0}")]
    UuidParsing(#[from] uuid::Error),
}

impl DatabaseError {
    pub(crate) fn query(e: sqlx::Error) -> Self {
        DatabaseError::Query(e.to_string())
    }

    pub(crate) fn transaction(e: sqlx::Error) -> Self {
        DatabaseError::Transaction(e.to_string())
    }

    /// Unique-constraint violations become `Conflict(message)`; anything else
    /// is a plain query error.
    pub(crate) fn conflict_or_query(e: sqlx::Error, message: &str) -> Self {
        match &e {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                DatabaseError::Conflict(message.to_string())
            }
            _ => DatabaseError::Query(e.to_string()),
        }
    }
}
