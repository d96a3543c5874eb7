use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage has been closed")]
    Closed,

    #[error("not found")]
    NotFound,

    #[error("duplicate key: {0}")]
    DuplicateKey(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

pub type Result<T> = std::result::Result<T, StorageError>;
