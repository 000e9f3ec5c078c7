//! State store error types.

use thiserror::Error;

pub type StateStoreResult<T> = Result<T, StateStoreError>;

#[derive(Debug, Error)]
pub enum StateStoreError {
    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("corrupt clip status row: {0}")]
    CorruptRow(String),
}
