//! Output error types.

use ego_models::ClipError;
use thiserror::Error;

pub type OutputResult<T> = Result<T, OutputError>;

#[derive(Debug, Error)]
pub enum OutputError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    #[error("Parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),

    #[error("invalid mask: {0}")]
    InvalidMask(String),
}

impl From<OutputError> for ClipError {
    fn from(err: OutputError) -> Self {
        match err {
            // Disk-level failures are worth a write retry.
            OutputError::Io(e) => ClipError::TransientIo(e.to_string()),
            other => ClipError::InvalidData(other.to_string()),
        }
    }
}
