//! Pipeline error types.
//!
//! These are the fatal, run-level failures. Per-clip failures travel as
//! `ego_models::ClipError` and never escape the driver's per-clip boundary.

use thiserror::Error;

pub type PipelineResult<T> = Result<T, PipelineError>;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("failed to load config: {0}")]
    ConfigLoad(#[from] ego_models::ConfigError),

    #[error("manifest error: {0}")]
    Manifest(String),

    #[error("state store error: {0}")]
    State(#[from] ego_state::StateStoreError),

    #[error("output error: {0}")]
    Output(#[from] ego_io::OutputError),

    #[error("probe failed: {0}")]
    Probe(String),

    #[error("worker pool error: {0}")]
    Pool(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),
}

impl PipelineError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn manifest(msg: impl Into<String>) -> Self {
        Self::Manifest(msg.into())
    }

    pub fn pool(msg: impl Into<String>) -> Self {
        Self::Pool(msg.into())
    }
}
