//! Shared data models for the egoworld batch perception pipeline.
//!
//! This crate provides Serde-serializable types for:
//! - Clip tasks and per-clip processing status
//! - Video/clip manifest rows and the embedded field specs
//! - Typed operator results (masks, poses, retargeting maps)
//! - The pipeline configuration tree and run manifest
//! - The per-clip error taxonomy and retry classification

pub mod clip;
pub mod config;
pub mod error;
pub mod hashing;
pub mod manifest;
pub mod qc;
pub mod result;
pub mod timecode;

// Re-export common types
pub use clip::{sanitize_id, ClipStatus, ClipTask};
pub use config::{
    load_config, make_run_id, BackpressureLimits, ConfigError, CoordinateSpec, MetricsThresholds,
    OperatorSettings, OperatorsSettings, ParquetSettings, PathSettings, PipelineConfig,
    ResolvedBackpressure, RetryPolicy, SceneDetectSettings,
};
pub use error::{classify, ClipError, ErrorClass};
pub use manifest::{field_specs, ClipRecord, VideoRecord};
pub use result::{
    ClipResult, HandPoseResult, MaskFrame, ObjectPoseResult, PoseFrame, RetargetResult,
    SegmentationResult, WriteReceipt,
};
