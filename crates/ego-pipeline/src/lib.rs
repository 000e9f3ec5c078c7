//! Offline batch scheduler for the egoworld perception pipeline.
//!
//! Ingests video/clip manifests, fans clips out to a GPU compute pool,
//! funnels results through a single writer that commits artifacts
//! atomically, and records per-clip progress in a SQLite state store so
//! interrupted runs resume without rework.

pub mod driver;
mod error;
pub mod gate;
pub mod manifest_io;
pub mod pool;
pub mod scheduler;
pub mod writer;

pub use driver::{run_pipeline, run_pipeline_with, RunSummary};
pub use error::{PipelineError, PipelineResult};
pub use gate::{enforce_in_flight, Completion, CompletionHandle, IdSource, SubmissionId};
pub use manifest_io::{
    build_manifests, discover_videos, load_clip_manifest, load_video_manifest, write_manifest,
    FfprobeProber, ProbedVideo, VideoProber,
};
pub use pool::ComputePool;
pub use scheduler::sort_clips_by_duration;
pub use writer::{ArtifactWriter, WriterActor};
