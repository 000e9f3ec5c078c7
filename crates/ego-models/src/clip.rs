//! Clip task and status models.

use std::fmt;
use std::str::FromStr;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Processing status of a clip, persisted in the state store.
///
/// `Done` and `Failed` are terminal; a clip marked `Done` is never
/// downgraded within a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
pub enum ClipStatus {
    /// Admitted but not yet submitted to a compute worker
    #[default]
    Pending,
    /// Submitted to a compute worker
    Running,
    /// Compute finished, artifacts being written
    Writing,
    /// All artifacts committed
    Done,
    /// Terminally failed (dead-lettered)
    Failed,
}

impl ClipStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ClipStatus::Pending => "Pending",
            ClipStatus::Running => "Running",
            ClipStatus::Writing => "Writing",
            ClipStatus::Done => "Done",
            ClipStatus::Failed => "Failed",
        }
    }

    /// Statuses a resumed run re-admits (everything except `Done`).
    pub fn resumable() -> &'static [ClipStatus] {
        &[
            ClipStatus::Pending,
            ClipStatus::Running,
            ClipStatus::Writing,
            ClipStatus::Failed,
        ]
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, ClipStatus::Done | ClipStatus::Failed)
    }
}

impl fmt::Display for ClipStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ClipStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Pending" => Ok(ClipStatus::Pending),
            "Running" => Ok(ClipStatus::Running),
            "Writing" => Ok(ClipStatus::Writing),
            "Done" => Ok(ClipStatus::Done),
            "Failed" => Ok(ClipStatus::Failed),
            other => Err(format!("unknown clip status: {other}")),
        }
    }
}

/// Unit of work handed to the compute pool.
///
/// Built by joining a clip manifest row against the video manifest; mutated
/// only through status transitions in the state store.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ClipTask {
    /// Globally unique within a run, stable across reruns
    pub clip_id: String,

    /// Grouping key
    pub video_id: String,

    /// Filesystem path of the source video
    pub video_path: String,

    /// Clip start in seconds
    pub start_s: f64,

    /// Clip end in seconds
    pub end_s: f64,

    /// Clip start frame (consistent with `start_s` under the video fps)
    pub frame_start: u64,

    /// Clip end frame
    pub frame_end: u64,

    /// Scene detection fell back to the full clip
    #[serde(default)]
    pub scenedetect_failed: bool,

    /// Compute attempts already spent on this clip (seeds resumed runs)
    #[serde(default)]
    pub retry_count: u32,
}

impl ClipTask {
    /// Clip duration in seconds; the orderer sorts on this.
    pub fn duration_s(&self) -> f64 {
        self.end_s - self.start_s
    }
}

/// Sanitize an identifier segment for use in partition paths and clip IDs.
///
/// Only ASCII alphanumeric, hyphen, and underscore survive; whitespace
/// collapses to single underscores. Non-ASCII is stripped so partition
/// directory names never need escaping.
pub fn sanitize_id(raw: &str) -> String {
    let filtered: String = raw
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == ' ' || *c == '-' || *c == '_')
        .collect();
    let joined = filtered.split_whitespace().collect::<Vec<_>>().join("_");
    if joined.is_empty() {
        "video".to_string()
    } else {
        joined
    }
}
