//! Video and clip manifest rows.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::clip::ClipStatus;

/// One row of `video_manifest.jsonl`.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct VideoRecord {
    pub video_id: String,
    pub path: String,
    pub duration_s: f64,
    pub fps: f64,
    pub width: u32,
    pub height: u32,
    pub audio: bool,
    /// sha256 of the video file
    pub checksum: String,
    #[serde(default = "default_split")]
    pub split: String,
}

fn default_split() -> String {
    "train".to_string()
}

/// One row of `clip_manifest.jsonl`.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ClipRecord {
    pub clip_id: String,
    pub video_id: String,
    pub start_s: f64,
    pub end_s: f64,
    pub frame_start: u64,
    pub frame_end: u64,
    /// Overlap padding applied when the clip was cut; informational only
    #[serde(default)]
    pub overlap_s: f64,
    #[serde(default)]
    pub scenedetect_failed: bool,
    #[serde(default)]
    pub status: ClipStatus,
    #[serde(default)]
    pub last_error: String,
    #[serde(default)]
    pub retry_count: u32,
}

/// Column specs embedded in every clip's `meta.json`.
pub fn field_specs() -> serde_json::Value {
    json!({
        "masks": {
            "frame_index": "int64",
            "timestamp_s": "float64",
            "mask_rle": "string",
        },
        "hand_pose": {
            "frame_index": "int64",
            "timestamp_s": "float64",
            "pose": "list<float32>",
        },
        "object_pose": {
            "frame_index": "int64",
            "timestamp_s": "float64",
            "pose": "list<float32>",
        },
        "mapping": {
            "frame_index": "int64",
            "timestamp_s": "float64",
            "pose": "list<float32>",
        },
    })
}
