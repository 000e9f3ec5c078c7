//! Typed operator results.
//!
//! Each operator returns its own tagged result; the compute pool assembles
//! them into a [`ClipResult`] that the writer decomposes per artifact.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::clip::ClipTask;

/// One frame of segmentation output.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct MaskFrame {
    /// Frame index relative to the clip start
    pub frame_index: i64,
    /// Timestamp within the source video, in seconds
    pub timestamp_s: f64,
    /// RLE-encoded binary mask (JSON envelope, see `ego-io::mask`)
    pub mask_rle: String,
}

/// One frame of pose output (hand pose, object pose, or retargeting map).
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct PoseFrame {
    /// Frame index relative to the clip start
    pub frame_index: i64,
    /// Timestamp within the source video, in seconds
    pub timestamp_s: f64,
    /// Flattened pose vector
    pub pose: Vec<f32>,
}

/// Segmentation operator output.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SegmentationResult {
    pub frames: Vec<MaskFrame>,
    /// Encoding tag for `mask_rle` payloads
    pub mask_encoding: String,
    /// Fraction of frames with an empty mask
    pub empty_mask_rate: f64,
    pub start_s: f64,
    pub end_s: f64,
    pub video_path: String,
}

/// Hand-pose operator output.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct HandPoseResult {
    pub hand_pose: Vec<PoseFrame>,
}

/// Object-pose operator output.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct ObjectPoseResult {
    pub object_pose: Vec<PoseFrame>,
}

/// Retargeting operator output (derived from the hand-pose result).
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct RetargetResult {
    pub mapping: Vec<PoseFrame>,
}

/// Composite result of the full operator chain for one clip.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ClipResult {
    pub clip: ClipTask,
    pub masks: SegmentationResult,
    pub hand_pose: HandPoseResult,
    pub object_pose: ObjectPoseResult,
    pub mapping: RetargetResult,
}

/// Acknowledgement returned by the writer once a clip's artifact set is
/// fully committed.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct WriteReceipt {
    pub clip_id: String,
}
