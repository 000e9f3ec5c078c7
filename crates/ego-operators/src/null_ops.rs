//! Null operator implementations.
//!
//! Each honors its trait contract with empty outputs. They stand in for
//! model-backed operators in environments without GPU checkpoints and are
//! the defaults wired by the CLI.

use ego_models::qc::empty_mask_rate;
use ego_models::{
    ClipError, CoordinateSpec, HandPoseResult, ObjectPoseResult, OperatorsSettings,
    RetargetResult, SegmentationResult,
};
use tracing::debug;

use crate::{
    HandPoseOperator, ObjectPoseOperator, OperatorSet, OperatorSetFactory, RetargetOperator,
    SegmentationOperator,
};

/// Segmentation stub producing zero frames.
pub struct NullSegmentation {
    mask_encoding: String,
}

impl NullSegmentation {
    pub fn new(params: &serde_json::Value, coordinates: &CoordinateSpec) -> Self {
        // Params may override the advertised encoding tag.
        let mask_encoding = params
            .get("mask_encoding")
            .and_then(|v| v.as_str())
            .unwrap_or(&coordinates.mask_encoding)
            .to_string();
        Self { mask_encoding }
    }
}

impl SegmentationOperator for NullSegmentation {
    fn run(
        &mut self,
        video_path: &str,
        start_s: f64,
        end_s: f64,
    ) -> Result<SegmentationResult, ClipError> {
        let frames = Vec::new();
        Ok(SegmentationResult {
            empty_mask_rate: empty_mask_rate(&frames),
            frames,
            mask_encoding: self.mask_encoding.clone(),
            start_s,
            end_s,
            video_path: video_path.to_string(),
        })
    }
}

/// Hand-pose stub.
#[derive(Default)]
pub struct NullHandPose;

impl HandPoseOperator for NullHandPose {
    fn run(
        &mut self,
        _video_path: &str,
        _start_s: f64,
        _end_s: f64,
    ) -> Result<HandPoseResult, ClipError> {
        Ok(HandPoseResult::default())
    }
}

/// Object-pose stub.
#[derive(Default)]
pub struct NullObjectPose;

impl ObjectPoseOperator for NullObjectPose {
    fn run(
        &mut self,
        _video_path: &str,
        _start_s: f64,
        _end_s: f64,
    ) -> Result<ObjectPoseResult, ClipError> {
        Ok(ObjectPoseResult::default())
    }
}

/// Retargeting stub producing an empty mapping.
#[derive(Default)]
pub struct NullRetarget;

impl RetargetOperator for NullRetarget {
    fn run(&mut self, _hand_pose: &HandPoseResult) -> Result<RetargetResult, ClipError> {
        Ok(RetargetResult::default())
    }
}

/// Factory wiring the null chain from operator settings.
pub struct NullOperatorFactory {
    settings: OperatorsSettings,
    coordinates: CoordinateSpec,
}

impl NullOperatorFactory {
    pub fn new(settings: OperatorsSettings, coordinates: CoordinateSpec) -> Self {
        Self {
            settings,
            coordinates,
        }
    }
}

impl OperatorSetFactory for NullOperatorFactory {
    fn build(&self, worker_index: usize) -> Result<OperatorSet, ClipError> {
        debug!(worker = worker_index, "building null operator set");
        Ok(OperatorSet {
            segmentation: Box::new(NullSegmentation::new(
                &self.settings.segmentation.params,
                &self.coordinates,
            )),
            hand_pose: Box::new(NullHandPose),
            object_pose: Box::new(NullObjectPose),
            retarget: Box::new(NullRetarget),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ego_models::ClipTask;

    fn task() -> ClipTask {
        ClipTask {
            clip_id: "c1".into(),
            video_id: "v1".into(),
            video_path: "/tmp/a.mp4".into(),
            start_s: 0.0,
            end_s: 1.0,
            frame_start: 0,
            frame_end: 30,
            scenedetect_failed: false,
            retry_count: 0,
        }
    }

    #[test]
    fn test_null_chain_produces_composite_result() {
        let factory =
            NullOperatorFactory::new(OperatorsSettings::default(), CoordinateSpec::default());
        let mut set = factory.build(0).unwrap();
        let result = set.process(task()).unwrap();
        assert_eq!(result.clip.clip_id, "c1");
        assert!(result.masks.frames.is_empty());
        assert_eq!(result.masks.mask_encoding, "rle");
        assert_eq!(result.masks.empty_mask_rate, 1.0);
        assert!(result.mapping.mapping.is_empty());
    }

    #[test]
    fn test_params_override_mask_encoding() {
        let params = serde_json::json!({"mask_encoding": "rle_packed"});
        let mut op = NullSegmentation::new(&params, &CoordinateSpec::default());
        let result = op.run("/tmp/a.mp4", 0.0, 1.0).unwrap();
        assert_eq!(result.mask_encoding, "rle_packed");
    }
}
