//! Operator trait seams for the perception chain.
//!
//! The pipeline treats every perception operator as a black box: a stateful
//! object built from an opaque parameter block, with a `run` method whose
//! signature is operator-specific. Real model-backed implementations live
//! outside this workspace; the null implementations here satisfy the
//! contract with empty outputs so the scheduler core is exercisable
//! end to end.

mod null_ops;
pub mod scene_detect;

use ego_models::{
    ClipError, ClipResult, ClipTask, HandPoseResult, ObjectPoseResult, RetargetResult,
    SegmentationResult,
};

pub use null_ops::{
    NullHandPose, NullObjectPose, NullOperatorFactory, NullRetarget, NullSegmentation,
};
pub use scene_detect::{detect_scenes, FallbackSceneDetector, SceneDetector};

/// Video segmentation over a clip interval.
pub trait SegmentationOperator: Send {
    fn run(
        &mut self,
        video_path: &str,
        start_s: f64,
        end_s: f64,
    ) -> Result<SegmentationResult, ClipError>;
}

/// Hand pose estimation over a clip interval.
pub trait HandPoseOperator: Send {
    fn run(
        &mut self,
        video_path: &str,
        start_s: f64,
        end_s: f64,
    ) -> Result<HandPoseResult, ClipError>;
}

/// Object pose estimation over a clip interval.
pub trait ObjectPoseOperator: Send {
    fn run(
        &mut self,
        video_path: &str,
        start_s: f64,
        end_s: f64,
    ) -> Result<ObjectPoseResult, ClipError>;
}

/// Retargeting of an estimated hand pose onto the target embodiment.
pub trait RetargetOperator: Send {
    fn run(&mut self, hand_pose: &HandPoseResult) -> Result<RetargetResult, ClipError>;
}

/// One worker's operator chain, owned by exactly one compute worker.
pub struct OperatorSet {
    pub segmentation: Box<dyn SegmentationOperator>,
    pub hand_pose: Box<dyn HandPoseOperator>,
    pub object_pose: Box<dyn ObjectPoseOperator>,
    pub retarget: Box<dyn RetargetOperator>,
}

impl OperatorSet {
    /// Execute the chain in fixed order: segmentation, hand pose, object
    /// pose, then retargeting fed the hand-pose result.
    pub fn process(&mut self, clip: ClipTask) -> Result<ClipResult, ClipError> {
        let masks = self
            .segmentation
            .run(&clip.video_path, clip.start_s, clip.end_s)?;
        let hand_pose = self
            .hand_pose
            .run(&clip.video_path, clip.start_s, clip.end_s)?;
        let object_pose = self
            .object_pose
            .run(&clip.video_path, clip.start_s, clip.end_s)?;
        let mapping = self.retarget.run(&hand_pose)?;
        Ok(ClipResult {
            clip,
            masks,
            hand_pose,
            object_pose,
            mapping,
        })
    }
}

/// Builds one [`OperatorSet`] per compute worker.
///
/// `build` runs once per worker before its first clip is dispatched, so
/// any model loading happens exactly once per worker and a load failure
/// aborts the run up front. This is also the fault injection seam for
/// tests.
pub trait OperatorSetFactory: Send + Sync {
    fn build(&self, worker_index: usize) -> Result<OperatorSet, ClipError>;
}
