//! Writer actor: serializes one clip's artifact set to disk.
//!
//! A single writer thread (write throughput is rarely the bottleneck, and
//! one writer avoids filesystem contention). Every file goes through the
//! tmp-then-rename protocol, so a mid-write failure leaves no partial
//! artifacts beyond the already-renamed ones.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use metrics::histogram;
use serde_json::json;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

use ego_io::{clip_dir, write_json, write_mask_table, write_pose_table};
use ego_models::{
    field_specs, ClipError, ClipResult, CoordinateSpec, ParquetSettings, WriteReceipt,
};

use crate::error::{PipelineError, PipelineResult};
use crate::gate::{CompletionHandle, IdSource};

/// Produces one clip's artifact set under the partitioned layout.
pub struct ArtifactWriter {
    output_root: PathBuf,
    run_id: String,
    parquet: ParquetSettings,
    coordinates: CoordinateSpec,
}

impl ArtifactWriter {
    pub fn new(
        output_root: impl Into<PathBuf>,
        run_id: impl Into<String>,
        parquet: ParquetSettings,
        coordinates: CoordinateSpec,
    ) -> Self {
        Self {
            output_root: output_root.into(),
            run_id: run_id.into(),
            parquet,
            coordinates,
        }
    }

    /// Write `meta.json` and the four columnar tables for one clip.
    pub fn write_clip(&self, result: &ClipResult) -> Result<WriteReceipt, ClipError> {
        let dir = clip_dir(
            &self.output_root,
            &self.run_id,
            &result.clip.video_id,
            &result.clip.clip_id,
        );

        let meta = json!({
            "clip": result.clip,
            "field_specs": field_specs(),
            "mask_encoding": self.coordinates.mask_encoding,
            "time_base": self.coordinates.time_base,
        });
        write_json(dir.join("meta.json"), &meta)?;
        write_mask_table(dir.join("masks.parquet"), &result.masks.frames, &self.parquet)?;
        write_pose_table(
            dir.join("hand_pose.parquet"),
            &result.hand_pose.hand_pose,
            &self.parquet,
        )?;
        write_pose_table(
            dir.join("object_pose.parquet"),
            &result.object_pose.object_pose,
            &self.parquet,
        )?;
        write_pose_table(dir.join("mapping.parquet"), &result.mapping.mapping, &self.parquet)?;

        Ok(WriteReceipt {
            clip_id: result.clip.clip_id.clone(),
        })
    }
}

struct WriteRequest {
    result: Arc<ClipResult>,
    reply: oneshot::Sender<Result<WriteReceipt, ClipError>>,
}

/// The single serialized writer stage.
pub struct WriterActor {
    inbox: mpsc::Sender<WriteRequest>,
    thread: Option<std::thread::JoinHandle<()>>,
    ids: IdSource,
}

impl WriterActor {
    pub fn new(
        writer: ArtifactWriter,
        ids: IdSource,
        queue_depth: usize,
    ) -> PipelineResult<Self> {
        let (inbox, mut rx) = mpsc::channel::<WriteRequest>(queue_depth.max(1));
        let thread = std::thread::Builder::new()
            .name("writer".to_string())
            .spawn(move || {
                while let Some(request) = rx.blocking_recv() {
                    let clip_id = request.result.clip.clip_id.clone();
                    debug!(clip_id = %clip_id, "write start");
                    let started = Instant::now();
                    let outcome = writer.write_clip(&request.result);
                    histogram!("stage_latency_seconds", "stage" => "write")
                        .record(started.elapsed().as_secs_f64());
                    if let Err(error) = &outcome {
                        debug!(clip_id = %clip_id, %error, "write failed");
                    }
                    let _ = request.reply.send(outcome);
                }
                debug!("writer exiting");
            })?;
        Ok(Self {
            inbox,
            thread: Some(thread),
            ids,
        })
    }

    /// Submit one composite result for writing. The `Arc` lets the driver
    /// keep the result for a write-only retry without recomputing.
    pub async fn submit(
        &self,
        result: Arc<ClipResult>,
    ) -> PipelineResult<CompletionHandle<WriteReceipt>> {
        let id = self.ids.next();
        let (reply, rx) = oneshot::channel();
        self.inbox
            .send(WriteRequest { result, reply })
            .await
            .map_err(|_| PipelineError::pool("writer is gone"))?;
        Ok(CompletionHandle::new(id, rx))
    }

    /// Close the inbox and wait for the writer thread.
    pub fn join(mut self) {
        drop(self.inbox);
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                warn!("writer thread panicked during shutdown");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ego_models::{ClipTask, HandPoseResult, ObjectPoseResult, RetargetResult, SegmentationResult};

    fn result(clip_id: &str) -> ClipResult {
        let clip = ClipTask {
            clip_id: clip_id.to_string(),
            video_id: "v1".to_string(),
            video_path: "/tmp/a.mp4".to_string(),
            start_s: 0.0,
            end_s: 1.0,
            frame_start: 0,
            frame_end: 30,
            scenedetect_failed: false,
            retry_count: 0,
        };
        ClipResult {
            masks: SegmentationResult {
                frames: Vec::new(),
                mask_encoding: "rle".to_string(),
                empty_mask_rate: 1.0,
                start_s: clip.start_s,
                end_s: clip.end_s,
                video_path: clip.video_path.clone(),
            },
            hand_pose: HandPoseResult::default(),
            object_pose: ObjectPoseResult::default(),
            mapping: RetargetResult::default(),
            clip,
        }
    }

    #[test]
    fn test_artifact_set_layout() {
        let dir = tempfile::tempdir().unwrap();
        let writer = ArtifactWriter::new(
            dir.path(),
            "r1",
            ParquetSettings::default(),
            CoordinateSpec::default(),
        );
        writer.write_clip(&result("c1")).unwrap();

        let clip = dir.path().join("run_id=r1/video_id=v1/clip_id=c1");
        for file in [
            "meta.json",
            "masks.parquet",
            "hand_pose.parquet",
            "object_pose.parquet",
            "mapping.parquet",
        ] {
            assert!(clip.join(file).exists(), "missing {file}");
            assert!(!clip.join(format!("{file}.tmp")).exists());
        }

        let meta: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(clip.join("meta.json")).unwrap())
                .unwrap();
        assert_eq!(meta["clip"]["clip_id"], "c1");
        assert_eq!(meta["mask_encoding"], "rle");
        assert_eq!(meta["time_base"], "seconds");
        assert!(meta["field_specs"]["masks"].is_object());
    }

    #[tokio::test]
    async fn test_writer_actor_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let writer = ArtifactWriter::new(
            dir.path(),
            "r1",
            ParquetSettings::default(),
            CoordinateSpec::default(),
        );
        let actor = WriterActor::new(writer, IdSource::default(), 2).unwrap();
        let handle = actor.submit(Arc::new(result("c1"))).await.unwrap();
        let (done, _) = crate::gate::enforce_in_flight(vec![handle], 1).await;
        let receipt = done.into_iter().next().unwrap().outcome.unwrap();
        assert_eq!(receipt.clip_id, "c1");
        actor.join();
    }
}
