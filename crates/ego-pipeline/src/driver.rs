//! Pipeline driver.
//!
//! Owns the per-clip state machine:
//!
//! ```text
//! Pending ──submit──▶ Running ──ok──▶ Writing ──ok──▶ Done
//!    ▲                   │                │
//!    └──retryable────────┘                ├──retryable──▶ retry write only
//!                                         │
//!    Running|Writing ──terminal/exhausted─▶ Failed (+ dead letter)
//! ```
//!
//! The state store is updated before every transition; that ordering is
//! the resume contract. Clip failures never escape the per-clip boundary.

use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use metrics::{counter, gauge};
use tracing::{info, warn};

use ego_io::{run_dir, write_json};
use ego_models::{
    classify, make_run_id, ClipError, ClipResult, ClipStatus, ClipTask, PipelineConfig,
    ResolvedBackpressure, RetryPolicy, WriteReceipt,
};
use ego_operators::{NullOperatorFactory, OperatorSetFactory};
use ego_state::StateStore;

use crate::error::{PipelineError, PipelineResult};
use crate::gate::{enforce_in_flight, CompletionHandle, IdSource, SubmissionId};
use crate::manifest_io::{load_clip_manifest, load_video_manifest};
use crate::pool::ComputePool;
use crate::scheduler::sort_clips_by_duration;
use crate::writer::{ArtifactWriter, WriterActor};

/// Counts reported after a run drains.
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub run_id: String,
    pub admitted: usize,
    pub skipped_done: usize,
    pub done: usize,
    pub failed: usize,
}

/// Run the pipeline with the default (null) operator chain.
pub async fn run_pipeline(
    config: PipelineConfig,
    video_manifest: &Path,
    clip_manifest: &Path,
) -> PipelineResult<RunSummary> {
    let factory =
        NullOperatorFactory::new(config.operators.clone(), config.coordinates.clone());
    run_pipeline_with(config, video_manifest, clip_manifest, &factory).await
}

/// Run the pipeline with an injected operator factory.
pub async fn run_pipeline_with(
    mut config: PipelineConfig,
    video_manifest: &Path,
    clip_manifest: &Path,
    factory: &dyn OperatorSetFactory,
) -> PipelineResult<RunSummary> {
    let run_id = config.run_id.clone().unwrap_or_else(make_run_id);
    config.run_id = Some(run_id.clone());
    let caps = config.backpressure.resolve(config.num_gpus);
    if caps.max_in_flight_gpu == 0 || caps.max_in_flight_write == 0 {
        return Err(PipelineError::config(
            "a backpressure cap of zero disables the stage; nothing can be submitted",
        ));
    }

    let store = StateStore::open(&config.paths.state_db_path)?;

    let video_index = load_video_manifest(video_manifest)?;
    let clip_rows = load_clip_manifest(clip_manifest)?;
    store.bulk_insert_pending(&clip_rows)?;

    // Resume filter: every manifest row has a store row after the bulk
    // insert, so anything missing from the resumable set is Done and is
    // skipped outright; the rest re-admit at their stored retry count.
    let resumable: HashSet<String> = store
        .get_resumable_clips(ClipStatus::resumable())?
        .into_iter()
        .collect();
    let mut skipped_done = 0usize;
    let mut tasks = Vec::new();
    for row in &clip_rows {
        if !resumable.contains(&row.clip_id) {
            skipped_done += 1;
            continue;
        }
        let retry_count = store
            .get_clip_state(&row.clip_id)?
            .map(|s| s.retry_count)
            .unwrap_or(row.retry_count);
        let video_path = video_index
            .get(&row.video_id)
            .map(|v| v.path.clone())
            .unwrap_or_default();
        tasks.push(ClipTask {
            clip_id: row.clip_id.clone(),
            video_id: row.video_id.clone(),
            video_path,
            start_s: row.start_s,
            end_s: row.end_s,
            frame_start: row.frame_start,
            frame_end: row.frame_end,
            scenedetect_failed: row.scenedetect_failed,
            retry_count,
        });
    }
    let tasks = sort_clips_by_duration(tasks);
    let admitted = tasks.len();
    info!(run_id = %run_id, admitted, skipped_done, "run starting");

    // The run manifest lands before any clip compute begins.
    let mut manifest = config.to_run_manifest()?;
    manifest["created_at"] = serde_json::Value::String(
        Utc::now().format("%Y-%m-%dT%H:%M:%S%.6fZ").to_string(),
    );
    let run_root = run_dir(&config.paths.output_root, &run_id);
    std::fs::create_dir_all(&run_root)?;
    write_json(run_root.join("run_manifest.json"), &manifest)?;

    let ids = IdSource::default();
    let pool = ComputePool::new(config.num_gpus, factory, ids.clone(), caps.max_in_flight_gpu)?;
    let writer = WriterActor::new(
        ArtifactWriter::new(
            &config.paths.output_root,
            run_id.clone(),
            config.parquet.clone(),
            config.coordinates.clone(),
        ),
        ids,
        caps.max_in_flight_write,
    )?;

    let mut driver = Driver {
        store: &store,
        retry: &config.retry,
        caps,
        pool,
        writer,
        pending_gpu: Vec::new(),
        pending_write: Vec::new(),
        compute_meta: HashMap::new(),
        write_meta: HashMap::new(),
        done: 0,
        failed: 0,
    };

    for task in tasks {
        let attempt = task.retry_count;
        driver.submit_clip(task, attempt).await?;
        driver.drain_compute(driver.caps.max_in_flight_gpu).await?;
        driver.drain_write(driver.caps.max_in_flight_write).await?;
    }

    // Drain to empty: compute first (retries may refill it), then writes.
    // The write gate stays enforced while compute drains so stage 2 never
    // exceeds its cap.
    while !driver.pending_gpu.is_empty() {
        driver.drain_compute(1).await?;
        driver.drain_write(driver.caps.max_in_flight_write).await?;
    }
    while !driver.pending_write.is_empty() {
        driver.drain_write(1).await?;
    }

    let Driver {
        pool, writer, done, failed, ..
    } = driver;
    pool.join();
    writer.join();

    info!(run_id = %run_id, done, failed, "run drained");
    Ok(RunSummary {
        run_id,
        admitted,
        skipped_done,
        done,
        failed,
    })
}

struct Driver<'a> {
    store: &'a StateStore,
    retry: &'a RetryPolicy,
    caps: ResolvedBackpressure,
    pool: ComputePool,
    writer: WriterActor,
    pending_gpu: Vec<CompletionHandle<ClipResult>>,
    pending_write: Vec<CompletionHandle<WriteReceipt>>,
    compute_meta: HashMap<SubmissionId, (ClipTask, u32)>,
    write_meta: HashMap<SubmissionId, (Arc<ClipResult>, u32)>,
    done: usize,
    failed: usize,
}

impl Driver<'_> {
    /// Mark Running and hand the clip to the next compute worker.
    async fn submit_clip(&mut self, task: ClipTask, attempt: u32) -> PipelineResult<()> {
        self.store.upsert_clip_status(
            &task.clip_id,
            &task.video_id,
            ClipStatus::Running,
            "",
            attempt,
        )?;
        let handle = self.pool.submit(task.clone()).await?;
        self.compute_meta.insert(handle.id(), (task, attempt));
        self.pending_gpu.push(handle);
        Ok(())
    }

    /// Mark Writing and hand the composite result to the writer. The
    /// result is retained so a failed write can be retried without
    /// re-running any operator.
    async fn submit_write(
        &mut self,
        result: Arc<ClipResult>,
        write_attempt: u32,
    ) -> PipelineResult<()> {
        let handle = self.writer.submit(Arc::clone(&result)).await?;
        self.write_meta.insert(handle.id(), (result, write_attempt));
        self.pending_write.push(handle);
        Ok(())
    }

    async fn drain_compute(&mut self, cap: usize) -> PipelineResult<()> {
        let pending = std::mem::take(&mut self.pending_gpu);
        let (completed, remaining) = enforce_in_flight(pending, cap).await;
        self.pending_gpu = remaining;
        gauge!("queue_length", "stage" => "gpu").set(self.pending_gpu.len() as f64);

        for completion in completed {
            let Some((task, attempt)) = self.compute_meta.remove(&completion.id) else {
                warn!("compute completion with no metadata; dropping");
                continue;
            };
            match completion.outcome {
                Ok(result) => {
                    self.store.upsert_clip_status(
                        &task.clip_id,
                        &task.video_id,
                        ClipStatus::Writing,
                        "",
                        attempt,
                    )?;
                    self.submit_write(Arc::new(result), 0).await?;
                }
                Err(error) => self.handle_compute_failure(task, attempt, error).await?,
            }
        }
        Ok(())
    }

    async fn drain_write(&mut self, cap: usize) -> PipelineResult<()> {
        let pending = std::mem::take(&mut self.pending_write);
        let (completed, remaining) = enforce_in_flight(pending, cap).await;
        self.pending_write = remaining;
        gauge!("queue_length", "stage" => "write").set(self.pending_write.len() as f64);

        for completion in completed {
            let Some((result, write_attempt)) = self.write_meta.remove(&completion.id) else {
                warn!("write completion with no metadata; dropping");
                continue;
            };
            let clip = &result.clip;
            match completion.outcome {
                Ok(_receipt) => {
                    self.store.upsert_clip_status(
                        &clip.clip_id,
                        &clip.video_id,
                        ClipStatus::Done,
                        "",
                        clip.retry_count,
                    )?;
                    counter!("clips_processed_total").increment(1);
                    self.done += 1;
                }
                Err(error) => {
                    self.handle_write_failure(result, write_attempt, error)
                        .await?
                }
            }
        }
        Ok(())
    }

    /// Retry/terminal decision after a compute failure. A retry re-enters
    /// stage 1 after the backoff delay with the attempt counter bumped.
    async fn handle_compute_failure(
        &mut self,
        mut task: ClipTask,
        attempt: u32,
        error: ClipError,
    ) -> PipelineResult<()> {
        let class = classify(&error);
        if class.retryable && attempt < self.retry.max_retries {
            let next = attempt + 1;
            let delay = self.retry.next_delay_s(next);
            warn!(
                clip_id = %task.clip_id,
                reason = class.reason,
                attempt = next,
                delay_s = delay,
                "retrying compute"
            );
            tokio::time::sleep(Duration::from_secs_f64(delay)).await;
            task.retry_count = next;
            self.submit_clip(task, next).await
        } else {
            self.fail_clip(&task.clip_id, &task.video_id, attempt, &error)
        }
    }

    /// Retry/terminal decision after a write failure. A retry resubmits
    /// the write only; the write budget is tracked separately from the
    /// clip's compute attempts.
    async fn handle_write_failure(
        &mut self,
        result: Arc<ClipResult>,
        write_attempt: u32,
        error: ClipError,
    ) -> PipelineResult<()> {
        let class = classify(&error);
        if class.retryable && write_attempt < self.retry.max_retries {
            let next = write_attempt + 1;
            let delay = self.retry.next_delay_s(next);
            warn!(
                clip_id = %result.clip.clip_id,
                reason = class.reason,
                write_attempt = next,
                delay_s = delay,
                "retrying write"
            );
            tokio::time::sleep(Duration::from_secs_f64(delay)).await;
            self.submit_write(result, next).await
        } else {
            let clip = result.clip.clone();
            self.fail_clip(&clip.clip_id, &clip.video_id, clip.retry_count, &error)
        }
    }

    /// Terminal transition: Failed row plus one dead-letter append.
    fn fail_clip(
        &mut self,
        clip_id: &str,
        video_id: &str,
        retry_count: u32,
        error: &ClipError,
    ) -> PipelineResult<()> {
        let message = error.to_string();
        self.store
            .upsert_clip_status(clip_id, video_id, ClipStatus::Failed, &message, retry_count)?;
        self.store.mark_dead_letter(clip_id, video_id, &message)?;
        counter!("clip_failures_total").increment(1);
        self.failed += 1;
        Ok(())
    }
}
