//! GPU compute worker pool.
//!
//! One OS thread per GPU, each owning its operator set for the lifetime of
//! the run. Clips arrive over a bounded inbox and results leave through
//! one-shot reply channels the driver selects on; workers share no mutable
//! state with each other.

use std::time::Instant;

use metrics::histogram;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use ego_models::{ClipError, ClipResult, ClipTask};
use ego_operators::{OperatorSet, OperatorSetFactory};

use crate::error::{PipelineError, PipelineResult};
use crate::gate::{CompletionHandle, IdSource};

struct ComputeRequest {
    clip: ClipTask,
    reply: oneshot::Sender<Result<ClipResult, ClipError>>,
}

/// Fixed pool of `num_gpus` compute workers with round-robin dispatch.
pub struct ComputePool {
    inboxes: Vec<mpsc::Sender<ComputeRequest>>,
    threads: Vec<std::thread::JoinHandle<()>>,
    ids: IdSource,
    next_worker: usize,
}

impl ComputePool {
    /// Spawn the pool. Operator sets are built up front, one per worker,
    /// so model-loading failures abort the run before any clip is
    /// dispatched.
    pub fn new(
        num_gpus: usize,
        factory: &dyn OperatorSetFactory,
        ids: IdSource,
        queue_depth: usize,
    ) -> PipelineResult<Self> {
        if num_gpus == 0 {
            return Err(PipelineError::config("num_gpus must be at least 1"));
        }
        let mut inboxes = Vec::with_capacity(num_gpus);
        let mut threads = Vec::with_capacity(num_gpus);
        for worker in 0..num_gpus {
            let operators = factory
                .build(worker)
                .map_err(|e| PipelineError::pool(format!("worker {worker} init failed: {e}")))?;
            let (tx, rx) = mpsc::channel(queue_depth.max(1));
            let thread = std::thread::Builder::new()
                .name(format!("compute-{worker}"))
                .spawn(move || worker_loop(worker, operators, rx))?;
            inboxes.push(tx);
            threads.push(thread);
        }
        info!(num_gpus, "compute pool started");
        Ok(Self {
            inboxes,
            threads,
            ids,
            next_worker: 0,
        })
    }

    /// Submit one clip to the next worker in round-robin order.
    pub async fn submit(&mut self, clip: ClipTask) -> PipelineResult<CompletionHandle<ClipResult>> {
        let worker = self.next_worker % self.inboxes.len();
        self.next_worker += 1;
        let id = self.ids.next();
        let (reply, rx) = oneshot::channel();
        self.inboxes[worker]
            .send(ComputeRequest { clip, reply })
            .await
            .map_err(|_| PipelineError::pool(format!("worker {worker} is gone")))?;
        Ok(CompletionHandle::new(id, rx))
    }

    /// Close the inboxes and wait for every worker to exit.
    pub fn join(mut self) {
        self.inboxes.clear();
        for thread in self.threads.drain(..) {
            if thread.join().is_err() {
                warn!("compute worker panicked during shutdown");
            }
        }
    }
}

fn worker_loop(
    worker: usize,
    mut operators: OperatorSet,
    mut rx: mpsc::Receiver<ComputeRequest>,
) {
    while let Some(request) = rx.blocking_recv() {
        let clip_id = request.clip.clip_id.clone();
        debug!(worker, clip_id = %clip_id, "compute start");
        let started = Instant::now();
        let result = operators.process(request.clip);
        histogram!("stage_latency_seconds", "stage" => "gpu")
            .record(started.elapsed().as_secs_f64());
        if let Err(error) = &result {
            debug!(worker, clip_id = %clip_id, %error, "compute failed");
        }
        // The driver may already have given up on this clip; a closed
        // reply channel is not the worker's problem.
        let _ = request.reply.send(result);
    }
    debug!(worker, "compute worker exiting");
}
