//! Backpressure gate over in-flight completion handles.
//!
//! Work submitted to a stage yields a [`CompletionHandle`]; the driver
//! keeps the pending handles per stage and calls [`enforce_in_flight`]
//! before admitting more. The handle's [`SubmissionId`] is hashable so the
//! driver can map completions back to (clip, attempt) metadata.

use std::future::{poll_fn, Future};
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::task::Poll;

use tokio::sync::oneshot;

use ego_models::ClipError;

/// Opaque identity of one submission to a stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubmissionId(u64);

/// Monotonic id allocator shared by the compute pool and the writer.
#[derive(Debug, Clone, Default)]
pub struct IdSource(Arc<AtomicU64>);

impl IdSource {
    pub fn next(&self) -> SubmissionId {
        SubmissionId(self.0.fetch_add(1, Ordering::Relaxed))
    }
}

/// Pending reply for one submitted piece of work.
pub struct CompletionHandle<T> {
    id: SubmissionId,
    rx: oneshot::Receiver<Result<T, ClipError>>,
}

impl<T> CompletionHandle<T> {
    pub fn new(id: SubmissionId, rx: oneshot::Receiver<Result<T, ClipError>>) -> Self {
        Self { id, rx }
    }

    pub fn id(&self) -> SubmissionId {
        self.id
    }
}

/// A resolved handle: the submission and its outcome.
pub struct Completion<T> {
    pub id: SubmissionId,
    pub outcome: Result<T, ClipError>,
}

/// Block until the stage is under its cap.
///
/// - `cap == 0`: the gate is disabled; nothing is drained and the caller
///   must not have submitted.
/// - `pending.len() < cap`: returns immediately with nothing drained.
/// - otherwise: waits until at least one handle completes and returns the
///   completed subset alongside the still-pending remainder.
///
/// A worker that drops its reply channel counts as completed with an
/// internal error, so a crashed worker can never wedge the gate.
pub async fn enforce_in_flight<T>(
    mut pending: Vec<CompletionHandle<T>>,
    cap: usize,
) -> (Vec<Completion<T>>, Vec<CompletionHandle<T>>) {
    if cap == 0 || pending.len() < cap {
        return (Vec::new(), pending);
    }

    let completed = poll_fn(|cx| {
        let mut done = Vec::new();
        let mut i = 0;
        while i < pending.len() {
            match Pin::new(&mut pending[i].rx).poll(cx) {
                Poll::Ready(res) => {
                    let handle = pending.swap_remove(i);
                    let outcome = res.unwrap_or_else(|_| {
                        Err(ClipError::internal("worker dropped the reply channel"))
                    });
                    done.push(Completion {
                        id: handle.id,
                        outcome,
                    });
                }
                Poll::Pending => i += 1,
            }
        }
        if done.is_empty() {
            Poll::Pending
        } else {
            Poll::Ready(done)
        }
    })
    .await;

    (completed, pending)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn handle(ids: &IdSource) -> (oneshot::Sender<Result<u32, ClipError>>, CompletionHandle<u32>) {
        let (tx, rx) = oneshot::channel();
        (tx, CompletionHandle::new(ids.next(), rx))
    }

    #[tokio::test]
    async fn test_under_cap_passes_through() {
        let ids = IdSource::default();
        let (_tx, h) = handle(&ids);
        let (done, remaining) = enforce_in_flight(vec![h], 2).await;
        assert!(done.is_empty());
        assert_eq!(remaining.len(), 1);
    }

    #[tokio::test]
    async fn test_disabled_gate_drains_nothing() {
        let ids = IdSource::default();
        let (_tx, h) = handle(&ids);
        let (done, remaining) = enforce_in_flight(vec![h], 0).await;
        assert!(done.is_empty());
        assert_eq!(remaining.len(), 1);
    }

    #[tokio::test]
    async fn test_at_cap_waits_for_one_completion() {
        let ids = IdSource::default();
        let (tx1, h1) = handle(&ids);
        let (_tx2, h2) = handle(&ids);
        let expected = h1.id();

        let wait = tokio::spawn(enforce_in_flight(vec![h1, h2], 2));
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        tx1.send(Ok(7)).unwrap();

        let (done, remaining) = wait.await.unwrap();
        assert_eq!(done.len(), 1);
        assert_eq!(done[0].id, expected);
        assert_eq!(*done[0].outcome.as_ref().unwrap(), 7);
        assert_eq!(remaining.len(), 1);
    }

    #[tokio::test]
    async fn test_dropped_sender_counts_as_internal_error() {
        let ids = IdSource::default();
        let (tx, h) = handle(&ids);
        drop(tx);
        let (done, remaining) = enforce_in_flight(vec![h], 1).await;
        assert!(remaining.is_empty());
        assert!(done[0].outcome.is_err());
    }
}
