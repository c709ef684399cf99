//! Batch scheduler: slot assignment, completion, failure and drain tracking
//!
//! The scheduler is the only writer of job lifecycle state. Protocol
//! handlers translate wire requests into its methods; it keeps the slot
//! invariant (at most K jobs Assigned or Sampling) by moving the freed
//! permit directly to the next Pending job whenever a job finishes.

use anyhow::Result;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tokio::sync::{mpsc, Mutex, Notify};
use tracing::{debug, info, warn};

use crate::application::error_ledger::ErrorLedger;
use crate::application::job_store::JobStore;
use crate::application::slot_pool::{SlotHandle, SlotPool};
use crate::domain::error::CoordinationError;
use crate::domain::models::{JobId, JobStatus};

/// A single job status change, emitted for progress display.
#[derive(Debug, Clone, Copy)]
pub struct JobStatusUpdate {
    /// Job that moved.
    pub job_id: JobId,
    /// Status it left.
    pub old_status: JobStatus,
    /// Status it entered.
    pub new_status: JobStatus,
}

/// Coordinates the batch: owns slot assignment and every status change.
pub struct BatchScheduler {
    store: Arc<JobStore>,
    slots: Arc<SlotPool>,
    ledger: Arc<ErrorLedger>,
    /// Permits held by currently active jobs.
    assignments: Mutex<HashMap<JobId, SlotHandle>>,
    status_tx: mpsc::Sender<JobStatusUpdate>,
    status_rx: Mutex<Option<mpsc::Receiver<JobStatusUpdate>>>,
    drained: Notify,
}

impl BatchScheduler {
    /// Create a scheduler over the given store, pool and ledger.
    pub fn new(store: Arc<JobStore>, slots: Arc<SlotPool>, ledger: Arc<ErrorLedger>) -> Self {
        let (status_tx, status_rx) = mpsc::channel(1000);
        Self {
            store,
            slots,
            ledger,
            assignments: Mutex::new(HashMap::new()),
            status_tx,
            status_rx: Mutex::new(Some(status_rx)),
            drained: Notify::new(),
        }
    }

    /// Shared handle to the job store.
    pub fn store(&self) -> Arc<JobStore> {
        Arc::clone(&self.store)
    }

    /// Shared handle to the error ledger.
    pub fn ledger(&self) -> Arc<ErrorLedger> {
        Arc::clone(&self.ledger)
    }

    /// Take the status update receiver. Yields `Some` exactly once.
    pub async fn take_status_receiver(&self) -> Option<mpsc::Receiver<JobStatusUpdate>> {
        self.status_rx.lock().await.take()
    }

    /// Fill the initial slots: the first min(K, jobs) Pending jobs become
    /// Assigned, in id order. An empty batch drains immediately.
    pub async fn start(&self) -> Result<()> {
        let fill = self.store.len().await.min(self.slots.capacity());
        for _ in 0..fill {
            let Some(permit) = self.slots.try_acquire() else {
                break;
            };
            let Some(id) = self.store.assign_next_pending().await else {
                break;
            };
            self.assignments.lock().await.insert(id, permit);
            self.emit(id, JobStatus::Pending, JobStatus::Assigned);
            debug!(job_id = id, "job assigned to slot");
        }
        info!(
            jobs = self.store.len().await,
            slots = self.slots.capacity(),
            "batch started"
        );
        self.check_drained().await;
        Ok(())
    }

    /// Note that the host fetched a job's input, returning the input path
    /// to serve.
    ///
    /// The first fetch of an Assigned job starts its sampling phase; any
    /// later fetch (host retry, terminal job) serves the bytes without
    /// touching status.
    pub async fn input_fetched(&self, id: JobId) -> Result<PathBuf, CoordinationError> {
        let job = self.store.job(id).await?;
        if job.status == JobStatus::Assigned {
            let old = self.store.transition(id, JobStatus::Sampling).await?;
            self.emit(id, old, JobStatus::Sampling);
            debug!(job_id = id, input = %job.input.display(), "sampling started");
        } else {
            debug!(
                job_id = id,
                status = %job.status,
                "input fetched outside assignment"
            );
        }
        Ok(job.input)
    }

    /// Accept a job's final image: claim the submission, write the file
    /// durably, complete the job and pass its slot on.
    ///
    /// Returns the output path written. A concurrent or repeated
    /// submission loses the claim and gets `InvalidTransition`; a write
    /// failure is recorded as an error event and leaves the job Sampling
    /// so the host may retry.
    pub async fn complete_job(&self, id: JobId, image: &[u8]) -> Result<PathBuf, CoordinationError> {
        let output = self.store.claim_submission(id).await?;

        if let Err(err) = write_image(&output, image).await {
            self.store.clear_submission(id).await;
            let input = self.store.record_error(id, &err.to_string()).await?;
            self.ledger.record(id, input, err.to_string()).await;
            warn!(job_id = id, path = %output.display(), error = %err, "image write failed");
            return Err(CoordinationError::SubmitFailed {
                id,
                path: output,
                source: err,
            });
        }

        let old = self.store.transition(id, JobStatus::Completed).await?;
        self.emit(id, old, JobStatus::Completed);
        info!(job_id = id, path = %output.display(), bytes = image.len(), "wrote image");

        self.release_and_reassign(id).await;
        self.check_drained().await;
        Ok(output)
    }

    /// Record an error event against a job.
    ///
    /// Errors accumulate without affecting status; a fatal report also
    /// abandons the job. A fatal report racing a winning submission is
    /// recorded but does not disturb the completed job.
    pub async fn report_error(
        &self,
        id: JobId,
        message: &str,
        fatal: bool,
    ) -> Result<(), CoordinationError> {
        let input = self.store.record_error(id, message).await?;
        self.ledger.record(id, input.clone(), message).await;
        warn!(job_id = id, input = %input.display(), error = message, "render error reported");

        if fatal {
            if let Err(err) = self.fail_job(id).await {
                warn!(job_id = id, error = %err, "fatal report left status unchanged");
            }
        }
        Ok(())
    }

    /// Abandon a job: mark it Failed and pass its slot on.
    pub async fn fail_job(&self, id: JobId) -> Result<(), CoordinationError> {
        let old = self.store.transition(id, JobStatus::Failed).await?;
        self.emit(id, old, JobStatus::Failed);
        info!(job_id = id, "job abandoned");

        self.release_and_reassign(id).await;
        self.check_drained().await;
        Ok(())
    }

    /// Whether every job has reached a terminal status.
    pub async fn all_terminal(&self) -> bool {
        self.store.all_terminal().await
    }

    /// Exit status the run would report right now.
    pub async fn exit_status(&self) -> u8 {
        self.ledger.exit_status().await
    }

    /// Wait until the batch drains (every job terminal).
    pub async fn wait_drained(&self) {
        loop {
            let notified = self.drained.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if self.store.is_drained().await {
                return;
            }
            notified.await;
        }
    }

    /// Move the permit freed by `id` to the next Pending job, or release
    /// it when none remain.
    async fn release_and_reassign(&self, id: JobId) {
        let mut assignments = self.assignments.lock().await;
        let Some(permit) = assignments.remove(&id) else {
            return;
        };
        // Picking and assigning under the assignments lock keeps two
        // concurrently freed slots from grabbing the same Pending job.
        if let Some(next) = self.store.assign_next_pending().await {
            assignments.insert(next, permit);
            drop(assignments);
            self.emit(next, JobStatus::Pending, JobStatus::Assigned);
            debug!(job_id = next, "freed slot reassigned");
        } else {
            drop(assignments);
            drop(permit);
        }
    }

    /// Flip the batch to Drained exactly once and wake waiters.
    async fn check_drained(&self) {
        if self.store.all_terminal().await && self.store.mark_drained().await {
            let errors = self.ledger.count().await;
            info!(errors, "batch drained");
            self.drained.notify_waiters();
        }
    }

    /// Best-effort status event; progress display may be absent.
    fn emit(&self, job_id: JobId, old_status: JobStatus, new_status: JobStatus) {
        let _ = self.status_tx.try_send(JobStatusUpdate {
            job_id,
            old_status,
            new_status,
        });
    }
}

/// Write image bytes and flush them to disk before reporting success.
async fn write_image(path: &Path, image: &[u8]) -> std::io::Result<()> {
    let mut file = tokio::fs::File::create(path).await?;
    file.write_all(image).await?;
    file.sync_all().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::Batch;
    use tempfile::TempDir;

    struct Harness {
        _dir: TempDir,
        scheduler: BatchScheduler,
        store: Arc<JobStore>,
        ledger: Arc<ErrorLedger>,
    }

    fn harness(jobs: usize, slots: usize) -> Harness {
        let dir = TempDir::new().unwrap();
        let inputs: Vec<PathBuf> = (0..jobs)
            .map(|i| {
                let path = dir.path().join(format!("c{i}.json"));
                std::fs::write(&path, format!("{{\"chart\":{i}}}")).unwrap();
                path
            })
            .collect();

        let store = Arc::new(JobStore::new(Batch::new(inputs, slots)));
        let pool = Arc::new(SlotPool::new(slots));
        let ledger = Arc::new(ErrorLedger::new());
        let scheduler =
            BatchScheduler::new(Arc::clone(&store), pool, Arc::clone(&ledger));
        Harness {
            _dir: dir,
            scheduler,
            store,
            ledger,
        }
    }

    async fn statuses(store: &JobStore) -> Vec<JobStatus> {
        store.jobs().await.into_iter().map(|j| j.status).collect()
    }

    #[tokio::test]
    async fn test_start_fills_min_of_slots_and_jobs() {
        let h = harness(3, 2);
        h.scheduler.start().await.unwrap();
        assert_eq!(
            statuses(&h.store).await,
            vec![JobStatus::Assigned, JobStatus::Assigned, JobStatus::Pending]
        );

        let h = harness(1, 4);
        h.scheduler.start().await.unwrap();
        assert_eq!(statuses(&h.store).await, vec![JobStatus::Assigned]);
        assert_eq!(h.store.active_count().await, 1);
    }

    #[tokio::test]
    async fn test_completion_writes_file_and_reassigns_slot() {
        let h = harness(3, 2);
        h.scheduler.start().await.unwrap();

        h.scheduler.input_fetched(0).await.unwrap();
        assert_eq!(h.store.status(0).await.unwrap(), JobStatus::Sampling);

        let output = h.scheduler.complete_job(0, b"png-bytes").await.unwrap();
        assert_eq!(std::fs::read(&output).unwrap(), b"png-bytes");

        // Completion freed a slot; job 2 moved up without waiting.
        assert_eq!(
            statuses(&h.store).await,
            vec![JobStatus::Completed, JobStatus::Assigned, JobStatus::Assigned]
        );
    }

    #[tokio::test]
    async fn test_refetch_does_not_transition_again() {
        let h = harness(1, 1);
        h.scheduler.start().await.unwrap();

        let first = h.scheduler.input_fetched(0).await.unwrap();
        let second = h.scheduler.input_fetched(0).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(h.store.status(0).await.unwrap(), JobStatus::Sampling);
    }

    #[tokio::test]
    async fn test_duplicate_submission_rejected_and_output_unchanged() {
        let h = harness(1, 1);
        h.scheduler.start().await.unwrap();
        h.scheduler.input_fetched(0).await.unwrap();

        let output = h.scheduler.complete_job(0, b"first").await.unwrap();
        let err = h.scheduler.complete_job(0, b"second").await.unwrap_err();
        assert!(matches!(err, CoordinationError::InvalidTransition { .. }));
        assert_eq!(std::fs::read(&output).unwrap(), b"first");
        assert_eq!(h.ledger.count().await, 0);
    }

    #[tokio::test]
    async fn test_write_failure_keeps_job_sampling() {
        let h = harness(1, 1);
        h.scheduler.start().await.unwrap();
        h.scheduler.input_fetched(0).await.unwrap();

        // Occupy the output path with a directory so the write fails.
        let output = h.store.job(0).await.unwrap().output;
        std::fs::create_dir(&output).unwrap();

        let err = h.scheduler.complete_job(0, b"img").await.unwrap_err();
        assert!(matches!(err, CoordinationError::SubmitFailed { .. }));
        assert_eq!(h.store.status(0).await.unwrap(), JobStatus::Sampling);
        assert_eq!(h.ledger.count().await, 1);

        // The claim was released, so a retry can win again.
        std::fs::remove_dir(&output).unwrap();
        h.scheduler.complete_job(0, b"img").await.unwrap();
        assert_eq!(h.store.status(0).await.unwrap(), JobStatus::Completed);
    }

    #[tokio::test]
    async fn test_fatal_error_fails_job_and_reassigns() {
        let h = harness(2, 1);
        h.scheduler.start().await.unwrap();
        h.scheduler.input_fetched(0).await.unwrap();

        h.scheduler
            .report_error(0, "renderer crashed", true)
            .await
            .unwrap();

        assert_eq!(
            statuses(&h.store).await,
            vec![JobStatus::Failed, JobStatus::Assigned]
        );
        assert_eq!(h.ledger.count().await, 1);
        assert_eq!(h.store.job(0).await.unwrap().errors, vec!["renderer crashed"]);
    }

    #[tokio::test]
    async fn test_nonfatal_error_leaves_status_alone() {
        let h = harness(1, 1);
        h.scheduler.start().await.unwrap();
        h.scheduler.input_fetched(0).await.unwrap();

        h.scheduler
            .report_error(0, "transient glitch", false)
            .await
            .unwrap();

        assert_eq!(h.store.status(0).await.unwrap(), JobStatus::Sampling);
        assert_eq!(h.ledger.count().await, 1);
    }

    #[tokio::test]
    async fn test_assigned_job_can_fail_before_sampling() {
        let h = harness(1, 1);
        h.scheduler.start().await.unwrap();

        h.scheduler
            .report_error(0, "input unreadable", true)
            .await
            .unwrap();
        assert_eq!(h.store.status(0).await.unwrap(), JobStatus::Failed);
    }

    #[tokio::test]
    async fn test_drain_notification_and_exit_status() {
        let h = harness(2, 2);
        h.scheduler.start().await.unwrap();

        h.scheduler.input_fetched(0).await.unwrap();
        h.scheduler.complete_job(0, b"a").await.unwrap();
        assert!(!h.scheduler.all_terminal().await);

        h.scheduler.report_error(1, "no render", true).await.unwrap();
        assert!(h.scheduler.all_terminal().await);

        // Resolves promptly because the batch already drained.
        h.scheduler.wait_drained().await;
        assert_eq!(h.scheduler.exit_status().await, 1);
    }

    #[tokio::test]
    async fn test_empty_batch_drains_at_start() {
        let h = harness(0, 1);
        h.scheduler.start().await.unwrap();
        h.scheduler.wait_drained().await;
        assert_eq!(h.scheduler.exit_status().await, 0);
    }

    #[tokio::test]
    async fn test_status_updates_emitted() {
        let h = harness(1, 1);
        let mut rx = h.scheduler.take_status_receiver().await.unwrap();
        assert!(h.scheduler.take_status_receiver().await.is_none());

        h.scheduler.start().await.unwrap();
        h.scheduler.input_fetched(0).await.unwrap();
        h.scheduler.complete_job(0, b"img").await.unwrap();

        let first = rx.recv().await.unwrap();
        assert_eq!(first.job_id, 0);
        assert_eq!(first.old_status, JobStatus::Pending);
        assert_eq!(first.new_status, JobStatus::Assigned);

        let second = rx.recv().await.unwrap();
        assert_eq!(second.new_status, JobStatus::Sampling);

        let third = rx.recv().await.unwrap();
        assert_eq!(third.new_status, JobStatus::Completed);
    }
}
