//! Shared, synchronized access to the batch and its jobs
//!
//! The store owns the only mutable copy of the [`Batch`] aggregate. Every
//! status transition, error record and submission claim goes through it,
//! so lifecycle invariants are enforced in one place regardless of which
//! protocol handler or scheduler path is calling.

use std::path::PathBuf;
use tokio::sync::RwLock;

use crate::domain::error::CoordinationError;
use crate::domain::models::{Batch, Job, JobId, JobStatus};

/// Thread-safe wrapper around the batch aggregate.
#[derive(Debug)]
pub struct JobStore {
    batch: RwLock<Batch>,
}

impl JobStore {
    /// Wrap a batch for shared access.
    pub fn new(batch: Batch) -> Self {
        Self {
            batch: RwLock::new(batch),
        }
    }

    /// Number of jobs in the batch.
    pub async fn len(&self) -> usize {
        self.batch.read().await.len()
    }

    /// Whether the batch has no jobs.
    pub async fn is_empty(&self) -> bool {
        self.batch.read().await.is_empty()
    }

    /// Slot capacity the batch was created with.
    pub async fn slot_capacity(&self) -> usize {
        self.batch.read().await.slots
    }

    /// Snapshot of a single job.
    pub async fn job(&self, id: JobId) -> Result<Job, CoordinationError> {
        self.batch
            .read()
            .await
            .job(id)
            .cloned()
            .ok_or(CoordinationError::UnknownJob(id))
    }

    /// Snapshot of every job, in id order.
    pub async fn jobs(&self) -> Vec<Job> {
        self.batch.read().await.jobs.clone()
    }

    /// Current status of a job.
    pub async fn status(&self, id: JobId) -> Result<JobStatus, CoordinationError> {
        Ok(self.job(id).await?.status)
    }

    /// Input path of a job.
    pub async fn input_path(&self, id: JobId) -> Result<PathBuf, CoordinationError> {
        Ok(self.job(id).await?.input)
    }

    /// Lowest-id Pending job, if any.
    pub async fn next_pending(&self) -> Option<JobId> {
        self.batch.read().await.next_pending()
    }

    /// Move a job to `new_status`, returning the status it left.
    ///
    /// A job with an image submission in flight cannot be failed; the
    /// submission owns the job's fate until it resolves.
    pub async fn transition(
        &self,
        id: JobId,
        new_status: JobStatus,
    ) -> Result<JobStatus, CoordinationError> {
        let mut batch = self.batch.write().await;
        let job = batch.job_mut(id).ok_or(CoordinationError::UnknownJob(id))?;
        if new_status == JobStatus::Failed && job.submission_claimed {
            return Err(CoordinationError::InvalidTransition {
                from: job.status,
                to: new_status,
            });
        }
        let old_status = job.status;
        job.transition_to(new_status)?;
        Ok(old_status)
    }

    /// Atomically pick the lowest-id Pending job and mark it Assigned.
    pub async fn assign_next_pending(&self) -> Option<JobId> {
        let mut batch = self.batch.write().await;
        let id = batch.next_pending()?;
        let job = batch.job_mut(id)?;
        job.transition_to(JobStatus::Assigned).ok()?;
        Some(id)
    }

    /// Append an error message to a job's log, returning its input path
    /// for the batch-level ledger entry.
    pub async fn record_error(
        &self,
        id: JobId,
        message: &str,
    ) -> Result<PathBuf, CoordinationError> {
        let mut batch = self.batch.write().await;
        let job = batch.job_mut(id).ok_or(CoordinationError::UnknownJob(id))?;
        job.record_error(message);
        Ok(job.input.clone())
    }

    /// Claim the right to submit this job's image, returning the output
    /// path to write.
    ///
    /// Exactly one claim can be outstanding per job; a second concurrent
    /// submission is rejected as an invalid transition, as is a claim on
    /// any job not currently Sampling.
    pub async fn claim_submission(&self, id: JobId) -> Result<PathBuf, CoordinationError> {
        let mut batch = self.batch.write().await;
        let job = batch.job_mut(id).ok_or(CoordinationError::UnknownJob(id))?;
        if job.status != JobStatus::Sampling || job.submission_claimed {
            return Err(CoordinationError::InvalidTransition {
                from: job.status,
                to: JobStatus::Completed,
            });
        }
        job.submission_claimed = true;
        Ok(job.output.clone())
    }

    /// Release a submission claim after a failed write so the host may
    /// retry. Claims on completed jobs are cleared by the transition.
    pub async fn clear_submission(&self, id: JobId) {
        let mut batch = self.batch.write().await;
        if let Some(job) = batch.job_mut(id) {
            job.submission_claimed = false;
        }
    }

    /// Whether every job is terminal.
    pub async fn all_terminal(&self) -> bool {
        self.batch.read().await.all_terminal()
    }

    /// Jobs currently occupying slots.
    pub async fn active_count(&self) -> usize {
        self.batch.read().await.active_count()
    }

    /// Jobs that have finished, either way.
    pub async fn terminal_count(&self) -> usize {
        self.batch.read().await.terminal_count()
    }

    /// Mark the batch drained; true on the first call only.
    pub async fn mark_drained(&self) -> bool {
        self.batch.write().await.mark_drained()
    }

    /// Whether the batch has drained.
    pub async fn is_drained(&self) -> bool {
        self.batch.read().await.state == crate::domain::models::BatchState::Drained
    }
}
