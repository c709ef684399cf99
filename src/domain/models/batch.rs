//! Batch aggregate: the full set of jobs in one conversion run

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use super::job::{Job, JobId, JobStatus};

/// Lifecycle of a batch as a whole.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchState {
    /// At least one job is not yet terminal.
    Running,
    /// Every job has reached a terminal status.
    Drained,
}

/// All jobs of one run plus the slot capacity that bounds their concurrency.
///
/// Purely synchronous; shared-state synchronization lives in the job store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Batch {
    /// Jobs in input order; a job's id is its index.
    pub jobs: Vec<Job>,
    /// Worker slot capacity K.
    pub slots: usize,
    /// Running until every job is terminal, then Drained.
    pub state: BatchState,
    /// When the batch was created.
    pub created_at: DateTime<Utc>,
    /// When the batch drained.
    pub finished_at: Option<DateTime<Utc>>,
}

impl Batch {
    /// Build a batch from input paths, assigning ordinal job ids.
    pub fn new(inputs: Vec<PathBuf>, slots: usize) -> Self {
        let jobs = inputs
            .into_iter()
            .enumerate()
            .map(|(i, input)| Job::new(JobId::try_from(i).unwrap_or(JobId::MAX), input))
            .collect();
        Self {
            jobs,
            slots,
            state: BatchState::Running,
            created_at: Utc::now(),
            finished_at: None,
        }
    }

    /// Number of jobs in the batch.
    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    /// Whether the batch has no jobs.
    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    /// Look up a job by id.
    pub fn job(&self, id: JobId) -> Option<&Job> {
        self.jobs.get(id as usize)
    }

    /// Look up a job by id for mutation.
    pub fn job_mut(&mut self, id: JobId) -> Option<&mut Job> {
        self.jobs.get_mut(id as usize)
    }

    /// Lowest-id job still waiting for a slot.
    pub fn next_pending(&self) -> Option<JobId> {
        self.jobs
            .iter()
            .find(|job| job.status == JobStatus::Pending)
            .map(|job| job.id)
    }

    /// Whether every job has reached a terminal status. True for an
    /// empty batch.
    pub fn all_terminal(&self) -> bool {
        self.jobs.iter().all(|job| job.status.is_terminal())
    }

    /// Jobs currently holding a slot (Assigned or Sampling).
    pub fn active_count(&self) -> usize {
        self.jobs.iter().filter(|job| job.status.is_active()).count()
    }

    /// Jobs that have finished, either way.
    pub fn terminal_count(&self) -> usize {
        self.jobs
            .iter()
            .filter(|job| job.status.is_terminal())
            .count()
    }

    /// Mark the batch drained. Returns true on the first call only, so
    /// callers can notify waiters exactly once.
    pub fn mark_drained(&mut self) -> bool {
        if self.state == BatchState::Drained {
            return false;
        }
        self.state = BatchState::Drained;
        self.finished_at = Some(Utc::now());
        true
    }
}

/// Batch parameters published at `GET /` so an independently started host
/// can discover the run without spawn-time environment variables.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchManifest {
    /// Number of jobs in the batch.
    pub jobs: u32,
    /// Worker slot capacity K.
    pub slots: usize,
    /// Requested render width in pixels.
    pub width: u32,
    /// Requested render height in pixels.
    pub height: u32,
    /// Delay between samples in milliseconds.
    pub sample_interval_ms: u64,
    /// Consecutive identical samples required for settlement.
    pub required_stable: u32,
    /// Optional cap on samples per job.
    pub max_samples: Option<u32>,
}

/// Body of a successful `GET /end` response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndSummary {
    /// Process exit status the coordinator will use.
    pub exit_status: u8,
    /// Total error events recorded during the run.
    pub error_events: usize,
}
