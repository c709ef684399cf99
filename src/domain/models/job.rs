//! Job domain model with forward-only status tracking

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::domain::error::CoordinationError;

/// Ordinal identifier of a job within its batch (position in the input list).
pub type JobId = u32;

/// Lifecycle status of a conversion job.
///
/// Movement is strictly forward; terminal statuses are never left.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Waiting for a free worker slot.
    Pending,
    /// Holds a slot, input not yet fetched by the renderer host.
    Assigned,
    /// The host is sampling renders of this job's chart.
    Sampling,
    /// Final image written to disk.
    Completed,
    /// Abandoned after a fatal error report.
    Failed,
}

impl JobStatus {
    /// Stable lowercase name, used in logs and summaries.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Assigned => "assigned",
            Self::Sampling => "sampling",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    /// Whether this status is terminal (no further transitions).
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Whether a job in this status occupies a worker slot.
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Assigned | Self::Sampling)
    }

    /// Statuses reachable from this one in a single step.
    pub fn valid_transitions(&self) -> Vec<JobStatus> {
        match self {
            Self::Pending => vec![Self::Assigned],
            Self::Assigned => vec![Self::Sampling, Self::Failed],
            Self::Sampling => vec![Self::Completed, Self::Failed],
            Self::Completed | Self::Failed => vec![],
        }
    }

    /// Check if a transition to `new_status` is allowed.
    pub fn can_transition_to(&self, new_status: &JobStatus) -> bool {
        self.valid_transitions().contains(new_status)
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A single chart-to-image conversion unit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    /// Ordinal id within the batch.
    pub id: JobId,
    /// Path of the chart description file to render.
    pub input: PathBuf,
    /// Path the final image is written to (`<input>.png`).
    pub output: PathBuf,
    /// Current lifecycle status.
    pub status: JobStatus,
    /// Error messages reported against this job, in arrival order.
    pub errors: Vec<String>,
    /// Set while an image submission for this job is in flight.
    /// Serializes concurrent submissions; the store manages it.
    #[serde(skip)]
    pub submission_claimed: bool,
    /// When the job was created.
    pub created_at: DateTime<Utc>,
    /// When sampling began (first input fetch).
    pub started_at: Option<DateTime<Utc>>,
    /// When the job reached a terminal status.
    pub completed_at: Option<DateTime<Utc>>,
}

impl Job {
    /// Create a new pending job for the given input path.
    ///
    /// The output path is the input path with `.png` appended, so
    /// `charts/q1.json` produces `charts/q1.json.png` next to its source.
    pub fn new(id: JobId, input: PathBuf) -> Self {
        let output = output_path_for(&input);
        Self {
            id,
            input,
            output,
            status: JobStatus::Pending,
            errors: Vec::new(),
            submission_claimed: false,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
        }
    }

    /// Move the job to `new_status`, enforcing the forward-only lifecycle.
    ///
    /// Records `started_at` on entering `Sampling` and `completed_at` on
    /// reaching a terminal status. Any submission claim is released when
    /// the job becomes terminal.
    pub fn transition_to(&mut self, new_status: JobStatus) -> Result<(), CoordinationError> {
        if !self.status.can_transition_to(&new_status) {
            return Err(CoordinationError::InvalidTransition {
                from: self.status,
                to: new_status,
            });
        }

        if new_status == JobStatus::Sampling && self.started_at.is_none() {
            self.started_at = Some(Utc::now());
        }
        if new_status.is_terminal() {
            self.completed_at = Some(Utc::now());
            self.submission_claimed = false;
        }

        self.status = new_status;
        Ok(())
    }

    /// Append a reported error message to this job's log.
    pub fn record_error(&mut self, message: impl Into<String>) {
        self.errors.push(message.into());
    }
}

/// Derive the output image path for an input: the full input path with
/// `.png` appended (not substituted), matching one image per input file.
pub fn output_path_for(input: &Path) -> PathBuf {
    let mut os = input.to_path_buf().into_os_string();
    os.push(".png");
    PathBuf::from(os)
}
