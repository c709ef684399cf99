//! Batch-wide error aggregation and the process exit policy

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::PathBuf;
use tokio::sync::Mutex;

use crate::domain::models::JobId;

/// Exit status for batch-fatal aborts: host spawn failure, invalid
/// configuration discovered after argument parsing, endpoint bind failure.
/// Deliberately outside the 0..=124 range a small error count produces;
/// a run with 125 recorded render errors also exits 125, and the run log
/// disambiguates the two.
pub const BATCH_FATAL_EXIT: i32 = 125;

/// Exit status when the run is interrupted by Ctrl-C.
pub const INTERRUPTED_EXIT: i32 = 130;

/// Map an error-event count to a process exit status: the count itself,
/// saturating at 255. Zero events means success. An explicit clamp, never
/// a wrapping cast.
pub fn clamp_error_count(count: usize) -> u8 {
    u8::try_from(count).unwrap_or(u8::MAX)
}

/// One recorded error event.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorEvent {
    /// Job the error was reported against.
    pub job_id: JobId,
    /// Input path of that job, for log readability.
    pub input: PathBuf,
    /// Reported message.
    pub message: String,
    /// When the event was recorded.
    pub at: DateTime<Utc>,
}

/// Ordered log of every error event in the run.
///
/// Fatal and non-fatal reports land here alike; the count, clamped,
/// becomes the process exit status.
#[derive(Debug, Default)]
pub struct ErrorLedger {
    events: Mutex<Vec<ErrorEvent>>,
}

impl ErrorLedger {
    /// Create an empty ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one error event.
    pub async fn record(&self, job_id: JobId, input: PathBuf, message: impl Into<String>) {
        self.events.lock().await.push(ErrorEvent {
            job_id,
            input,
            message: message.into(),
            at: Utc::now(),
        });
    }

    /// Number of events recorded so far.
    pub async fn count(&self) -> usize {
        self.events.lock().await.len()
    }

    /// Snapshot of all events in arrival order.
    pub async fn events(&self) -> Vec<ErrorEvent> {
        self.events.lock().await.clone()
    }

    /// Exit status for the run: the clamped event count.
    pub async fn exit_status(&self) -> u8 {
        clamp_error_count(self.count().await)
    }
}
