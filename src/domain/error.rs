use thiserror::Error;

use super::models::job::{JobId, JobStatus};

/// Domain-level errors for batch coordination.
///
/// Per-job errors (`UnknownJob`, `InvalidTransition`, `SubmitFailed`) never
/// affect other jobs in the batch; only `HostUnreachable` is batch-fatal.
#[derive(Error, Debug)]
pub enum CoordinationError {
    #[error("Unknown job id: {0}")]
    UnknownJob(JobId),

    #[error("Invalid status transition from {from:?} to {to:?}")]
    InvalidTransition { from: JobStatus, to: JobStatus },

    #[error("Failed to write image for job {id} to {}: {source}", path.display())]
    SubmitFailed {
        id: JobId,
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Renderer host unreachable: {0}")]
    HostUnreachable(String),
}

/// Errors raised while capturing a sample from a renderer session.
#[derive(Error, Debug)]
pub enum SampleError {
    /// A single capture attempt failed; sampling may continue.
    #[error("Sample capture failed: {0}")]
    Capture(String),

    /// The renderer refused the input outright; the job cannot render.
    #[error("Renderer rejected input: {0}")]
    Rejected(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_error_messages() {
        let err = CoordinationError::UnknownJob(7);
        assert_eq!(err.to_string(), "Unknown job id: 7");

        let err = CoordinationError::InvalidTransition {
            from: JobStatus::Sampling,
            to: JobStatus::Assigned,
        };
        assert!(err.to_string().contains("Sampling"));
        assert!(err.to_string().contains("Assigned"));
    }

    #[test]
    fn test_submit_failed_carries_source() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err = CoordinationError::SubmitFailed {
            id: 2,
            path: PathBuf::from("out/c.json.png"),
            source: io,
        };
        let msg = err.to_string();
        assert!(msg.contains("job 2"));
        assert!(msg.contains("out/c.json.png"));
        assert!(std::error::Error::source(&err).is_some());
    }
}
