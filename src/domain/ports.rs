//! Renderer-side ports: interfaces between the sampling loop and the
//! engine that actually draws charts.

use async_trait::async_trait;

use super::error::SampleError;
use super::models::JobId;

/// A live render session that can be sampled repeatedly.
///
/// Each call captures the renderer's current output for one job. Captures
/// are independent; a failed capture does not invalidate the session.
#[async_trait]
pub trait SampleSource: Send + std::fmt::Debug {
    /// Capture the current rendered image bytes.
    async fn sample(&mut self) -> Result<Vec<u8>, SampleError>;
}

/// Factory for render sessions.
///
/// Abstracts the visual engine behind the host agent: the real thing is an
/// external program, tests and dry runs use [`MockRenderer`].
///
/// [`MockRenderer`]: crate::adapters::renderer::MockRenderer
#[async_trait]
pub trait Renderer: Send + Sync {
    /// Start rendering `input` for `job_id` and return a sampleable session.
    ///
    /// Returns [`SampleError::Rejected`] when the renderer cannot accept
    /// the input at all, which abandons the job.
    async fn open(
        &self,
        job_id: JobId,
        input: &[u8],
    ) -> Result<Box<dyn SampleSource>, SampleError>;
}

/// Where the sampling loop reports transient capture failures.
///
/// Reporting is fire-and-forget; implementations log their own delivery
/// problems rather than surfacing them into the loop.
#[async_trait]
pub trait FaultSink: Send + Sync {
    /// Report a failed capture for `job_id`.
    async fn report(&self, job_id: JobId, message: &str);
}
