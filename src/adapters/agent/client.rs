//! HTTP client for the coordination endpoint.
//!
//! Speaks the loopback protocol from the host side: fetch chart
//! definitions, submit rendered images as base64 form fields, report
//! render errors, and signal end-of-batch. Used by the in-process
//! agent and by the standalone `chartsnap-agent` binary.

use std::time::Duration;

use backoff::ExponentialBackoffBuilder;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use reqwest::Client;
use thiserror::Error;

use crate::domain::models::{BatchManifest, EndSummary, JobId};

/// Errors from coordinator requests.
#[derive(Debug, Error)]
pub enum AgentError {
    #[error("Coordinator request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Coordinator returned {status}: {body}")]
    Unexpected { status: u16, body: String },
}

/// Client for one coordination endpoint.
///
/// Cheap to clone; all flows of a host share the underlying
/// connection pool.
#[derive(Debug, Clone)]
pub struct CoordinatorClient {
    /// The underlying HTTP client.
    http: Client,
    /// Endpoint base URL, always with a trailing slash.
    base_url: String,
}

impl CoordinatorClient {
    /// Create a client for the given endpoint URL.
    pub fn new(base_url: impl Into<String>) -> Result<Self, AgentError> {
        let mut base_url = base_url.into();
        if !base_url.ends_with('/') {
            base_url.push('/');
        }

        let http = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self { http, base_url })
    }

    /// The endpoint base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Poll the health route until the coordinator answers, backing off
    /// exponentially, for at most `budget`.
    ///
    /// Hosts typically start before the coordinator finishes binding,
    /// so the first few attempts are expected to fail.
    pub async fn wait_ready(&self, budget: Duration) -> Result<(), AgentError> {
        let policy = ExponentialBackoffBuilder::new()
            .with_initial_interval(Duration::from_millis(50))
            .with_max_interval(Duration::from_secs(2))
            .with_max_elapsed_time(Some(budget))
            .build();

        let url = format!("{}health", self.base_url);
        backoff::future::retry(policy, || async {
            let resp = self
                .http
                .get(&url)
                .send()
                .await
                .map_err(|e| backoff::Error::transient(AgentError::Http(e)))?;

            if resp.status().is_success() {
                Ok(())
            } else {
                let status = resp.status().as_u16();
                let body = resp.text().await.unwrap_or_default();
                Err(backoff::Error::transient(AgentError::Unexpected {
                    status,
                    body,
                }))
            }
        })
        .await
    }

    /// Fetch the batch manifest from the root route.
    pub async fn manifest(&self) -> Result<BatchManifest, AgentError> {
        let resp = self.http.get(&self.base_url).send().await?;
        let resp = check(resp).await?;
        Ok(resp.json().await?)
    }

    /// Fetch the chart definition for a job.
    pub async fn fetch_input(&self, job_id: JobId) -> Result<Vec<u8>, AgentError> {
        let url = format!("{}chart/{}", self.base_url, job_id);
        let resp = self.http.get(&url).send().await?;
        let resp = check(resp).await?;
        Ok(resp.bytes().await?.to_vec())
    }

    /// Submit the rendered image for a job as a base64 form field.
    pub async fn submit_image(&self, job_id: JobId, image: &[u8]) -> Result<(), AgentError> {
        let url = format!("{}chart/{}", self.base_url, job_id);
        let encoded = STANDARD.encode(image);

        let resp = self
            .http
            .post(&url)
            .form(&[("image", encoded.as_str())])
            .send()
            .await?;
        check(resp).await?;
        Ok(())
    }

    /// Report a render error for a job. With `fatal` set the
    /// coordinator abandons the job.
    pub async fn report_error(
        &self,
        job_id: JobId,
        message: &str,
        fatal: bool,
    ) -> Result<(), AgentError> {
        let url = format!("{}error", self.base_url);
        let form = [
            ("id", job_id.to_string()),
            ("error", message.to_string()),
            ("fatal", fatal.to_string()),
        ];

        let resp = self.http.post(&url).form(&form).send().await?;
        check(resp).await?;
        Ok(())
    }

    /// Signal that this host has finished its jobs.
    ///
    /// The coordinator rejects the signal while jobs are still active,
    /// so this is only valid once every claimed job has been submitted
    /// or fatally reported.
    pub async fn signal_end(&self) -> Result<EndSummary, AgentError> {
        let url = format!("{}end", self.base_url);
        let resp = self.http.get(&url).send().await?;
        let resp = check(resp).await?;
        Ok(resp.json().await?)
    }
}

/// Map non-success responses to [`AgentError::Unexpected`] with the body
/// preserved for diagnostics.
async fn check(resp: reqwest::Response) -> Result<reqwest::Response, AgentError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }

    let body = resp.text().await.unwrap_or_default();
    Err(AgentError::Unexpected {
        status: status.as_u16(),
        body,
    })
}
