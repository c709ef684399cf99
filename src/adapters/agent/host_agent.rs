//! In-process renderer host agent.
//!
//! Drives a [`Renderer`] against a coordination endpoint: waits for the
//! endpoint to come up, reads the batch manifest, then runs one flow per
//! worker slot. Each flow claims job ids in order, fetches the chart,
//! samples the render until it settles, and submits the image. Used for
//! dry runs with the mock renderer and as the engine behind the
//! standalone `chartsnap-agent` binary.
//!
//! [`Renderer`]: crate::domain::ports::Renderer

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::sleep;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::application::{Sampler, SamplingOutcome};
use crate::domain::models::{BatchManifest, EndSummary, JobId};
use crate::domain::ports::{FaultSink, Renderer};

use super::client::{AgentError, CoordinatorClient};

/// Milliseconds of startup stagger between flows.
const FLOW_STAGGER_MS: u64 = 3;

/// Agent tuning knobs not carried by the manifest.
#[derive(Debug, Clone)]
pub struct HostAgentConfig {
    /// How long to keep polling before giving up on the coordinator.
    pub ready_budget: Duration,
}

impl Default for HostAgentConfig {
    fn default() -> Self {
        Self {
            ready_budget: Duration::from_secs(10),
        }
    }
}

/// One renderer host worth of flows.
pub struct HostAgent {
    client: CoordinatorClient,
    renderer: Arc<dyn Renderer>,
    config: HostAgentConfig,
}

impl HostAgent {
    /// Create an agent driving `renderer` against the given endpoint.
    pub fn new(
        client: CoordinatorClient,
        renderer: Arc<dyn Renderer>,
        config: HostAgentConfig,
    ) -> Self {
        Self {
            client,
            renderer,
            config,
        }
    }

    /// Process the whole batch and signal end-of-batch.
    ///
    /// Spawns one flow per worker slot, capped by the job count. Flows
    /// claim job ids from a shared counter so charts are picked up in
    /// submission order. Per-job failures are reported to the
    /// coordinator rather than returned; only endpoint-level failures
    /// surface as errors.
    pub async fn run(&self) -> Result<EndSummary, AgentError> {
        self.client.wait_ready(self.config.ready_budget).await?;
        let manifest = self.client.manifest().await?;

        let flows = manifest
            .slots
            .min(usize::try_from(manifest.jobs).unwrap_or(usize::MAX));
        info!(
            jobs = manifest.jobs,
            flows,
            endpoint = self.client.base_url(),
            "Renderer host agent starting"
        );

        let next_job = Arc::new(AtomicU32::new(0));
        let mut handles = Vec::with_capacity(flows);

        for index in 0..flows {
            let client = self.client.clone();
            let renderer = Arc::clone(&self.renderer);
            let next_job = Arc::clone(&next_job);
            let manifest = manifest.clone();

            handles.push(tokio::spawn(async move {
                // Stagger startup so flows do not hit the endpoint with
                // simultaneous first fetches.
                sleep(Duration::from_millis(FLOW_STAGGER_MS * index as u64)).await;

                let flow_id = Uuid::new_v4();
                loop {
                    let job_id = next_job.fetch_add(1, Ordering::SeqCst);
                    if job_id >= manifest.jobs {
                        break;
                    }
                    run_job(&client, renderer.as_ref(), &manifest, flow_id, job_id).await;
                }
            }));
        }

        futures::future::join_all(handles).await;
        self.client.signal_end().await
    }
}

/// Carry one job from fetch to submission or fatal report.
async fn run_job(
    client: &CoordinatorClient,
    renderer: &dyn Renderer,
    manifest: &BatchManifest,
    flow_id: Uuid,
    job_id: JobId,
) {
    debug!(%flow_id, job_id, "Flow picked up job");

    let input = match client.fetch_input(job_id).await {
        Ok(bytes) => bytes,
        Err(err) => {
            warn!(job_id, error = %err, "Chart fetch failed");
            report_fatal(client, job_id, &format!("Chart fetch failed: {err}")).await;
            return;
        }
    };

    let mut source = match renderer.open(job_id, &input).await {
        Ok(source) => source,
        Err(err) => {
            warn!(job_id, error = %err, "Renderer could not open chart");
            report_fatal(client, job_id, &err.to_string()).await;
            return;
        }
    };

    let sampler = Sampler::new(
        Duration::from_millis(manifest.sample_interval_ms),
        manifest.required_stable,
        manifest.max_samples,
    );
    let faults = ClientFaultSink {
        client: client.clone(),
    };

    match sampler.run(job_id, source.as_mut(), &faults).await {
        SamplingOutcome::Settled { image, samples } => {
            debug!(job_id, samples, bytes = image.len(), "Render settled");
            if let Err(err) = client.submit_image(job_id, &image).await {
                warn!(job_id, error = %err, "Image submission failed");
                report_fatal(client, job_id, &format!("Image submission failed: {err}")).await;
            }
        }
        SamplingOutcome::BudgetExhausted { samples } => {
            report_fatal(
                client,
                job_id,
                &format!("No stable render after {samples} samples"),
            )
            .await;
        }
    }
}

/// Report a job-ending error, logging if even the report fails.
async fn report_fatal(client: &CoordinatorClient, job_id: JobId, message: &str) {
    if let Err(err) = client.report_error(job_id, message, true).await {
        warn!(job_id, error = %err, "Could not report fatal render error");
    }
}

/// Forwards capture faults to the coordinator as non-fatal reports.
struct ClientFaultSink {
    client: CoordinatorClient,
}

#[async_trait]
impl FaultSink for ClientFaultSink {
    async fn report(&self, job_id: JobId, message: &str) {
        if let Err(err) = self.client.report_error(job_id, message, false).await {
            warn!(job_id, error = %err, "Could not report sample fault");
        }
    }
}
