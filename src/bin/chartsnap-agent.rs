//! Standalone renderer host agent
//!
//! Connects to a running Chartsnap coordinator, works through the batch
//! with the mock renderer, and signals the end of the batch. Useful as a
//! protocol smoke test and as a stand-in host when the real rendering
//! engine is unavailable.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use chartsnap::adapters::agent::{CoordinatorClient, HostAgent, HostAgentConfig};
use chartsnap::adapters::renderer::MockRenderer;

#[derive(Parser, Debug)]
#[command(name = "chartsnap-agent")]
#[command(about = "Mock renderer host agent for a Chartsnap coordinator")]
struct Args {
    /// Coordinator base URL. The coordinator appends this when it spawns
    /// the host, so it arrives as the final positional argument.
    #[arg(env = "CHARTSNAP_URL")]
    url: String,

    /// Seconds to wait for the coordinator to become reachable
    #[arg(long, default_value = "10")]
    ready_timeout_secs: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_ansi(false),
        )
        .init();

    let args = Args::parse();

    info!("Starting Chartsnap renderer host agent");
    info!("Coordinator URL: {}", args.url);

    let client = CoordinatorClient::new(args.url).context("Invalid coordinator URL")?;
    let agent = HostAgent::new(
        client,
        Arc::new(MockRenderer::new()),
        HostAgentConfig {
            ready_budget: Duration::from_secs(args.ready_timeout_secs),
        },
    );

    let summary = agent.run().await.context("Batch run failed")?;

    info!(
        exit_status = summary.exit_status,
        error_events = summary.error_events,
        "Batch complete"
    );

    Ok(())
}
