//! Batch render command.
//!
//! Wires the whole coordinator together: job store, slot pool, error
//! ledger, scheduler, coordination endpoint, and the renderer host.
//! Returns the process exit status rather than exiting itself so the
//! entry point stays testable.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{Context, Result};
use indicatif::ProgressBar;
use tokio::sync::Notify;
use tracing::{info, warn};

use crate::adapters::agent::{CoordinatorClient, HostAgent, HostAgentConfig};
use crate::adapters::http::{CoordinationServer, CoordinationServerConfig};
use crate::adapters::renderer::MockRenderer;
use crate::application::{
    BatchScheduler, ErrorLedger, JobStore, RendererHostManager, SlotPool, INTERRUPTED_EXIT,
};
use crate::cli::output::progress::{create_progress_bar, create_spinner, ProgressBarExt};
use crate::cli::output::TableFormatter;
use crate::cli::types::RenderArgs;
use crate::domain::models::{Batch, BatchManifest, Config, JobStatus};
use crate::infrastructure::config::ConfigLoader;

pub async fn execute(args: RenderArgs, json_mode: bool) -> Result<i32> {
    let config = load_config(&args)?;

    let manifest = BatchManifest {
        jobs: u32::try_from(args.inputs.len()).unwrap_or(u32::MAX),
        slots: config.slots,
        width: config.render.width,
        height: config.render.height,
        sample_interval_ms: config.sampling.interval_ms,
        required_stable: config.sampling.required_stable,
        max_samples: config.sampling.max_samples,
    };

    // Core coordination state.
    let batch = Batch::new(args.inputs.clone(), config.slots);
    let store = Arc::new(JobStore::new(batch));
    let slots = Arc::new(SlotPool::new(config.slots));
    let ledger = Arc::new(ErrorLedger::new());
    let scheduler = Arc::new(BatchScheduler::new(
        Arc::clone(&store),
        slots,
        Arc::clone(&ledger),
    ));

    let mut status_rx = scheduler
        .take_status_receiver()
        .await
        .context("Status receiver already taken")?;

    // Loopback endpoint the renderer host talks to.
    let end_signal = Arc::new(Notify::new());
    let server = CoordinationServer::new(
        Arc::clone(&scheduler),
        manifest.clone(),
        CoordinationServerConfig {
            host: config.endpoint.host.clone(),
            port: config.endpoint.port,
        },
        config.strip_animation,
        Arc::clone(&end_signal),
    );
    let bound = server
        .bind()
        .await
        .map_err(|e| anyhow::anyhow!(e))
        .context("Failed to bind coordination endpoint")?;
    let endpoint_url = bound.url();

    if !json_mode {
        println!("Starting chart batch conversion");
        println!("   Charts: {}", manifest.jobs);
        println!("   Worker slots: {}", config.slots);
        println!(
            "   Render size: {}x{}",
            config.render.width, config.render.height
        );
        println!("   Endpoint: {endpoint_url}");
        if args.dry_run {
            println!("   Mode: DRY RUN (using mock renderer)");
        }
        println!();
    }

    scheduler.start().await?;

    // Serve until the host signals end-of-batch or the user interrupts.
    let interrupted = Arc::new(AtomicBool::new(false));
    let shutdown = {
        let end_signal = Arc::clone(&end_signal);
        let interrupted = Arc::clone(&interrupted);
        async move {
            tokio::select! {
                () = end_signal.notified() => {}
                _ = tokio::signal::ctrl_c() => {
                    interrupted.store(true, Ordering::SeqCst);
                    warn!("Interrupted, shutting down");
                }
            }
        }
    };
    let server_task = tokio::spawn(bound.serve_with_shutdown(shutdown));

    // Status display: a spinner until a host connects, then a bar that
    // advances as jobs reach a terminal status.
    let total = manifest.jobs;
    let progress_task = tokio::spawn(async move {
        let mut spinner = if json_mode {
            None
        } else {
            let s = create_spinner();
            s.set_message("Waiting for renderer host");
            Some(s)
        };
        let mut bar: Option<ProgressBar> = None;

        let mut seen_terminal = 0;
        while seen_terminal < total {
            let Some(update) = status_rx.recv().await else {
                break;
            };
            // Assigned events fire before any host traffic, so only
            // later transitions prove a host is attached.
            if update.new_status != JobStatus::Assigned {
                if let Some(s) = spinner.take() {
                    s.finish_and_clear();
                }
                if bar.is_none() && !json_mode {
                    bar = Some(create_progress_bar(u64::from(total)));
                }
            }
            if update.new_status.is_terminal() {
                seen_terminal += 1;
                if let Some(pb) = &bar {
                    pb.inc(1);
                    pb.set_message(format!("chart {} {}", update.job_id, update.new_status));
                }
            }
        }
        bar
    });

    // Attach a renderer host: in-process mock for dry runs, spawned
    // command otherwise. With neither, an operator-run host is expected
    // to connect on its own.
    let mut manager = RendererHostManager::new(config.host.clone(), config.host_grace_period());
    let mut agent_task = None;
    if args.dry_run {
        let client = CoordinatorClient::new(endpoint_url.clone())?;
        let agent = HostAgent::new(
            client,
            Arc::new(MockRenderer::new()),
            HostAgentConfig::default(),
        );
        agent_task = Some(tokio::spawn(async move {
            match agent.run().await {
                Ok(summary) => {
                    info!(
                        exit_status = summary.exit_status,
                        "Mock renderer host finished"
                    );
                }
                Err(err) => warn!(error = %err, "Mock renderer host failed"),
            }
        }));
    } else if manager.has_command() {
        manager.start(&endpoint_url, &manifest)?;
    } else {
        info!("No host command configured, waiting for an external renderer host");
    }

    server_task
        .await
        .context("Coordination endpoint task panicked")?
        .map_err(|e| anyhow::anyhow!(e))
        .context("Coordination endpoint failed")?;

    let was_interrupted = interrupted.load(Ordering::SeqCst);

    manager.stop().await;
    if let Some(task) = agent_task {
        if was_interrupted {
            task.abort();
        }
        let _ = task.await;
    }

    if was_interrupted {
        progress_task.abort();
    }
    let bar = progress_task.await.ok().flatten();

    let jobs = store.jobs().await;
    let error_events = ledger.events().await;
    let exit_status = if was_interrupted {
        INTERRUPTED_EXIT
    } else {
        i32::from(ledger.exit_status().await)
    };

    if let Some(pb) = bar {
        if was_interrupted {
            pb.finish_error("Interrupted");
        } else if error_events.is_empty() {
            pb.finish_success(format!("Converted {} charts", manifest.jobs));
        } else {
            pb.finish_error(format!("{} render errors", error_events.len()));
        }
    }

    if json_mode {
        let summary = serde_json::json!({
            "jobs": jobs,
            "errors": error_events,
            "interrupted": was_interrupted,
            "exit_status": exit_status,
        });
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        println!("{}", TableFormatter::new().format_jobs(&jobs));
        if !error_events.is_empty() {
            println!("{} render errors:", error_events.len());
            for event in &error_events {
                println!(
                    "   {} (job {}): {}",
                    event.input.display(),
                    event.job_id,
                    event.message
                );
            }
        }
    }

    info!(exit_status, "Batch finished");
    Ok(exit_status)
}

/// Effective configuration: file and environment first, then CLI flags.
fn load_config(args: &RenderArgs) -> Result<Config> {
    let config = match &args.config {
        Some(path) => ConfigLoader::load_from_file(path)?,
        None => ConfigLoader::load()?,
    };

    let config = apply_overrides(config, args);
    ConfigLoader::validate(&config)?;
    Ok(config)
}

fn apply_overrides(mut config: Config, args: &RenderArgs) -> Config {
    if let Some(slots) = args.slots {
        config.slots = slots;
    }
    if let Some(width) = args.width {
        config.render.width = width;
    }
    if let Some(height) = args.height {
        config.render.height = height;
    }
    if let Some(interval) = args.sample_interval_ms {
        config.sampling.interval_ms = interval;
    }
    if let Some(stable) = args.stable_samples {
        config.sampling.required_stable = stable;
    }
    if let Some(max) = args.max_samples {
        config.sampling.max_samples = Some(max);
    }
    if args.strip_animation {
        config.strip_animation = true;
    }
    if let Some(command) = &args.host_command {
        config.host.command = Some(command.clone());
    }
    if !args.host_args.is_empty() {
        config.host.args.clone_from(&args.host_args);
    }
    config
}
