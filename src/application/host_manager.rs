//! Renderer host process lifecycle
//!
//! The coordinator spawns the external renderer host (a browser wrapper,
//! a headless engine, whatever the configuration names) with the endpoint
//! URL as its final argument and the batch parameters in its environment.
//! Shutdown is polite first: SIGTERM, a bounded grace period, then a hard
//! kill. Dropping the manager kills any child still running.

use nix::sys::signal::{self, Signal};
use nix::unistd::Pid;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::{Child, Command};
use tracing::{debug, info, warn};

use crate::domain::error::CoordinationError;
use crate::domain::models::{BatchManifest, HostConfig};

/// Handle on the external renderer host process.
pub struct RendererHostManager {
    config: HostConfig,
    grace_period: Duration,
    child: Option<Child>,
}

impl RendererHostManager {
    /// Create a manager for the configured host command.
    pub fn new(config: HostConfig, grace_period: Duration) -> Self {
        Self {
            config,
            grace_period,
            child: None,
        }
    }

    /// Whether a host command is configured at all.
    pub const fn has_command(&self) -> bool {
        self.config.command.is_some()
    }

    /// Spawn the host, handing it the coordinator URL as the final
    /// argument and the batch parameters as `CHARTSNAP_*` environment
    /// variables.
    pub fn start(&mut self, url: &str, manifest: &BatchManifest) -> Result<(), CoordinationError> {
        let Some(command) = self.config.command.clone() else {
            return Err(CoordinationError::HostUnreachable(
                "no host command configured".to_string(),
            ));
        };

        let mut cmd = Command::new(&command);
        cmd.args(&self.config.args)
            .arg(url)
            .env("CHARTSNAP_URL", url)
            .env("CHARTSNAP_JOBS", manifest.jobs.to_string())
            .env("CHARTSNAP_SLOTS", manifest.slots.to_string())
            .env("CHARTSNAP_WIDTH", manifest.width.to_string())
            .env("CHARTSNAP_HEIGHT", manifest.height.to_string())
            .envs(&self.config.env)
            .stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit());

        let child = cmd.spawn().map_err(|err| {
            CoordinationError::HostUnreachable(format!("failed to spawn {command}: {err}"))
        })?;

        info!(
            command = %command,
            pid = child.id().unwrap_or_default(),
            url = %url,
            "renderer host started"
        );
        self.child = Some(child);
        Ok(())
    }

    /// Ask the host to stop with SIGTERM. Returns false when there is
    /// nothing to signal or the signal could not be delivered; either way
    /// the batch result stands.
    pub fn request_stop(&self) -> bool {
        let Some(child) = self.child.as_ref() else {
            return false;
        };
        let Some(pid) = child.id() else {
            return false;
        };
        let Ok(raw) = i32::try_from(pid) else {
            return false;
        };

        match signal::kill(Pid::from_raw(raw), Signal::SIGTERM) {
            Ok(()) => {
                debug!(pid, "sent SIGTERM to renderer host");
                true
            }
            Err(err) => {
                warn!(pid, error = %err, "failed to signal renderer host");
                false
            }
        }
    }

    /// Stop the host: SIGTERM, wait out the grace period, then force-kill
    /// if it is still running.
    pub async fn stop(&mut self) {
        let graceful = self.request_stop();
        let Some(mut child) = self.child.take() else {
            return;
        };

        if graceful {
            match tokio::time::timeout(self.grace_period, child.wait()).await {
                Ok(Ok(status)) => {
                    info!(%status, "renderer host exited");
                    return;
                }
                Ok(Err(err)) => {
                    warn!(error = %err, "error waiting for renderer host");
                }
                Err(_) => {
                    warn!(
                        grace_secs = self.grace_period.as_secs(),
                        "renderer host ignored stop request"
                    );
                }
            }
        }

        match child.kill().await {
            Ok(()) => info!("renderer host killed"),
            Err(err) => warn!(error = %err, "failed to kill renderer host"),
        }
    }

    /// Whether the host process is still running.
    pub fn is_running(&mut self) -> bool {
        match self.child.as_mut() {
            Some(child) => matches!(child.try_wait(), Ok(None)),
            None => false,
        }
    }
}

impl Drop for RendererHostManager {
    fn drop(&mut self) {
        if let Some(child) = self.child.as_mut() {
            let _ = child.start_kill();
        }
    }
}
