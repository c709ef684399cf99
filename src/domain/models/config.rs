use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

/// Main configuration structure for Chartsnap
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Config {
    /// Worker slot capacity K: how many jobs may render concurrently
    #[serde(default = "default_slots")]
    pub slots: usize,

    /// Plateau sampling configuration
    #[serde(default)]
    pub sampling: SamplingConfig,

    /// Requested render dimensions
    #[serde(default)]
    pub render: RenderConfig,

    /// Renderer host process configuration
    #[serde(default)]
    pub host: HostConfig,

    /// Coordination endpoint bind configuration
    #[serde(default)]
    pub endpoint: EndpointConfig,

    /// Strip animation keys from chart descriptions before serving them
    #[serde(default)]
    pub strip_animation: bool,
}

const fn default_slots() -> usize {
    1
}

impl Default for Config {
    fn default() -> Self {
        Self {
            slots: default_slots(),
            sampling: SamplingConfig::default(),
            render: RenderConfig::default(),
            host: HostConfig::default(),
            endpoint: EndpointConfig::default(),
            strip_animation: false,
        }
    }
}

impl Config {
    /// Interval between samples as a `Duration`.
    pub const fn sample_interval(&self) -> Duration {
        Duration::from_millis(self.sampling.interval_ms)
    }

    /// Grace period for host shutdown as a `Duration`.
    pub const fn host_grace_period(&self) -> Duration {
        Duration::from_secs(self.host.grace_period_secs)
    }
}

/// Plateau convergence detector and sampling loop parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct SamplingConfig {
    /// Delay D between successive samples, in milliseconds
    #[serde(default = "default_sample_interval_ms")]
    pub interval_ms: u64,

    /// Consecutive identical samples M required to declare settlement
    #[serde(default = "default_required_stable")]
    pub required_stable: u32,

    /// Optional cap on samples per job; unset samples until settlement
    #[serde(default)]
    pub max_samples: Option<u32>,
}

const fn default_sample_interval_ms() -> u64 {
    200
}

const fn default_required_stable() -> u32 {
    3
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            interval_ms: default_sample_interval_ms(),
            required_stable: default_required_stable(),
            max_samples: None,
        }
    }
}

/// Render dimensions requested from the host
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct RenderConfig {
    /// Image width in pixels
    #[serde(default = "default_width")]
    pub width: u32,

    /// Image height in pixels
    #[serde(default = "default_height")]
    pub height: u32,
}

const fn default_width() -> u32 {
    600
}

const fn default_height() -> u32 {
    400
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            width: default_width(),
            height: default_height(),
        }
    }
}

/// How to launch and stop the external renderer host
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct HostConfig {
    /// Program to spawn; the coordinator URL is appended as the final
    /// argument. Unset means the host is started out of band.
    #[serde(default)]
    pub command: Option<String>,

    /// Arguments placed before the URL
    #[serde(default)]
    pub args: Vec<String>,

    /// Seconds to wait after a stop request before force-killing
    #[serde(default = "default_grace_period_secs")]
    pub grace_period_secs: u64,

    /// Extra environment variables for the host process
    #[serde(default)]
    pub env: HashMap<String, String>,
}

const fn default_grace_period_secs() -> u64 {
    5
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            command: None,
            args: Vec::new(),
            grace_period_secs: default_grace_period_secs(),
            env: HashMap::new(),
        }
    }
}

/// Where the coordination endpoint listens
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct EndpointConfig {
    /// Bind address; loopback unless deliberately overridden
    #[serde(default = "default_endpoint_host")]
    pub host: String,

    /// Bind port; 0 picks a random free port
    #[serde(default = "default_endpoint_port")]
    pub port: u16,
}

fn default_endpoint_host() -> String {
    "127.0.0.1".to_string()
}

const fn default_endpoint_port() -> u16 {
    0
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            host: default_endpoint_host(),
            port: default_endpoint_port(),
        }
    }
}
