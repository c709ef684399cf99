//! CLI type definitions
//!
//! This module contains clap command structures that define the CLI interface.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(name = "chartsnap")]
#[command(about = "Chartsnap - batch chart-to-image conversion", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Output in JSON format
    #[arg(short, long, global = true)]
    pub json: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Convert a batch of chart definitions to images
    Render(RenderArgs),

    /// Configuration commands
    Config(ConfigArgs),
}

#[derive(Args, Debug)]
pub struct RenderArgs {
    /// Chart definition files to convert; each output gains a .png suffix
    #[arg(required = true)]
    pub inputs: Vec<PathBuf>,

    /// Renderer host command; the endpoint URL is appended as its final argument
    #[arg(long, env = "CHARTSNAP_HOST_COMMAND")]
    pub host_command: Option<String>,

    /// Extra argument for the host command (repeatable)
    #[arg(long = "host-arg", allow_hyphen_values = true)]
    pub host_args: Vec<String>,

    /// Worker slots, bounding concurrent renders
    #[arg(short, long)]
    pub slots: Option<usize>,

    /// Render width in pixels
    #[arg(long)]
    pub width: Option<u32>,

    /// Render height in pixels
    #[arg(long)]
    pub height: Option<u32>,

    /// Milliseconds between render samples
    #[arg(long)]
    pub sample_interval_ms: Option<u64>,

    /// Identical consecutive samples required before capture
    #[arg(long)]
    pub stable_samples: Option<u32>,

    /// Abandon a job after this many samples
    #[arg(long)]
    pub max_samples: Option<u32>,

    /// Strip animation keys from chart definitions before serving them
    #[arg(long)]
    pub strip_animation: bool,

    /// Run against the built-in mock renderer instead of a host command
    #[arg(long)]
    pub dry_run: bool,

    /// Load configuration from this file instead of chartsnap.yaml
    #[arg(short, long)]
    pub config: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Show the effective configuration after merging
    Show,
}
