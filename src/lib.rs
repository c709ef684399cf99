//! Chartsnap - Batch Chart-to-Image Conversion Coordinator
//!
//! Chartsnap converts a batch of chart descriptions into image files by
//! coordinating an external renderer host over a loopback HTTP protocol.
//! The coordinator schedules jobs across a bounded pool of worker slots;
//! the host fetches chart inputs, samples rendered frames until they
//! stabilize, and submits the settled image back.
//!
//! # Architecture
//!
//! This crate follows Clean Architecture / Hexagonal Architecture principles:
//!
//! - **Domain Layer** (`domain`): Jobs, batches, configuration, and the
//!   renderer-side ports
//! - **Application Layer** (`application`): Scheduling, slot accounting,
//!   sampling, and error aggregation
//! - **Adapters Layer** (`adapters`): The coordination endpoint, the host
//!   agent, the mock renderer, and image transforms
//! - **Infrastructure Layer** (`infrastructure`): Configuration loading
//! - **CLI Layer** (`cli`): Command-line interface
//!
//! # Example
//!
//! ```ignore
//! use chartsnap::application::BatchScheduler;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     // Wire a job store, slot pool, and error ledger into a scheduler,
//!     // then serve the coordination endpoint until the batch drains.
//!     Ok(())
//! }
//! ```

pub mod adapters;
pub mod application;
pub mod cli;
pub mod domain;
pub mod infrastructure;

// Re-export commonly used types for convenience
pub use application::{
    BatchScheduler, ErrorLedger, JobStore, Sampler, SamplingOutcome, SlotPool,
};
pub use domain::error::{CoordinationError, SampleError};
pub use domain::models::{
    Batch, BatchManifest, BatchState, Config, EndSummary, Job, JobId, JobStatus,
};
pub use domain::ports::{FaultSink, Renderer, SampleSource};
pub use infrastructure::config::{ConfigError, ConfigLoader};
