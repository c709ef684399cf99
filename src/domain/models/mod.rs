pub mod batch;
pub mod config;
pub mod job;

pub use batch::{Batch, BatchManifest, BatchState, EndSummary};
pub use config::{Config, EndpointConfig, HostConfig, RenderConfig, SamplingConfig};
pub use job::{output_path_for, Job, JobId, JobStatus};
