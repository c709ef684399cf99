pub mod error_ledger;
pub mod host_manager;
pub mod job_store;
pub mod sampling;
pub mod scheduler;
pub mod slot_pool;

pub use error_ledger::{
    clamp_error_count, ErrorEvent, ErrorLedger, BATCH_FATAL_EXIT, INTERRUPTED_EXIT,
};
pub use host_manager::RendererHostManager;
pub use job_store::JobStore;
pub use sampling::{ConvergenceDetector, SampleVerdict, Sampler, SamplingOutcome};
pub use scheduler::{BatchScheduler, JobStatusUpdate};
pub use slot_pool::{SlotHandle, SlotPool};
