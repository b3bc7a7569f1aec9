pub mod job_store;
pub mod monitor;
pub mod orchestrator;

pub use job_store::JobStore;
pub use monitor::{PeriodType, PipelineMonitor, StageStatus};
pub use orchestrator::Orchestrator;
