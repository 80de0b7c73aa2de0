//! Orchestrator: scheduling, shutdown, and reporting.
//!
//! `JobQueue` drives a batch of jobs through a worker pool. A
//! `ShutdownCoordinator` obtained from the queue is what signal handlers
//! call into. Summaries and the JSON run report live in `report`.

mod queue;
mod report;
mod shutdown;

pub use queue::{JobQueue, QueueEvent, QueueEventCallback};
pub use report::{Anomaly, JobRecord, QueueSummary, ReportError, RunReport, SummaryKind};
pub use shutdown::{ShutdownCoordinator, ShutdownFlag, ShutdownState, SignalAction};
