//! # Master Dispatch Core
//!
//! Worker registration, pluggable worker-selection policy, busy/free
//! tracking, pending-task queueing, request-to-worker correlation, response
//! routing back to the originating client, and end-to-end statistics.

pub mod dispatch;
pub mod policy;
pub mod registry;
pub mod stats;

pub use dispatch::Dispatcher;
pub use policy::SelectionPolicy;
pub use registry::{PendingRequest, PendingTask, WorkerRecord};
pub use stats::FinalStatisticsSummary;
