//! Background sync workers (§4.8–§4.15): the scheduler and the
//! independent jobs it drives. Every worker takes a shared [`AppContext`]
//! by reference, runs one pass, and returns a summary plus a list of
//! per-record errors it swallowed along the way — a worker-level error
//! aborts only that worker's run, never its peers (§4.15, §7).

pub mod classification_queue;
pub mod context;
pub mod error;
pub mod feedback_sync;
pub mod graph_sync;
pub mod reconciliation;
pub mod relational_sync;
pub mod reputation_snapshot;
pub mod scheduler;

pub use context::{AppContext, DEFAULT_CLASSIFICATION_MAX_ATTEMPTS};
pub use error::{RunError, RunResult, WorkerError};
