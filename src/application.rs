//! Application layer module
//!
//! This module contains the harvest use cases: the per-task worker, the
//! orchestrator running a pass over all pending tasks, and the weighted
//! score recomputation.

pub mod errors;
pub mod orchestrator;
pub mod score_updater;
pub mod worker;

// Re-export commonly used items
pub use errors::{HarvestError, HarvestResult};
pub use orchestrator::{compute_pending, HarvestReport, Orchestrator};
pub use score_updater::{update_scores, ScoreReport};
pub use worker::{run_task, search_url, TaskOutcome, WorkerContext, WorkerSettings};
