//! Domain module - Core business logic and entities
//!
//! This module contains the harvesting entities, value objects, repository
//! boundaries and the pure rules (address disambiguation, weighted scoring)
//! that do not depend on any infrastructure.

pub mod address;
pub mod record;
pub mod repositories;
pub mod scoring;
pub mod task;

// Re-export commonly used items
pub use address::{extract_token, select_candidate, select_candidate_within, CANDIDATE_LIMIT, LOCALE_SUFFIXES};
pub use record::{ExtractedRecord, HarvestStatus, MenuItem, PlaceDetail};
pub use repositories::{CompletionLedger, DocumentStore, RecordSink, StoreConnector, TaskSource};
pub use task::Task;
