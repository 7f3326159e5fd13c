//! Place Harvester - idempotent place-attribute harvesting
//!
//! Reads operating places from a relational table, skips the ones already
//! harvested, and drives a small pool of headless browser sessions through
//! the map application's search and detail views. The detail view's embedded
//! client state is parsed into a record and upserted into a JSON document
//! store keyed by the place's original name.

// Module declarations
pub mod application;
pub mod domain;
pub mod infrastructure;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
