//! Embedded client-state parsing
//!
//! The map application renders client side and keeps its data in a normalized
//! cache exposed on the global scope. This module reads that cache through an
//! accessor that treats every field as optional and turns it into typed
//! place details.

pub mod config;
pub mod embedded_state;
pub mod place_detail_parser;

// Re-export public types
pub use crate::infrastructure::parsing_error::{ParsingError, ParsingResult};
pub use config::{PageSelectors, StateSchema};
pub use embedded_state::{EmbeddedState, StateRecord};
pub use place_detail_parser::PlaceDetailParser;

use serde_json::Value;

/// Parser over the raw embedded-state JSON
pub trait StateParser {
    type Output;

    fn parse(&self, state: &Value) -> ParsingResult<Self::Output>;
}
