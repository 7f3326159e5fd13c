//! Parsing error types for embedded client-state extraction
//!
//! The embedded state schema is owned by the target site and changes without
//! notice, so only a missing root record or a value that cannot be coerced is
//! an error. Everything else falls back to a default.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParsingError {
    #[error("Embedded state is missing")]
    StateMissing,

    #[error("Embedded state is not an object (found {found})")]
    NotAnObject { found: String },

    #[error("Root record with prefix '{prefix}' not found")]
    RootRecordMissing { prefix: String },

    #[error("Field '{field}' is not a valid number: {value}")]
    InvalidNumber { field: String, value: String },
}

impl ParsingError {
    pub fn invalid_number(field: &str, value: impl ToString) -> Self {
        Self::InvalidNumber {
            field: field.to_string(),
            value: value.to_string(),
        }
    }

    pub fn root_record_missing(prefix: &str) -> Self {
        Self::RootRecordMissing {
            prefix: prefix.to_string(),
        }
    }
}

pub type ParsingResult<T> = Result<T, ParsingError>;
