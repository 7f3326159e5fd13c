//! 작업 단위 오류 정의
//!
//! Every per-task failure is one of these variants. None of them crosses the
//! task boundary: the worker turns each into a `fail` or `error` outcome.

use thiserror::Error;

use crate::domain::record::HarvestStatus;
use crate::infrastructure::automation::AutomationError;
use crate::infrastructure::parsing::ParsingError;

#[derive(Error, Debug)]
pub enum HarvestError {
    /// Store or browser endpoint unreachable
    #[error("Connectivity error: {0}")]
    Connectivity(String),

    /// Search view did not load (or the chosen entry was missing) within the bound
    #[error("Navigation timeout: {0}")]
    NavigationTimeout(String),

    /// Detail frame did not attach within the bound
    #[error("Detail frame not found: {0}")]
    FrameNotFound(String),

    #[error("Parse failure: {0}")]
    ParseFailure(#[from] ParsingError),

    #[error(transparent)]
    Automation(#[from] AutomationError),

    #[error("Store error: {0}")]
    Store(String),

    #[error("Task panicked: {0}")]
    Panicked(String),
}

impl HarvestError {
    /// Outcome status recorded for this error
    pub fn status(&self) -> HarvestStatus {
        match self {
            Self::NavigationTimeout(_) | Self::FrameNotFound(_) | Self::ParseFailure(_) => HarvestStatus::Fail,
            _ => HarvestStatus::Error,
        }
    }

    /// Reason shown in progress output and carried by the outcome record
    pub fn reason(&self) -> String {
        match self {
            Self::NavigationTimeout(_) => "navigation timeout".to_string(),
            Self::FrameNotFound(_) => "frame not found".to_string(),
            Self::ParseFailure(_) => "parse failed".to_string(),
            other => other.to_string(),
        }
    }

    pub fn store(error: &anyhow::Error) -> Self {
        Self::Store(format!("{:#}", error))
    }

    pub fn connectivity(error: impl ToString) -> Self {
        Self::Connectivity(error.to_string())
    }

    /// Message of a caught panic payload
    pub fn from_panic(payload: Box<dyn std::any::Any + Send>) -> Self {
        let message = payload
            .downcast_ref::<&str>()
            .map(|s| (*s).to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "unknown panic".to_string());
        Self::Panicked(message)
    }
}

pub type HarvestResult<T> = Result<T, HarvestError>;
