//! Repository interfaces for place harvesting
//!
//! Contains trait definitions for the relational task source and the keyed
//! document store that doubles as completion ledger and result sink.

use std::collections::HashSet;

use anyhow::Result;
use async_trait::async_trait;

use super::record::ExtractedRecord;
use super::task::Task;

/// Candidate entity list, filtered to operating entities
#[async_trait]
pub trait TaskSource: Send + Sync {
    async fn list_open_tasks(&self) -> Result<Vec<Task>>;
}

/// Identifiers that already have a persisted record
#[async_trait]
pub trait CompletionLedger: Send {
    async fn known_identifiers(&mut self) -> Result<HashSet<String>>;
}

/// Keyed insert-or-replace of successful records
#[async_trait]
pub trait RecordSink: Send {
    async fn upsert(&mut self, identifier: &str, record: &ExtractedRecord) -> Result<()>;
}

/// One open connection to the document store
#[async_trait]
pub trait DocumentStore: CompletionLedger + RecordSink {
    /// Release the connection. Consumes the handle so it cannot be closed twice.
    async fn close(self: Box<Self>) -> Result<()>;
}

/// Opens document store connections on demand
///
/// Every harvest task opens its own connection and releases it when the task
/// ends; connections are never shared between tasks.
#[async_trait]
pub trait StoreConnector: Send + Sync {
    async fn connect(&self) -> Result<Box<dyn DocumentStore>>;
}
