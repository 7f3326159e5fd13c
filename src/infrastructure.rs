//! Infrastructure layer for stores, browser automation, parsing and configuration
//!
//! This module provides the sqlx-backed task source and document store, the
//! chromiumoxide browser session, embedded-state parsing, and the
//! configuration and logging setup.

pub mod automation;
pub mod chromium_session;
pub mod config;
pub mod database_connection;
pub mod document_store;
pub mod logging;
pub mod parsing;
pub mod parsing_error;
pub mod task_source;

// Re-export commonly used items
pub use automation::{AutomationError, AutomationResult, BrowserSession, SessionConfig, SessionFactory};
pub use chromium_session::ChromiumSessionFactory;
pub use config::{AppConfig, ConfigError, DocumentStoreConfig, HarvestConfig, TaskSourceConfig};
pub use database_connection::DatabaseConnection;
pub use document_store::{SqliteDocumentStore, SqliteStoreConnector};
pub use logging::{init_logging, init_logging_with_config, log_system_info};
pub use parsing::{PageSelectors, ParsingError, ParsingResult, PlaceDetailParser, StateParser, StateSchema};
pub use task_source::SqlTaskSource;
