//! Configuration infrastructure
//!
//! Contains configuration loading and validation for place harvesting.
//!
//! Sources are layered with the `config` crate:
//! 1. Built-in defaults (see [`defaults`])
//! 2. Optional configuration file
//! 3. Environment variables prefixed `PLACE_HARVESTER` (`__` separates sections,
//!    e.g. `PLACE_HARVESTER__HARVEST__WORKERS=2`)

#![allow(clippy::uninlined_format_args)]

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use super::automation::{SessionConfig, DEFAULT_USER_AGENT};
use super::parsing::{PageSelectors, StateSchema};

pub const ENV_PREFIX: &str = "PLACE_HARVESTER";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load config: {source}")]
    FileLoad {
        #[from]
        source: config::ConfigError,
    },

    #[error("Configuration validation failed: {message}")]
    Validation { message: String },
}

/// Complete application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Relational table holding the candidate places
    pub task_source: TaskSourceConfig,

    /// Document store holding harvested records
    pub document_store: DocumentStoreConfig,

    /// Worker pool and navigation bounds
    pub harvest: HarvestConfig,

    /// Browser session settings
    pub browser: SessionConfig,

    /// Page selectors of the map application
    pub selectors: PageSelectors,

    /// Embedded-state keys of the map application
    pub state: StateSchema,

    /// Logging configuration
    pub logging: LoggingConfig,

    /// Weighted score settings
    pub scoring: ScoringConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskSourceConfig {
    /// sqlx connection URL (`mysql://...` for MariaDB, `sqlite://...` also works)
    pub database_url: String,
    pub table: String,
    pub name_column: String,
    pub address_column: String,
    pub status_column: String,

    /// SQL `LIKE` pattern matched against the status column
    pub operating_pattern: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentStoreConfig {
    /// sqlx SQLite URL of the document store
    pub database_url: String,

    /// Table holding one JSON document per identifier
    pub collection: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HarvestConfig {
    /// Parallel browser sessions; keep low, the target site rate-limits informally
    pub workers: usize,

    /// Bound for the search view to load
    pub navigation_timeout_secs: u64,

    /// Bound for the result entries to appear once the search view is loaded
    pub candidate_wait_secs: u64,

    /// Search result entries inspected for the locale token
    pub candidate_limit: usize,

    /// Bound for the detail frame (and its embedded state) to attach
    pub frame_timeout_secs: u64,

    /// Pause after clicking a search result
    pub settle_delay_ms: u64,

    /// Base URL the normalized name is appended to
    pub search_url_base: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoringConfig {
    /// Review count at which a place's own rating weighs as much as the mean
    pub min_reviews: f64,
}

/// Logging configuration settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level: "error", "warn", "info", "debug", "trace"
    pub level: String,

    /// Enable JSON formatted logs (file output)
    pub json_format: bool,

    /// Enable console output
    pub console_output: bool,

    /// Enable file output
    pub file_output: bool,

    /// Log directory; `logs/` next to the executable when unset
    pub log_dir: Option<PathBuf>,

    /// Log file name
    pub file_name: String,

    /// Number of log files to keep (older files will be deleted)
    pub max_files: u32,

    /// Enable automatic log cleanup on startup
    pub auto_cleanup_logs: bool,
}

impl Default for TaskSourceConfig {
    fn default() -> Self {
        Self {
            database_url: defaults::TASK_SOURCE_URL.to_string(),
            table: defaults::TASK_TABLE.to_string(),
            name_column: defaults::NAME_COLUMN.to_string(),
            address_column: defaults::ADDRESS_COLUMN.to_string(),
            status_column: defaults::STATUS_COLUMN.to_string(),
            operating_pattern: defaults::OPERATING_PATTERN.to_string(),
        }
    }
}

impl Default for DocumentStoreConfig {
    fn default() -> Self {
        Self {
            database_url: defaults::DOCUMENT_STORE_URL.to_string(),
            collection: defaults::COLLECTION.to_string(),
        }
    }
}

impl Default for HarvestConfig {
    fn default() -> Self {
        Self {
            workers: defaults::WORKERS,
            navigation_timeout_secs: defaults::NAVIGATION_TIMEOUT_SECS,
            candidate_wait_secs: defaults::CANDIDATE_WAIT_SECS,
            candidate_limit: defaults::CANDIDATE_LIMIT,
            frame_timeout_secs: defaults::FRAME_TIMEOUT_SECS,
            settle_delay_ms: defaults::SETTLE_DELAY_MS,
            search_url_base: defaults::SEARCH_URL_BASE.to_string(),
        }
    }
}

impl HarvestConfig {
    pub fn navigation_timeout(&self) -> Duration {
        Duration::from_secs(self.navigation_timeout_secs)
    }

    pub fn candidate_wait(&self) -> Duration {
        Duration::from_secs(self.candidate_wait_secs)
    }

    pub fn frame_timeout(&self) -> Duration {
        Duration::from_secs(self.frame_timeout_secs)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            min_reviews: defaults::MIN_REVIEWS,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: defaults::LOG_LEVEL.to_string(),
            json_format: defaults::LOG_JSON_FORMAT,
            console_output: defaults::LOG_CONSOLE_OUTPUT,
            file_output: defaults::LOG_FILE_OUTPUT,
            log_dir: None,
            file_name: defaults::LOG_FILE_NAME.to_string(),
            max_files: defaults::LOG_MAX_FILES,
            auto_cleanup_logs: defaults::LOG_AUTO_CLEANUP,
        }
    }
}

impl AppConfig {
    /// 기본값 → 설정 파일(선택) → 환경 변수 순서로 로드
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = config::Config::builder()
            .add_source(config::Config::try_from(&AppConfig::default())?);

        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(true));
        }

        let settings = builder
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: Self = settings.try_deserialize()?;
        config.validate()?;

        match path {
            Some(path) => info!("Loaded configuration from: {:?}", path),
            None => info!("Using built-in configuration (no file given)"),
        }
        Ok(config)
    }

    /// Default config file location (`<config dir>/place-harvester/config.toml`)
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("place-harvester").join("config.toml"))
    }

    /// 설정값 유효성 검증
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.harvest.workers == 0 {
            return Err(validation("harvest.workers must be greater than 0"));
        }
        if self.harvest.navigation_timeout_secs == 0
            || self.harvest.candidate_wait_secs == 0
            || self.harvest.frame_timeout_secs == 0
        {
            return Err(validation("harvest timeouts must be greater than 0"));
        }
        if self.harvest.candidate_limit == 0 {
            return Err(validation("harvest.candidate_limit must be greater than 0"));
        }
        if self.browser.page_load_timeout_secs == 0 {
            return Err(validation("browser.page_load_timeout_secs must be greater than 0"));
        }
        if self.scoring.min_reviews < 0.0 {
            return Err(validation("scoring.min_reviews must not be negative"));
        }
        if self.state.min_main_price > self.state.max_main_price {
            return Err(validation("state.min_main_price cannot be greater than max_main_price"));
        }

        for (name, value) in [
            ("task_source.table", &self.task_source.table),
            ("task_source.name_column", &self.task_source.name_column),
            ("task_source.address_column", &self.task_source.address_column),
            ("task_source.status_column", &self.task_source.status_column),
            ("document_store.collection", &self.document_store.collection),
        ] {
            if !is_identifier(value) {
                return Err(validation(&format!(
                    "{} must match [A-Za-z0-9_]+ (got '{}')",
                    name, value
                )));
            }
        }

        if url::Url::parse(&self.harvest.search_url_base).is_err() {
            return Err(validation("harvest.search_url_base must be an absolute URL"));
        }

        Ok(())
    }
}

/// SQL identifiers are interpolated into queries, so only plain names are allowed
pub fn is_identifier(value: &str) -> bool {
    !value.is_empty() && value.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn validation(message: &str) -> ConfigError {
    ConfigError::Validation {
        message: message.to_string(),
    }
}

/// Default configuration values
pub mod defaults {
    /// Default task source (MariaDB)
    pub const TASK_SOURCE_URL: &str = "mysql://harvester@localhost:3306/places";

    /// Default task table and columns
    pub const TASK_TABLE: &str = "RESTAURANTS_GENERAL";
    pub const NAME_COLUMN: &str = "STORE_NAME";
    pub const ADDRESS_COLUMN: &str = "DETAIL_ADD";
    pub const STATUS_COLUMN: &str = "OP_STATUS";

    /// Status values containing this word are operating ("영업")
    pub const OPERATING_PATTERN: &str = "%영업%";

    /// Default document store (SQLite, JSON documents)
    pub const DOCUMENT_STORE_URL: &str = "sqlite://data/places.db";
    pub const COLLECTION: &str = "restaurant";

    /// Default number of parallel browser workers
    pub const WORKERS: usize = 2;

    /// Default search view timeout in seconds
    pub const NAVIGATION_TIMEOUT_SECS: u64 = 10;

    /// Default wait for search result entries in seconds
    pub const CANDIDATE_WAIT_SECS: u64 = 5;

    /// Default number of search results inspected during disambiguation
    pub const CANDIDATE_LIMIT: usize = crate::domain::CANDIDATE_LIMIT;

    /// Default detail frame timeout in seconds
    pub const FRAME_TIMEOUT_SECS: u64 = 10;

    /// Default settle delay after a click in milliseconds
    pub const SETTLE_DELAY_MS: u64 = 2000;

    /// Default search URL base
    pub const SEARCH_URL_BASE: &str = "https://map.naver.com/p/search/";

    /// Default minimum review count for weighted scores
    pub const MIN_REVIEWS: f64 = 200.0;

    /// Default user agent
    pub const USER_AGENT: &str = super::DEFAULT_USER_AGENT;

    // Log configuration defaults
    /// Default log level
    pub const LOG_LEVEL: &str = "info";

    /// Default JSON format setting
    pub const LOG_JSON_FORMAT: bool = false;

    /// Default console output setting
    pub const LOG_CONSOLE_OUTPUT: bool = true;

    /// Default file output setting
    pub const LOG_FILE_OUTPUT: bool = true;

    /// Default log file name
    pub const LOG_FILE_NAME: &str = "place-harvester.log";

    /// Default maximum log files to keep
    pub const LOG_MAX_FILES: u32 = 5;

    /// Default auto cleanup logs setting
    pub const LOG_AUTO_CLEANUP: bool = true;
}
