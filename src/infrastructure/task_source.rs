//! Relational task source
//!
//! Reads operating places (name, address) from the restaurant table. Runs on
//! the sqlx `Any` driver so the same code serves MariaDB in production and
//! SQLite in tests.

use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::any::{install_default_drivers, AnyPoolOptions};
use sqlx::{AnyPool, Row};
use tracing::{debug, info};

use super::config::{is_identifier, TaskSourceConfig};
use crate::domain::repositories::TaskSource;
use crate::domain::task::Task;

pub struct SqlTaskSource {
    pool: AnyPool,
    query: String,
    operating_pattern: String,
}

impl SqlTaskSource {
    pub async fn connect(config: &TaskSourceConfig) -> Result<Self> {
        install_default_drivers();

        let pool = AnyPoolOptions::new()
            .max_connections(1)
            .connect(&config.database_url)
            .await
            .context("Failed to connect to task source")?;

        Self::from_pool(pool, config)
    }

    pub fn from_pool(pool: AnyPool, config: &TaskSourceConfig) -> Result<Self> {
        for identifier in [
            &config.table,
            &config.name_column,
            &config.address_column,
            &config.status_column,
        ] {
            anyhow::ensure!(is_identifier(identifier), "Invalid SQL identifier: {}", identifier);
        }

        let query = format!(
            "SELECT `{name}` AS name, `{address}` AS address FROM `{table}` WHERE `{status}` LIKE ?",
            name = config.name_column,
            address = config.address_column,
            table = config.table,
            status = config.status_column,
        );

        Ok(Self {
            pool,
            query,
            operating_pattern: config.operating_pattern.clone(),
        })
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[async_trait]
impl TaskSource for SqlTaskSource {
    async fn list_open_tasks(&self) -> Result<Vec<Task>> {
        debug!("Task query: {}", self.query);

        let rows = sqlx::query(&self.query)
            .bind(&self.operating_pattern)
            .fetch_all(&self.pool)
            .await
            .context("Failed to read task list")?;

        let mut tasks = Vec::with_capacity(rows.len());
        for row in &rows {
            let name: Option<String> = row.try_get("name")?;
            let address: Option<String> = row.try_get("address")?;
            match name {
                Some(name) if !name.trim().is_empty() => tasks.push(Task::new(name, address)),
                _ => debug!("Skipping task row without a name"),
            }
        }

        info!("📋 Loaded {} operating places from task source", tasks.len());
        Ok(tasks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn memory_pool() -> AnyPool {
        install_default_drivers();
        let pool = AnyPoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await
            .unwrap();

        sqlx::query(
            "CREATE TABLE RESTAURANTS_GENERAL (STORE_NAME TEXT, DETAIL_ADD TEXT, OP_STATUS TEXT)",
        )
        .execute(&pool)
        .await
        .unwrap();

        for (name, address, status) in [
            (Some("토속촌"), Some("서울 종로구 체부동 85-1"), "영업/정상"),
            (Some("폐업식당"), Some("서울 중구 명동 1"), "폐업"),
            (Some("주소없는집"), None, "영업"),
            (None, Some("서울"), "영업/정상"),
        ] {
            sqlx::query("INSERT INTO RESTAURANTS_GENERAL VALUES (?, ?, ?)")
                .bind(name)
                .bind(address)
                .bind(status)
                .execute(&pool)
                .await
                .unwrap();
        }
        pool
    }

    #[tokio::test]
    async fn test_lists_only_operating_places() {
        let source = SqlTaskSource::from_pool(memory_pool().await, &TaskSourceConfig::default()).unwrap();

        let tasks = source.list_open_tasks().await.unwrap();
        let names: Vec<&str> = tasks.iter().map(|t| t.original_name.as_str()).collect();

        assert_eq!(names, vec!["토속촌", "주소없는집"]);
        assert_eq!(tasks[0].address(), Some("서울 종로구 체부동 85-1"));
        assert_eq!(tasks[1].address(), None);
    }

    #[tokio::test]
    async fn test_empty_result_is_valid() {
        let config = TaskSourceConfig {
            operating_pattern: "%휴업%".to_string(),
            ..TaskSourceConfig::default()
        };
        let source = SqlTaskSource::from_pool(memory_pool().await, &config).unwrap();

        assert!(source.list_open_tasks().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_missing_table_is_an_error() {
        let config = TaskSourceConfig {
            table: "NOPE".to_string(),
            ..TaskSourceConfig::default()
        };
        let source = SqlTaskSource::from_pool(memory_pool().await, &config).unwrap();

        assert!(source.list_open_tasks().await.is_err());
    }

    #[tokio::test]
    async fn test_rejects_unsafe_identifiers() {
        let config = TaskSourceConfig {
            name_column: "name` FROM x; --".to_string(),
            ..TaskSourceConfig::default()
        };
        assert!(SqlTaskSource::from_pool(memory_pool().await, &config).is_err());
    }
}
