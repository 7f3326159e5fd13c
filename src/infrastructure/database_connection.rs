// Document store connection management
// One SQLite connection per harvest task; documents are JSON text keyed by original_name

use anyhow::{Context, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqliteConnection};
use sqlx::Connection;
use std::path::Path;
use std::str::FromStr;
use tracing::debug;

use super::config::is_identifier;

pub struct DatabaseConnection {
    conn: SqliteConnection,
}

impl DatabaseConnection {
    /// Open a connection, creating the database file (and its directory) if necessary
    pub async fn open(database_url: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(database_url)
            .with_context(|| format!("Invalid document store URL: {}", database_url))?
            .create_if_missing(true);

        if let Some(parent) = options.get_filename().parent() {
            if !parent.as_os_str().is_empty() && !Path::new(parent).exists() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .with_context(|| format!("Failed to create database directory {:?}", parent))?;
            }
        }

        let conn = SqliteConnection::connect_with(&options)
            .await
            .with_context(|| format!("Failed to connect to document store: {}", database_url))?;

        Ok(Self { conn })
    }

    pub fn connection(&mut self) -> &mut SqliteConnection {
        &mut self.conn
    }

    /// Create the document table for `collection` if it does not exist yet
    pub async fn migrate(&mut self, collection: &str) -> Result<()> {
        anyhow::ensure!(is_identifier(collection), "Invalid collection name: {}", collection);

        let create_documents_sql = format!(
            r#"
            CREATE TABLE IF NOT EXISTS "{collection}" (
                original_name TEXT PRIMARY KEY,
                document TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )
            "#
        );
        sqlx::query(&create_documents_sql).execute(&mut self.conn).await?;

        debug!("Document table '{}' ready", collection);
        Ok(())
    }

    pub async fn close(self) -> Result<()> {
        self.conn.close().await?;
        Ok(())
    }
}
