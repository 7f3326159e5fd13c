//! SQLite-backed document store
//!
//! Each harvested place is one JSON document keyed by `original_name`.
//! The same connection serves as completion ledger (identifiers already
//! persisted) and as result sink (keyed upsert).

use std::collections::HashSet;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{Connection, Row};
use tracing::{debug, info};

use super::config::DocumentStoreConfig;
use super::database_connection::DatabaseConnection;
use crate::domain::record::ExtractedRecord;
use crate::domain::repositories::{CompletionLedger, DocumentStore, RecordSink, StoreConnector};
use crate::domain::scoring::{ScoreInput, WeightedScore};

pub struct SqliteDocumentStore {
    db: DatabaseConnection,
    collection: String,
}

impl SqliteDocumentStore {
    pub async fn open(config: &DocumentStoreConfig) -> Result<Self> {
        let mut db = DatabaseConnection::open(&config.database_url).await?;
        db.migrate(&config.collection).await?;
        Ok(Self {
            db,
            collection: config.collection.clone(),
        })
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    pub async fn close_connection(self) -> Result<()> {
        self.db.close().await
    }

    /// Rating inputs of every persisted document; non-numeric values read as 0
    pub async fn load_score_inputs(&mut self) -> Result<Vec<ScoreInput>> {
        let sql = format!(
            r#"
            SELECT original_name,
                   COALESCE(CAST(json_extract(document, '$.rating') AS REAL), 0.0) AS rating,
                   COALESCE(CAST(json_extract(document, '$.visitor_reviews') AS REAL), 0.0) AS visitor_reviews
            FROM "{}"
            ORDER BY original_name
            "#,
            self.collection
        );

        let rows = sqlx::query(&sql)
            .fetch_all(self.db.connection())
            .await
            .context("Failed to read score inputs")?;

        rows.iter()
            .map(|row| -> Result<ScoreInput> {
                Ok(ScoreInput {
                    original_name: row.try_get("original_name")?,
                    rating: row.try_get("rating")?,
                    visitor_reviews: row.try_get("visitor_reviews")?,
                })
            })
            .collect()
    }

    /// Write `weighted_score` into every listed document in one transaction
    pub async fn write_weighted_scores(&mut self, scores: &[WeightedScore]) -> Result<u64> {
        let sql = format!(
            r#"UPDATE "{}" SET document = json_set(document, '$.weighted_score', ?) WHERE original_name = ?"#,
            self.collection
        );

        let mut tx = self.db.connection().begin().await?;
        let mut updated = 0;
        for score in scores {
            updated += sqlx::query(&sql)
                .bind(score.weighted_score)
                .bind(&score.original_name)
                .execute(&mut *tx)
                .await?
                .rows_affected();
        }
        tx.commit().await.context("Failed to commit weighted scores")?;

        info!("Updated weighted_score for {} documents", updated);
        Ok(updated)
    }
}

#[async_trait]
impl CompletionLedger for SqliteDocumentStore {
    async fn known_identifiers(&mut self) -> Result<HashSet<String>> {
        let sql = format!(
            r#"SELECT json_extract(document, '$.original_name') AS original_name FROM "{}""#,
            self.collection
        );

        let rows = sqlx::query(&sql)
            .fetch_all(self.db.connection())
            .await
            .context("Failed to read completed identifiers")?;

        let mut identifiers = HashSet::with_capacity(rows.len());
        for row in &rows {
            // 식별자 없는 문서는 건너뜀
            if let Some(identifier) = row.try_get::<Option<String>, _>("original_name")? {
                identifiers.insert(identifier);
            }
        }

        debug!("{} of {} documents carry an identifier", identifiers.len(), rows.len());
        Ok(identifiers)
    }
}

#[async_trait]
impl RecordSink for SqliteDocumentStore {
    async fn upsert(&mut self, identifier: &str, record: &ExtractedRecord) -> Result<()> {
        anyhow::ensure!(
            record.is_success(),
            "Refusing to persist '{}' with status {}",
            identifier,
            record.status
        );

        let document = serde_json::to_string(record)?;
        let sql = format!(
            r#"
            INSERT INTO "{}" (original_name, document, updated_at)
            VALUES (?, ?, ?)
            ON CONFLICT(original_name) DO UPDATE SET
                document = json_patch(document, excluded.document),
                updated_at = excluded.updated_at
            "#,
            self.collection
        );

        sqlx::query(&sql)
            .bind(identifier)
            .bind(document)
            .bind(Utc::now().to_rfc3339())
            .execute(self.db.connection())
            .await
            .with_context(|| format!("Failed to upsert document '{}'", identifier))?;

        Ok(())
    }
}

#[async_trait]
impl DocumentStore for SqliteDocumentStore {
    async fn close(self: Box<Self>) -> Result<()> {
        self.close_connection().await
    }
}

/// Opens a fresh [`SqliteDocumentStore`] per call
#[derive(Debug, Clone)]
pub struct SqliteStoreConnector {
    config: DocumentStoreConfig,
}

impl SqliteStoreConnector {
    pub fn new(config: DocumentStoreConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl StoreConnector for SqliteStoreConnector {
    async fn connect(&self) -> Result<Box<dyn DocumentStore>> {
        let store = SqliteDocumentStore::open(&self.config).await?;
        Ok(Box::new(store))
    }
}
