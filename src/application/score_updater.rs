//! Weighted score recomputation over every persisted place

use anyhow::Result;
use tracing::info;

use crate::domain::scoring::{mean_rating, score_all};
use crate::infrastructure::document_store::SqliteDocumentStore;

#[derive(Debug, Clone, PartialEq)]
pub struct ScoreReport {
    pub documents: usize,
    pub mean_rating: f64,
    pub updated: u64,
}

/// Recompute `weighted_score` for every document in the store
pub async fn update_scores(store: &mut SqliteDocumentStore, min_reviews: f64) -> Result<ScoreReport> {
    let inputs = store.load_score_inputs().await?;
    if inputs.is_empty() {
        info!("No documents in '{}', nothing to score", store.collection());
        return Ok(ScoreReport {
            documents: 0,
            mean_rating: 0.0,
            updated: 0,
        });
    }

    let mean = mean_rating(&inputs);
    info!("📊 Scoring {} documents (mean rating {:.3}, m = {})", inputs.len(), mean, min_reviews);

    let scores = score_all(&inputs, min_reviews);
    let updated = store.write_weighted_scores(&scores).await?;

    Ok(ScoreReport {
        documents: inputs.len(),
        mean_rating: mean,
        updated,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::record::{ExtractedRecord, PlaceDetail};
    use crate::domain::repositories::RecordSink;
    use crate::domain::task::Task;
    use crate::infrastructure::config::DocumentStoreConfig;

    async fn open_store(dir: &tempfile::TempDir) -> SqliteDocumentStore {
        SqliteDocumentStore::open(&DocumentStoreConfig {
            database_url: format!("sqlite://{}", dir.path().join("score.db").display()),
            collection: "restaurant".to_string(),
        })
        .await
        .unwrap()
    }

    fn place(name: &str, rating: f64, visitor_reviews: i64) -> ExtractedRecord {
        ExtractedRecord::success(
            &Task::new(name, None),
            PlaceDetail {
                name: name.to_string(),
                rating,
                visitor_reviews,
                blog_reviews: 0,
                menu_items: Vec::new(),
                avg_price: 0.0,
            },
        )
    }

    #[tokio::test]
    async fn test_empty_store_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = open_store(&dir).await;

        let report = update_scores(&mut store, 200.0).await.unwrap();
        assert_eq!(report.documents, 0);
        assert_eq!(report.updated, 0);
    }

    #[tokio::test]
    async fn test_scores_every_document() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = open_store(&dir).await;
        store.upsert("a", &place("a", 4.0, 200)).await.unwrap();
        store.upsert("b", &place("b", 2.0, 0)).await.unwrap();

        let report = update_scores(&mut store, 200.0).await.unwrap();

        assert_eq!(report.documents, 2);
        assert_eq!(report.updated, 2);
        assert!((report.mean_rating - 3.0).abs() < 1e-9);

        let inputs = store.load_score_inputs().await.unwrap();
        assert_eq!(inputs.len(), 2);
    }
}
