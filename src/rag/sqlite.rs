//! SQLite-backed vector store.
//!
//! In-process store using SQLite for chunk rows and embeddings, with
//! brute-force distance ranking at query time.

use std::path::PathBuf;

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Row, SqlitePool};

use super::store::{CollectionInfo, DistanceMetric, QueryHit, StoredChunk, VectorStore};
use super::RagError;
use crate::core::config::AppPaths;
use crate::vector_math;

pub struct SqliteVectorStore {
    pool: SqlitePool,
}

impl SqliteVectorStore {
    pub async fn new(paths: &AppPaths) -> Result<Self, RagError> {
        Self::with_path(paths.vector_db_path.clone()).await
    }

    pub async fn with_path(db_path: PathBuf) -> Result<Self, RagError> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).map_err(RagError::store)?;
        }

        let options = SqliteConnectOptions::new()
            .filename(&db_path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .min_connections(1)
            .max_connections(4)
            .connect_with(options)
            .await
            .map_err(RagError::store)?;

        let store = Self { pool };
        store.init_schema().await?;
        Ok(store)
    }

    async fn init_schema(&self) -> Result<(), RagError> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS collections (
                name TEXT PRIMARY KEY,
                embedding_model TEXT NOT NULL,
                metric TEXT NOT NULL,
                created_at TEXT NOT NULL,
                source_digest TEXT
            )",
        )
        .execute(&self.pool)
        .await
        .map_err(RagError::store)?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS chunks (
                collection TEXT NOT NULL REFERENCES collections(name) ON DELETE CASCADE,
                chunk_id TEXT NOT NULL,
                content TEXT NOT NULL,
                source TEXT NOT NULL DEFAULT '',
                page_number INTEGER NOT NULL DEFAULT 0,
                sequence_index INTEGER NOT NULL DEFAULT 0,
                embedding BLOB NOT NULL,
                PRIMARY KEY (collection, chunk_id)
            )",
        )
        .execute(&self.pool)
        .await
        .map_err(RagError::store)?;

        Ok(())
    }

    fn serialize_embedding(embedding: &[f32]) -> Vec<u8> {
        embedding.iter().flat_map(|f| f.to_le_bytes()).collect()
    }

    fn deserialize_embedding(bytes: &[u8]) -> Vec<f32> {
        bytes
            .chunks_exact(4)
            .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
            .collect()
    }

    fn row_to_chunk(row: &sqlx::sqlite::SqliteRow) -> StoredChunk {
        let page_number: i64 = row.get("page_number");
        let sequence_index: i64 = row.get("sequence_index");
        StoredChunk {
            chunk_id: row.get("chunk_id"),
            content: row.get("content"),
            source: row.get("source"),
            page_number: page_number.max(0) as u32,
            sequence_index: sequence_index.max(0) as usize,
        }
    }

    fn row_to_info(row: &sqlx::sqlite::SqliteRow) -> Result<CollectionInfo, RagError> {
        let metric: String = row.get("metric");
        let metric = DistanceMetric::parse(&metric)
            .ok_or_else(|| RagError::Store(format!("unknown distance metric '{}'", metric)))?;
        Ok(CollectionInfo {
            name: row.get("name"),
            embedding_model: row.get("embedding_model"),
            metric,
            created_at: row.get("created_at"),
            source_digest: row.get("source_digest"),
        })
    }
}

#[async_trait]
impl VectorStore for SqliteVectorStore {
    async fn create_collection(
        &self,
        name: &str,
        embedding_model: &str,
        metric: DistanceMetric,
    ) -> Result<CollectionInfo, RagError> {
        sqlx::query(
            "INSERT OR IGNORE INTO collections (name, embedding_model, metric, created_at)
             VALUES (?1, ?2, ?3, ?4)",
        )
        .bind(name)
        .bind(embedding_model)
        .bind(metric.as_str())
        .bind(chrono::Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(RagError::store)?;

        self.collection_info(name)
            .await?
            .ok_or_else(|| RagError::Store(format!("collection '{}' was not created", name)))
    }

    async fn delete_collection(&self, name: &str) -> Result<bool, RagError> {
        let mut tx = self.pool.begin().await.map_err(RagError::store)?;

        sqlx::query("DELETE FROM chunks WHERE collection = ?1")
            .bind(name)
            .execute(&mut *tx)
            .await
            .map_err(RagError::store)?;
        let result = sqlx::query("DELETE FROM collections WHERE name = ?1")
            .bind(name)
            .execute(&mut *tx)
            .await
            .map_err(RagError::store)?;

        tx.commit().await.map_err(RagError::store)?;
        Ok(result.rows_affected() > 0)
    }

    async fn collection_info(&self, name: &str) -> Result<Option<CollectionInfo>, RagError> {
        let row = sqlx::query(
            "SELECT name, embedding_model, metric, created_at, source_digest
             FROM collections
             WHERE name = ?1",
        )
        .bind(name)
        .fetch_optional(&self.pool)
        .await
        .map_err(RagError::store)?;

        row.as_ref().map(Self::row_to_info).transpose()
    }

    async fn set_source_digest(&self, name: &str, digest: &str) -> Result<(), RagError> {
        sqlx::query("UPDATE collections SET source_digest = ?1 WHERE name = ?2")
            .bind(digest)
            .bind(name)
            .execute(&self.pool)
            .await
            .map_err(RagError::store)?;
        Ok(())
    }

    async fn add(&self, name: &str, items: Vec<(StoredChunk, Vec<f32>)>) -> Result<(), RagError> {
        if items.is_empty() {
            return Ok(());
        }

        let mut tx = self.pool.begin().await.map_err(RagError::store)?;

        for (chunk, embedding) in &items {
            let blob = Self::serialize_embedding(embedding);
            sqlx::query(
                "INSERT OR REPLACE INTO chunks
                    (collection, chunk_id, content, source, page_number, sequence_index, embedding)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            )
            .bind(name)
            .bind(&chunk.chunk_id)
            .bind(&chunk.content)
            .bind(&chunk.source)
            .bind(chunk.page_number as i64)
            .bind(chunk.sequence_index as i64)
            .bind(&blob)
            .execute(&mut *tx)
            .await
            .map_err(RagError::store)?;
        }

        tx.commit().await.map_err(RagError::store)?;
        Ok(())
    }

    async fn query(
        &self,
        name: &str,
        vector: &[f32],
        k: usize,
    ) -> Result<Vec<QueryHit>, RagError> {
        let Some(info) = self.collection_info(name).await? else {
            return Ok(Vec::new());
        };

        let rows = sqlx::query(
            "SELECT chunk_id, content, source, page_number, sequence_index, embedding
             FROM chunks
             WHERE collection = ?1",
        )
        .bind(name)
        .fetch_all(&self.pool)
        .await
        .map_err(RagError::store)?;

        let distances: Vec<f32> = rows
            .iter()
            .map(|row| {
                let bytes: Vec<u8> = row.get("embedding");
                info.metric
                    .distance(vector, &Self::deserialize_embedding(&bytes))
            })
            .collect();

        Ok(vector_math::nearest(&distances, k)
            .into_iter()
            .map(|(idx, distance)| QueryHit {
                chunk: Self::row_to_chunk(&rows[idx]),
                distance,
            })
            .collect())
    }

    async fn count(&self, name: &str) -> Result<usize, RagError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM chunks WHERE collection = ?1")
            .bind(name)
            .fetch_one(&self.pool)
            .await
            .map_err(RagError::store)?;

        Ok(count as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn test_store(dir: &tempfile::TempDir) -> SqliteVectorStore {
        SqliteVectorStore::with_path(dir.path().join("vectors.db"))
            .await
            .unwrap()
    }

    fn make_chunk(id: &str, content: &str, page: u32) -> StoredChunk {
        StoredChunk {
            chunk_id: id.to_string(),
            content: content.to_string(),
            source: "ncf.pdf".to_string(),
            page_number: page,
            sequence_index: 0,
        }
    }

    #[tokio::test]
    async fn add_and_query_orders_by_distance() {
        let dir = tempfile::tempdir().unwrap();
        let store = test_store(&dir).await;
        store
            .create_collection("ncf", "all-minilm", DistanceMetric::Cosine)
            .await
            .unwrap();

        store
            .add(
                "ncf",
                vec![
                    (make_chunk("c1", "play based learning", 3), vec![1.0, 0.0, 0.0]),
                    (make_chunk("c2", "assessment", 7), vec![0.0, 1.0, 0.0]),
                    (make_chunk("c3", "play and toys", 4), vec![0.9, 0.1, 0.0]),
                ],
            )
            .await
            .unwrap();
        assert_eq!(store.count("ncf").await.unwrap(), 3);

        let hits = store.query("ncf", &[1.0, 0.0, 0.0], 2).await.unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].chunk.chunk_id, "c1");
        assert_eq!(hits[0].chunk.page_number, 3);
        assert_eq!(hits[1].chunk.chunk_id, "c3");
        assert!(hits[0].distance <= hits[1].distance);
    }

    #[tokio::test]
    async fn missing_collection_is_empty_not_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = test_store(&dir).await;

        assert_eq!(store.count("absent").await.unwrap(), 0);
        assert!(store.query("absent", &[1.0], 5).await.unwrap().is_empty());
        assert!(store.collection_info("absent").await.unwrap().is_none());
        assert!(!store.delete_collection("absent").await.unwrap());
    }

    #[tokio::test]
    async fn delete_collection_drops_chunks_and_metadata() {
        let dir = tempfile::tempdir().unwrap();
        let store = test_store(&dir).await;
        store
            .create_collection("ncf", "model-a", DistanceMetric::L2)
            .await
            .unwrap();
        store
            .add("ncf", vec![(make_chunk("c1", "text", 1), vec![1.0])])
            .await
            .unwrap();
        store.set_source_digest("ncf", "abc123").await.unwrap();

        let info = store.collection_info("ncf").await.unwrap().unwrap();
        assert_eq!(info.embedding_model, "model-a");
        assert_eq!(info.metric, DistanceMetric::L2);
        assert_eq!(info.source_digest.as_deref(), Some("abc123"));

        assert!(store.delete_collection("ncf").await.unwrap());
        assert_eq!(store.count("ncf").await.unwrap(), 0);

        let recreated = store
            .create_collection("ncf", "model-b", DistanceMetric::Cosine)
            .await
            .unwrap();
        assert_eq!(recreated.embedding_model, "model-b");
        assert!(recreated.source_digest.is_none());
    }
}
