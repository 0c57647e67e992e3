//! Ephemeral in-process vector store.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::store::{CollectionInfo, DistanceMetric, QueryHit, StoredChunk, VectorStore};
use super::RagError;
use crate::vector_math;

struct Collection {
    info: CollectionInfo,
    rows: Vec<(StoredChunk, Vec<f32>)>,
}

#[derive(Default)]
pub struct MemoryVectorStore {
    collections: RwLock<HashMap<String, Collection>>,
}

impl MemoryVectorStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl VectorStore for MemoryVectorStore {
    async fn create_collection(
        &self,
        name: &str,
        embedding_model: &str,
        metric: DistanceMetric,
    ) -> Result<CollectionInfo, RagError> {
        let mut collections = self.collections.write().await;
        let collection = collections
            .entry(name.to_string())
            .or_insert_with(|| Collection {
                info: CollectionInfo {
                    name: name.to_string(),
                    embedding_model: embedding_model.to_string(),
                    metric,
                    created_at: chrono::Utc::now().to_rfc3339(),
                    source_digest: None,
                },
                rows: Vec::new(),
            });
        Ok(collection.info.clone())
    }

    async fn delete_collection(&self, name: &str) -> Result<bool, RagError> {
        Ok(self.collections.write().await.remove(name).is_some())
    }

    async fn collection_info(&self, name: &str) -> Result<Option<CollectionInfo>, RagError> {
        Ok(self
            .collections
            .read()
            .await
            .get(name)
            .map(|collection| collection.info.clone()))
    }

    async fn set_source_digest(&self, name: &str, digest: &str) -> Result<(), RagError> {
        if let Some(collection) = self.collections.write().await.get_mut(name) {
            collection.info.source_digest = Some(digest.to_string());
        }
        Ok(())
    }

    async fn add(&self, name: &str, items: Vec<(StoredChunk, Vec<f32>)>) -> Result<(), RagError> {
        let mut collections = self.collections.write().await;
        let collection = collections
            .get_mut(name)
            .ok_or_else(|| RagError::Store(format!("collection '{}' does not exist", name)))?;

        for (chunk, embedding) in items {
            collection
                .rows
                .retain(|(existing, _)| existing.chunk_id != chunk.chunk_id);
            collection.rows.push((chunk, embedding));
        }
        Ok(())
    }

    async fn query(
        &self,
        name: &str,
        vector: &[f32],
        k: usize,
    ) -> Result<Vec<QueryHit>, RagError> {
        let collections = self.collections.read().await;
        let Some(collection) = collections.get(name) else {
            return Ok(Vec::new());
        };

        let distances: Vec<f32> = collection
            .rows
            .iter()
            .map(|(_, embedding)| collection.info.metric.distance(vector, embedding))
            .collect();

        Ok(vector_math::nearest(&distances, k)
            .into_iter()
            .map(|(idx, distance)| QueryHit {
                chunk: collection.rows[idx].0.clone(),
                distance,
            })
            .collect())
    }

    async fn count(&self, name: &str) -> Result<usize, RagError> {
        Ok(self
            .collections
            .read()
            .await
            .get(name)
            .map(|collection| collection.rows.len())
            .unwrap_or(0))
    }
}
