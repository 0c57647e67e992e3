//! VectorStore trait: the nearest-neighbour collaborator behind the index.
//!
//! Collections are named partitions. Each one remembers which embedding
//! model and distance metric produced its vectors so callers can refuse
//! to mix models.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::RagError;
use crate::vector_math;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DistanceMetric {
    Cosine,
    L2,
}

impl DistanceMetric {
    pub fn as_str(&self) -> &'static str {
        match self {
            DistanceMetric::Cosine => "cosine",
            DistanceMetric::L2 => "l2",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "cosine" => Some(DistanceMetric::Cosine),
            "l2" => Some(DistanceMetric::L2),
            _ => None,
        }
    }

    /// Smaller is closer.
    pub fn distance(&self, query: &[f32], candidate: &[f32]) -> f32 {
        match self {
            DistanceMetric::Cosine => vector_math::cosine_distance(query, candidate),
            DistanceMetric::L2 => vector_math::l2_distance(query, candidate),
        }
    }

    /// Maps a distance onto a relevance score in [0, 1], higher is better.
    pub fn score(&self, distance: f32) -> f32 {
        let score = match self {
            DistanceMetric::Cosine => 1.0 - distance,
            DistanceMetric::L2 => 1.0 / (1.0 + distance),
        };
        if score.is_nan() {
            0.0
        } else {
            score.clamp(0.0, 1.0)
        }
    }
}

/// A persisted chunk and its provenance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredChunk {
    pub chunk_id: String,
    pub content: String,
    pub source: String,
    pub page_number: u32,
    pub sequence_index: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryHit {
    pub chunk: StoredChunk,
    pub distance: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionInfo {
    pub name: String,
    pub embedding_model: String,
    pub metric: DistanceMetric,
    pub created_at: String,
    /// Hex SHA-256 of the source the collection was last built from.
    pub source_digest: Option<String>,
}

#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Creates an empty collection. Existing collections are left untouched.
    async fn create_collection(
        &self,
        name: &str,
        embedding_model: &str,
        metric: DistanceMetric,
    ) -> Result<CollectionInfo, RagError>;

    /// Drops the collection and all of its chunks. Returns whether it existed.
    async fn delete_collection(&self, name: &str) -> Result<bool, RagError>;

    async fn collection_info(&self, name: &str) -> Result<Option<CollectionInfo>, RagError>;

    async fn set_source_digest(&self, name: &str, digest: &str) -> Result<(), RagError>;

    async fn add(&self, name: &str, items: Vec<(StoredChunk, Vec<f32>)>) -> Result<(), RagError>;

    /// Up to `k` hits ordered by ascending distance. A missing collection
    /// yields an empty list.
    async fn query(&self, name: &str, vector: &[f32], k: usize)
        -> Result<Vec<QueryHit>, RagError>;

    /// Number of chunks in the collection; 0 when it does not exist.
    async fn count(&self, name: &str) -> Result<usize, RagError>;
}
