//! VectorIndex: chunk, embed and persist documents; answer similarity queries.

use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::BoxFuture;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tokio::sync::{Mutex, OnceCell};

use super::chunker::{Chunk, Chunker, Document};
use super::embedder::{Embedder, HttpEmbedder};
use super::memory::MemoryVectorStore;
use super::pdf;
use super::retriever::RetrievedDocument;
use super::sqlite::SqliteVectorStore;
use super::store::{DistanceMetric, StoredChunk, VectorStore};
use super::RagError;
use crate::core::config::{AppPaths, Settings, StoreBackend};

/// Chunks sent to the embedder per request while indexing.
const EMBED_BATCH: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexStatus {
    Success,
    Skipped,
    Error,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexReport {
    pub status: IndexStatus,
    pub chunks_count: usize,
    pub pages: usize,
    pub source: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub document_count: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexStats {
    pub collection_name: String,
    pub document_count: usize,
    pub is_ready: bool,
    pub embedding_model: Option<String>,
    pub indexed_at: Option<String>,
    pub source_digest: Option<String>,
}

#[derive(Debug, Clone, Copy)]
pub struct IndexTimeouts {
    pub embedding: Duration,
    pub vector_query: Duration,
}

pub struct VectorIndex {
    store: Arc<dyn VectorStore>,
    embedder: Arc<dyn Embedder>,
    chunker: Chunker,
    collection: String,
    metric: DistanceMetric,
    timeouts: IndexTimeouts,
    // Indexing runs delete and rebuild the collection; never interleave two.
    write_lock: Mutex<()>,
}

impl VectorIndex {
    pub fn new(
        store: Arc<dyn VectorStore>,
        embedder: Arc<dyn Embedder>,
        chunker: Chunker,
        collection: impl Into<String>,
        metric: DistanceMetric,
        timeouts: IndexTimeouts,
    ) -> Self {
        Self {
            store,
            embedder,
            chunker,
            collection: collection.into(),
            metric,
            timeouts,
            write_lock: Mutex::new(()),
        }
    }

    /// Opens the configured store and embedding client.
    pub async fn from_settings(paths: &AppPaths, settings: &Settings) -> Result<Self, RagError> {
        let rag = &settings.rag;
        let chunker = Chunker::new(rag.chunk_size, rag.chunk_overlap, rag.chunk_unit)?
            .with_min_page_chars(rag.min_page_chars);

        let store: Arc<dyn VectorStore> = match rag.store_backend {
            StoreBackend::Sqlite => Arc::new(SqliteVectorStore::new(paths).await?),
            StoreBackend::Memory => Arc::new(MemoryVectorStore::new()),
        };
        let embedder = Arc::new(HttpEmbedder::new(
            &settings.embedding,
            settings.timeouts.embedding,
        )?);

        tracing::info!(
            collection = %rag.collection_name,
            backend = ?rag.store_backend,
            model = %settings.embedding.model,
            "Vector index opened"
        );

        Ok(Self::new(
            store,
            embedder,
            chunker,
            rag.collection_name.clone(),
            rag.distance_metric,
            IndexTimeouts {
                embedding: settings.timeouts.embedding,
                vector_query: settings.timeouts.vector_query,
            },
        ))
    }

    pub fn collection_name(&self) -> &str {
        &self.collection
    }

    pub async fn index_pdf(&self, path: &Path, force: bool) -> Result<IndexReport, RagError> {
        if !path.exists() {
            return Err(RagError::SourceNotFound(path.display().to_string()));
        }
        let source = pdf::source_id(path);

        if !force {
            if let Some(report) = self.skip_if_populated(&source).await? {
                return Ok(report);
            }
        }

        let pages = pdf::extract_pages(path).await?;
        tracing::info!(source = %source, pages = pages.len(), "Extracted PDF pages");
        self.index_pages(pages, &source, force).await
    }

    pub async fn index_pages(
        &self,
        pages: Vec<Document>,
        source: &str,
        force: bool,
    ) -> Result<IndexReport, RagError> {
        let _guard = self.write_lock.lock().await;

        if !force {
            if let Some(report) = self.skip_if_populated(source).await? {
                return Ok(report);
            }
        }

        let model = self.embedder.model_id().to_string();
        let existing = self.store.collection_info(&self.collection).await?;
        let stale_model = existing
            .as_ref()
            .map(|info| info.embedding_model != model)
            .unwrap_or(false);
        if force || stale_model {
            let deleted = self.store.delete_collection(&self.collection).await?;
            tracing::info!(
                collection = %self.collection,
                deleted,
                stale_model,
                "Cleared collection before reindex"
            );
        }
        self.store
            .create_collection(&self.collection, &model, self.metric)
            .await?;

        let chunks = self.chunker.chunk(&pages);
        if chunks.is_empty() {
            tracing::warn!(source = %source, pages = pages.len(), "No chunks produced");
            return Ok(IndexReport {
                status: IndexStatus::Error,
                chunks_count: 0,
                pages: pages.len(),
                source: source.to_string(),
                reason: Some("no_chunks_created".to_string()),
                document_count: None,
            });
        }

        if let Err(err) = self.write_chunks(&chunks, &pages).await {
            self.discard_partial(&err).await;
            return Err(err);
        }

        tracing::info!(
            source = %source,
            chunks = chunks.len(),
            pages = pages.len(),
            "Indexed document"
        );

        Ok(IndexReport {
            status: IndexStatus::Success,
            chunks_count: chunks.len(),
            pages: pages.len(),
            source: source.to_string(),
            reason: None,
            document_count: None,
        })
    }

    /// Nearest chunks to `text`, scored in [0, 1]. Absent or empty
    /// collections yield an empty list.
    pub async fn query(&self, text: &str, k: usize) -> Result<Vec<RetrievedDocument>, RagError> {
        let Some(info) = self.store.collection_info(&self.collection).await? else {
            return Ok(Vec::new());
        };
        if info.embedding_model != self.embedder.model_id() {
            return Err(RagError::ModelMismatch {
                collection: self.collection.clone(),
                indexed: info.embedding_model,
                current: self.embedder.model_id().to_string(),
            });
        }
        if self.store.count(&self.collection).await? == 0 {
            return Ok(Vec::new());
        }

        let mut vectors = with_timeout(
            "embedding",
            self.timeouts.embedding,
            self.embedder.embed(&[text.to_string()]),
        )
        .await?;
        let Some(vector) = vectors.pop() else {
            return Err(RagError::Embedding("no vector returned for query".to_string()));
        };

        let hits = with_timeout(
            "vector_query",
            self.timeouts.vector_query,
            self.store.query(&self.collection, &vector, k),
        )
        .await?;

        Ok(hits
            .into_iter()
            .map(|hit| RetrievedDocument {
                text: hit.chunk.content,
                source: hit.chunk.source,
                page_number: hit.chunk.page_number,
                score: f64::from(info.metric.score(hit.distance)),
            })
            .collect())
    }

    pub async fn stats(&self) -> Result<IndexStats, RagError> {
        let info = self.store.collection_info(&self.collection).await?;
        let document_count = self.store.count(&self.collection).await?;
        Ok(IndexStats {
            collection_name: self.collection.clone(),
            document_count,
            is_ready: document_count > 0,
            embedding_model: info.as_ref().map(|i| i.embedding_model.clone()),
            indexed_at: info.as_ref().map(|i| i.created_at.clone()),
            source_digest: info.and_then(|i| i.source_digest),
        })
    }

    /// Embeds and stores every chunk, then records the source digest.
    async fn write_chunks(&self, chunks: &[Chunk], pages: &[Document]) -> Result<(), RagError> {
        for batch in chunks.chunks(EMBED_BATCH) {
            let texts: Vec<String> = batch.iter().map(|chunk| chunk.text.clone()).collect();
            let vectors = with_timeout(
                "embedding",
                self.timeouts.embedding,
                self.embedder.embed(&texts),
            )
            .await?;
            if vectors.len() != batch.len() {
                return Err(RagError::Embedding(format!(
                    "expected {} vectors, got {}",
                    batch.len(),
                    vectors.len()
                )));
            }

            let items = batch
                .iter()
                .zip(vectors)
                .map(|(chunk, vector)| {
                    (
                        StoredChunk {
                            chunk_id: chunk.chunk_id.clone(),
                            content: chunk.text.clone(),
                            source: chunk.source_id.clone(),
                            page_number: chunk.page_number,
                            sequence_index: chunk.sequence_index,
                        },
                        vector,
                    )
                })
                .collect();
            self.store.add(&self.collection, items).await?;
        }

        self.store
            .set_source_digest(&self.collection, &digest_pages(pages))
            .await
    }

    /// Drops a half-written collection so the next run starts clean.
    async fn discard_partial(&self, cause: &RagError) {
        match self.store.delete_collection(&self.collection).await {
            Ok(_) => tracing::warn!(
                collection = %self.collection,
                error = %cause,
                "Indexing failed, partial collection removed"
            ),
            Err(err) => tracing::error!(
                collection = %self.collection,
                error = %cause,
                cleanup_error = %err,
                "Indexing failed and the partial collection could not be removed"
            ),
        }
    }

    async fn skip_if_populated(&self, source: &str) -> Result<Option<IndexReport>, RagError> {
        let count = self.store.count(&self.collection).await?;
        if count == 0 {
            return Ok(None);
        }
        tracing::info!(
            collection = %self.collection,
            count,
            "Collection already populated, skipping"
        );
        Ok(Some(IndexReport {
            status: IndexStatus::Skipped,
            chunks_count: 0,
            pages: 0,
            source: source.to_string(),
            reason: Some("already_indexed".to_string()),
            document_count: Some(count),
        }))
    }
}

async fn with_timeout<T, F>(stage: &'static str, limit: Duration, fut: F) -> Result<T, RagError>
where
    F: Future<Output = Result<T, RagError>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => Err(RagError::Timeout {
            stage,
            secs: limit.as_secs(),
        }),
    }
}

fn digest_pages(pages: &[Document]) -> String {
    let mut hasher = Sha256::new();
    for page in pages {
        hasher.update(page.page_number.to_le_bytes());
        hasher.update(page.raw_text.as_bytes());
    }
    hex::encode(hasher.finalize())
}

type IndexFactory =
    Box<dyn Fn() -> BoxFuture<'static, Result<Arc<VectorIndex>, RagError>> + Send + Sync>;

/// Process-wide, lazily opened index. Concurrent first callers share one
/// construction; a failed construction is retried on the next call.
pub struct IndexHandle {
    cell: OnceCell<Arc<VectorIndex>>,
    factory: IndexFactory,
}

impl IndexHandle {
    pub fn lazy<F>(factory: F) -> Self
    where
        F: Fn() -> BoxFuture<'static, Result<Arc<VectorIndex>, RagError>> + Send + Sync + 'static,
    {
        Self {
            cell: OnceCell::new(),
            factory: Box::new(factory),
        }
    }

    pub fn from_settings(paths: Arc<AppPaths>, settings: Arc<Settings>) -> Self {
        Self::lazy(move || {
            let paths = paths.clone();
            let settings = settings.clone();
            Box::pin(async move {
                VectorIndex::from_settings(&paths, &settings)
                    .await
                    .map(Arc::new)
            })
        })
    }

    pub fn ready(index: Arc<VectorIndex>) -> Self {
        Self {
            cell: OnceCell::new_with(Some(index)),
            factory: Box::new(|| -> BoxFuture<'static, Result<Arc<VectorIndex>, RagError>> {
                Box::pin(async {
                    Err(RagError::Configuration(
                        "index handle has no factory".to_string(),
                    ))
                })
            }),
        }
    }

    pub async fn get(&self) -> Result<Arc<VectorIndex>, RagError> {
        self.cell
            .get_or_try_init(|| (self.factory)())
            .await
            .cloned()
    }

    pub fn is_initialized(&self) -> bool {
        self.cell.initialized()
    }
}
