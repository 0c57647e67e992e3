//! Retrieval over the curriculum framework document.
//!
//! - `chunker`: page text into overlapping, boundary-aware chunks
//! - `index`: embeds and persists chunks, answers nearest-neighbour queries
//! - `retriever`: ranking, context formatting and relevance gating

pub mod chunker;
pub mod embedder;
mod error;
pub mod index;
pub mod memory;
pub mod pdf;
pub mod retriever;
pub mod sqlite;
pub mod store;

pub use chunker::{Chunk, ChunkUnit, Chunker, Document};
pub use embedder::{Embedder, HttpEmbedder};
pub use error::RagError;
pub use index::{IndexHandle, IndexReport, IndexStats, IndexStatus, VectorIndex};
pub use retriever::{format_context, gate, GatedContext, RetrievedDocument, Retriever};
pub use store::{DistanceMetric, VectorStore};
