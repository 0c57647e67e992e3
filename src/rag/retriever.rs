//! Query-time retrieval: ranking, context formatting and relevance gating.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::index::IndexHandle;
use super::RagError;

const CONTEXT_DELIMITER: &str = "\n---\n";
/// Approximate characters per token when budgeting context.
const CHARS_PER_TOKEN: usize = 4;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievedDocument {
    pub text: String,
    pub source: String,
    pub page_number: u32,
    /// Normalized similarity in [0, 1]; higher is more relevant.
    pub score: f64,
}

impl RetrievedDocument {
    pub fn citation(&self) -> String {
        format!("{}, Page {}", self.source, self.page_number)
    }
}

/// Documents that cleared the relevance threshold.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct GatedContext {
    pub included: Vec<RetrievedDocument>,
    pub sources_used: Vec<String>,
    pub confidence_score: f64,
}

impl GatedContext {
    pub fn ncf_used(&self) -> bool {
        !self.included.is_empty()
    }
}

pub struct Retriever {
    index: Arc<IndexHandle>,
    top_k: usize,
}

impl Retriever {
    pub fn new(index: Arc<IndexHandle>, top_k: usize) -> Self {
        Self {
            index,
            top_k: top_k.max(1),
        }
    }

    pub fn top_k(&self) -> usize {
        self.top_k
    }

    /// Ranked documents for `query`, best first, without duplicate texts.
    /// A cold or empty index yields an empty list.
    pub async fn retrieve(
        &self,
        query: &str,
        top_k: usize,
    ) -> Result<Vec<RetrievedDocument>, RagError> {
        let index = self.index.get().await?;
        let documents = index
            .query(query, top_k)
            .await
            .map_err(|err| match err {
                RagError::Timeout { .. } | RagError::ModelMismatch { .. } => err,
                other => RagError::Retrieval(other.to_string()),
            })?;
        Ok(rank(documents))
    }

    /// Retrieval for a classroom request, searching `"{grade} {subject} {query}"`.
    pub async fn retrieve_for(
        &self,
        grade: &str,
        subject: &str,
        query: &str,
    ) -> Result<Vec<RetrievedDocument>, RagError> {
        self.retrieve(&search_query(grade, subject, query), self.top_k)
            .await
    }
}

pub fn search_query(grade: &str, subject: &str, query: &str) -> String {
    [grade.trim(), subject.trim(), query.trim()]
        .iter()
        .filter(|part| !part.is_empty())
        .copied()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Sorts by descending score and drops repeated texts, keeping the best.
pub fn rank(documents: Vec<RetrievedDocument>) -> Vec<RetrievedDocument> {
    let mut best: HashMap<String, RetrievedDocument> = HashMap::new();
    for doc in documents {
        match best.get(&doc.text) {
            Some(existing) if existing.score >= doc.score => {}
            _ => {
                best.insert(doc.text.clone(), doc);
            }
        }
    }

    let mut ranked: Vec<RetrievedDocument> = best.into_values().collect();
    ranked.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
    ranked
}

/// Joins `[source, Page N]` blocks until the next whole block would push the
/// result past `max_tokens * 4` characters.
pub fn format_context(documents: &[RetrievedDocument], max_tokens: usize) -> String {
    let budget = max_tokens.saturating_mul(CHARS_PER_TOKEN);
    let delimiter_len = CONTEXT_DELIMITER.chars().count();

    let mut parts: Vec<String> = Vec::new();
    let mut used = 0usize;
    for doc in documents {
        let block = format!("[{}, Page {}]\n{}\n", doc.source, doc.page_number, doc.text);
        let mut cost = block.chars().count();
        if !parts.is_empty() {
            cost += delimiter_len;
        }
        if used + cost > budget {
            break;
        }
        used += cost;
        parts.push(block);
    }

    parts.join(CONTEXT_DELIMITER)
}

/// Keeps documents scoring strictly above `threshold`; confidence is their
/// mean score rounded to two decimals.
pub fn gate(documents: Vec<RetrievedDocument>, threshold: f64) -> GatedContext {
    let included: Vec<RetrievedDocument> = documents
        .into_iter()
        .filter(|doc| doc.score > threshold)
        .collect();
    if included.is_empty() {
        return GatedContext::default();
    }

    let mean = included.iter().map(|doc| doc.score).sum::<f64>() / included.len() as f64;
    let confidence_score = ((mean * 100.0).round() / 100.0).clamp(0.0, 1.0);
    let sources_used = included.iter().map(RetrievedDocument::citation).collect();

    GatedContext {
        included,
        sources_used,
        confidence_score,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rag::chunker::{ChunkUnit, Chunker, Document};
    use crate::rag::embedder::testing::LetterEmbedder;
    use crate::rag::index::{IndexTimeouts, VectorIndex};
    use crate::rag::memory::MemoryVectorStore;
    use crate::rag::store::DistanceMetric;
    use std::time::Duration;

    fn doc(text: &str, page: u32, score: f64) -> RetrievedDocument {
        RetrievedDocument {
            text: text.to_string(),
            source: "NCF".to_string(),
            page_number: page,
            score,
        }
    }

    #[test]
    fn gate_averages_only_documents_above_threshold() {
        let gated = gate(
            vec![doc("a", 1, 0.9), doc("b", 2, 0.5), doc("c", 3, 0.2)],
            0.3,
        );
        assert_eq!(gated.confidence_score, 0.70);
        assert_eq!(gated.sources_used, vec!["NCF, Page 1", "NCF, Page 2"]);
        assert!(gated.ncf_used());
    }

    #[test]
    fn gate_is_strict_and_zero_when_nothing_clears() {
        let gated = gate(vec![doc("a", 1, 0.3), doc("b", 2, 0.1)], 0.3);
        assert_eq!(gated.confidence_score, 0.0);
        assert!(gated.sources_used.is_empty());
        assert!(!gated.ncf_used());
    }

    #[test]
    fn format_context_never_exceeds_budget_or_splits_documents() {
        let docs = vec![
            doc(&"x".repeat(20), 1, 0.9),
            doc(&"y".repeat(20), 2, 0.8),
            doc(&"z".repeat(20), 3, 0.7),
        ];
        // each block is 14 + 20 + 1 = 35 chars, delimiter 5
        let context = format_context(&docs, 19);
        assert!(context.chars().count() <= 76);
        assert_eq!(
            context,
            format!(
                "[NCF, Page 1]\n{}\n\n---\n[NCF, Page 2]\n{}\n",
                "x".repeat(20),
                "y".repeat(20)
            )
        );
        assert!(!context.contains('z'));

        assert_eq!(format_context(&docs, 1), "");
    }

    #[test]
    fn rank_dedupes_by_text_and_sorts_descending() {
        let ranked = rank(vec![
            doc("same", 1, 0.4),
            doc("other", 2, 0.6),
            doc("same", 5, 0.8),
        ]);
        assert_eq!(ranked.len(), 2);
        assert_eq!(ranked[0].page_number, 5);
        assert_eq!(ranked[1].text, "other");
    }

    #[test]
    fn search_query_skips_blank_parts() {
        assert_eq!(search_query("5", "Math", "fractions"), "5 Math fractions");
        assert_eq!(search_query("", " Math ", "noise"), "Math noise");
    }

    #[tokio::test]
    async fn retrieve_from_cold_index_is_empty() {
        let index = VectorIndex::new(
            Arc::new(MemoryVectorStore::new()),
            Arc::new(LetterEmbedder::new("m")),
            Chunker::new(100, 10, ChunkUnit::Chars).unwrap(),
            "ncf_documents",
            DistanceMetric::Cosine,
            IndexTimeouts {
                embedding: Duration::from_secs(1),
                vector_query: Duration::from_secs(1),
            },
        );
        let retriever = Retriever::new(Arc::new(IndexHandle::ready(Arc::new(index))), 5);
        assert!(retriever.retrieve("anything", 5).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn retrieve_returns_best_first() {
        let index = Arc::new(VectorIndex::new(
            Arc::new(MemoryVectorStore::new()),
            Arc::new(LetterEmbedder::new("m")),
            Chunker::new(100, 10, ChunkUnit::Chars).unwrap(),
            "ncf_documents",
            DistanceMetric::Cosine,
            IndexTimeouts {
                embedding: Duration::from_secs(1),
                vector_query: Duration::from_secs(1),
            },
        ));
        index
            .index_pages(
                vec![
                    Document::new("NCF", 1, "games and play"),
                    Document::new("NCF", 2, "fraction of a roti"),
                ],
                "NCF",
                false,
            )
            .await
            .unwrap();

        let retriever = Retriever::new(Arc::new(IndexHandle::ready(index)), 5);
        let docs = retriever.retrieve("fraction roti", 2).await.unwrap();
        assert_eq!(docs[0].page_number, 2);
        assert!(docs[0].score >= docs[1].score);
    }
}
