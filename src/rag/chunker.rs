//! Boundary-aware splitting of extracted pages into overlapping chunks.

use serde::{Deserialize, Serialize};

use super::RagError;

/// Characters treated as sentence ends when looking for a cut point.
const BREAK_CHARS: [char; 5] = ['.', '!', '?', '।', '\n'];

/// One extracted page of a source document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub source_id: String,
    /// 1-based page number.
    pub page_number: u32,
    pub raw_text: String,
}

impl Document {
    pub fn new(
        source_id: impl Into<String>,
        page_number: u32,
        raw_text: impl Into<String>,
    ) -> Self {
        Self {
            source_id: source_id.into(),
            page_number,
            raw_text: raw_text.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    /// `chunk_{n}`, unique within one indexing run.
    pub chunk_id: String,
    pub text: String,
    pub source_id: String,
    pub page_number: u32,
    pub sequence_index: usize,
    /// Offset of the window start in the page (chars or words, per unit).
    pub start_offset: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChunkUnit {
    Chars,
    Words,
}

#[derive(Debug, Clone)]
pub struct Chunker {
    chunk_size: usize,
    overlap: usize,
    unit: ChunkUnit,
    min_page_chars: usize,
}

impl Chunker {
    pub fn new(chunk_size: usize, overlap: usize, unit: ChunkUnit) -> Result<Self, RagError> {
        if chunk_size == 0 {
            return Err(RagError::Configuration(
                "chunk_size must be greater than zero".to_string(),
            ));
        }
        if overlap >= chunk_size {
            return Err(RagError::Configuration(format!(
                "chunk_overlap ({}) must be smaller than chunk_size ({})",
                overlap, chunk_size
            )));
        }
        Ok(Self {
            chunk_size,
            overlap,
            unit,
            min_page_chars: 0,
        })
    }

    /// Pages whose trimmed text is shorter than `min_chars` are skipped.
    pub fn with_min_page_chars(mut self, min_chars: usize) -> Self {
        self.min_page_chars = min_chars;
        self
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn overlap(&self) -> usize {
        self.overlap
    }

    /// Splits all pages, numbering chunks with one counter across the run.
    pub fn chunk(&self, pages: &[Document]) -> Vec<Chunk> {
        let mut chunks = Vec::new();
        let mut counter = 0usize;

        for page in pages {
            let trimmed = page.raw_text.trim();
            if trimmed.is_empty() || trimmed.chars().count() < self.min_page_chars {
                continue;
            }

            let pieces = match self.unit {
                ChunkUnit::Chars => self.split_chars(&page.raw_text),
                ChunkUnit::Words => self.split_words(&page.raw_text),
            };

            for (start_offset, text) in pieces {
                chunks.push(Chunk {
                    chunk_id: format!("chunk_{}", counter),
                    text,
                    source_id: page.source_id.clone(),
                    page_number: page.page_number,
                    sequence_index: counter,
                    start_offset,
                });
                counter += 1;
            }
        }

        chunks
    }

    fn split_chars(&self, text: &str) -> Vec<(usize, String)> {
        let chars: Vec<char> = text.chars().collect();
        let total = chars.len();
        let mut pieces = Vec::new();
        let mut start = 0usize;

        while start < total {
            let mut end = (start + self.chunk_size).min(total);

            if end < total {
                let window = &chars[start..end];
                if let Some(break_point) = window.iter().rposition(|c| BREAK_CHARS.contains(c)) {
                    if break_point * 2 > self.chunk_size {
                        end = start + break_point + 1;
                    }
                }
            }

            let piece: String = chars[start..end].iter().collect();
            let piece = piece.trim();
            if !piece.is_empty() {
                pieces.push((start, piece.to_string()));
            }

            if end >= total {
                break;
            }
            // A shortened window minus the overlap could land at or before
            // the previous start; always move forward.
            start = end.saturating_sub(self.overlap).max(start + 1);
        }

        pieces
    }

    fn split_words(&self, text: &str) -> Vec<(usize, String)> {
        let words: Vec<&str> = text.split_whitespace().collect();
        let step = self.chunk_size - self.overlap;
        let mut pieces = Vec::new();
        let mut start = 0usize;

        while start < words.len() {
            let end = (start + self.chunk_size).min(words.len());
            pieces.push((start, words[start..end].join(" ")));
            if end >= words.len() {
                break;
            }
            start += step;
        }

        pieces
    }
}
