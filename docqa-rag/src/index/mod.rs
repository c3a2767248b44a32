//! The persisted vector index.
//!
//! A [`VectorIndex`] is an [`IndexHeader`] plus every [`IndexEntry`] in the
//! order it was inserted. It is produced once by the [`IndexBuilder`],
//! written with [`storage::save`], and loaded read-only with
//! [`storage::load`]. Search is exhaustive over all entries using the metric
//! recorded in the header.

mod builder;
pub mod storage;

pub use builder::IndexBuilder;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::document::{Chunk, SearchResult};
use crate::error::{RagError, Result};
use crate::similarity::Similarity;

/// Version of the on-disk layout written by this crate.
pub const FORMAT_VERSION: u32 = 1;

/// Identity of an index: who built it and how it must be searched.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IndexHeader {
    /// On-disk layout version.
    pub format_version: u32,
    /// Identity of the embedder that produced every vector.
    pub embedder: String,
    /// Length of every stored vector.
    pub dimensions: usize,
    /// Metric used by search.
    pub metric: Similarity,
    /// When the build finished.
    pub built_at: DateTime<Utc>,
    /// Number of entries that follow the header.
    pub entry_count: usize,
}

/// A chunk stored together with its embedding.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IndexEntry {
    /// The chunk text and metadata.
    pub chunk: Chunk,
    /// The chunk's embedding.
    pub embedding: Vec<f32>,
}

/// An immutable collection of index entries with exhaustive similarity search.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VectorIndex {
    header: IndexHeader,
    entries: Vec<IndexEntry>,
}

impl VectorIndex {
    /// Assemble an index from already-embedded entries.
    ///
    /// # Errors
    ///
    /// - [`RagError::EmptyCorpus`] if `entries` is empty
    /// - [`RagError::EmbeddingDimensionMismatch`] if any vector does not have
    ///   `dimensions` elements
    /// - [`RagError::EmbeddingError`] if any vector holds a NaN or infinite
    ///   component, which JSON cannot represent
    pub fn new(
        embedder: impl Into<String>,
        dimensions: usize,
        metric: Similarity,
        entries: Vec<IndexEntry>,
    ) -> Result<Self> {
        if entries.is_empty() {
            return Err(RagError::EmptyCorpus);
        }
        if let Some(bad) = entries.iter().find(|e| e.embedding.len() != dimensions) {
            return Err(RagError::EmbeddingDimensionMismatch {
                expected: dimensions,
                actual: bad.embedding.len(),
            });
        }
        let embedder = embedder.into();
        if let Some(bad) = entries.iter().find(|e| !is_finite(&e.embedding)) {
            return Err(RagError::EmbeddingError {
                provider: embedder,
                message: format!("embedding for chunk {} has non-finite components", bad.chunk.id),
            });
        }

        let header = IndexHeader {
            format_version: FORMAT_VERSION,
            embedder,
            dimensions,
            metric,
            built_at: Utc::now(),
            entry_count: entries.len(),
        };
        Ok(Self { header, entries })
    }

    /// The index header.
    pub fn header(&self) -> &IndexHeader {
        &self.header
    }

    /// All entries in insertion order.
    pub fn entries(&self) -> &[IndexEntry] {
        &self.entries
    }

    /// Number of stored entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the index holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Return the `top_k` entries most similar to `query`, best first.
    ///
    /// Equal scores keep insertion order. Fewer than `top_k` results are
    /// returned only when the index holds fewer entries.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::EmbeddingDimensionMismatch`] if `query` does not
    /// match the index dimension.
    pub fn search(&self, query: &[f32], top_k: usize) -> Result<Vec<SearchResult>> {
        if query.len() != self.header.dimensions {
            return Err(RagError::EmbeddingDimensionMismatch {
                expected: self.header.dimensions,
                actual: query.len(),
            });
        }

        let metric = self.header.metric;
        let mut scored: Vec<(usize, f32)> = self
            .entries
            .iter()
            .enumerate()
            .map(|(position, entry)| (position, metric.score(&entry.embedding, query)))
            .collect();

        // `sort_by` is stable, so ties stay in insertion order.
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(top_k);

        Ok(scored
            .into_iter()
            .map(|(position, score)| SearchResult {
                chunk: self.entries[position].chunk.clone(),
                score,
            })
            .collect())
    }

    /// Check internal consistency of a deserialized index.
    fn validate(&self) -> std::result::Result<(), String> {
        if self.header.format_version != FORMAT_VERSION {
            return Err(format!(
                "unsupported format_version {} (expected {FORMAT_VERSION})",
                self.header.format_version
            ));
        }
        if self.header.entry_count != self.entries.len() {
            return Err(format!(
                "header declares {} entries but {} are present",
                self.header.entry_count,
                self.entries.len()
            ));
        }
        if self.entries.is_empty() {
            return Err("index holds no entries".to_string());
        }
        if let Some((position, entry)) = self
            .entries
            .iter()
            .enumerate()
            .find(|(_, e)| e.embedding.len() != self.header.dimensions)
        {
            return Err(format!(
                "entry {position} ({}) has {} dimensions, header declares {}",
                entry.chunk.id,
                entry.embedding.len(),
                self.header.dimensions
            ));
        }
        Ok(())
    }
}

/// Whether every component is a finite number.
pub(crate) fn is_finite(embedding: &[f32]) -> bool {
    embedding.iter().all(|v| v.is_finite())
}
