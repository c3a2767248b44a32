//! Data types for documents, chunks, and search results.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// A source document containing text content and metadata.
///
/// One loaded file (or one page of a paged file) becomes one `Document`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Document {
    /// Unique identifier for the document.
    pub id: String,
    /// The text content of the document.
    pub text: String,
    /// Path of the file the text was read from.
    pub source: String,
    /// Page number within the source, when the source is paged.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,
    /// Additional key-value metadata.
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl Document {
    /// Create a document with no page and empty metadata.
    pub fn new(id: impl Into<String>, source: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            source: source.into(),
            page: None,
            metadata: HashMap::new(),
        }
    }

    /// Set the page number.
    pub fn with_page(mut self, page: u32) -> Self {
        self.page = Some(page);
        self
    }

    /// Add a metadata entry.
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// A contiguous segment of a [`Document`]'s text.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Chunk {
    /// Unique identifier for the chunk, `{document_id}_{sequence}`.
    pub id: String,
    /// The text content of the chunk.
    pub text: String,
    /// The ID of the parent [`Document`].
    pub document_id: String,
    /// Source path inherited from the parent document.
    pub source: String,
    /// Page inherited from the parent document.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,
    /// Position of this chunk within its document.
    pub sequence: usize,
    /// Character offset of the chunk within the document text.
    pub start: usize,
    /// Metadata inherited from the parent document.
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl Chunk {
    /// Length of the chunk in characters.
    pub fn char_len(&self) -> usize {
        self.text.chars().count()
    }
}

/// A retrieved [`Chunk`] paired with a relevance score.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SearchResult {
    /// The retrieved chunk.
    pub chunk: Chunk,
    /// The similarity score (higher is more relevant).
    pub score: f32,
}
