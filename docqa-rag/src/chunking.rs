//! Document chunking strategies.
//!
//! This module provides the [`Chunker`] trait and two implementations:
//!
//! - [`RecursiveChunker`]: splits hierarchically by paragraphs, lines,
//!   sentences, words, then characters, carrying an overlap between chunks
//! - [`FixedSizeChunker`]: splits by character count with exact overlap
//!
//! Sizes are measured in characters, not bytes. Every chunk produced here is
//! an exact substring of its document, and [`Chunk::start`] is its character
//! offset.

use std::collections::VecDeque;

use crate::config::RagConfig;
use crate::document::{Chunk, Document};
use crate::error::{RagError, Result};

/// Boundaries tried in order, largest first.
const SEPARATORS: [&str; 6] = ["\n\n", "\n", ". ", "! ", "? ", " "];

/// A strategy for splitting documents into chunks.
pub trait Chunker: Send + Sync {
    /// Split a document into chunks.
    ///
    /// Returns an empty `Vec` if the document has no non-whitespace text.
    fn chunk(&self, document: &Document) -> Vec<Chunk>;

    /// Split every document, preserving document order.
    fn chunk_all(&self, documents: &[Document]) -> Vec<Chunk> {
        documents.iter().flat_map(|document| self.chunk(document)).collect()
    }
}

fn check_sizes(chunk_size: usize, chunk_overlap: usize) -> Result<()> {
    if chunk_size == 0 {
        return Err(RagError::ConfigurationError(
            "chunk_size must be greater than zero".to_string(),
        ));
    }
    if chunk_overlap >= chunk_size {
        return Err(RagError::ConfigurationError(format!(
            "chunk_overlap ({chunk_overlap}) must be less than chunk_size ({chunk_size})"
        )));
    }
    Ok(())
}

/// A byte range of the document text together with its character count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Span {
    start: usize,
    end: usize,
    chars: usize,
}

impl Span {
    fn of(text: &str, start: usize, end: usize) -> Self {
        Self { start, end, chars: text[start..end].chars().count() }
    }
}

/// Splits text hierarchically: paragraphs → lines → sentences → words → characters.
///
/// The text is cut at the largest separator present in it. Pieces small
/// enough are merged greedily up to `chunk_size`; when a chunk is emitted the
/// next one starts with the trailing pieces of the previous chunk, up to
/// `chunk_overlap` characters. Pieces that are still too large are split
/// again with the next separator, ending with a plain character window whose
/// overlap is exactly `chunk_overlap`. Merged pieces that precede an oversize
/// piece are emitted first, and the oversize piece's chunks start where they
/// end, without overlap.
///
/// # Example
///
/// ```rust,ignore
/// use docqa_rag::RecursiveChunker;
///
/// let chunker = RecursiveChunker::new(1000, 200)?;
/// let chunks = chunker.chunk(&document);
/// ```
#[derive(Debug, Clone)]
pub struct RecursiveChunker {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl RecursiveChunker {
    /// Create a new `RecursiveChunker`.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigurationError`] if `chunk_size` is zero or
    /// `chunk_overlap >= chunk_size`.
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Result<Self> {
        check_sizes(chunk_size, chunk_overlap)?;
        Ok(Self { chunk_size, chunk_overlap })
    }

    /// Create a chunker from the sizes in a [`RagConfig`].
    pub fn from_config(config: &RagConfig) -> Result<Self> {
        Self::new(config.chunk_size, config.chunk_overlap)
    }

    fn split(&self, text: &str, span: Span, separators: &[&str]) -> Vec<Span> {
        if span.chars <= self.chunk_size {
            return vec![span];
        }

        let slice = &text[span.start..span.end];
        let Some(level) = separators.iter().position(|sep| slice.contains(sep)) else {
            return split_by_chars(text, span, self.chunk_size, self.chunk_overlap);
        };
        let remaining = &separators[level + 1..];

        let mut chunks = Vec::new();
        let mut pending = Vec::new();
        for (start, end) in split_keeping_separator(slice, separators[level]) {
            let piece = Span::of(text, span.start + start, span.start + end);
            if piece.chars <= self.chunk_size {
                pending.push(piece);
                continue;
            }
            if !pending.is_empty() {
                chunks.extend(merge_with_overlap(&pending, self.chunk_size, self.chunk_overlap));
                pending.clear();
            }
            chunks.extend(self.split(text, piece, remaining));
        }
        if !pending.is_empty() {
            chunks.extend(merge_with_overlap(&pending, self.chunk_size, self.chunk_overlap));
        }
        chunks
    }
}

impl Chunker for RecursiveChunker {
    fn chunk(&self, document: &Document) -> Vec<Chunk> {
        let text = &document.text;
        if text.trim().is_empty() {
            return Vec::new();
        }
        let spans = self.split(text, Span::of(text, 0, text.len()), &SEPARATORS);
        spans_to_chunks(document, spans)
    }
}

/// Greedily merge consecutive pieces into chunks of at most `chunk_size`
/// characters, seeding each new chunk with the tail of the previous one.
fn merge_with_overlap(pieces: &[Span], chunk_size: usize, chunk_overlap: usize) -> Vec<Span> {
    let mut merged = Vec::new();
    let mut window: VecDeque<Span> = VecDeque::new();
    let mut total = 0;

    for &piece in pieces {
        if total + piece.chars > chunk_size && !window.is_empty() {
            merged.push(join(&window, total));
            while total > chunk_overlap || (total > 0 && total + piece.chars > chunk_size) {
                let Some(front) = window.pop_front() else { break };
                total -= front.chars;
            }
        }
        window.push_back(piece);
        total += piece.chars;
    }
    if !window.is_empty() {
        merged.push(join(&window, total));
    }
    merged
}

fn join(window: &VecDeque<Span>, chars: usize) -> Span {
    match (window.front(), window.back()) {
        (Some(first), Some(last)) => Span { start: first.start, end: last.end, chars },
        _ => Span { start: 0, end: 0, chars: 0 },
    }
}

/// Split text at a separator while keeping the separator attached to the
/// preceding segment. Returns byte ranges relative to `text`.
fn split_keeping_separator(text: &str, separator: &str) -> Vec<(usize, usize)> {
    let mut result = Vec::new();
    let mut start = 0;

    while let Some(pos) = text[start..].find(separator) {
        let end = start + pos + separator.len();
        result.push((start, end));
        start = end;
    }

    if start < text.len() {
        result.push((start, text.len()));
    }

    result
}

/// Character windows of `chunk_size` advancing by `chunk_size - chunk_overlap`.
fn split_by_chars(text: &str, span: Span, chunk_size: usize, chunk_overlap: usize) -> Vec<Span> {
    let boundaries: Vec<usize> = text[span.start..span.end]
        .char_indices()
        .map(|(offset, _)| span.start + offset)
        .chain(std::iter::once(span.end))
        .collect();
    let char_count = boundaries.len() - 1;
    let step = chunk_size - chunk_overlap;

    let mut windows = Vec::new();
    let mut first = 0;
    loop {
        let last = (first + chunk_size).min(char_count);
        windows.push(Span { start: boundaries[first], end: boundaries[last], chars: last - first });
        if last == char_count {
            break;
        }
        first += step;
    }
    windows
}

fn spans_to_chunks(document: &Document, spans: Vec<Span>) -> Vec<Chunk> {
    let text = &document.text;
    spans
        .into_iter()
        .filter(|span| !text[span.start..span.end].trim().is_empty())
        .enumerate()
        .map(|(sequence, span)| Chunk {
            id: format!("{}_{sequence}", document.id),
            text: text[span.start..span.end].to_string(),
            document_id: document.id.clone(),
            source: document.source.clone(),
            page: document.page,
            sequence,
            start: text[..span.start].chars().count(),
            metadata: document.metadata.clone(),
        })
        .collect()
}

/// Splits text into fixed-size chunks by character count with exact overlap.
///
/// Chunk IDs are generated as `{document_id}_{sequence}`. Each chunk inherits
/// the parent document's source, page, and metadata.
///
/// # Example
///
/// ```rust,ignore
/// use docqa_rag::FixedSizeChunker;
///
/// let chunker = FixedSizeChunker::new(256, 50)?;
/// let chunks = chunker.chunk(&document);
/// ```
#[derive(Debug, Clone)]
pub struct FixedSizeChunker {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl FixedSizeChunker {
    /// Create a new `FixedSizeChunker`.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigurationError`] if `chunk_size` is zero or
    /// `chunk_overlap >= chunk_size`.
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Result<Self> {
        check_sizes(chunk_size, chunk_overlap)?;
        Ok(Self { chunk_size, chunk_overlap })
    }
}

impl Chunker for FixedSizeChunker {
    fn chunk(&self, document: &Document) -> Vec<Chunk> {
        let text = &document.text;
        if text.trim().is_empty() {
            return Vec::new();
        }
        let spans =
            split_by_chars(text, Span::of(text, 0, text.len()), self.chunk_size, self.chunk_overlap);
        spans_to_chunks(document, spans)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(text: &str) -> Document {
        Document::new("doc", "data/doc.txt", text)
    }

    fn overlap(prev: &Chunk, next: &Chunk) -> usize {
        (prev.start + prev.char_len()).saturating_sub(next.start)
    }

    #[test]
    fn short_document_is_a_single_identical_chunk() {
        let chunker = RecursiveChunker::new(1000, 200).unwrap();
        let chunks = chunker.chunk(&doc("Paris is the capital of France."));
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, "Paris is the capital of France.");
        assert_eq!(chunks[0].start, 0);
        assert_eq!(chunks[0].id, "doc_0");
    }

    #[test]
    fn document_of_exactly_chunk_size_is_not_split() {
        let chunker = RecursiveChunker::new(10, 2).unwrap();
        assert_eq!(chunker.chunk(&doc("abcde fghi")).len(), 1);
    }

    #[test]
    fn empty_and_blank_documents_yield_nothing() {
        let chunker = RecursiveChunker::new(100, 10).unwrap();
        assert!(chunker.chunk(&doc("")).is_empty());
        assert!(chunker.chunk(&doc(" \n\n \t")).is_empty());
    }

    #[test]
    fn rejects_overlap_not_below_size() {
        assert!(matches!(RecursiveChunker::new(100, 100), Err(RagError::ConfigurationError(_))));
        assert!(RecursiveChunker::new(0, 0).is_err());
        assert!(FixedSizeChunker::new(10, 20).is_err());
    }

    #[test]
    fn word_level_overlap_matches_configuration() {
        // Every piece is "word " (5 chars), so 20 chars of overlap is four whole pieces.
        let text = "word ".repeat(100);
        let chunker = RecursiveChunker::new(100, 20).unwrap();
        let chunks = chunker.chunk(&doc(&text));
        assert!(chunks.len() > 1);
        for pair in chunks.windows(2) {
            assert_eq!(overlap(&pair[0], &pair[1]), 20);
        }
        assert!(chunks.iter().all(|c| c.char_len() <= 100));
    }

    #[test]
    fn character_level_overlap_is_exact() {
        let text: String = ('a'..='z').cycle().take(2500).collect();
        let chunker = RecursiveChunker::new(1000, 200).unwrap();
        let chunks = chunker.chunk(&doc(&text));
        let starts: Vec<usize> = chunks.iter().map(|c| c.start).collect();
        assert_eq!(starts, vec![0, 800, 1600]);
        assert_eq!(chunks[2].char_len(), 900);
        for pair in chunks.windows(2) {
            assert_eq!(overlap(&pair[0], &pair[1]), 200);
        }
    }

    #[test]
    fn prefers_paragraph_boundaries() {
        let first = "First paragraph about rivers.";
        let second = "Second paragraph about mountains.";
        let text = format!("{first}\n\n{second}");
        let chunker = RecursiveChunker::new(40, 5).unwrap();
        let chunks = chunker.chunk(&doc(&text));
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].text, format!("{first}\n\n"));
        assert_eq!(chunks[1].text, second);
    }

    #[test]
    fn oversize_paragraph_starts_without_overlap() {
        // Pieces merged before an oversize paragraph are flushed on their own;
        // overlap only applies inside the paragraph's character windows.
        let intro = "Short intro.\n\n";
        let long: String = ('a'..='z').cycle().take(50).collect();
        let text = format!("{intro}{long}");
        let chunker = RecursiveChunker::new(20, 5).unwrap();
        let chunks = chunker.chunk(&doc(&text));

        let starts: Vec<usize> = chunks.iter().map(|c| c.start).collect();
        assert_eq!(starts, vec![0, 14, 29, 44]);
        assert_eq!(chunks[0].text, intro);
        assert_eq!(overlap(&chunks[0], &chunks[1]), 0);
        for pair in chunks[1..].windows(2) {
            assert_eq!(overlap(&pair[0], &pair[1]), 5);
        }
        assert_eq!(chunks[3].text, long[30..]);
    }

    #[test]
    fn counts_characters_not_bytes() {
        let text = "é".repeat(30);
        let chunker = RecursiveChunker::new(10, 2).unwrap();
        let chunks = chunker.chunk(&doc(&text));
        assert!(chunks.iter().all(|c| c.char_len() <= 10));
        assert_eq!(chunks[1].start, 8);
    }

    #[test]
    fn chunks_inherit_document_fields() {
        let document = doc("alpha beta gamma delta epsilon")
            .with_page(3)
            .with_metadata("lang", "en");
        let chunker = RecursiveChunker::new(12, 4).unwrap();
        let chunks = chunker.chunk(&document);
        assert!(chunks.len() > 1);
        for (i, chunk) in chunks.iter().enumerate() {
            assert_eq!(chunk.sequence, i);
            assert_eq!(chunk.page, Some(3));
            assert_eq!(chunk.source, "data/doc.txt");
            assert_eq!(chunk.metadata.get("lang").map(String::as_str), Some("en"));
        }
    }

    #[test]
    fn fixed_size_windows_stop_at_end() {
        let chunker = FixedSizeChunker::new(6, 2).unwrap();
        let chunks = chunker.chunk(&doc("abcdefghij"));
        let texts: Vec<&str> = chunks.iter().map(|c| c.text.as_str()).collect();
        assert_eq!(texts, vec!["abcdef", "efghij"]);
    }

    #[test]
    fn chunk_all_keeps_document_order() {
        let chunker = RecursiveChunker::new(100, 10).unwrap();
        let docs = vec![Document::new("a", "a.txt", "one"), Document::new("b", "b.txt", "two")];
        let ids: Vec<String> = chunker.chunk_all(&docs).into_iter().map(|c| c.id).collect();
        assert_eq!(ids, vec!["a_0", "b_0"]);
    }
}
