//! Property tests for chunk boundaries.

use docqa_rag::{Chunk, Chunker, Document, FixedSizeChunker, RecursiveChunker};
use proptest::prelude::*;

/// Text mixing paragraphs, lines, sentences, words and multibyte characters.
fn arb_text() -> impl Strategy<Value = String> {
    proptest::collection::vec(
        prop_oneof![
            6 => "[a-zé]{1,12}",
            3 => Just(" ".to_string()),
            1 => Just(". ".to_string()),
            1 => Just("\n".to_string()),
            1 => Just("\n\n".to_string()),
        ],
        0..200,
    )
    .prop_map(|parts| parts.concat())
}

/// A `(chunk_size, chunk_overlap)` pair with `overlap < size`.
fn arb_sizes() -> impl Strategy<Value = (usize, usize)> {
    (1usize..120).prop_flat_map(|size| (Just(size), 0..size))
}

fn char_slice(text: &str, start: usize, len: usize) -> String {
    text.chars().skip(start).take(len).collect()
}

fn check_chunks(text: &str, chunks: &[Chunk], size: usize, overlap: usize) {
    for chunk in chunks {
        assert!(chunk.char_len() <= size, "chunk longer than {size}: {:?}", chunk.text);
        assert!(!chunk.text.trim().is_empty());
        assert_eq!(char_slice(text, chunk.start, chunk.char_len()), chunk.text);
    }

    for pair in chunks.windows(2) {
        let prev_end = pair[0].start + pair[0].char_len();
        assert!(pair[1].start >= pair[0].start, "chunks out of order");
        assert!(prev_end.saturating_sub(pair[1].start) <= overlap, "overlap above {overlap}");
    }

    // Every non-whitespace character lands in at least one chunk.
    for (offset, c) in text.chars().enumerate() {
        if c.is_whitespace() {
            continue;
        }
        assert!(
            chunks.iter().any(|ch| ch.start <= offset && offset < ch.start + ch.char_len()),
            "character {offset} ({c:?}) not covered"
        );
    }
}

mod prop_recursive_chunker {
    use super::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(200))]

        #[test]
        fn chunks_are_bounded_exact_and_covering(
            text in arb_text(),
            (size, overlap) in arb_sizes(),
        ) {
            let chunker = RecursiveChunker::new(size, overlap).unwrap();
            let chunks = chunker.chunk(&Document::new("doc", "doc.txt", text.clone()));
            check_chunks(&text, &chunks, size, overlap);

            for (i, chunk) in chunks.iter().enumerate() {
                prop_assert_eq!(chunk.sequence, i);
                prop_assert_eq!(&chunk.id, &format!("doc_{i}"));
            }
        }

        #[test]
        fn chunking_is_deterministic(text in arb_text(), (size, overlap) in arb_sizes()) {
            let chunker = RecursiveChunker::new(size, overlap).unwrap();
            let document = Document::new("doc", "doc.txt", text);
            prop_assert_eq!(chunker.chunk(&document), chunker.chunk(&document));
        }
    }
}

mod prop_fixed_size_chunker {
    use super::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(200))]

        #[test]
        fn chunks_are_bounded_exact_and_covering(
            text in arb_text(),
            (size, overlap) in arb_sizes(),
        ) {
            let chunker = FixedSizeChunker::new(size, overlap).unwrap();
            let chunks = chunker.chunk(&Document::new("doc", "doc.txt", text.clone()));
            check_chunks(&text, &chunks, size, overlap);
        }
    }
}
