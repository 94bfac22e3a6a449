//! Fixed-size overlapping text chunker.
//!
//! Splits each document into consecutive windows of `chunk_size` characters,
//! advancing by `chunk_size - chunk_overlap` per step so neighboring windows
//! share context. Source metadata is carried onto every chunk. Sizes are
//! measured in Unicode scalar values, never bytes, so windows always land on
//! character boundaries.

use anyhow::{bail, Result};

use crate::models::{Chunk, Document};

/// Split one document into overlapping windows.
///
/// Text no longer than `chunk_size` produces exactly one chunk equal to the
/// full text. Trailing content shorter than a full window is never dropped:
/// the final window always reaches the end of the document.
pub fn chunk_text(doc: &Document, chunk_size: usize, chunk_overlap: usize) -> Result<Vec<Chunk>> {
    if chunk_size == 0 {
        bail!("chunk_size must be > 0");
    }
    if chunk_overlap >= chunk_size {
        bail!(
            "chunk_overlap ({}) must be smaller than chunk_size ({})",
            chunk_overlap,
            chunk_size
        );
    }

    // Byte position of every character boundary, plus the end of the text,
    // so windows can be sliced without re-scanning.
    let mut bounds: Vec<usize> = doc.text.char_indices().map(|(i, _)| i).collect();
    bounds.push(doc.text.len());
    let n_chars = bounds.len() - 1;

    let step = chunk_size - chunk_overlap;
    let mut chunks = Vec::new();
    let mut start = 0usize;

    loop {
        let end = (start + chunk_size).min(n_chars);
        chunks.push(Chunk {
            text: doc.text[bounds[start]..bounds[end]].to_string(),
            source_name: doc.source_name.clone(),
            kind: doc.kind,
            offset: start,
        });
        if end == n_chars {
            break;
        }
        start += step;
    }

    Ok(chunks)
}

/// Chunk a whole batch, preserving document order and per-document chunk order.
pub fn chunk_documents(
    docs: &[Document],
    chunk_size: usize,
    chunk_overlap: usize,
) -> Result<Vec<Chunk>> {
    let mut all = Vec::new();
    for doc in docs {
        all.extend(chunk_text(doc, chunk_size, chunk_overlap)?);
    }
    Ok(all)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::FileKind;

    fn doc(text: &str) -> Document {
        Document {
            source_name: "test.txt".to_string(),
            kind: FileKind::Txt,
            text: text.to_string(),
        }
    }

    #[test]
    fn short_text_single_chunk() {
        let d = doc("Hello, world!");
        let chunks = chunk_text(&d, 1000, 100).unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, "Hello, world!");
        assert_eq!(chunks[0].offset, 0);
    }

    #[test]
    fn text_exactly_chunk_size_single_chunk() {
        let d = doc(&"x".repeat(1000));
        let chunks = chunk_text(&d, 1000, 100).unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text.chars().count(), 1000);
    }

    #[test]
    fn window_offsets_and_tail_coverage() {
        // size 1000, overlap 100, length 2500 => windows at 0, 900, 1800.
        let d = doc(&"a".repeat(2500));
        let chunks = chunk_text(&d, 1000, 100).unwrap();
        let offsets: Vec<usize> = chunks.iter().map(|c| c.offset).collect();
        assert_eq!(offsets, vec![0, 900, 1800]);
        assert!(chunks.iter().all(|c| c.text.chars().count() <= 1000));
        // The last window covers the tail.
        assert_eq!(chunks.last().unwrap().text.chars().count(), 700);
        let covered: usize = chunks.last().unwrap().offset
            + chunks.last().unwrap().text.chars().count();
        assert_eq!(covered, 2500);
    }

    #[test]
    fn overlap_repeats_window_boundary_text() {
        let text: String = (0..30).map(|i| (b'a' + (i % 26) as u8) as char).collect();
        let d = doc(&text);
        let chunks = chunk_text(&d, 10, 4).unwrap();
        for pair in chunks.windows(2) {
            let prev_tail: String = pair[0].text.chars().rev().take(4).collect::<Vec<_>>()
                .into_iter().rev().collect();
            let next_head: String = pair[1].text.chars().take(4).collect();
            assert_eq!(prev_tail, next_head);
        }
    }

    #[test]
    fn multibyte_text_splits_on_char_boundaries() {
        let d = doc(&"é".repeat(25));
        let chunks = chunk_text(&d, 10, 2).unwrap();
        assert!(chunks.len() > 1);
        for c in &chunks {
            assert!(c.text.chars().all(|ch| ch == 'é'));
        }
        // Tail still covered.
        let last = chunks.last().unwrap();
        assert_eq!(last.offset + last.text.chars().count(), 25);
    }

    #[test]
    fn overlap_not_smaller_than_size_rejected() {
        let d = doc("anything");
        assert!(chunk_text(&d, 100, 100).is_err());
        assert!(chunk_text(&d, 100, 150).is_err());
    }

    #[test]
    fn batch_preserves_source_metadata() {
        let docs = vec![
            Document {
                source_name: "a.pdf".to_string(),
                kind: FileKind::Pdf,
                text: "alpha ".repeat(50),
            },
            Document {
                source_name: "b.txt".to_string(),
                kind: FileKind::Txt,
                text: "beta".to_string(),
            },
        ];
        let chunks = chunk_documents(&docs, 100, 10).unwrap();
        assert!(chunks.iter().any(|c| c.source_name == "a.pdf"));
        assert_eq!(chunks.last().unwrap().source_name, "b.txt");
        assert_eq!(chunks.last().unwrap().kind, FileKind::Txt);
    }
}
