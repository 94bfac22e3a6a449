//! In-memory vector index over one batch of embedded chunks.
//!
//! The index is built wholesale from a successfully embedded document set and
//! is immutable afterwards; a new upload builds a fresh index that replaces
//! the old one entirely (no merge, no incremental update). Retrieval is
//! brute-force cosine similarity over all stored vectors, which is exact and
//! more than fast enough for session-sized document sets.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{bail, Result};
use sha2::{Digest, Sha256};

use crate::embedding::cosine_similarity;
use crate::models::{Chunk, Document, EmbeddedChunk};

/// One retrieval hit: a stored chunk and its similarity to the query.
#[derive(Debug)]
pub struct Scored<'a> {
    pub chunk: &'a Chunk,
    pub score: f32,
}

/// Immutable nearest-neighbor store for the current document batch.
#[derive(Debug)]
pub struct VectorIndex {
    entries: Vec<EmbeddedChunk>,
    dims: usize,
    fingerprint: String,
}

impl VectorIndex {
    /// Build an index from all embedded chunks of a batch.
    ///
    /// Rejects an empty batch (a query must never run against an absent or
    /// empty index) and mixed vector dimensionalities.
    pub fn build(entries: Vec<EmbeddedChunk>, fingerprint: String) -> Result<VectorIndex> {
        let dims = match entries.first() {
            Some(e) => e.vector.len(),
            None => bail!("cannot build an index from zero embedded chunks"),
        };
        if dims == 0 {
            bail!("cannot build an index from zero-dimensional vectors");
        }
        if let Some(bad) = entries.iter().find(|e| e.vector.len() != dims) {
            bail!(
                "inconsistent embedding dimensionality: expected {}, got {} for chunk of {}",
                dims,
                bad.vector.len(),
                bad.chunk.source_name
            );
        }
        Ok(VectorIndex {
            entries,
            dims,
            fingerprint,
        })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn dims(&self) -> usize {
        self.dims
    }

    /// Identity of the document set this index was built from.
    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    /// Return the `min(k, len)` most similar chunks, best first.
    ///
    /// `k` is clamped to `[1, len]`. The sort is stable, so equal scores keep
    /// their insertion order.
    pub fn top_k(&self, query_vec: &[f32], k: usize) -> Vec<Scored<'_>> {
        let k = k.clamp(1, self.entries.len());

        let mut scored: Vec<Scored<'_>> = self
            .entries
            .iter()
            .map(|e| Scored {
                chunk: &e.chunk,
                score: cosine_similarity(query_vec, &e.vector),
            })
            .collect();

        scored.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        scored.truncate(k);
        scored
    }
}

/// Content identity of a document set: SHA-256 over sorted source names and
/// per-document text hashes. Two uploads of the same files produce the same
/// fingerprint regardless of upload order.
pub fn fingerprint_documents(docs: &[Document]) -> String {
    let mut lines: Vec<String> = docs
        .iter()
        .map(|d| {
            let mut hasher = Sha256::new();
            hasher.update(d.text.as_bytes());
            format!("{}\u{0}{:x}", d.source_name, hasher.finalize())
        })
        .collect();
    lines.sort();

    let mut hasher = Sha256::new();
    for line in &lines {
        hasher.update(line.as_bytes());
        hasher.update(b"\n");
    }
    format!("{:x}", hasher.finalize())
}

/// Opaque identity for a credential/provider pairing, safe to use as a cache
/// key without holding the secret itself.
pub fn credential_fingerprint(parts: &[&str]) -> String {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update(part.as_bytes());
        hasher.update(b"\x00");
    }
    format!("{:x}", hasher.finalize())
}

/// Process-lifetime cache of built indexes, keyed by credential identity
/// *and* document-set fingerprint so two sessions with the same credential
/// but different documents can never observe each other's index.
#[derive(Default)]
pub struct IndexCache {
    entries: HashMap<(String, String), Arc<VectorIndex>>,
}

impl IndexCache {
    pub fn new() -> IndexCache {
        IndexCache::default()
    }

    pub fn get(&self, credential_fp: &str, doc_fp: &str) -> Option<Arc<VectorIndex>> {
        self.entries
            .get(&(credential_fp.to_string(), doc_fp.to_string()))
            .cloned()
    }

    pub fn insert(&mut self, credential_fp: String, doc_fp: String, index: Arc<VectorIndex>) {
        self.entries.insert((credential_fp, doc_fp), index);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
