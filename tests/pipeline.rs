//! End-to-end pipeline tests over the library: ingest → chunk → index →
//! answer, with a deterministic toy embedding and scripted chat models so
//! no network provider is involved.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;

use docchat::answer::generate_answer;
use docchat::chunk::chunk_documents;
use docchat::index::{fingerprint_documents, VectorIndex};
use docchat::ingest::ingest_files;
use docchat::llm::{ChatMessage, ChatModel, ChatOptions};
use docchat::models::{Chunk, EmbeddedChunk, UploadedFile};
use docchat::session::{NotReady, Session};

/// Deterministic toy embedding: character histogram over a fixed alphabet.
/// Same text, same vector; similar texts get similar vectors.
fn toy_embed(text: &str) -> Vec<f32> {
    let alphabet = "abcdefghijklmnopqrstuvwxyz ";
    let mut v = vec![0.0f32; alphabet.len()];
    for ch in text.to_lowercase().chars() {
        if let Some(i) = alphabet.find(ch) {
            v[i] += 1.0;
        }
    }
    v
}

fn embed_chunks(chunks: Vec<Chunk>) -> Vec<EmbeddedChunk> {
    chunks
        .into_iter()
        .map(|chunk| EmbeddedChunk {
            vector: toy_embed(&chunk.text),
            chunk,
        })
        .collect()
}

fn upload(name: &str, bytes: &[u8]) -> UploadedFile {
    UploadedFile {
        name: name.to_string(),
        bytes: bytes.to_vec(),
    }
}

fn opts() -> ChatOptions {
    ChatOptions {
        temperature: 0.3,
        max_output_tokens: 250,
        timeout_secs: 5,
        max_retries: 0,
    }
}

/// Chat model that echoes the prompt it was given.
struct EchoModel {
    calls: AtomicUsize,
}

#[async_trait]
impl ChatModel for EchoModel {
    fn model_name(&self) -> &str {
        "echo"
    }
    async fn complete(&self, messages: &[ChatMessage], _opts: &ChatOptions) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(messages
            .last()
            .map(|m| m.content.clone())
            .unwrap_or_default())
    }
}

/// Chat model that always fails, like an unreachable endpoint.
struct FailingModel;

#[async_trait]
impl ChatModel for FailingModel {
    fn model_name(&self) -> &str {
        "failing"
    }
    async fn complete(&self, _messages: &[ChatMessage], _opts: &ChatOptions) -> Result<String> {
        anyhow::bail!("model unavailable")
    }
}

fn build_index_from_texts(files: &[UploadedFile]) -> Arc<VectorIndex> {
    let report = ingest_files(files);
    assert!(report.failures.is_empty());
    let fingerprint = fingerprint_documents(&report.documents);
    let chunks = chunk_documents(&report.documents, 500, 50).unwrap();
    Arc::new(VectorIndex::build(embed_chunks(chunks), fingerprint).unwrap())
}

#[test]
fn unreadable_file_excluded_index_covers_the_rest() {
    // One broken PDF and one valid TXT: one failure, one document, and the
    // index is built over the TXT content only.
    let report = ingest_files(&[
        upload("broken.pdf", b"%PDF- nope, not really"),
        upload("guide.txt", "the cluster runs on four nodes".as_bytes()),
    ]);

    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].name, "broken.pdf");
    assert_eq!(report.documents.len(), 1);

    let fingerprint = fingerprint_documents(&report.documents);
    let chunks = chunk_documents(&report.documents, 500, 50).unwrap();
    let index = VectorIndex::build(embed_chunks(chunks), fingerprint).unwrap();

    assert_eq!(index.len(), 1);
    let hits = index.top_k(&toy_embed("how many nodes"), 4);
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].chunk.source_name, "guide.txt");
}

#[test]
fn empty_batch_builds_nothing() {
    let report = ingest_files(&[upload("image.png", b"\x89PNG")]);
    assert!(report.documents.is_empty());
    assert_eq!(report.skipped.len(), 1);
    assert!(VectorIndex::build(Vec::new(), String::new()).is_err());
}

#[test]
fn retrieval_returns_min_k_n_without_duplicates() {
    let files = vec![
        upload("a.txt", "rust ownership and borrowing".as_bytes()),
        upload("b.txt", "python machine learning frameworks".as_bytes()),
        upload("c.txt", "kubernetes deployment and infrastructure".as_bytes()),
    ];
    let index = build_index_from_texts(&files);
    assert_eq!(index.len(), 3);

    let query = toy_embed("rust borrowing rules");
    let hits = index.top_k(&query, 10);
    assert_eq!(hits.len(), 3);
    for pair in hits.windows(2) {
        assert!(pair[0].score >= pair[1].score);
    }

    let two = index.top_k(&query, 2);
    assert_eq!(two.len(), 2);
    assert_ne!(two[0].chunk.source_name, two[1].chunk.source_name);
}

#[tokio::test]
async fn answer_carries_citations_in_retrieval_order() {
    let files = vec![
        upload("alpha.txt", "alpha alpha alpha alpha".as_bytes()),
        upload("beta.txt", "beta beta beta beta".as_bytes()),
    ];
    let index = build_index_from_texts(&files);

    let model = EchoModel {
        calls: AtomicUsize::new(0),
    };
    let query = toy_embed("alpha");
    let ans = generate_answer(&model, &opts(), &index, &query, "what is alpha?", 2)
        .await
        .unwrap();

    assert_eq!(ans.citations.len(), 2);
    // Best match first, scores descending, true cosine values.
    assert_eq!(ans.citations[0].source_name, "alpha.txt");
    assert!(ans.citations[0].score >= ans.citations[1].score);

    // The prompt contains context then question, with no extra history.
    assert!(ans.text.contains("alpha alpha"));
    assert!(ans.text.contains("Question: what is alpha?"));
    assert_eq!(model.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn generation_failure_leaves_conversation_untouched() {
    let files = vec![upload("a.txt", "some indexed content".as_bytes())];
    let index = build_index_from_texts(&files);

    let mut session = Session::new();
    session.begin_upload();
    session.attach_index(index.clone());

    let turns_before = session.turns().len();
    let active_index = session.begin_answer().unwrap();

    let result = generate_answer(
        &FailingModel,
        &opts(),
        &active_index,
        &toy_embed("anything"),
        "anything",
        2,
    )
    .await;
    assert!(result.is_err());
    session.fail_answer();

    assert_eq!(session.turns().len(), turns_before);
    // The session stays usable for a retry.
    assert!(session.begin_answer().is_ok());
}

#[tokio::test]
async fn clear_then_question_is_rejected_before_any_call() {
    let files = vec![upload("a.txt", "indexed content".as_bytes())];
    let index = build_index_from_texts(&files);

    let mut session = Session::new();
    session.begin_upload();
    session.attach_index(index);
    session.complete_answer("q".to_string(), "a".to_string(), None);
    assert_eq!(session.turns().len(), 2);

    session.clear();
    assert!(session.turns().is_empty());
    assert!(session.index().is_none());
    assert_eq!(session.begin_answer().unwrap_err(), NotReady::NoIndex);
}

#[test]
fn new_upload_replaces_index_wholesale() {
    let first = build_index_from_texts(&[upload("a.txt", "old corpus text".as_bytes())]);
    let second = build_index_from_texts(&[
        upload("b.txt", "new corpus text".as_bytes()),
        upload("c.txt", "more new text".as_bytes()),
    ]);
    assert_ne!(first.fingerprint(), second.fingerprint());

    let mut session = Session::new();
    session.begin_upload();
    session.attach_index(first);
    session.begin_upload();
    session.attach_index(second.clone());

    let index = session.begin_answer().unwrap();
    assert_eq!(index.len(), second.len());
    assert_eq!(index.fingerprint(), second.fingerprint());
}
