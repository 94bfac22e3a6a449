//! One-shot grounded question: run the whole pipeline once, print the
//! answer with sources, and exit.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Result};

use crate::answer;
use crate::chunk;
use crate::config::Config;
use crate::embedding;
use crate::files;
use crate::index::{fingerprint_documents, VectorIndex};
use crate::ingest;
use crate::llm::{self, ChatOptions};
use crate::models::EmbeddedChunk;

pub async fn run_ask(config: &Config, question: &str, paths: &[PathBuf]) -> Result<()> {
    if question.trim().is_empty() {
        bail!("question must not be empty");
    }

    let (uploads, gather_failures) = files::gather_files(paths)?;
    let mut report = ingest::ingest_files(&uploads);
    report.failures.extend(gather_failures);

    for failure in &report.failures {
        eprintln!("  error: {}: {}", failure.name, failure.error);
    }
    if report.documents.is_empty() {
        bail!("no text could be extracted from the given files");
    }

    let chunks = chunk::chunk_documents(
        &report.documents,
        config.rag.chunk_size,
        config.rag.chunk_overlap,
    )?;
    let fingerprint = fingerprint_documents(&report.documents);

    let provider = embedding::create_provider(&config.embedding)?;
    let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
    let mut vectors: Vec<Vec<f32>> = Vec::with_capacity(texts.len());
    for batch in texts.chunks(config.embedding.batch_size) {
        vectors.extend(embedding::embed_texts(provider.as_ref(), &config.embedding, batch).await?);
    }

    let embedded: Vec<EmbeddedChunk> = chunks
        .into_iter()
        .zip(vectors)
        .map(|(chunk, vector)| EmbeddedChunk { chunk, vector })
        .collect();
    let index = Arc::new(VectorIndex::build(embedded, fingerprint)?);

    let question_vec =
        embedding::embed_query(provider.as_ref(), &config.embedding, question).await?;

    let model = llm::create_model(&config.llm)?;
    let opts = ChatOptions::from(&config.llm);
    let ans = answer::generate_answer(
        model.as_ref(),
        &opts,
        &index,
        &question_vec,
        question,
        config.rag.top_k,
    )
    .await?;

    println!("{}", ans.text);
    if !ans.citations.is_empty() {
        println!();
        println!("Sources:");
        for c in &ans.citations {
            println!("  - {} (relevance: {:.2})", c.source_name, c.score);
        }
    }

    Ok(())
}
