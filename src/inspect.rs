//! Offline pipeline check: extract and chunk the given files, print the
//! batch report, and touch no network provider.

use std::path::PathBuf;

use anyhow::Result;

use crate::chunk;
use crate::config::Config;
use crate::files;
use crate::ingest;

pub fn run_inspect(config: &Config, paths: &[PathBuf]) -> Result<()> {
    let (uploads, gather_failures) = files::gather_files(paths)?;
    let mut report = ingest::ingest_files(&uploads);
    report.failures.extend(gather_failures);

    println!("inspect");
    println!("  files given: {}", uploads.len());

    let mut total_chunks = 0usize;
    for doc in &report.documents {
        let chunks = chunk::chunk_text(doc, config.rag.chunk_size, config.rag.chunk_overlap)?;
        println!(
            "  {} ({}): {} chars, {} chunks",
            doc.source_name,
            doc.kind,
            doc.text.chars().count(),
            chunks.len()
        );
        total_chunks += chunks.len();
    }

    println!("  documents: {}", report.documents.len());
    println!("  chunks: {}", total_chunks);

    for failure in &report.failures {
        println!("  error: {}: {}", failure.name, failure.error);
    }
    for name in &report.skipped {
        println!("  skipped (unsupported type): {}", name);
    }

    Ok(())
}
