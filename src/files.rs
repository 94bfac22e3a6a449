use anyhow::Result;
use globset::{Glob, GlobSet, GlobSetBuilder};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::ingest::IngestFailure;
use crate::models::UploadedFile;

/// Include patterns used when a directory is given instead of a file.
const SUPPORTED_GLOBS: &[&str] = &["**/*.pdf", "**/*.docx", "**/*.txt"];

/// Expand user-supplied paths into uploadable files.
///
/// A path may name a file (accepted as-is; the ingestor decides whether the
/// extension is supported) or a directory, which is walked and filtered to
/// supported extensions. Unreadable or missing paths become per-file
/// failures, never a batch abort. Results are sorted by name for
/// deterministic processing order.
pub fn gather_files(paths: &[PathBuf]) -> Result<(Vec<UploadedFile>, Vec<IngestFailure>)> {
    let include_set = build_globset(SUPPORTED_GLOBS)?;

    let mut files = Vec::new();
    let mut failures = Vec::new();

    for path in paths {
        if path.is_dir() {
            collect_dir(path, &include_set, &mut files, &mut failures);
        } else {
            read_file(path, &mut files, &mut failures);
        }
    }

    files.sort_by(|a, b| a.name.cmp(&b.name));
    Ok((files, failures))
}

fn collect_dir(
    root: &Path,
    include_set: &GlobSet,
    files: &mut Vec<UploadedFile>,
    failures: &mut Vec<IngestFailure>,
) {
    for entry in WalkDir::new(root) {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                failures.push(IngestFailure {
                    name: root.display().to_string(),
                    error: e.to_string(),
                });
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        let rel = entry.path().strip_prefix(root).unwrap_or(entry.path());
        if !include_set.is_match(rel.to_string_lossy().as_ref()) {
            continue;
        }
        read_file(entry.path(), files, failures);
    }
}

fn read_file(path: &Path, files: &mut Vec<UploadedFile>, failures: &mut Vec<IngestFailure>) {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string());

    match std::fs::read(path) {
        Ok(bytes) => files.push(UploadedFile { name, bytes }),
        Err(e) => failures.push(IngestFailure {
            name: path.display().to_string(),
            error: e.to_string(),
        }),
    }
}

fn build_globset(patterns: &[&str]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern)?);
    }
    Ok(builder.build()?)
}
