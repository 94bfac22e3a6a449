//! Batch ingestion: uploaded files in, a per-file report out.
//!
//! Every file is handled independently: unsupported extensions are skipped,
//! extraction failures are recorded and excluded, and the remaining files
//! become [`Document`]s. A failure in one file never aborts the batch; a
//! batch that yields zero documents is the caller's signal to halt the
//! request without mutating any session state.

use crate::extract;
use crate::models::{Document, FileKind, UploadedFile};

/// One file that could not be turned into a document.
#[derive(Debug, Clone)]
pub struct IngestFailure {
    pub name: String,
    pub error: String,
}

/// Outcome of ingesting one batch of uploads.
#[derive(Debug, Default)]
pub struct IngestReport {
    pub documents: Vec<Document>,
    pub failures: Vec<IngestFailure>,
    /// Files skipped for an unsupported extension.
    pub skipped: Vec<String>,
}

impl IngestReport {
    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}

/// Turn a batch of uploads into documents, collecting per-file outcomes.
pub fn ingest_files(files: &[UploadedFile]) -> IngestReport {
    let mut report = IngestReport::default();

    for file in files {
        let kind = match FileKind::from_name(&file.name) {
            Some(k) => k,
            None => {
                report.skipped.push(file.name.clone());
                continue;
            }
        };

        match extract::extract_text(kind, &file.bytes) {
            Ok(text) if text.trim().is_empty() => {
                report.failures.push(IngestFailure {
                    name: file.name.clone(),
                    error: "no text extracted".to_string(),
                });
            }
            Ok(text) => {
                report.documents.push(Document {
                    source_name: file.name.clone(),
                    kind,
                    text,
                });
            }
            Err(e) => {
                report.failures.push(IngestFailure {
                    name: file.name.clone(),
                    error: e.to_string(),
                });
            }
        }
    }

    report
}
