//! Core data types flowing through the document-chat pipeline.
//!
//! A session turns uploaded files into [`Document`]s, documents into
//! [`Chunk`]s, chunks into [`EmbeddedChunk`]s, and answers into [`Turn`]s
//! on the conversation log.

use chrono::{DateTime, Utc};

/// Supported upload formats, decided by file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Pdf,
    Docx,
    Txt,
}

impl FileKind {
    /// Classify a file by its extension. Returns `None` for anything
    /// outside the supported set; callers skip those files.
    pub fn from_name(name: &str) -> Option<FileKind> {
        let ext = name.rsplit_once('.').map(|(_, e)| e)?;
        match ext.to_ascii_lowercase().as_str() {
            "pdf" => Some(FileKind::Pdf),
            "docx" => Some(FileKind::Docx),
            "txt" => Some(FileKind::Txt),
            _ => None,
        }
    }
}

impl std::fmt::Display for FileKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FileKind::Pdf => write!(f, "pdf"),
            FileKind::Docx => write!(f, "docx"),
            FileKind::Txt => write!(f, "txt"),
        }
    }
}

/// A file as handed to the pipeline: name plus raw bytes.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub name: String,
    pub bytes: Vec<u8>,
}

/// Extracted text tagged with its origin. Immutable; discarded once chunked.
#[derive(Debug, Clone)]
pub struct Document {
    pub source_name: String,
    pub kind: FileKind,
    pub text: String,
}

/// A bounded window of one document's text, used as the retrieval unit.
///
/// `offset` is the window start in characters within the source document.
/// Ordering within a document is preserved; ordering across documents is
/// not meaningful.
#[derive(Debug, Clone)]
pub struct Chunk {
    pub text: String,
    pub source_name: String,
    pub kind: FileKind,
    pub offset: usize,
}

/// A chunk paired with its embedding vector. One-to-one with [`Chunk`].
#[derive(Debug, Clone)]
pub struct EmbeddedChunk {
    pub chunk: Chunk,
    pub vector: Vec<f32>,
}

/// A source reference shown next to a grounded answer.
#[derive(Debug, Clone)]
pub struct Citation {
    pub source_name: String,
    /// Cosine similarity of the cited chunk against the question.
    pub score: f32,
    pub excerpt: String,
}

/// Speaker of a conversation turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Assistant,
}

/// One entry on the append-only conversation log.
#[derive(Debug, Clone)]
pub struct Turn {
    pub role: Role,
    pub content: String,
    /// Citations for grounded assistant turns; `None` for user turns and
    /// ungrounded replies.
    pub sources: Option<Vec<Citation>>,
    pub created_at: DateTime<Utc>,
}

impl Turn {
    pub fn user(content: impl Into<String>) -> Self {
        Turn {
            role: Role::User,
            content: content.into(),
            sources: None,
            created_at: Utc::now(),
        }
    }

    pub fn assistant(content: impl Into<String>, sources: Option<Vec<Citation>>) -> Self {
        Turn {
            role: Role::Assistant,
            content: content.into(),
            sources,
            created_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_kind_from_extension() {
        assert_eq!(FileKind::from_name("report.pdf"), Some(FileKind::Pdf));
        assert_eq!(FileKind::from_name("Notes.DOCX"), Some(FileKind::Docx));
        assert_eq!(FileKind::from_name("a.b.txt"), Some(FileKind::Txt));
        assert_eq!(FileKind::from_name("archive.zip"), None);
        assert_eq!(FileKind::from_name("no_extension"), None);
    }
}
