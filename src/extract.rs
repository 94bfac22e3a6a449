//! Per-format text extraction for uploaded files (PDF, DOCX, plain text).
//!
//! Extraction is pipeline-layer: the ingestor supplies bytes plus a
//! [`FileKind`]; this module returns plain UTF-8 text. Failures are typed so
//! the batch report can name what went wrong for each file without aborting
//! the rest of the batch.

use std::io::Read;

use crate::models::FileKind;

/// Maximum decompressed bytes read from the DOCX document part (zip-bomb bound).
const MAX_XML_ENTRY_BYTES: u64 = 50 * 1024 * 1024;

/// Extraction error. Never panics; the ingestor excludes the file and keeps going.
#[derive(Debug)]
pub enum ExtractError {
    Pdf(String),
    Docx(String),
    Utf8(String),
}

impl std::fmt::Display for ExtractError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExtractError::Pdf(e) => write!(f, "PDF extraction failed: {}", e),
            ExtractError::Docx(e) => write!(f, "DOCX extraction failed: {}", e),
            ExtractError::Utf8(e) => write!(f, "text decode failed: {}", e),
        }
    }
}

impl std::error::Error for ExtractError {}

/// Extract plain text from file bytes according to the detected format.
pub fn extract_text(kind: FileKind, bytes: &[u8]) -> Result<String, ExtractError> {
    match kind {
        FileKind::Pdf => extract_pdf(bytes),
        FileKind::Docx => extract_docx(bytes),
        FileKind::Txt => extract_txt(bytes),
    }
}

/// Page text concatenation via pdf-extract.
fn extract_pdf(bytes: &[u8]) -> Result<String, ExtractError> {
    pdf_extract::extract_text_from_mem(bytes).map_err(|e| ExtractError::Pdf(e.to_string()))
}

/// Strict UTF-8 decode; a text upload with invalid bytes is a per-file failure.
fn extract_txt(bytes: &[u8]) -> Result<String, ExtractError> {
    String::from_utf8(bytes.to_vec()).map_err(|e| ExtractError::Utf8(e.to_string()))
}

/// Paragraph concatenation from `word/document.xml` inside the DOCX archive.
///
/// Text runs (`w:t`) within a paragraph are joined as-is; each closed
/// paragraph (`w:p`) contributes a newline, matching how word processors
/// linearize body text.
fn extract_docx(bytes: &[u8]) -> Result<String, ExtractError> {
    let mut archive = zip::ZipArchive::new(std::io::Cursor::new(bytes))
        .map_err(|e| ExtractError::Docx(e.to_string()))?;

    let mut doc_xml = Vec::new();
    {
        let entry = archive
            .by_name("word/document.xml")
            .map_err(|_| ExtractError::Docx("word/document.xml not found".to_string()))?;
        entry
            .take(MAX_XML_ENTRY_BYTES)
            .read_to_end(&mut doc_xml)
            .map_err(|e| ExtractError::Docx(e.to_string()))?;
        if doc_xml.len() as u64 >= MAX_XML_ENTRY_BYTES {
            return Err(ExtractError::Docx(
                "word/document.xml exceeds size limit".to_string(),
            ));
        }
    }

    extract_paragraph_text(&doc_xml)
}

fn extract_paragraph_text(xml: &[u8]) -> Result<String, ExtractError> {
    let mut out = String::new();
    let mut reader = quick_xml::Reader::from_reader(xml);
    reader.config_mut().trim_text(false);
    let mut buf = Vec::new();
    let mut in_text_run = false;
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(quick_xml::events::Event::Start(e)) => {
                if e.local_name().as_ref() == b"t" {
                    in_text_run = true;
                }
            }
            Ok(quick_xml::events::Event::Text(te)) if in_text_run => {
                out.push_str(te.unescape().unwrap_or_default().as_ref());
            }
            Ok(quick_xml::events::Event::End(e)) => {
                match e.local_name().as_ref() {
                    b"t" => in_text_run = false,
                    b"p" => out.push('\n'),
                    _ => {}
                }
            }
            Ok(quick_xml::events::Event::Eof) => break,
            Err(e) => return Err(ExtractError::Docx(e.to_string())),
            _ => {}
        }
        buf.clear();
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn docx_bytes(xml_body: &str) -> Vec<u8> {
        let mut buf = Vec::new();
        {
            let mut z = zip::ZipWriter::new(std::io::Cursor::new(&mut buf));
            z.start_file("word/document.xml", zip::write::SimpleFileOptions::default())
                .unwrap();
            z.write_all(xml_body.as_bytes()).unwrap();
            z.finish().unwrap();
        }
        buf
    }

    #[test]
    fn invalid_pdf_returns_error() {
        let err = extract_text(FileKind::Pdf, b"not a pdf").unwrap_err();
        assert!(matches!(err, ExtractError::Pdf(_)));
    }

    #[test]
    fn invalid_zip_returns_error_for_docx() {
        let err = extract_text(FileKind::Docx, b"not a zip").unwrap_err();
        assert!(matches!(err, ExtractError::Docx(_)));
    }

    #[test]
    fn docx_missing_document_part_is_an_error() {
        let mut buf = Vec::new();
        {
            let mut z = zip::ZipWriter::new(std::io::Cursor::new(&mut buf));
            z.start_file("other.xml", zip::write::SimpleFileOptions::default())
                .unwrap();
            z.write_all(b"<x/>").unwrap();
            z.finish().unwrap();
        }
        let err = extract_text(FileKind::Docx, &buf).unwrap_err();
        assert!(err.to_string().contains("word/document.xml"));
    }

    #[test]
    fn docx_paragraphs_join_with_newlines() {
        let xml = "<?xml version=\"1.0\"?>\
            <w:document xmlns:w=\"http://schemas.openxmlformats.org/wordprocessingml/2006/main\">\
            <w:body>\
            <w:p><w:r><w:t>first paragraph</w:t></w:r></w:p>\
            <w:p><w:r><w:t>second </w:t></w:r><w:r><w:t>paragraph</w:t></w:r></w:p>\
            </w:body></w:document>";
        let text = extract_text(FileKind::Docx, &docx_bytes(xml)).unwrap();
        assert_eq!(text, "first paragraph\nsecond paragraph\n");
    }

    #[test]
    fn txt_strict_utf8() {
        assert_eq!(
            extract_text(FileKind::Txt, "olá mundo".as_bytes()).unwrap(),
            "olá mundo"
        );
        let err = extract_text(FileKind::Txt, &[0xff, 0xfe, 0x00]).unwrap_err();
        assert!(matches!(err, ExtractError::Utf8(_)));
    }
}
