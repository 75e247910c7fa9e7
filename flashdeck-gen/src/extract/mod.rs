//! Page extraction
//!
//! Turns a source document into ordered pages (plus the outline, when the
//! format carries one). PDF pages map one-to-one; DOCX and TXT have no page
//! geometry and are grouped into pseudo-pages of roughly
//! [`WORDS_PER_PSEUDO_PAGE`] words.

pub mod docx;
pub mod pdf;
pub mod text;

use crate::error::{GenError, GenResult};
use crate::models::{ExtractedDocument, Page};
use flashdeck_common::text::count_words;
use std::path::Path;
use tracing::info;

/// Target size of a DOCX/TXT pseudo-page
pub const WORDS_PER_PSEUDO_PAGE: usize = 500;

/// Supported document formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    Pdf,
    Docx,
    Txt,
}

impl DocumentFormat {
    /// Detect the format from the file extension (case-insensitive)
    pub fn from_path(path: &Path) -> GenResult<Self> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default();

        match ext.as_str() {
            "pdf" => Ok(DocumentFormat::Pdf),
            "docx" => Ok(DocumentFormat::Docx),
            "txt" => Ok(DocumentFormat::Txt),
            "" => Err(GenError::UnsupportedFormat("(no extension)".to_string())),
            other => Err(GenError::UnsupportedFormat(format!(".{}", other))),
        }
    }
}

/// Text extraction collaborator
///
/// Implementations must keep empty pages so numbering stays contiguous.
pub trait PageSource: Send + Sync {
    fn extract(&self, path: &Path) -> GenResult<ExtractedDocument>;
}

/// File-backed extractor dispatching on the file extension
#[derive(Debug, Clone, Copy, Default)]
pub struct FileExtractor;

impl FileExtractor {
    pub fn new() -> Self {
        Self
    }
}

impl PageSource for FileExtractor {
    fn extract(&self, path: &Path) -> GenResult<ExtractedDocument> {
        extract(path)
    }
}

/// Extract pages (and outline) from a PDF, DOCX or TXT file
///
/// Fails with `UnsupportedFormat` before touching the file when the extension
/// is not supported, and with `Extraction` when the reader fails.
pub fn extract(path: &Path) -> GenResult<ExtractedDocument> {
    let format = DocumentFormat::from_path(path)?;

    let document = match format {
        DocumentFormat::Pdf => pdf::extract_pdf(path)?,
        DocumentFormat::Docx => ExtractedDocument {
            pages: docx::extract_docx(path)?,
            outline: Vec::new(),
        },
        DocumentFormat::Txt => ExtractedDocument {
            pages: text::extract_txt(path)?,
            outline: Vec::new(),
        },
    };

    info!(
        file = %path.display(),
        pages = document.pages.len(),
        outline_entries = document.outline.len(),
        "Extracted document"
    );

    Ok(document)
}

/// Group paragraphs into pseudo-pages of about `words_per_page` words
///
/// Paragraphs are never split; a page closes once it reaches the budget.
/// Always returns at least one page so numbering starts at 1.
pub fn paginate_paragraphs<S: AsRef<str>>(paragraphs: &[S], words_per_page: usize) -> Vec<Page> {
    let mut pages = Vec::new();
    let mut buffer: Vec<&str> = Vec::new();
    let mut tally = 0usize;

    for para in paragraphs {
        let para = para.as_ref().trim();
        if para.is_empty() {
            continue;
        }
        buffer.push(para);
        tally += count_words(para);

        if tally >= words_per_page {
            pages.push(Page::new(buffer.join("\n\n"), pages.len() as u32 + 1));
            buffer.clear();
            tally = 0;
        }
    }

    if !buffer.is_empty() || pages.is_empty() {
        pages.push(Page::new(buffer.join("\n\n"), pages.len() as u32 + 1));
    }

    pages
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_detection() {
        assert_eq!(DocumentFormat::from_path(Path::new("a.PDF")).unwrap(), DocumentFormat::Pdf);
        assert_eq!(DocumentFormat::from_path(Path::new("b.docx")).unwrap(), DocumentFormat::Docx);
        assert_eq!(DocumentFormat::from_path(Path::new("c.txt")).unwrap(), DocumentFormat::Txt);
    }

    #[test]
    fn test_unsupported_extension_fails_without_reading() {
        // The file does not exist; the extension check must fire first.
        let err = extract(Path::new("/nowhere/notes.xyz")).unwrap_err();
        match err {
            GenError::UnsupportedFormat(ext) => assert_eq!(ext, ".xyz"),
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(matches!(
            extract(Path::new("/nowhere/README")),
            Err(GenError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn test_missing_supported_file_is_extraction_error() {
        let err = extract(Path::new("/nowhere/notes.txt")).unwrap_err();
        assert!(matches!(err, GenError::Extraction { .. }));
    }

    #[test]
    fn test_paginate_groups_by_word_budget() {
        let paras = ["one two three", "four five", "six", "seven eight nine ten"];
        let pages = paginate_paragraphs(&paras, 5);

        assert_eq!(pages.len(), 2);
        assert_eq!(pages[0].number, 1);
        assert_eq!(pages[0].text, "one two three\n\nfour five");
        assert_eq!(pages[1].number, 2);
        assert!(pages[1].text.starts_with("six"));
    }

    #[test]
    fn test_paginate_empty_input_yields_one_empty_page() {
        let pages = paginate_paragraphs::<&str>(&[], 500);
        assert_eq!(pages, vec![Page::new("", 1)]);
    }
}
