//! DOCX reader
//!
//! A .docx file is a ZIP archive of XML parts; docx-rs gives a typed tree:
//! Document → Paragraph → Run → Text. Paragraph text is collected in order and
//! grouped into pseudo-pages.

use super::{paginate_paragraphs, WORDS_PER_PSEUDO_PAGE};
use crate::error::{GenError, GenResult};
use crate::models::Page;
use docx_rs::{read_docx, DocumentChild, ParagraphChild, RunChild};
use std::path::Path;
use tracing::debug;

/// Read a .docx file into pseudo-pages
pub fn extract_docx(path: &Path) -> GenResult<Vec<Page>> {
    let bytes = std::fs::read(path).map_err(|e| GenError::extraction(path, e))?;

    let docx = read_docx(&bytes)
        .map_err(|e| GenError::extraction(path, format!("docx parse error: {:?}", e)))?;

    let mut paragraphs: Vec<String> = Vec::new();
    for child in &docx.document.children {
        if let DocumentChild::Paragraph(para) = child {
            let text = paragraph_text(para);
            if !text.trim().is_empty() {
                paragraphs.push(text);
            }
        }
    }

    debug!(file = %path.display(), paragraphs = paragraphs.len(), "Read DOCX paragraphs");

    Ok(paginate_paragraphs(&paragraphs, WORDS_PER_PSEUDO_PAGE))
}

/// Concatenate the text runs of one paragraph
///
/// Runs are parts of the same sentence, so they join without a separator.
fn paragraph_text(para: &docx_rs::Paragraph) -> String {
    let mut parts = String::new();

    for child in &para.children {
        if let ParagraphChild::Run(run) = child {
            for rc in &run.children {
                match rc {
                    RunChild::Text(t) => parts.push_str(&t.text),
                    RunChild::Tab(_) => parts.push('\t'),
                    _ => {}
                }
            }
        }
    }

    parts
}
