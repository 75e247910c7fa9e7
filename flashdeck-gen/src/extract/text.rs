//! Plain-text reader

use super::{paginate_paragraphs, WORDS_PER_PSEUDO_PAGE};
use crate::error::{GenError, GenResult};
use crate::models::Page;
use std::path::Path;

const FORM_FEED: char = '\x0C';

/// Read a UTF-8 text file into pages
///
/// Form feeds are honoured as explicit page breaks; without them, paragraphs
/// (blank-line separated) are grouped into pseudo-pages.
pub fn extract_txt(path: &Path) -> GenResult<Vec<Page>> {
    let bytes = std::fs::read(path).map_err(|e| GenError::extraction(path, e))?;
    let content =
        String::from_utf8(bytes).map_err(|e| GenError::extraction(path, format!("not UTF-8: {}", e)))?;

    Ok(split_text_pages(&content))
}

/// Split already-loaded text into pages
pub fn split_text_pages(content: &str) -> Vec<Page> {
    let content = content.replace("\r\n", "\n");

    if content.contains(FORM_FEED) {
        return content
            .split(FORM_FEED)
            .enumerate()
            .map(|(i, page)| Page::new(page.trim(), i as u32 + 1))
            .collect();
    }

    let paragraphs: Vec<&str> = content.split("\n\n").collect();
    paginate_paragraphs(&paragraphs, WORDS_PER_PSEUDO_PAGE)
}
