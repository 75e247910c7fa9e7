use serde::{Deserialize, Serialize};

/// One page of extracted text
///
/// Pages are numbered from 1 and kept even when empty so numbering stays
/// contiguous.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page {
    pub text: String,
    pub number: u32,
}

impl Page {
    pub fn new(text: impl Into<String>, number: u32) -> Self {
        Self {
            text: text.into(),
            number,
        }
    }
}

/// Outline (bookmark) entry read from document metadata
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutlineEntry {
    pub title: String,
    /// 1-based page the entry points at
    pub page: u32,
    /// Nesting depth, 1 for top-level entries
    pub level: u32,
}

impl OutlineEntry {
    pub fn new(title: impl Into<String>, page: u32, level: u32) -> Self {
        Self {
            title: title.into(),
            page,
            level,
        }
    }
}

/// Output of the page extractor
#[derive(Debug, Clone, Default)]
pub struct ExtractedDocument {
    /// Pages ordered by number
    pub pages: Vec<Page>,
    /// Outline entries, empty when the format has none
    pub outline: Vec<OutlineEntry>,
}

impl ExtractedDocument {
    pub fn page_count(&self) -> u32 {
        self.pages.len() as u32
    }

    /// Outline, or `None` when the document carried none
    pub fn outline(&self) -> Option<&[OutlineEntry]> {
        if self.outline.is_empty() {
            None
        } else {
            Some(&self.outline)
        }
    }
}
