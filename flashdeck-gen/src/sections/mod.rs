//! Section building
//!
//! Partitions the page range `[1, P]` into titled, contiguous sections and
//! extracts bullet-level facts from each one. The table of contents comes from
//! the document outline when there is one, from heading detection otherwise,
//! and from an even page partition as the last resort.

pub mod builder;
pub mod facts;
pub mod headings;

pub use builder::{
    build_sections, build_sections_with_source, even_partition, sections_from_plan, SectionSource,
};

use crate::models::Page;

/// Concatenated document text with a page-boundary table
///
/// Maps a byte offset in the concatenation back to its page number by binary
/// search over page start offsets.
#[derive(Debug, Clone)]
pub struct PageIndex {
    text: String,
    starts: Vec<usize>,
    numbers: Vec<u32>,
}

impl PageIndex {
    pub fn new(pages: &[Page]) -> Self {
        let mut text = String::new();
        let mut starts = Vec::with_capacity(pages.len());
        let mut numbers = Vec::with_capacity(pages.len());

        for (i, page) in pages.iter().enumerate() {
            if i > 0 {
                text.push('\n');
            }
            starts.push(text.len());
            numbers.push(page.number);
            text.push_str(&page.text);
        }

        Self {
            text,
            starts,
            numbers,
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Page containing the byte at `offset`
    pub fn page_at(&self, offset: usize) -> Option<u32> {
        if self.starts.is_empty() {
            return None;
        }
        let idx = self.starts.partition_point(|&start| start <= offset);
        Some(self.numbers[idx.saturating_sub(1)])
    }
}

/// Text of the inclusive page range
///
/// Pages are separated by a blank line so a page break is also a paragraph
/// break for chunking.
pub(crate) fn range_text(pages: &[Page], start: u32, end: u32) -> String {
    pages
        .iter()
        .filter(|p| p.number >= start && p.number <= end)
        .map(|p| p.text.trim())
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join("\n\n")
}
