//! Synthetic documents and a fixed page source

use flashdeck_gen::extract::PageSource;
use flashdeck_gen::models::{ExtractedDocument, OutlineEntry, Page};
use flashdeck_gen::GenResult;
use std::path::Path;

/// Lower-case filler pages (no headings, no bullets), `words` words each
pub fn filler_pages(count: u32, words: usize) -> Vec<Page> {
    (1..=count)
        .map(|n| {
            let text = (0..words)
                .map(|i| format!("filler{}w{}", n, i))
                .collect::<Vec<_>>()
                .join(" ");
            Page::new(text, n)
        })
        .collect()
}

/// Filler document with one outline entry per `(title, page)`
pub fn outlined_document(entries: &[(&str, u32)], page_count: u32) -> ExtractedDocument {
    ExtractedDocument {
        pages: filler_pages(page_count, 50),
        outline: entries
            .iter()
            .map(|(title, page)| OutlineEntry::new(*title, *page, 1))
            .collect(),
    }
}

/// Page source that ignores the path and returns a fixed document
pub struct StaticSource(pub ExtractedDocument);

impl PageSource for StaticSource {
    fn extract(&self, _path: &Path) -> GenResult<ExtractedDocument> {
        Ok(self.0.clone())
    }
}
